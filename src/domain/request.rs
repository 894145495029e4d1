use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Option side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionType::Call => "call",
            OptionType::Put => "put",
        }
    }
}

impl fmt::Display for OptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "call" => Ok(OptionType::Call),
            "put" => Ok(OptionType::Put),
            other => Err(Error::invalid(format!(
                "option_type must be 'call' or 'put', got '{other}'"
            ))),
        }
    }
}

/// A request for option-chain parameters.
///
/// `strike`, `expiry`, `rate` and `volatility` are overrides; when omitted the
/// upstream source substitutes its defaults (nearest expiry, at-the-money
/// strike, its reference risk-free rate, chain-implied volatility).
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRequest {
    pub symbol: String,
    pub option_type: OptionType,
    pub expiry: Option<NaiveDate>,
    pub strike: Option<f64>,
    pub rate: Option<f64>,
    pub volatility: Option<f64>,
}

impl ChainRequest {
    pub fn new(symbol: impl Into<String>, option_type: OptionType) -> Self {
        Self {
            symbol: symbol.into(),
            option_type,
            expiry: None,
            strike: None,
            rate: None,
            volatility: None,
        }
    }

    pub fn with_expiry(mut self, expiry: NaiveDate) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn with_strike(mut self, strike: f64) -> Self {
        self.strike = Some(strike);
        self
    }

    pub fn with_rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn with_volatility(mut self, volatility: f64) -> Self {
        self.volatility = Some(volatility);
        self
    }

    /// Reject malformed requests before they enter the admission queue.
    pub fn validate(&self) -> Result<()> {
        let symbol = self.symbol.trim();
        if symbol.is_empty() {
            return Err(Error::invalid("symbol must not be empty"));
        }
        if !symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '='))
        {
            return Err(Error::invalid(format!("symbol '{symbol}' contains invalid characters")));
        }
        if let Some(strike) = self.strike {
            if !strike.is_finite() || strike <= 0.0 {
                return Err(Error::invalid(format!("strike must be positive, got {strike}")));
            }
        }
        if let Some(rate) = self.rate {
            if !rate.is_finite() {
                return Err(Error::invalid(format!("rate must be finite, got {rate}")));
            }
        }
        if let Some(vol) = self.volatility {
            if !vol.is_finite() || vol <= 0.0 {
                return Err(Error::invalid(format!(
                    "volatility must be positive, got {vol}"
                )));
            }
        }
        Ok(())
    }

    /// Normalize into the canonical cache key.
    ///
    /// Equivalent requests must collide: the symbol is case-folded and
    /// float overrides are canonicalized to fixed-point so `100` and `100.0`
    /// produce the same key.
    pub fn key(&self) -> ChainKey {
        ChainKey {
            symbol: self.symbol.trim().to_ascii_uppercase(),
            option_type: self.option_type,
            expiry: self.expiry,
            strike_milli: self.strike.map(to_milli),
            rate_micro: self.rate.map(to_micro),
            vol_micro: self.volatility.map(to_micro),
        }
    }
}

fn to_milli(v: f64) -> i64 {
    (v * 1_000.0).round() as i64
}

fn to_micro(v: f64) -> i64 {
    (v * 1_000_000.0).round() as i64
}

/// Canonical cache key for a normalized [`ChainRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainKey {
    symbol: String,
    option_type: OptionType,
    expiry: Option<NaiveDate>,
    strike_milli: Option<i64>,
    rate_micro: Option<i64>,
    vol_micro: Option<i64>,
}

impl ChainKey {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

impl fmt::Display for ChainKey {
    /// Renders every component, so keys that differ only in a rate or
    /// volatility override are distinguishable in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn segment(f: &mut fmt::Formatter<'_>, value: Option<i64>) -> fmt::Result {
            match value {
                Some(v) => write!(f, ":{v}"),
                None => write!(f, ":-"),
            }
        }

        write!(f, "{}:{}", self.symbol, self.option_type)?;
        match self.expiry {
            Some(d) => write!(f, ":{d}")?,
            None => write!(f, ":-")?,
        }
        segment(f, self.strike_milli)?;
        segment(f, self.rate_micro)?;
        segment(f, self.vol_micro)
    }
}
