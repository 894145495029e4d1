//! HTTP chain source.
//!
//! Speaks a plain JSON chain document and reproduces the reference selection
//! rules: nearest listed expiry when none is requested, the listed strike
//! closest to the request (or to spot), chain-implied volatility and a fixed
//! reference risk-free rate unless the request overrides them.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::domain::{ChainRequest, OptionQuote, OptionType};
use crate::error::{Result, UpstreamError};

use super::ChainSource;

/// Reference risk-free rate used when the request does not override it.
const DEFAULT_RISK_FREE_RATE: f64 = 0.045;

/// Floor for time-to-expiry, in years. Contracts expiring today would
/// otherwise divide by zero in the Greeks.
const MIN_TIME_TO_EXPIRY: f64 = 0.001;

const DAYS_PER_YEAR: f64 = 365.0;

/// Raw chain document as served by the upstream endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainDocument {
    pub symbol: String,
    /// Last traded price of the underlying.
    pub spot: f64,
    /// Listed expiration dates, ascending.
    pub expirations: Vec<NaiveDate>,
    pub contracts: Vec<ContractRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContractRow {
    pub strike: f64,
    pub implied_volatility: f64,
    pub option_type: OptionType,
    pub expiry: NaiveDate,
}

/// Chain source backed by an HTTP JSON endpoint.
pub struct HttpChainSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpChainSource {
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ChainSource for HttpChainSource {
    async fn fetch(&self, request: &ChainRequest) -> std::result::Result<OptionQuote, UpstreamError> {
        let symbol = request.symbol.trim().to_ascii_uppercase();
        let url = format!("{}/chain/{}", self.base_url, symbol);
        debug!(symbol = %symbol, url = %url, "fetching option chain");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UpstreamError::Transport(format!(
                "upstream returned {} for {symbol}",
                response.status()
            )));
        }

        let document: ChainDocument = response
            .json()
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        select_quote(&document, request, Utc::now().date_naive())
    }
}

/// Resolve a request against a chain document.
///
/// Pure so the selection rules are testable without a server.
pub fn select_quote(
    document: &ChainDocument,
    request: &ChainRequest,
    today: NaiveDate,
) -> std::result::Result<OptionQuote, UpstreamError> {
    let symbol = document.symbol.clone();

    if !document.spot.is_finite() || document.spot <= 0.0 {
        return Err(UpstreamError::NoPrice { symbol });
    }
    if document.expirations.is_empty() {
        return Err(UpstreamError::NoChain { symbol });
    }

    let expiry = match request.expiry {
        Some(requested) => {
            if !document.expirations.contains(&requested) {
                return Err(UpstreamError::UnknownExpiry {
                    symbol,
                    requested: requested.to_string(),
                });
            }
            requested
        }
        None => match document.expirations.iter().min() {
            Some(nearest) => *nearest,
            None => return Err(UpstreamError::NoChain { symbol }),
        },
    };

    // Nearest listed strike to the requested one, or at-the-money when no
    // strike was requested.
    let target = request.strike.unwrap_or(document.spot);
    let contract = document
        .contracts
        .iter()
        .filter(|c| c.option_type == request.option_type && c.expiry == expiry)
        .min_by(|a, b| {
            let da = (a.strike - target).abs();
            let db = (b.strike - target).abs();
            da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
        })
        .ok_or(UpstreamError::NoChain { symbol })?;

    let days = (expiry - today).num_days();
    let time_to_expiry = (days as f64 / DAYS_PER_YEAR).max(MIN_TIME_TO_EXPIRY);

    Ok(OptionQuote {
        spot: document.spot,
        strike: contract.strike,
        time_to_expiry,
        rate: request.rate.unwrap_or(DEFAULT_RISK_FREE_RATE),
        implied_vol: request.volatility.unwrap_or(contract.implied_volatility),
        option_type: request.option_type,
        expiry,
    })
}
