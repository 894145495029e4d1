//! Closed-form Black-Scholes Greeks.
//!
//! Pure, stateless numeric functions. These bypass the serving pipeline
//! entirely: no caching, no queueing, sub-microsecond.

use crate::error::{Error, Result};

use super::{OptionQuote, OptionType};

const SQRT_2: f64 = std::f64::consts::SQRT_2;
const SQRT_2PI: f64 = 2.506_628_274_631_000_2;

/// Sensitivity of the option price to the underlying price.
///
/// Call delta lies in [0, 1], put delta in [-1, 0].
pub fn delta(s: f64, k: f64, t: f64, r: f64, sigma: f64, option_type: OptionType) -> Result<f64> {
    validate_inputs(s, k, t, sigma)?;
    let d1 = d1(s, k, t, r, sigma);
    match option_type {
        OptionType::Call => Ok(norm_cdf(d1)),
        OptionType::Put => Ok(norm_cdf(d1) - 1.0),
    }
}

/// Second derivative of the option price with respect to the underlying
/// price. Identical for calls and puts.
pub fn gamma(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> Result<f64> {
    validate_inputs(s, k, t, sigma)?;
    let d1 = d1(s, k, t, r, sigma);
    Ok(norm_pdf(d1) / (s * sigma * t.sqrt()))
}

/// Time decay of the option price, per year.
pub fn theta(s: f64, k: f64, t: f64, r: f64, sigma: f64, option_type: OptionType) -> Result<f64> {
    validate_inputs(s, k, t, sigma)?;
    let d1 = d1(s, k, t, r, sigma);
    let d2 = d1 - sigma * t.sqrt();
    let term1 = -(s * sigma * norm_pdf(d1)) / (2.0 * t.sqrt());
    let theta = match option_type {
        OptionType::Call => term1 - r * k * (-r * t).exp() * norm_cdf(d2),
        OptionType::Put => term1 + r * k * (-r * t).exp() * norm_cdf(-d2),
    };
    Ok(theta)
}

/// Sensitivity to volatility. Identical for calls and puts, always
/// non-negative.
pub fn vega(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> Result<f64> {
    validate_inputs(s, k, t, sigma)?;
    let d1 = d1(s, k, t, r, sigma);
    Ok(s * t.sqrt() * norm_pdf(d1))
}

/// Sensitivity to the risk-free rate.
pub fn rho(s: f64, k: f64, t: f64, r: f64, sigma: f64, option_type: OptionType) -> Result<f64> {
    validate_inputs(s, k, t, sigma)?;
    let d1 = d1(s, k, t, r, sigma);
    let d2 = d1 - sigma * t.sqrt();
    let rho = match option_type {
        OptionType::Call => k * t * (-r * t).exp() * norm_cdf(d2),
        OptionType::Put => -k * t * (-r * t).exp() * norm_cdf(-d2),
    };
    Ok(rho)
}

/// All five Greeks for a resolved quote.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub theta: f64,
    pub vega: f64,
    pub rho: f64,
}

impl Greeks {
    pub fn for_quote(q: &OptionQuote) -> Result<Self> {
        let (s, k, t, r, sigma) = (q.spot, q.strike, q.time_to_expiry, q.rate, q.implied_vol);
        Ok(Greeks {
            delta: delta(s, k, t, r, sigma, q.option_type)?,
            gamma: gamma(s, k, t, r, sigma)?,
            theta: theta(s, k, t, r, sigma, q.option_type)?,
            vega: vega(s, k, t, r, sigma)?,
            rho: rho(s, k, t, r, sigma, q.option_type)?,
        })
    }
}

/// Shares per listed contract. One contract controls 100 shares.
const CONTRACT_MULTIPLIER: f64 = 100.0;

/// One option position in a portfolio: a resolved contract and a signed
/// number of contracts (negative is short).
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub quote: OptionQuote,
    pub contracts: f64,
}

/// Portfolio delta/gamma exposure under an instantaneous spot shock.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RiskShock {
    /// The applied shock, as a fraction of spot (e.g. -0.02 for -2%).
    pub shock_percent: f64,
    /// Sum of delta * contracts * spot * multiplier across positions.
    pub total_dollar_delta: f64,
    /// Delta P&L plus gamma P&L under the shock.
    pub estimated_pnl_impact: f64,
    pub delta_pnl_contribution: f64,
    pub gamma_pnl_contribution: f64,
    /// Net portfolio delta before and after the shock, in contracts.
    pub base_net_delta: f64,
    pub shocked_net_delta: f64,
}

/// Aggregate portfolio Greeks and estimate P&L under a spot shock.
///
/// For each position: delta P&L is `delta * dS`, gamma P&L is
/// `0.5 * gamma * dS^2`, with `dS = spot * shock_percent`. The shocked net
/// delta re-evaluates delta at the shocked spot, showing how much the
/// portfolio's directional exposure drifts through the move.
pub fn risk_shock(positions: &[Position], shock_percent: f64) -> Result<RiskShock> {
    if positions.is_empty() {
        return Err(Error::invalid("portfolio must contain at least one position"));
    }
    if !shock_percent.is_finite() || shock_percent <= -1.0 {
        return Err(Error::invalid(format!(
            "shock_percent must be a finite fraction greater than -1, got {shock_percent}"
        )));
    }

    let mut total_dollar_delta = 0.0;
    let mut delta_pnl = 0.0;
    let mut gamma_pnl = 0.0;
    let mut base_net_delta = 0.0;
    let mut shocked_net_delta = 0.0;

    for position in positions {
        let q = &position.quote;
        if !position.contracts.is_finite() {
            return Err(Error::invalid(format!(
                "position size must be finite, got {}",
                position.contracts
            )));
        }
        let (s, k, t, r, sigma) = (q.spot, q.strike, q.time_to_expiry, q.rate, q.implied_vol);

        let base_delta = delta(s, k, t, r, sigma, q.option_type)?;
        let base_gamma = gamma(s, k, t, r, sigma)?;
        let shocked_delta = delta(s * (1.0 + shock_percent), k, t, r, sigma, q.option_type)?;

        let ds = s * shock_percent;
        total_dollar_delta += base_delta * position.contracts * s * CONTRACT_MULTIPLIER;
        delta_pnl += base_delta * position.contracts * ds * CONTRACT_MULTIPLIER;
        gamma_pnl += 0.5 * base_gamma * position.contracts * ds * ds * CONTRACT_MULTIPLIER;
        base_net_delta += base_delta * position.contracts;
        shocked_net_delta += shocked_delta * position.contracts;
    }

    Ok(RiskShock {
        shock_percent,
        total_dollar_delta,
        estimated_pnl_impact: delta_pnl + gamma_pnl,
        delta_pnl_contribution: delta_pnl,
        gamma_pnl_contribution: gamma_pnl,
        base_net_delta,
        shocked_net_delta,
    })
}

fn validate_inputs(s: f64, k: f64, t: f64, sigma: f64) -> Result<()> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if !positive(s) {
        return Err(Error::invalid(format!("spot must be positive, got {s}")));
    }
    if !positive(k) {
        return Err(Error::invalid(format!("strike must be positive, got {k}")));
    }
    if !positive(t) {
        return Err(Error::invalid(format!(
            "time to expiry must be positive, got {t}"
        )));
    }
    if !positive(sigma) {
        return Err(Error::invalid(format!(
            "volatility must be positive, got {sigma}"
        )));
    }
    Ok(())
}

fn d1(s: f64, k: f64, t: f64, r: f64, sigma: f64) -> f64 {
    ((s / k).ln() + (r + 0.5 * sigma * sigma) * t) / (sigma * t.sqrt())
}

fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / SQRT_2PI
}

fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / SQRT_2))
}

/// Abramowitz & Stegun 7.1.26, max absolute error 1.5e-7.
fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254829592;
    const A2: f64 = -0.284496736;
    const A3: f64 = 1.421413741;
    const A4: f64 = -1.453152027;
    const A5: f64 = 1.061405429;
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + P * x);
    let y = 1.0 - (((((A5 * t + A4) * t) + A3) * t + A2) * t + A1) * t * (-x * x).exp();

    sign * y
}
