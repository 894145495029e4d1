use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::OptionType;

/// Resolved option-chain parameters for one contract.
///
/// Field names follow the Black-Scholes convention: `spot` is S, `strike` is
/// K, `time_to_expiry` is T in years, `rate` is r, `implied_vol` is sigma.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionQuote {
    pub spot: f64,
    pub strike: f64,
    pub time_to_expiry: f64,
    pub rate: f64,
    pub implied_vol: f64,
    pub option_type: OptionType,
    pub expiry: NaiveDate,
}
