//! Domain types: requests, cache keys, quotes, and the Greeks math.

pub mod greeks;
mod quote;
mod request;

pub use quote::OptionQuote;
pub use request::{ChainKey, ChainRequest, OptionType};
