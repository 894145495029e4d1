//! Upstream chain-data sources.
//!
//! The pipeline only sees the [`ChainSource`] port; transport details live in
//! the implementations. Upstream calls are assumed slow (tens to hundreds of
//! milliseconds) -- the worker pool is the rate limiter in front of them.

mod http;

use async_trait::async_trait;

use crate::domain::{ChainRequest, OptionQuote};
use crate::error::UpstreamError;

pub use http::HttpChainSource;

/// A source of option-chain data.
#[async_trait]
pub trait ChainSource: Send + Sync {
    /// Fetch and resolve chain parameters for one request.
    async fn fetch(&self, request: &ChainRequest) -> Result<OptionQuote, UpstreamError>;
}
