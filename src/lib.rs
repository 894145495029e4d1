//! Optionpipe - backpressured option-chain data serving.
//!
//! Serves computed option-chain parameters (S, K, T, r, sigma) and
//! Black-Scholes Greeks to concurrent callers with bounded latency, while
//! shielding a slow upstream data source from overload.
//!
//! # Architecture
//!
//! Requests flow through a fixed pipeline:
//!
//! - **`pipeline::AdmissionQueue`** - bounded FIFO admission with drop-newest
//!   load shedding; a full queue rejects immediately instead of blocking
//! - **`pipeline::QuoteCache`** - strict-TTL cache; entries are never served
//!   at or past their expiry
//! - **`pipeline::SingleFlight`** - coalesces concurrent misses for one key
//!   into a single upstream fetch
//! - **`pipeline::WorkerPool`** - caps concurrent upstream fetches and
//!   bounds how many may wait for a slot
//! - **`pipeline::Dispatcher`** - wires the above together and replies to
//!   callers
//!
//! The Greeks in [`domain::greeks`] are pure closed-form functions and
//! bypass the pipeline entirely.
//!
//! # Modules
//!
//! - [`config`] - TOML configuration and logging setup
//! - [`domain`] - requests, cache keys, quotes, Greeks
//! - [`error`] - error taxonomy for the crate
//! - [`pipeline`] - the concurrent serving pipeline
//! - [`service`] - the public [`service::OptionService`] facade
//! - [`upstream`] - the `ChainSource` port and HTTP implementation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use optionpipe::config::Config;
//! use optionpipe::domain::{ChainRequest, OptionType};
//! use optionpipe::service::OptionService;
//! use optionpipe::upstream::HttpChainSource;
//!
//! # async fn run() -> optionpipe::error::Result<()> {
//! let config = Config::default();
//! let source = Arc::new(HttpChainSource::new(&config.upstream)?);
//! let service = OptionService::new(&config, source)?;
//! let quote = service
//!     .get_option_data(ChainRequest::new("AAPL", OptionType::Call))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod upstream;
