//! The concurrent serving pipeline.
//!
//! Flow: caller -> [`AdmissionQueue`] -> [`Dispatcher`] -> [`QuoteCache`]
//! (hit: reply) -> on miss [`SingleFlight`] -> [`WorkerPool`] -> upstream
//! fetch -> cache populate -> fan-out to every coalesced waiter.

mod cache;
mod dispatcher;
mod pool;
mod queue;
mod single_flight;

pub use cache::QuoteCache;
pub use dispatcher::Dispatcher;
pub use pool::{FetchFailure, WorkerPool};
pub use queue::{AdmissionQueue, QueueItem, QueueReceiver};
pub use single_flight::{FetchOutcome, SingleFlight};
