//! Public facade over the serving pipeline.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::config::Config;
use crate::domain::{ChainRequest, OptionQuote};
use crate::error::{Error, Result};
use crate::pipeline::{AdmissionQueue, Dispatcher, QueueItem, QuoteCache, SingleFlight, WorkerPool};
use crate::upstream::ChainSource;

/// Serves option-chain data through the admission-controlled pipeline.
///
/// Owns the wiring: constructing a service builds the cache, single-flight
/// coordinator and worker pool, and spawns the dispatcher. Dropping the
/// service closes the queue; the dispatcher drains what was admitted and
/// stops.
pub struct OptionService {
    queue: AdmissionQueue,
}

impl OptionService {
    /// Wire up and start the pipeline. Must be called from within a tokio
    /// runtime (the dispatcher is spawned here).
    pub fn new(config: &Config, source: Arc<dyn ChainSource>) -> Result<Self> {
        let pipeline = &config.pipeline;
        let (queue, receiver) = AdmissionQueue::bounded(pipeline.queue_capacity)?;
        let cache = Arc::new(QuoteCache::new(pipeline.cache_ttl()));
        let single_flight = Arc::new(SingleFlight::new());
        let pool = Arc::new(WorkerPool::new(
            pipeline.worker_pool_size,
            pipeline.worker_backlog_factor,
            pipeline.fetch_timeout(),
        )?);

        let dispatcher = Arc::new(Dispatcher::new(cache, single_flight, pool, source));
        tokio::spawn(dispatcher.run(receiver));

        info!(
            queue_capacity = pipeline.queue_capacity,
            cache_ttl_secs = pipeline.cache_ttl_secs,
            worker_pool_size = pipeline.worker_pool_size,
            "option service started"
        );
        Ok(Self { queue })
    }

    /// Resolve chain parameters for one request.
    ///
    /// Returns immediately with [`Error::InvalidRequest`] on a malformed
    /// request or [`Error::Overloaded`] when the queue is full; otherwise
    /// waits for at most one coalesced fetch latency.
    pub async fn get_option_data(&self, request: ChainRequest) -> Result<OptionQuote> {
        request.validate()?;

        let symbol = request.symbol.clone();
        let submitted_at = Instant::now();
        let (reply, response) = oneshot::channel();
        self.queue.submit(QueueItem {
            request,
            submitted_at,
            reply,
        })?;

        let result = response.await.map_err(|_| Error::PipelineClosed)?;
        debug!(
            symbol = %symbol,
            elapsed_ms = submitted_at.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "get_option_data served"
        );
        result
    }

    /// Capacity of the admission queue, as configured.
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }
}
