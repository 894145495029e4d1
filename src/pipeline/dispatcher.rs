use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::upstream::ChainSource;

use super::{QueueItem, QueueReceiver, QuoteCache, SingleFlight, WorkerPool};

/// Orchestrates the pipeline: drains the admission queue in FIFO order and
/// routes each item through cache -> single-flight -> worker pool.
///
/// Holds no state of its own beyond the wiring.
pub struct Dispatcher {
    cache: Arc<QuoteCache>,
    single_flight: Arc<SingleFlight>,
    pool: Arc<WorkerPool>,
    source: Arc<dyn ChainSource>,
}

impl Dispatcher {
    pub fn new(
        cache: Arc<QuoteCache>,
        single_flight: Arc<SingleFlight>,
        pool: Arc<WorkerPool>,
        source: Arc<dyn ChainSource>,
    ) -> Self {
        Self {
            cache,
            single_flight,
            pool,
            source,
        }
    }

    /// Drain the queue until every sender is gone.
    ///
    /// Each item is handled on its own task so a slow fetch never stalls the
    /// dequeue loop; dequeue order stays FIFO, replies complete whenever
    /// their key resolves.
    pub async fn run(self: Arc<Self>, mut queue: QueueReceiver) {
        info!("dispatcher started");
        while let Some(item) = queue.recv().await {
            let dispatcher = Arc::clone(&self);
            tokio::spawn(async move {
                dispatcher.handle(item).await;
            });
        }
        info!("dispatcher stopped");
    }

    async fn handle(&self, item: QueueItem) {
        let QueueItem {
            request,
            submitted_at,
            reply,
        } = item;
        let key = request.key();
        let queued_ms = submitted_at.elapsed().as_millis() as u64;

        if let Some(quote) = self.cache.get(&key) {
            debug!(key = %key, queued_ms, "cache hit");
            let _ = reply.send(Ok(quote));
            return;
        }

        debug!(key = %key, queued_ms, "cache miss");
        let started = Instant::now();
        let outcome = self
            .single_flight
            .resolve(key.clone(), || {
                let cache = Arc::clone(&self.cache);
                let pool = Arc::clone(&self.pool);
                let source = Arc::clone(&self.source);
                let key = key.clone();
                let request = request.clone();
                async move {
                    let quote = pool.execute(|| async { source.fetch(&request).await }).await?;
                    // Populate once, here in the leader, so the entry's expiry
                    // is anchored to the fetch that produced it. Failures are
                    // never cached.
                    cache.put(key, quote.clone());
                    Ok(quote)
                }
            })
            .await;

        match &outcome {
            Ok(_) => debug!(
                key = %key,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "fetch resolved"
            ),
            Err(e) => warn!(
                key = %key,
                elapsed_ms = started.elapsed().as_millis() as u64,
                error = %e,
                "fetch failed"
            ),
        }

        let _ = reply.send(outcome.map_err(Error::from));
    }
}
