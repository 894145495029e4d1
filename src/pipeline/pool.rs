use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use thiserror::Error as ThisError;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::warn;

use crate::domain::OptionQuote;
use crate::error::{ConfigError, Error, Result, UpstreamError};

/// Why a pool execution did not produce a quote.
///
/// `Clone` because the single-flight coordinator fans one outcome out to
/// every coalesced waiter.
#[derive(ThisError, Debug, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// The pool's bounded backlog was full; the fetch was shed, not queued.
    #[error("worker pool saturated")]
    PoolSaturated,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl From<FetchFailure> for Error {
    fn from(failure: FetchFailure) -> Self {
        match failure {
            FetchFailure::PoolSaturated => Error::Overloaded,
            FetchFailure::Upstream(e) => Error::Upstream(e),
        }
    }
}

/// Fixed-size executor for upstream fetches.
///
/// At most `size` fetches run concurrently; up to `backlog_factor * size`
/// more may wait for a slot. Beyond that, `execute` rejects immediately with
/// the same drop-newest philosophy as the admission queue. Every fetch runs
/// under a timeout so one hanging upstream call cannot hold a slot forever.
pub struct WorkerPool {
    semaphore: Semaphore,
    /// Running + waiting executions. Bounds the internal backlog.
    pending: AtomicUsize,
    max_pending: usize,
    fetch_timeout: Duration,
}

impl WorkerPool {
    pub fn new(size: usize, backlog_factor: usize, fetch_timeout: Duration) -> Result<Self> {
        if size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "worker_pool_size",
                reason: "must be at least 1".into(),
            }
            .into());
        }
        Ok(Self {
            semaphore: Semaphore::new(size),
            pending: AtomicUsize::new(0),
            max_pending: size + size * backlog_factor,
            fetch_timeout,
        })
    }

    /// Run `fetch` on a pool slot, waiting for one if all are busy.
    pub async fn execute<F, Fut>(&self, fetch: F) -> std::result::Result<OptionQuote, FetchFailure>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<OptionQuote, UpstreamError>>,
    {
        // Claim a backlog slot before waiting on the semaphore. Admission is
        // granted only if the post-increment count stays within the bound, so
        // racing claims for the last slot cannot both win.
        let claimed = self.pending.fetch_add(1, Ordering::SeqCst) + 1;
        if claimed > self.max_pending {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            warn!(max_pending = self.max_pending, "worker pool backlog full, shedding fetch");
            return Err(FetchFailure::PoolSaturated);
        }
        let _pending = PendingGuard(&self.pending);

        // The semaphore is never closed, so acquire can only fail if the
        // pool itself is gone.
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchFailure::PoolSaturated)?;

        match timeout(self.fetch_timeout, fetch()).await {
            Ok(result) => result.map_err(FetchFailure::Upstream),
            Err(_) => Err(FetchFailure::Upstream(UpstreamError::TimedOut {
                timeout_secs: self.fetch_timeout.as_secs(),
            })),
        }
    }

    /// Running + waiting executions.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

struct PendingGuard<'a>(&'a AtomicUsize);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
