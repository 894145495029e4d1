use std::future::Future;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::debug;

use crate::domain::{ChainKey, OptionQuote};
use crate::error::UpstreamError;

use super::pool::FetchFailure;

/// Outcome of one coalesced fetch, delivered identically to every waiter.
pub type FetchOutcome = Result<OptionQuote, FetchFailure>;

type SharedReceiver = Shared<oneshot::Receiver<FetchOutcome>>;

/// Coalesces concurrent fetches for the same key into a single upstream call.
///
/// The first caller for a key becomes the leader and runs the fetch; callers
/// arriving while the fetch is in flight await a shared copy of the leader's
/// outcome. The in-flight record is removed once the fetch resolves, so the
/// next call for that key starts fresh -- a failure is never replayed.
pub struct SingleFlight {
    inflight: DashMap<ChainKey, SharedReceiver>,
}

enum Role {
    Leader(oneshot::Sender<FetchOutcome>),
    Waiter(SharedReceiver),
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            inflight: DashMap::new(),
        }
    }

    /// Resolve `key` to a fetch outcome, invoking `fetch` only if no fetch
    /// for this key is already in flight.
    pub async fn resolve<F, Fut>(&self, key: ChainKey, fetch: F) -> FetchOutcome
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchOutcome>,
    {
        // The entry API makes leader election atomic: exactly one caller can
        // insert for a vacant key. The guard must not be held across await.
        let role = match self.inflight.entry(key.clone()) {
            Entry::Occupied(occupied) => Role::Waiter(occupied.get().clone()),
            Entry::Vacant(vacant) => {
                let (tx, rx) = oneshot::channel();
                vacant.insert(rx.shared());
                Role::Leader(tx)
            }
        };

        match role {
            Role::Waiter(shared) => {
                debug!(key = %key, "joining in-flight fetch");
                match shared.await {
                    Ok(outcome) => outcome,
                    // Leader dropped without sending (task cancelled).
                    Err(_) => Err(FetchFailure::Upstream(UpstreamError::Transport(
                        "in-flight fetch was abandoned".into(),
                    ))),
                }
            }
            Role::Leader(tx) => {
                debug!(key = %key, "starting upstream fetch");
                // Ensure the record is removed even if this task is cancelled
                // mid-fetch, so the key can never wedge.
                let guard = FlightGuard {
                    inflight: &self.inflight,
                    key: &key,
                };
                let outcome = fetch().await;
                drop(guard);
                let _ = tx.send(outcome.clone());
                outcome
            }
        }
    }

    /// Number of keys with a fetch currently in flight.
    pub fn inflight_count(&self) -> usize {
        self.inflight.len()
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

struct FlightGuard<'a> {
    inflight: &'a DashMap<ChainKey, SharedReceiver>,
    key: &'a ChainKey,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.inflight.remove(self.key);
    }
}
