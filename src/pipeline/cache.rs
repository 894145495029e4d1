use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::{ChainKey, OptionQuote};

struct CacheEntry {
    value: OptionQuote,
    expires_at: Instant,
}

/// Strict-TTL quote cache.
///
/// An entry is servable only while `now < expires_at`; at or past the
/// deadline it behaves exactly like a miss. Expired entries are evicted
/// lazily on lookup. The cache itself puts no bound on key count -- the
/// admission queue is the pipeline's load limiter.
pub struct QuoteCache {
    ttl: Duration,
    entries: Mutex<HashMap<ChainKey, CacheEntry>>,
}

impl QuoteCache {
    /// Create a cache with a uniform TTL applied to every entry.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached quote for `key` if it is still fresh.
    pub fn get(&self, key: &ChainKey) -> Option<OptionQuote> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(entry) if Instant::now() < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                debug!(key = %key, "evicting expired cache entry");
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store `value` under `key`, overwriting any prior entry. The new entry
    /// expires exactly `ttl` from now.
    pub fn put(&self, key: ChainKey, value: OptionQuote) {
        let expires_at = Instant::now() + self.ttl;
        debug!(key = %key, ttl_secs = self.ttl.as_secs(), "cache populate");
        self.entries.lock().insert(key, CacheEntry { value, expires_at });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChainRequest, OptionType};
    use chrono::NaiveDate;

    fn quote(spot: f64) -> OptionQuote {
        OptionQuote {
            spot,
            strike: 100.0,
            time_to_expiry: 0.5,
            rate: 0.045,
            implied_vol: 0.2,
            option_type: OptionType::Call,
            expiry: NaiveDate::from_ymd_opt(2026, 12, 18).unwrap(),
        }
    }

    fn key(symbol: &str) -> ChainKey {
        ChainRequest::new(symbol, OptionType::Call).key()
    }

    #[tokio::test(start_paused = true)]
    async fn serves_fresh_entries_and_expires_at_the_boundary() {
        let cache = QuoteCache::new(Duration::from_secs(60));
        cache.put(key("AAPL"), quote(190.0));

        tokio::time::advance(Duration::from_millis(59_999)).await;
        assert_eq!(cache.get(&key("AAPL")).unwrap().spot, 190.0);

        // now == expires_at: must behave as a miss.
        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(cache.get(&key("AAPL")).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_evicted_on_lookup() {
        let cache = QuoteCache::new(Duration::from_secs(60));
        cache.put(key("MSFT"), quote(410.0));
        tokio::time::advance(Duration::from_secs(61)).await;

        assert!(cache.get(&key("MSFT")).is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn put_overwrites_and_refreshes_expiry() {
        let cache = QuoteCache::new(Duration::from_secs(60));
        cache.put(key("NVDA"), quote(100.0));

        tokio::time::advance(Duration::from_secs(45)).await;
        cache.put(key("NVDA"), quote(105.0));

        // 50s after the overwrite; the original entry would be long expired.
        tokio::time::advance(Duration::from_secs(50)).await;
        assert_eq!(cache.get(&key("NVDA")).unwrap().spot, 105.0);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_do_not_collide() {
        let cache = QuoteCache::new(Duration::from_secs(60));
        cache.put(key("AAPL"), quote(190.0));
        assert!(cache.get(&key("TSLA")).is_none());
        assert!(cache
            .get(&ChainRequest::new("AAPL", OptionType::Put).key())
            .is_none());
    }
}
