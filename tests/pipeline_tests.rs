//! End-to-end tests for the serving pipeline.
//!
//! All timing-sensitive tests run on a paused tokio clock: upstream latency
//! and TTL boundaries are crossed with `tokio::time::advance`, so the suite
//! is deterministic and instant.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;

use optionpipe::config::{Config, PipelineConfig};
use optionpipe::domain::{ChainRequest, OptionQuote, OptionType};
use optionpipe::error::{Error, UpstreamError};
use optionpipe::service::OptionService;
use optionpipe::upstream::ChainSource;

/// Upstream stand-in with controllable latency and failure, plus call
/// accounting.
struct MockSource {
    delay: Duration,
    failing: AtomicBool,
    calls: AtomicUsize,
    per_symbol: Mutex<HashMap<String, usize>>,
    fetch_order: Mutex<Vec<String>>,
}

impl MockSource {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            per_symbol: Mutex::new(HashMap::new()),
            fetch_order: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn calls_for(&self, symbol: &str) -> usize {
        self.per_symbol.lock().get(symbol).copied().unwrap_or(0)
    }

    fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainSource for MockSource {
    async fn fetch(&self, request: &ChainRequest) -> Result<OptionQuote, UpstreamError> {
        let symbol = request.symbol.to_ascii_uppercase();
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.per_symbol.lock().entry(symbol.clone()).or_insert(0) += 1;
        self.fetch_order.lock().push(symbol.clone());

        tokio::time::sleep(self.delay).await;

        if self.failing.load(Ordering::SeqCst) {
            return Err(UpstreamError::NoChain { symbol });
        }
        Ok(OptionQuote {
            spot: 100.0 + symbol.len() as f64,
            strike: request.strike.unwrap_or(100.0),
            time_to_expiry: 0.25,
            rate: request.rate.unwrap_or(0.045),
            implied_vol: request.volatility.unwrap_or(0.2),
            option_type: request.option_type,
            expiry: NaiveDate::from_ymd_opt(2026, 12, 18).unwrap(),
        })
    }
}

fn config(queue_capacity: usize, cache_ttl_secs: u64, worker_pool_size: usize) -> Config {
    Config {
        pipeline: PipelineConfig {
            queue_capacity,
            cache_ttl_secs,
            worker_pool_size,
            worker_backlog_factor: 4,
            fetch_timeout_secs: 10,
        },
        ..Config::default()
    }
}

fn request(symbol: &str) -> ChainRequest {
    ChainRequest::new(symbol, OptionType::Call)
}

#[tokio::test(start_paused = true)]
async fn concurrent_misses_for_one_key_trigger_exactly_one_fetch() {
    let source = MockSource::new(Duration::from_millis(100));
    let service = Arc::new(OptionService::new(&config(16, 60, 4), source.clone()).unwrap());

    let mut handles = Vec::new();
    for _ in 0..5 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(
            async move { service.get_option_data(request("AAPL")).await },
        ));
    }

    let mut quotes = Vec::new();
    for handle in handles {
        quotes.push(handle.await.unwrap().unwrap());
    }

    assert_eq!(source.calls(), 1);
    // Every coalesced waiter sees the identical outcome.
    for quote in &quotes[1..] {
        assert_eq!(quote, &quotes[0]);
    }
}

#[tokio::test(start_paused = true)]
async fn cached_quotes_are_served_without_a_fetch_until_the_ttl() {
    let source = MockSource::new(Duration::from_millis(100));
    let service = OptionService::new(&config(16, 60, 4), source.clone()).unwrap();

    let first = service.get_option_data(request("AAPL")).await.unwrap();
    assert_eq!(source.calls(), 1);

    tokio::time::advance(Duration::from_secs(1)).await;
    let second = service.get_option_data(request("AAPL")).await.unwrap();
    assert_eq!(source.calls(), 1, "fresh entry must be served from cache");
    assert_eq!(first, second);

    // 61s after the entry was created: expired, a new fetch is required.
    tokio::time::advance(Duration::from_secs(61)).await;
    service.get_option_data(request("AAPL")).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn equivalent_requests_hit_the_same_cache_entry() {
    let source = MockSource::new(Duration::from_millis(10));
    let service = OptionService::new(&config(16, 60, 4), source.clone()).unwrap();

    service.get_option_data(request("aapl")).await.unwrap();
    service.get_option_data(request("AAPL")).await.unwrap();
    assert_eq!(source.calls(), 1);

    // A different option type is a different key.
    service
        .get_option_data(ChainRequest::new("AAPL", OptionType::Put))
        .await
        .unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn upstream_failure_is_not_cached() {
    let source = MockSource::new(Duration::from_millis(10));
    let service = OptionService::new(&config(16, 60, 4), source.clone()).unwrap();

    source.set_failing(true);
    let err = service.get_option_data(request("TSLA")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Upstream(UpstreamError::NoChain { .. })
    ));
    assert_eq!(source.calls(), 1);

    // The failure is not replayed: the next request fetches fresh.
    source.set_failing(false);
    service.get_option_data(request("TSLA")).await.unwrap();
    assert_eq!(source.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn coalesced_waiters_all_observe_the_same_failure() {
    let source = MockSource::new(Duration::from_millis(100));
    let service = Arc::new(OptionService::new(&config(16, 60, 4), source.clone()).unwrap());
    source.set_failing(true);

    let mut handles = Vec::new();
    for _ in 0..3 {
        let service = Arc::clone(&service);
        handles.push(tokio::spawn(
            async move { service.get_option_data(request("NVDA")).await },
        ));
    }

    for handle in handles {
        assert!(matches!(
            handle.await.unwrap(),
            Err(Error::Upstream(UpstreamError::NoChain { .. }))
        ));
    }
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn hanging_upstream_times_out_and_frees_the_pool() {
    let source = MockSource::new(Duration::from_secs(3600));
    let service = OptionService::new(&config(16, 60, 2), source.clone()).unwrap();

    let err = service.get_option_data(request("AAPL")).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Upstream(UpstreamError::TimedOut { timeout_secs: 10 })
    ));
}

#[tokio::test(start_paused = true)]
async fn invalid_requests_never_enter_the_queue() {
    let source = MockSource::new(Duration::from_millis(10));
    let service = OptionService::new(&config(16, 60, 4), source.clone()).unwrap();

    let err = service.get_option_data(request("")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidRequest { .. }));

    let err = service
        .get_option_data(request("AAPL").with_strike(-10.0))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidRequest { .. }));

    assert_eq!(source.calls(), 0);
}

/// The reference scenario: capacity 5, TTL 60s, six simultaneous requests
/// for distinct symbols.
#[tokio::test(start_paused = true)]
async fn end_to_end_burst_with_shedding_caching_and_expiry() {
    let source = MockSource::new(Duration::from_millis(100));
    let service = Arc::new(OptionService::new(&config(5, 60, 8), source.clone()).unwrap());

    // Spawned tasks submit synchronously on first poll, before the
    // dispatcher (waiting on recv) gets to drain anything, so all six race
    // for five slots.
    let mut handles = Vec::new();
    for i in 0..6 {
        let service = Arc::clone(&service);
        let symbol = format!("SYM{i}");
        handles.push(tokio::spawn(async move {
            service.get_option_data(request(&symbol)).await
        }));
    }

    let mut served = 0;
    let mut shed = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => served += 1,
            Err(Error::Overloaded) => shed += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(served, 5);
    assert_eq!(shed, 1, "exactly the newest submission is shed");

    // Distinct keys do not coalesce: one fetch each, started in FIFO order.
    assert_eq!(source.calls(), 5);
    let order = source.fetch_order.lock().clone();
    let mut sorted = order.clone();
    sorted.sort();
    assert_eq!(order, sorted, "fetches start in admission order");

    // 1s later the first symbol is a cache hit.
    tokio::time::advance(Duration::from_secs(1)).await;
    let first = order[0].clone();
    service.get_option_data(request(&first)).await.unwrap();
    assert_eq!(source.calls_for(&first), 1);

    // 61s after it was cached, the same request fetches fresh.
    tokio::time::advance(Duration::from_secs(61)).await;
    service.get_option_data(request(&first)).await.unwrap();
    assert_eq!(source.calls_for(&first), 2);
}

#[tokio::test(start_paused = true)]
async fn accepted_work_is_served_after_a_shed_burst() {
    let source = MockSource::new(Duration::from_millis(50));
    let service = Arc::new(OptionService::new(&config(2, 60, 4), source.clone()).unwrap());

    let mut handles = Vec::new();
    for i in 0..3 {
        let service = Arc::clone(&service);
        let symbol = format!("BURST{i}");
        handles.push(tokio::spawn(async move {
            service.get_option_data(request(&symbol)).await
        }));
    }

    let outcomes: Vec<_> = {
        let mut v = Vec::new();
        for handle in handles {
            v.push(handle.await.unwrap());
        }
        v
    };
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 2);
    assert!(matches!(outcomes[2], Err(Error::Overloaded)));

    // The system recovers: a later request is admitted normally.
    service.get_option_data(request("BURST2")).await.unwrap();
}
