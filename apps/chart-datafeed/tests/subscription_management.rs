//! Subscription Management Integration Tests
//!
//! Drives subscriptions through the datafeed and polls them with the pulse
//! updater against an in-memory host.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use chart_datafeed::application::services::{FetchOutcome, Tick};
use chart_datafeed::{
    Bar, ChartDatafeed, Datafeed, InMemoryHost, PulseConfig, SymbolInfo,
};

const MINUTE: i64 = 60;

/// One-minute bars covering the last hour, aligned to the minute.
fn seed_last_hour(host: &InMemoryHost, ticker: &str) -> i64 {
    let now = chrono::Utc::now().timestamp();
    let last = now - now % MINUTE;
    let bars = (0..=60)
        .map(|i| {
            let time = last - (60 - i) * MINUTE;
            let price = Decimal::new(1_000 + i, 0);
            Bar::new(time, price, price, price, price, Decimal::ONE)
        })
        .collect();
    host.set_bars(ticker, "1", bars);
    last
}

fn setup() -> (Arc<InMemoryHost>, Datafeed) {
    let host = Arc::new(InMemoryHost::new());
    let datafeed = Datafeed::new(host.clone());
    (host, datafeed)
}

fn subscribe(datafeed: &Datafeed, ticker: &str, resolution: &str, uid: &str) {
    datafeed.subscribe_bars(
        SymbolInfo::for_ticker(ticker),
        resolution.to_string(),
        Arc::new(|_| {}),
        uid.to_string(),
        None,
    );
}

async fn outcomes(tick: Tick) -> Vec<FetchOutcome> {
    let Tick::Polled { fetches, .. } = tick else {
        panic!("tick should poll");
    };
    let mut outcomes = Vec::new();
    for fetch in fetches {
        outcomes.push(fetch.await.unwrap());
    }
    outcomes
}

// =============================================================================
// Polling Tests
// =============================================================================

#[tokio::test]
async fn test_tick_polls_each_subscription_once() {
    let (host, datafeed) = setup();
    subscribe(&datafeed, "BTCUSDT", "1", "uid-1");
    subscribe(&datafeed, "ETHUSDT", "5", "uid-2");

    let updater = datafeed.pulse_updater(PulseConfig::default(), CancellationToken::new());
    let outcomes = outcomes(updater.tick()).await;

    assert_eq!(outcomes.len(), 2);
    assert_eq!(host.request_count(), 2);

    let requests = host.requests();
    assert_eq!(requests[0].symbol_info.ticker, "BTCUSDT");
    assert_eq!(requests[0].range.to - requests[0].range.from, 10 * MINUTE);
    assert_eq!(requests[1].symbol_info.ticker, "ETHUSDT");
    assert_eq!(requests[1].range.to - requests[1].range.from, 50 * MINUTE);
}

#[tokio::test]
async fn test_unsubscribed_uid_is_not_polled() {
    let (host, datafeed) = setup();
    subscribe(&datafeed, "BTCUSDT", "1", "uid-1");
    subscribe(&datafeed, "ETHUSDT", "1", "uid-2");
    datafeed.unsubscribe_bars("uid-1");

    let updater = datafeed.pulse_updater(PulseConfig::default(), CancellationToken::new());
    let _ = outcomes(updater.tick()).await;

    let requests = host.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].symbol_info.ticker, "ETHUSDT");
}

#[tokio::test]
async fn test_resubscribe_replaces_record() {
    let (host, datafeed) = setup();
    subscribe(&datafeed, "ETHUSDT", "1", "uid-1");
    datafeed.unsubscribe_bars("uid-1");
    subscribe(&datafeed, "BTCUSDT", "15", "uid-1");

    let updater = datafeed.pulse_updater(PulseConfig::default(), CancellationToken::new());
    let _ = outcomes(updater.tick()).await;

    let requests = host.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].symbol_info.ticker, "BTCUSDT");
    assert_eq!(requests[0].resolution, "15");
}

#[tokio::test]
async fn test_covered_window_is_received_without_dispatch() {
    let (host, datafeed) = setup();
    seed_last_hour(&host, "BTCUSDT");

    let calls = Arc::new(AtomicUsize::new(0));
    let listener_calls = Arc::clone(&calls);
    datafeed.subscribe_bars(
        SymbolInfo::for_ticker("BTCUSDT"),
        "1".to_string(),
        Arc::new(move |_| {
            listener_calls.fetch_add(1, Ordering::SeqCst);
        }),
        "uid-1".to_string(),
        None,
    );

    let updater = datafeed.pulse_updater(PulseConfig::default(), CancellationToken::new());
    let outcomes = outcomes(updater.tick()).await;

    assert!(matches!(outcomes[0], FetchOutcome::Received { bars } if bars >= 10));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_dispatch_pushes_latest_bar_to_every_listener() {
    let (host, datafeed) = setup();
    let last = seed_last_hour(&host, "BTCUSDT");

    let seen = Arc::new(AtomicI64::new(0));
    let calls = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let seen = Arc::clone(&seen);
        let calls = Arc::clone(&calls);
        datafeed.subscribe_bars(
            SymbolInfo::for_ticker("BTCUSDT"),
            "1".to_string(),
            Arc::new(move |bar: &Bar| {
                seen.store(bar.time, Ordering::SeqCst);
                calls.fetch_add(1, Ordering::SeqCst);
            }),
            "uid-1".to_string(),
            None,
        );
    }

    let config = PulseConfig {
        dispatch_realtime: true,
        ..PulseConfig::default()
    };
    let updater = datafeed.pulse_updater(config, CancellationToken::new());
    let outcomes = outcomes(updater.tick()).await;

    assert_eq!(outcomes, vec![FetchOutcome::Dispatched { listeners: 2 }]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(seen.load(Ordering::SeqCst), last);
    assert_eq!(datafeed.registry().last_bar_time("uid-1"), Some(last));
}

#[tokio::test]
async fn test_window_not_covered_by_host_is_empty() {
    let (host, datafeed) = setup();
    let now = chrono::Utc::now().timestamp();
    let price = Decimal::ONE;
    host.push_bar("BTCUSDT", "1", Bar::new(now - 30, price, price, price, price, price));
    subscribe(&datafeed, "BTCUSDT", "1", "uid-1");

    let updater = datafeed.pulse_updater(PulseConfig::default(), CancellationToken::new());
    let outcomes = outcomes(updater.tick()).await;

    assert_eq!(outcomes, vec![FetchOutcome::Empty]);
}

#[tokio::test]
async fn test_host_failure_releases_in_flight_gate() {
    let (host, datafeed) = setup();
    seed_last_hour(&host, "BTCUSDT");
    subscribe(&datafeed, "BTCUSDT", "1", "uid-1");
    host.fail_with(Some("maintenance"));

    let updater = datafeed.pulse_updater(PulseConfig::default(), CancellationToken::new());
    assert_eq!(outcomes(updater.tick()).await, vec![FetchOutcome::Failed]);
    assert_eq!(updater.in_flight().load(), 0);

    host.fail_with(None);
    let outcomes = outcomes(updater.tick()).await;
    assert!(matches!(outcomes[0], FetchOutcome::Received { .. }));
    assert_eq!(host.request_count(), 2);
}

#[tokio::test]
async fn test_invalid_resolution_is_skipped() {
    let (host, datafeed) = setup();
    subscribe(&datafeed, "BTCUSDT", "D", "uid-1");
    subscribe(&datafeed, "BTCUSDT", "1", "uid-2");

    let updater = datafeed.pulse_updater(PulseConfig::default(), CancellationToken::new());
    let Tick::Polled { fetches, invalid } = updater.tick() else {
        panic!("tick should poll");
    };

    assert_eq!(invalid, 1);
    assert_eq!(fetches.len(), 1);
    for fetch in fetches {
        fetch.await.unwrap();
    }
    assert_eq!(host.requests()[0].resolution, "1");
}

// =============================================================================
// Poll Loop Tests
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_pulse_polls_on_interval_until_cancelled() {
    let (host, datafeed) = setup();
    subscribe(&datafeed, "BTCUSDT", "1", "uid-1");

    let cancel = CancellationToken::new();
    let handle = datafeed
        .spawn_pulse(PulseConfig::default(), cancel.clone())
        .expect("polling enabled");

    // No poll before the first interval elapses
    tokio::time::sleep(Duration::from_secs(29)).await;
    assert_eq!(host.request_count(), 0);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(host.request_count(), 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(host.request_count(), 2);

    cancel.cancel();
    handle.await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(host.request_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_pulse_with_no_subscriptions_issues_nothing() {
    let (host, datafeed) = setup();

    let cancel = CancellationToken::new();
    let handle = datafeed
        .spawn_pulse(PulseConfig::default(), cancel.clone())
        .expect("polling enabled");

    tokio::time::sleep(Duration::from_secs(95)).await;
    cancel.cancel();
    handle.await.unwrap();

    assert_eq!(host.request_count(), 0);
}
