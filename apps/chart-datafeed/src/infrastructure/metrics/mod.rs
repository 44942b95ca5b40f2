//! Prometheus Metrics Module
//!
//! Exposes datafeed metrics via Prometheus format for monitoring.
//!
//! # Metrics Categories
//!
//! - **Ticks**: Poll cycles run and skipped
//! - **Fetches**: Poll fetch outcomes and fetches in flight
//! - **Subscriptions**: Active subscription count
//!
//! # Integration
//!
//! When a metrics port is configured, metrics are served at `/metrics` by
//! the exporter's own HTTP listener. Recording functions are no-ops until a
//! recorder is installed.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics initialization error.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// The exporter could not be built.
    #[error("failed to build Prometheus exporter: {0}")]
    Build(#[from] BuildError),
    /// Another global recorder is already installed.
    #[error("failed to install metrics recorder: {0}")]
    Install(String),
}

/// Install the Prometheus recorder and serve it on `port`.
///
/// Must be called from within a Tokio runtime. Subsequent calls return the
/// handle installed first.
///
/// # Errors
///
/// Returns an error if the exporter cannot be built or a recorder is
/// already installed.
pub fn init_metrics(port: u16) -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let (recorder, exporter) = PrometheusBuilder::new().with_http_listener(addr).build()?;
    let handle = recorder.handle();

    metrics::set_global_recorder(recorder).map_err(|e| MetricsError::Install(e.to_string()))?;
    tokio::spawn(exporter);

    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "chart_datafeed_ticks_total",
        "Total poll ticks that issued fetches"
    );
    describe_counter!(
        "chart_datafeed_ticks_skipped_total",
        "Total poll ticks skipped because fetches were still in flight"
    );
    describe_counter!(
        "chart_datafeed_fetches_total",
        "Total poll fetches by outcome"
    );
    describe_gauge!(
        "chart_datafeed_fetches_in_flight",
        "Poll fetches currently awaiting the host"
    );
    describe_gauge!(
        "chart_datafeed_subscriptions",
        "Active bar subscriptions"
    );
    describe_gauge!(
        "chart_datafeed_tick_subscriptions",
        "Subscriptions seen by the last poll tick"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a poll tick over `subscriptions` subscriptions.
pub fn record_tick(subscriptions: usize) {
    counter!("chart_datafeed_ticks_total").increment(1);
    gauge!("chart_datafeed_tick_subscriptions").set(subscriptions as f64);
}

/// Record a skipped poll tick.
pub fn record_tick_skipped() {
    counter!("chart_datafeed_ticks_skipped_total").increment(1);
}

/// Record the outcome of one poll fetch.
pub fn record_fetch(outcome: &'static str) {
    counter!("chart_datafeed_fetches_total", "outcome" => outcome).increment(1);
}

/// Update the in-flight fetch gauge.
pub fn set_in_flight(count: usize) {
    gauge!("chart_datafeed_fetches_in_flight").set(count as f64);
}

/// Update the active subscription gauge.
pub fn set_subscriptions(count: usize) {
    gauge!("chart_datafeed_subscriptions").set(count as f64);
}

// =============================================================================
// Tests
// =============================================================================
