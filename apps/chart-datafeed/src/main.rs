//! Chart Datafeed Binary
//!
//! Runs the datafeed over an in-memory host seeded with a synthetic series,
//! opens one subscription and polls it until shutdown.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin chart-datafeed
//! ```
//!
//! # Environment Variables
//!
//! - `DATAFEED_UPDATE_FREQUENCY_MS`: Poll interval, 0 disables (default: 30000)
//! - `DATAFEED_FETCH_TIMEOUT_MS`: Poll fetch budget, 0 disables (default: 60000)
//! - `DATAFEED_LOOKBACK_PERIODS`: Periods re-fetched per tick (default: 10)
//! - `DATAFEED_DISPATCH_REALTIME`: Push polled bars to listeners (default: false)
//! - `DATAFEED_METRICS_PORT`: Prometheus metrics port, 0 disables (default: 9091)
//! - `DATAFEED_DEMO_SYMBOL`: Ticker subscribed at startup (default: BTCUSDT)
//! - `DATAFEED_DEMO_RESOLUTION`: Resolution subscribed at startup (default: 1)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: chart-datafeed)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chart_datafeed::domain::bars::{Bar, whole_seconds};
use chart_datafeed::domain::lookback::period_length_seconds;
use chart_datafeed::infrastructure::telemetry;
use chart_datafeed::{
    BarRange, ChartDatafeed, Datafeed, DatafeedConfig, InMemoryHost, Overrides, PulseConfig,
    SymbolInfo, init_metrics,
};
use rust_decimal::Decimal;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Bars generated for the demo series.
const DEMO_SERIES_LEN: i64 = 500;

/// Subscriber UID used for the startup subscription.
const DEMO_SUBSCRIBER_UID: &str = "demo";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (tracing + optional OpenTelemetry)
    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting chart datafeed");

    let config = DatafeedConfig::from_env().context("invalid datafeed configuration")?;
    log_config(&config);

    if config.server.metrics_port != 0 {
        let _metrics_handle =
            init_metrics(config.server.metrics_port).context("failed to start metrics exporter")?;
        tracing::info!(port = config.server.metrics_port, "Metrics exporter listening");
    }

    let host = Arc::new(InMemoryHost::new());
    let series_start = seed_demo_series(&host, &config.demo.symbol, &config.demo.resolution)?;

    let datafeed = Arc::new(Datafeed::new(host.clone()));
    let shutdown_token = CancellationToken::new();

    // Spawn pulse updater
    let pulse_handle = datafeed.spawn_pulse(
        PulseConfig::from_settings(&config.datafeed),
        shutdown_token.clone(),
    );

    // Resolve and subscribe the demo symbol
    let (resolved_tx, resolved_rx) = tokio::sync::oneshot::channel();
    let (failed_tx, failed_rx) = tokio::sync::oneshot::channel();
    datafeed
        .resolve_symbol(
            &config.demo.symbol,
            Box::new(move |info: SymbolInfo| {
                let _ = resolved_tx.send(info);
            }),
            Box::new(move |message: String| {
                let _ = failed_tx.send(message);
            }),
        )
        .await;

    let symbol_info = match resolved_rx.await {
        Ok(info) => info,
        Err(_) => {
            let message = failed_rx.await.unwrap_or_default();
            anyhow::bail!("failed to resolve {}: {message}", config.demo.symbol);
        }
    };

    let history = datafeed
        .history(
            &symbol_info,
            &config.demo.resolution,
            BarRange::new(series_start, chrono::Utc::now().timestamp()),
        )
        .await?;
    tracing::info!(
        symbol = %symbol_info.ticker,
        bars = history.bars.len(),
        no_data = history.meta.no_data,
        "Initial history loaded"
    );

    let resolution = config.demo.resolution.clone();
    datafeed.subscribe_bars(
        symbol_info,
        config.demo.resolution.clone(),
        Arc::new(move |bar: &Bar| {
            tracing::info!(
                resolution = %resolution,
                time = bar.time,
                close = %bar.close,
                "Realtime bar"
            );
        }),
        DEMO_SUBSCRIBER_UID.to_string(),
        None,
    );

    tracing::info!("Chart datafeed ready");

    await_shutdown(shutdown_token).await;

    datafeed.unsubscribe_bars(DEMO_SUBSCRIBER_UID);
    if let Some(handle) = pulse_handle
        && tokio::time::timeout(SHUTDOWN_TIMEOUT, handle).await.is_err()
    {
        tracing::warn!("Pulse updater did not stop in time");
    }

    tracing::info!(
        bar_requests = host.request_count(),
        "Chart datafeed stopped"
    );
    Ok(())
}

/// Fill the host with a synthetic series ending now.
///
/// Returns the time of the first bar.
fn seed_demo_series(host: &InMemoryHost, ticker: &str, resolution: &str) -> anyhow::Result<i64> {
    let length = period_length_seconds(resolution, 1)
        .with_context(|| format!("unusable demo resolution {resolution:?}"))?;
    let step = whole_seconds(length)
        .with_context(|| format!("demo resolution {resolution:?} is out of range"))?
        .max(1);

    let now = chrono::Utc::now().timestamp();
    let last = now - now % step;
    let first = step
        .checked_mul(DEMO_SERIES_LEN - 1)
        .and_then(|span| last.checked_sub(span))
        .with_context(|| format!("demo resolution {resolution:?} is out of range"))?;

    let bars = (0..DEMO_SERIES_LEN)
        .map(|i| {
            let time = first + i * step;
            let open = Decimal::new(30_000 + (i % 50) * 10, 0);
            let close = open + Decimal::new(5, 0);
            Bar::new(
                time,
                open,
                close + Decimal::TEN,
                open - Decimal::TEN,
                close,
                Decimal::new(100 + i, 0),
            )
        })
        .collect();

    host.set_bars(ticker, resolution, bars);

    let mut symbol = Overrides::new();
    for key in ["name", "ticker", "description"] {
        symbol.insert(key.to_string(), ticker.into());
    }
    host.set_symbol_overrides(ticker, symbol);

    tracing::debug!(ticker, resolution, step, "Demo series seeded");
    Ok(first)
}

/// Load .env file from current or ancestor directories.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &DatafeedConfig) {
    tracing::info!(
        update_frequency_ms = config.datafeed.update_frequency.as_millis(),
        fetch_timeout_ms = config.datafeed.fetch_timeout.map(|t| t.as_millis()),
        lookback_periods = config.datafeed.lookback_periods,
        dispatch_realtime = config.datafeed.dispatch_realtime,
        metrics_port = config.server.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        symbol = %config.demo.symbol,
        resolution = %config.demo.resolution,
        "Demo subscription"
    );
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
