#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Chart Datafeed - Charting Widget Data-Feed Adapter
//!
//! Implements the datafeed contract a charting widget calls to discover
//! configuration, resolve symbols, load history and subscribe to updates.
//! Data comes from a host application behind a port; active subscriptions
//! are re-fetched on a fixed interval.
//!
//! # Layers (inside -> outside)
//!
//! - **Domain**: Pure types and rules
//!   - `lookback`: Resolution token to lookback window length
//!   - `bars`: Candles, ranges and history normalization
//!   - `symbol`: Default configuration and symbol records, overlay merge
//!   - `subscription`: Registry of active bar subscriptions
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: The widget-facing datafeed contract and the host port
//!   - `services`: The datafeed, history loading and the pulse updater
//!
//! - **Infrastructure**: Adapters and process concerns
//!   - `host`: In-memory host implementation
//!   - `config`: Settings from environment variables
//!   - `metrics`: Prometheus instrumentation
//!   - `telemetry`: Logging and OpenTelemetry
//!
//! # Data Flow
//!
//! ```text
//!  widget --getBars------> Datafeed --get_bars--> HostPort
//!  widget --subscribeBars> SubscriptionRegistry
//!                               ^ snapshot
//!                          PulseUpdater --every update_frequency--> HostPort
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::bars::{Bar, BarRange, HistoryMetadata, HistoryResponse, UnixSeconds};
pub use domain::lookback::{LookbackError, period_length_seconds};
pub use domain::subscription::{SubscriberUid, SubscriptionId, SubscriptionRegistry};
pub use domain::symbol::{DatafeedConfiguration, Overrides, SymbolInfo};

// Ports
pub use application::ports::{BarsRequest, ChartDatafeed, HostError, HostPort};

// Services
pub use application::services::{Datafeed, DatafeedError, PulseConfig, PulseUpdater};

// Infrastructure config
pub use infrastructure::config::{
    ConfigError, DatafeedConfig, DatafeedSettings, DemoSettings, ServerSettings,
};

// Host adapters
pub use infrastructure::host::InMemoryHost;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
