//! Domain Layer - Datafeed types and rules.
//!
//! Pure types with no I/O: candles and history normalization, lookback
//! windows, configuration and symbol records, and the subscription registry.

/// Bars, ranges and history normalization.
pub mod bars;

/// Lookback window calculation from resolution tokens.
pub mod lookback;

/// Subscription tracking keyed by subscriber UID.
pub mod subscription;

/// Datafeed configuration and symbol records.
pub mod symbol;
