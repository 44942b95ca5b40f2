//! Chart Datafeed Port (Driver Port)
//!
//! The callback-shaped contract a charting widget drives. Mirrors the
//! widely used JS datafeed API so widget bridges can forward calls as-is.

use async_trait::async_trait;

use crate::domain::bars::{Bar, BarRange, HistoryMetadata};
use crate::domain::subscription::{RealtimeCallback, ResetCacheCallback, SubscriberUid};
use crate::domain::symbol::{DatafeedConfiguration, SymbolInfo};

/// Receives the merged configuration.
pub type ConfigurationCallback = Box<dyn FnOnce(DatafeedConfiguration) + Send>;

/// Receives a resolved symbol.
pub type SymbolResolvedCallback = Box<dyn FnOnce(SymbolInfo) + Send>;

/// Receives a history answer.
pub type HistoryCallback = Box<dyn FnOnce(Vec<Bar>, HistoryMetadata) + Send>;

/// Receives an error description.
pub type ErrorCallback = Box<dyn FnOnce(String) + Send>;

/// Datafeed operations called by the charting widget.
#[async_trait]
pub trait ChartDatafeed: Send + Sync {
    /// Answer the datafeed configuration.
    ///
    /// On failure the error is logged and `callback` is not invoked.
    async fn on_ready(&self, callback: ConfigurationCallback);

    /// Resolve a symbol name into a symbol record.
    async fn resolve_symbol(
        &self,
        symbol_name: &str,
        on_resolved: SymbolResolvedCallback,
        on_error: ErrorCallback,
    );

    /// Load bars for a range.
    async fn get_bars(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &str,
        range: BarRange,
        on_data: HistoryCallback,
        on_error: ErrorCallback,
    );

    /// Start polling a symbol/resolution pair for `subscriber_uid`.
    ///
    /// `on_reset_cache_needed` is accepted for compatibility and not used.
    fn subscribe_bars(
        &self,
        symbol_info: SymbolInfo,
        resolution: String,
        on_realtime: RealtimeCallback,
        subscriber_uid: SubscriberUid,
        on_reset_cache_needed: Option<ResetCacheCallback>,
    );

    /// Stop polling for `subscriber_uid`. Unknown UIDs are ignored.
    fn unsubscribe_bars(&self, subscriber_uid: &str);
}
