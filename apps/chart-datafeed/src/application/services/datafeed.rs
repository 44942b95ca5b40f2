//! Datafeed Service
//!
//! Implements the widget contract on top of a [`HostPort`]: configuration
//! and symbol overlays, history requests, and subscription bookkeeping for
//! the pulse updater.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ChartDatafeed, ConfigurationCallback, ErrorCallback, HistoryCallback, HostPort,
    SymbolResolvedCallback,
};
use crate::application::services::{DatafeedError, HistoryLoader, PulseConfig, PulseUpdater};
use crate::domain::bars::{BarRange, HistoryResponse};
use crate::domain::subscription::{
    RealtimeCallback, ResetCacheCallback, SubscriberUid, SubscriptionRegistry,
};
use crate::domain::symbol::{DatafeedConfiguration, SymbolInfo, overlay};
use crate::infrastructure::metrics;

/// Widget-facing datafeed.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use chart_datafeed::application::services::{Datafeed, PulseConfig};
/// use chart_datafeed::infrastructure::host::InMemoryHost;
/// use tokio_util::sync::CancellationToken;
///
/// async fn example() {
///     let datafeed = Datafeed::new(Arc::new(InMemoryHost::new()));
///     let cancel = CancellationToken::new();
///     let _pulse = datafeed.spawn_pulse(PulseConfig::default(), cancel.clone());
///
///     let config = datafeed.configuration().await;
///     assert!(config.is_ok());
/// }
/// ```
pub struct Datafeed {
    host: Arc<dyn HostPort>,
    history: HistoryLoader,
    registry: Arc<SubscriptionRegistry>,
}

impl std::fmt::Debug for Datafeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Datafeed")
            .field("subscriptions", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Datafeed {
    /// Create a datafeed over `host`.
    #[must_use]
    pub fn new(host: Arc<dyn HostPort>) -> Self {
        Self {
            history: HistoryLoader::new(Arc::clone(&host)),
            host,
            registry: Arc::new(SubscriptionRegistry::new()),
        }
    }

    /// The subscription registry polled by this datafeed.
    #[must_use]
    pub fn registry(&self) -> Arc<SubscriptionRegistry> {
        Arc::clone(&self.registry)
    }

    /// Build a pulse updater over this datafeed's subscriptions.
    #[must_use]
    pub fn pulse_updater(&self, config: PulseConfig, cancel: CancellationToken) -> PulseUpdater {
        PulseUpdater::new(config, self.registry(), self.history.clone(), cancel)
    }

    /// Spawn the pulse updater.
    ///
    /// Returns `None` when polling is disabled by a zero update frequency.
    pub fn spawn_pulse(
        &self,
        config: PulseConfig,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        if !config.is_enabled() {
            tracing::info!("Polling disabled, pulse updater not started");
            return None;
        }
        Some(tokio::spawn(self.pulse_updater(config, cancel).run()))
    }

    /// Default configuration with host overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the host fails or an override has the wrong shape.
    pub async fn configuration(&self) -> Result<DatafeedConfiguration, DatafeedError> {
        let defaults = DatafeedConfiguration::default();
        match self.host.get_config().await? {
            Some(overrides) => Ok(overlay(&defaults, overrides)?),
            None => Ok(defaults),
        }
    }

    /// Default symbol record with host overrides applied.
    ///
    /// # Errors
    ///
    /// Returns an error if the host fails or an override has the wrong shape.
    pub async fn symbol_info(&self, symbol_name: &str) -> Result<SymbolInfo, DatafeedError> {
        let defaults = SymbolInfo::default();
        match self.host.get_symbol(symbol_name).await? {
            Some(overrides) => Ok(overlay(&defaults, overrides)?),
            None => Ok(defaults),
        }
    }

    /// Fetch and normalize bars for `range`.
    ///
    /// # Errors
    ///
    /// Returns an error if the host fails.
    pub async fn history(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &str,
        range: BarRange,
    ) -> Result<HistoryResponse, DatafeedError> {
        self.history.load(symbol_info, resolution, range).await
    }
}

#[async_trait]
impl ChartDatafeed for Datafeed {
    async fn on_ready(&self, callback: ConfigurationCallback) {
        match self.configuration().await {
            Ok(config) => callback(config),
            Err(e) => tracing::error!(error = %e, "Failed to build datafeed configuration"),
        }
    }

    async fn resolve_symbol(
        &self,
        symbol_name: &str,
        on_resolved: SymbolResolvedCallback,
        on_error: ErrorCallback,
    ) {
        match self.symbol_info(symbol_name).await {
            Ok(info) => on_resolved(info),
            Err(e) => {
                tracing::warn!(symbol = symbol_name, error = %e, "Symbol resolution failed");
                on_error(e.to_string());
            }
        }
    }

    async fn get_bars(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &str,
        range: BarRange,
        on_data: HistoryCallback,
        on_error: ErrorCallback,
    ) {
        match self.history(symbol_info, resolution, range).await {
            Ok(response) => on_data(response.bars, response.meta),
            Err(e) => on_error(e.to_string()),
        }
    }

    fn subscribe_bars(
        &self,
        symbol_info: SymbolInfo,
        resolution: String,
        on_realtime: RealtimeCallback,
        subscriber_uid: SubscriberUid,
        _on_reset_cache_needed: Option<ResetCacheCallback>,
    ) {
        self.registry
            .subscribe(subscriber_uid, symbol_info, resolution, on_realtime);
        metrics::set_subscriptions(self.registry.len());
    }

    fn unsubscribe_bars(&self, subscriber_uid: &str) {
        self.registry.unsubscribe(subscriber_uid);
        metrics::set_subscriptions(self.registry.len());
    }
}
