//! History Loader
//!
//! Single fetch-and-normalize pass against the host bar source.

use std::sync::Arc;
use std::time::Duration;

use crate::application::ports::{BarsRequest, HostPort};
use crate::application::services::DatafeedError;
use crate::domain::bars::{BarRange, HistoryResponse, normalize_history};
use crate::domain::symbol::SymbolInfo;

/// Loads bars from the host and applies history normalization.
#[derive(Clone)]
pub struct HistoryLoader {
    host: Arc<dyn HostPort>,
}

impl std::fmt::Debug for HistoryLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryLoader").finish_non_exhaustive()
    }
}

impl HistoryLoader {
    /// Create a loader over `host`.
    #[must_use]
    pub fn new(host: Arc<dyn HostPort>) -> Self {
        Self { host }
    }

    /// Fetch bars for `range` and normalize them.
    ///
    /// # Errors
    ///
    /// Returns [`DatafeedError::Host`] if the host fails.
    #[tracing::instrument(skip(self, symbol_info), fields(ticker = %symbol_info.ticker))]
    pub async fn load(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &str,
        range: BarRange,
    ) -> Result<HistoryResponse, DatafeedError> {
        let request = BarsRequest::new(symbol_info.clone(), resolution, range);
        let bars = self.host.get_bars(&request).await?;
        let received = bars.len();

        let response = normalize_history(range.from, bars);
        if received > 0 && response.is_empty() {
            tracing::debug!(
                received,
                from = range.from,
                "Host window starts after requested range, answering noData"
            );
        }

        Ok(response)
    }

    /// Like [`load`](Self::load), bounded by `timeout` when given.
    ///
    /// # Errors
    ///
    /// Returns [`DatafeedError::Timeout`] if the budget elapses first.
    pub async fn load_within(
        &self,
        symbol_info: &SymbolInfo,
        resolution: &str,
        range: BarRange,
        timeout: Option<Duration>,
    ) -> Result<HistoryResponse, DatafeedError> {
        match timeout {
            Some(after) => tokio::time::timeout(after, self.load(symbol_info, resolution, range))
                .await
                .map_err(|_| DatafeedError::Timeout { after })?,
            None => self.load(symbol_info, resolution, range).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::{HostError, MockHostPort};
    use crate::domain::bars::Bar;
    use rust_decimal::Decimal;

    fn bar(time: i64) -> Bar {
        Bar::new(time, Decimal::TEN, Decimal::TEN, Decimal::TEN, Decimal::TEN, Decimal::ONE)
    }

    #[tokio::test]
    async fn forwards_request_unchanged() {
        let mut host = MockHostPort::new();
        host.expect_get_bars()
            .withf(|req| {
                req.resolution == "15"
                    && req.range == BarRange::new(1_000, 2_000)
                    && req.symbol_info.ticker == "BTCUSDT"
            })
            .times(1)
            .returning(|_| Ok(vec![bar(1_000), bar(1_900)]));

        let loader = HistoryLoader::new(Arc::new(host));
        let response = loader
            .load(&SymbolInfo::default(), "15", BarRange::new(1_000, 2_000))
            .await
            .unwrap();

        assert_eq!(response.bars.len(), 2);
        assert!(response.meta.no_data);
    }

    #[tokio::test]
    async fn truncated_window_is_emptied() {
        let mut host = MockHostPort::new();
        host.expect_get_bars()
            .returning(|req| Ok(vec![bar(req.range.from + 100)]));

        let loader = HistoryLoader::new(Arc::new(host));
        let response = loader
            .load(&SymbolInfo::default(), "1", BarRange::new(1_000, 2_000))
            .await
            .unwrap();

        assert!(response.is_empty());
        assert!(response.meta.no_data);
    }

    #[tokio::test]
    async fn host_error_propagates() {
        let mut host = MockHostPort::new();
        host.expect_get_bars().returning(|_| {
            Err(HostError::Unavailable {
                message: "down".to_string(),
            })
        });

        let loader = HistoryLoader::new(Arc::new(host));
        let err = loader
            .load(&SymbolInfo::default(), "1", BarRange::new(0, 1))
            .await
            .unwrap_err();

        assert!(matches!(err, DatafeedError::Host(HostError::Unavailable { .. })));
    }
}
