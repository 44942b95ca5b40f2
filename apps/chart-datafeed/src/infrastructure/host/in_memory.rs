//! In-memory host for the runner and for tests.
//!
//! Holds bar series keyed by ticker and resolution, plus optional
//! configuration and symbol overrides. A bar request answers every bar
//! overlapping the range, starting with the bar open at `range.from`.
//! The most recent requests are recorded so callers can inspect what the
//! datafeed asked for; older entries are dropped once the log is full.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{BarsRequest, HostError, HostPort};
use crate::domain::bars::Bar;
use crate::domain::symbol::Overrides;

/// Number of bar requests kept in the request log.
pub const REQUEST_LOG_CAPACITY: usize = 256;

/// In-memory host.
#[derive(Debug, Default)]
pub struct InMemoryHost {
    series: RwLock<HashMap<(String, String), Vec<Bar>>>,
    config_overrides: RwLock<Option<Overrides>>,
    symbol_overrides: RwLock<HashMap<String, Overrides>>,
    failure: RwLock<Option<String>>,
    requests: RwLock<VecDeque<BarsRequest>>,
    request_count: AtomicUsize,
}

impl InMemoryHost {
    /// Create an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the series for `ticker` at `resolution`.
    ///
    /// Bars are stored in ascending time order.
    pub fn set_bars(&self, ticker: &str, resolution: &str, mut bars: Vec<Bar>) {
        bars.sort_by_key(|b| b.time);
        self.series
            .write()
            .insert((ticker.to_string(), resolution.to_string()), bars);
    }

    /// Append or replace one bar in a series.
    ///
    /// A bar with the same time as an existing one replaces it.
    pub fn push_bar(&self, ticker: &str, resolution: &str, bar: Bar) {
        let mut series = self.series.write();
        let bars = series
            .entry((ticker.to_string(), resolution.to_string()))
            .or_default();

        match bars.binary_search_by_key(&bar.time, |b| b.time) {
            Ok(idx) => bars[idx] = bar,
            Err(idx) => bars.insert(idx, bar),
        }
    }

    /// Set the overrides answered to `get_config`.
    pub fn set_config_overrides(&self, overrides: Option<Overrides>) {
        *self.config_overrides.write() = overrides;
    }

    /// Set the overrides answered to `get_symbol` for `symbol_name`.
    pub fn set_symbol_overrides(&self, symbol_name: &str, overrides: Overrides) {
        self.symbol_overrides
            .write()
            .insert(symbol_name.to_string(), overrides);
    }

    /// Make every call fail with `message`, or clear the failure with `None`.
    pub fn fail_with(&self, message: Option<&str>) {
        *self.failure.write() = message.map(ToString::to_string);
    }

    /// Most recent bar requests, oldest first.
    ///
    /// Holds at most [`REQUEST_LOG_CAPACITY`] entries.
    #[must_use]
    pub fn requests(&self) -> Vec<BarsRequest> {
        self.requests.read().iter().cloned().collect()
    }

    /// Number of bar requests received so far, including those no longer
    /// in the log.
    #[must_use]
    pub fn request_count(&self) -> usize {
        self.request_count.load(Ordering::Relaxed)
    }

    fn record(&self, request: &BarsRequest) {
        self.request_count.fetch_add(1, Ordering::Relaxed);

        let mut requests = self.requests.write();
        if requests.len() == REQUEST_LOG_CAPACITY {
            requests.pop_front();
        }
        requests.push_back(request.clone());
    }

    fn check_available(&self) -> Result<(), HostError> {
        match self.failure.read().as_ref() {
            Some(message) => Err(HostError::Unavailable {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl HostPort for InMemoryHost {
    async fn get_config(&self) -> Result<Option<Overrides>, HostError> {
        self.check_available()?;
        Ok(self.config_overrides.read().clone())
    }

    async fn get_symbol(&self, symbol_name: &str) -> Result<Option<Overrides>, HostError> {
        self.check_available()?;
        Ok(self.symbol_overrides.read().get(symbol_name).cloned())
    }

    async fn get_bars(&self, request: &BarsRequest) -> Result<Vec<Bar>, HostError> {
        self.record(request);
        self.check_available()?;

        let key = (
            request.symbol_info.ticker.clone(),
            request.resolution.clone(),
        );
        let series = self.series.read();
        let Some(bars) = series.get(&key) else {
            return Ok(Vec::new());
        };

        // Include the bar already open at `range.from`
        let start = bars
            .partition_point(|b| b.time <= request.range.from)
            .saturating_sub(1);

        Ok(bars[start..]
            .iter()
            .take_while(|b| b.time <= request.range.to)
            .cloned()
            .collect())
    }
}
