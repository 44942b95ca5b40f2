//! Pulse Updater
//!
//! Periodically re-fetches the most recent bars for every active
//! subscription. A tick is skipped as a whole while any fetch from an
//! earlier tick is still in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::services::{DatafeedError, HistoryLoader};
use crate::domain::bars::{BarRange, UnixSeconds};
use crate::domain::lookback::{DEFAULT_LOOKBACK_PERIODS, LookbackError, period_length_seconds};
use crate::domain::subscription::{SubscriptionRegistry, SubscriptionSnapshot};
use crate::infrastructure::metrics;

/// Configuration for the poll loop.
#[derive(Debug, Clone)]
pub struct PulseConfig {
    /// Interval between ticks. Zero disables polling.
    pub update_frequency: Duration,
    /// Budget for each host fetch. `None` waits indefinitely.
    pub fetch_timeout: Option<Duration>,
    /// Number of periods re-fetched on each tick.
    pub lookback_periods: u32,
    /// Push the latest polled bar to subscription listeners.
    pub dispatch_realtime: bool,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            update_frequency: Duration::from_secs(30),
            fetch_timeout: Some(Duration::from_secs(60)),
            lookback_periods: DEFAULT_LOOKBACK_PERIODS,
            dispatch_realtime: false,
        }
    }
}

impl PulseConfig {
    /// Create configuration from `DatafeedSettings`.
    #[must_use]
    pub const fn from_settings(settings: &crate::DatafeedSettings) -> Self {
        Self {
            update_frequency: settings.update_frequency,
            fetch_timeout: settings.fetch_timeout,
            lookback_periods: settings.lookback_periods,
            dispatch_realtime: settings.dispatch_realtime,
        }
    }

    /// Whether the poll loop should run at all.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        !self.update_frequency.is_zero()
    }

    /// Poll window for `resolution` ending at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`DatafeedError::InvalidResolution`] for an unusable token,
    /// including one whose window is negative or reaches before
    /// `i64::MIN` seconds.
    pub fn window(&self, resolution: &str, now: UnixSeconds) -> Result<BarRange, DatafeedError> {
        let length = period_length_seconds(resolution, self.lookback_periods)?;
        BarRange::ending_at(now, length)
            .ok_or_else(|| LookbackError::WindowOutOfRange(resolution.to_string()).into())
    }
}

// =============================================================================
// In-flight Gate
// =============================================================================

/// Count of host fetches issued by the poller and not yet finished.
#[derive(Debug, Clone, Default)]
pub struct InFlightCounter {
    count: Arc<AtomicUsize>,
}

impl InFlightCounter {
    /// Create a counter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one fetch. The count drops when the guard is dropped.
    #[must_use]
    pub fn acquire(&self) -> InFlightGuard {
        let now = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::set_in_flight(now);
        InFlightGuard {
            count: Arc::clone(&self.count),
        }
    }

    /// Current number of fetches in flight.
    #[must_use]
    pub fn load(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Marks one in-flight fetch.
#[derive(Debug)]
pub struct InFlightGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let before = self.count.fetch_sub(1, Ordering::SeqCst);
        metrics::set_in_flight(before.saturating_sub(1));
    }
}

// =============================================================================
// Tick Results
// =============================================================================

/// Result of a single poll fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The subscription was removed or replaced while the fetch was in flight.
    Discarded,
    /// The host returned no usable bars.
    Empty,
    /// Bars arrived; real-time dispatch is disabled.
    Received {
        /// Number of bars.
        bars: usize,
    },
    /// The latest bar was pushed to listeners.
    Dispatched {
        /// Listeners notified.
        listeners: usize,
    },
    /// The host fetch failed.
    Failed,
    /// The host did not answer within the fetch timeout.
    TimedOut,
}

impl FetchOutcome {
    /// Metric label for this outcome.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Discarded => "discarded",
            Self::Empty => "empty",
            Self::Received { .. } => "received",
            Self::Dispatched { .. } => "dispatched",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Result of one tick.
#[derive(Debug)]
pub enum Tick {
    /// Fetches from an earlier tick are still running; nothing was issued.
    Skipped {
        /// Fetches in flight at tick start.
        in_flight: usize,
    },
    /// One fetch was issued per valid subscription.
    Polled {
        /// Spawned fetches, in subscription order.
        fetches: Vec<JoinHandle<FetchOutcome>>,
        /// Subscriptions skipped for an unusable resolution.
        invalid: usize,
    },
}

impl Tick {
    /// Number of fetches issued by this tick.
    #[must_use]
    pub fn issued(&self) -> usize {
        match self {
            Self::Skipped { .. } => 0,
            Self::Polled { fetches, .. } => fetches.len(),
        }
    }
}

// =============================================================================
// Pulse Updater
// =============================================================================

/// Interval poller over a [`SubscriptionRegistry`].
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use chart_datafeed::application::services::{HistoryLoader, PulseConfig, PulseUpdater};
/// use chart_datafeed::domain::subscription::SubscriptionRegistry;
/// use chart_datafeed::infrastructure::host::InMemoryHost;
/// use tokio_util::sync::CancellationToken;
///
/// async fn example() {
///     let registry = Arc::new(SubscriptionRegistry::new());
///     let history = HistoryLoader::new(Arc::new(InMemoryHost::new()));
///     let cancel = CancellationToken::new();
///
///     let updater = PulseUpdater::new(PulseConfig::default(), registry, history, cancel.clone());
///     let handle = tokio::spawn(updater.run());
///
///     cancel.cancel();
///     let _ = handle.await;
/// }
/// ```
#[derive(Debug)]
pub struct PulseUpdater {
    config: PulseConfig,
    registry: Arc<SubscriptionRegistry>,
    history: HistoryLoader,
    in_flight: InFlightCounter,
    cancel: CancellationToken,
}

impl PulseUpdater {
    /// Create a new updater.
    #[must_use]
    pub fn new(
        config: PulseConfig,
        registry: Arc<SubscriptionRegistry>,
        history: HistoryLoader,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            registry,
            history,
            in_flight: InFlightCounter::new(),
            cancel,
        }
    }

    /// The updater's in-flight counter.
    #[must_use]
    pub const fn in_flight(&self) -> &InFlightCounter {
        &self.in_flight
    }

    /// Run the poll loop until cancelled.
    ///
    /// Returns immediately when the update frequency is zero.
    pub async fn run(self) {
        if !self.config.is_enabled() {
            tracing::info!("Pulse updater disabled (update frequency is zero)");
            return;
        }

        let mut interval = tokio::time::interval(self.config.update_frequency);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick of a tokio interval completes immediately
        interval.tick().await;

        tracing::info!(
            update_frequency_ms = self.config.update_frequency.as_millis(),
            lookback_periods = self.config.lookback_periods,
            dispatch_realtime = self.config.dispatch_realtime,
            "Pulse updater started"
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!("Pulse updater cancelled");
                    break;
                }
                _ = interval.tick() => {
                    let _ = self.tick();
                }
            }
        }
    }

    /// Run one poll cycle.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn tick(&self) -> Tick {
        let in_flight = self.in_flight.load();
        if in_flight > 0 {
            tracing::debug!(in_flight, "Skipping tick, fetches still in flight");
            metrics::record_tick_skipped();
            return Tick::Skipped { in_flight };
        }

        let subscriptions = self.registry.snapshot();
        metrics::record_tick(subscriptions.len());

        let now = chrono::Utc::now().timestamp();
        let mut fetches = Vec::with_capacity(subscriptions.len());
        let mut invalid = 0;

        for subscription in subscriptions {
            let range = match self.config.window(&subscription.resolution, now) {
                Ok(range) => range,
                Err(e) => {
                    tracing::warn!(
                        uid = %subscription.uid,
                        error = %e,
                        "Skipping subscription with unusable resolution"
                    );
                    invalid += 1;
                    continue;
                }
            };

            let guard = self.in_flight.acquire();
            fetches.push(self.spawn_fetch(subscription, range, guard));
        }

        tracing::trace!(issued = fetches.len(), invalid, "Tick issued fetches");
        Tick::Polled { fetches, invalid }
    }

    fn spawn_fetch(
        &self,
        subscription: SubscriptionSnapshot,
        range: BarRange,
        guard: InFlightGuard,
    ) -> JoinHandle<FetchOutcome> {
        let history = self.history.clone();
        let registry = Arc::clone(&self.registry);
        let timeout = self.config.fetch_timeout;
        let dispatch = self.config.dispatch_realtime;

        tokio::spawn(async move {
            let result = history
                .load_within(
                    &subscription.symbol_info,
                    &subscription.resolution,
                    range,
                    timeout,
                )
                .await;
            drop(guard);

            let outcome = match result {
                Ok(response) => {
                    if !registry.is_current(&subscription.uid, subscription.id) {
                        tracing::debug!(
                            uid = %subscription.uid,
                            "Discarding response for removed subscription"
                        );
                        FetchOutcome::Discarded
                    } else if let Some(last) = response.last_bar() {
                        if dispatch {
                            let listeners = registry.dispatch(&subscription.uid, subscription.id, last);
                            FetchOutcome::Dispatched { listeners }
                        } else {
                            FetchOutcome::Received {
                                bars: response.bars.len(),
                            }
                        }
                    } else {
                        FetchOutcome::Empty
                    }
                }
                Err(DatafeedError::Timeout { after }) => {
                    tracing::warn!(
                        uid = %subscription.uid,
                        timeout_ms = after.as_millis(),
                        "Poll fetch timed out"
                    );
                    FetchOutcome::TimedOut
                }
                Err(e) => {
                    tracing::debug!(uid = %subscription.uid, error = %e, "Poll fetch failed");
                    FetchOutcome::Failed
                }
            };

            metrics::record_fetch(outcome.as_str());
            outcome
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
