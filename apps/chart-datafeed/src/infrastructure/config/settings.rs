//! Datafeed Configuration Settings
//!
//! Configuration types for the datafeed runner, loaded from environment
//! variables.

use std::time::Duration;

use crate::domain::lookback::DEFAULT_LOOKBACK_PERIODS;
use crate::domain::symbol::DEFAULT_SYMBOL;

/// Poll loop settings.
#[derive(Debug, Clone)]
pub struct DatafeedSettings {
    /// Interval between poll ticks (zero disables polling).
    pub update_frequency: Duration,
    /// Budget for each poll fetch (`None` waits indefinitely).
    pub fetch_timeout: Option<Duration>,
    /// Periods re-fetched on each tick.
    pub lookback_periods: u32,
    /// Push polled bars to subscription listeners.
    pub dispatch_realtime: bool,
}

impl Default for DatafeedSettings {
    fn default() -> Self {
        Self {
            update_frequency: Duration::from_millis(30_000),
            fetch_timeout: Some(Duration::from_millis(60_000)),
            lookback_periods: DEFAULT_LOOKBACK_PERIODS,
            dispatch_realtime: false,
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { metrics_port: 9091 }
    }
}

/// Subscription the runner opens at startup.
#[derive(Debug, Clone)]
pub struct DemoSettings {
    /// Ticker to subscribe.
    pub symbol: String,
    /// Resolution token to subscribe.
    pub resolution: String,
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            resolution: "1".to_string(),
        }
    }
}

/// Complete runner configuration.
#[derive(Debug, Clone, Default)]
pub struct DatafeedConfig {
    /// Poll loop settings.
    pub datafeed: DatafeedSettings,
    /// Server port settings.
    pub server: ServerSettings,
    /// Startup subscription.
    pub demo: DemoSettings,
}

impl DatafeedConfig {
    /// Create configuration from environment variables.
    ///
    /// Unparseable numbers fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a boolean variable holds something other than
    /// `true`/`false`/`1`/`0`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DatafeedSettings::default();

        let datafeed = DatafeedSettings {
            update_frequency: parse_duration_millis(
                &lookup,
                "DATAFEED_UPDATE_FREQUENCY_MS",
                defaults.update_frequency,
            ),
            fetch_timeout: Some(parse_duration_millis(
                &lookup,
                "DATAFEED_FETCH_TIMEOUT_MS",
                defaults.fetch_timeout.unwrap_or_default(),
            ))
            .filter(|d| !d.is_zero()),
            lookback_periods: parse_or(&lookup, "DATAFEED_LOOKBACK_PERIODS", defaults.lookback_periods),
            dispatch_realtime: parse_bool(
                &lookup,
                "DATAFEED_DISPATCH_REALTIME",
                defaults.dispatch_realtime,
            )?,
        };

        let server = ServerSettings {
            metrics_port: parse_or(
                &lookup,
                "DATAFEED_METRICS_PORT",
                ServerSettings::default().metrics_port,
            ),
        };

        let demo_defaults = DemoSettings::default();
        let demo = DemoSettings {
            symbol: lookup("DATAFEED_DEMO_SYMBOL")
                .filter(|s| !s.is_empty())
                .unwrap_or(demo_defaults.symbol),
            resolution: lookup("DATAFEED_DEMO_RESOLUTION")
                .filter(|s| !s.is_empty())
                .unwrap_or(demo_defaults.resolution),
        };

        Ok(Self {
            datafeed,
            server,
            demo,
        })
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable holds a value that cannot be interpreted.
    #[error("invalid value for {key}: {value}")]
    InvalidValue {
        /// Variable name.
        key: String,
        /// Offending value.
        value: String,
    },
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };

    match raw.trim().to_lowercase().as_str() {
        "" => Ok(default),
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: raw,
        }),
    }
}
