//! Datafeed service errors.

use std::time::Duration;

use crate::application::ports::HostError;
use crate::domain::lookback::LookbackError;

/// Error from a datafeed operation.
#[derive(Debug, thiserror::Error)]
pub enum DatafeedError {
    /// The host failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// A host override could not be applied to the defaults.
    #[error("invalid host override: {0}")]
    Overlay(#[from] serde_json::Error),

    /// The resolution token cannot be turned into a lookback window.
    #[error(transparent)]
    InvalidResolution(#[from] LookbackError),

    /// The host did not answer in time.
    #[error("host request timed out after {after:?}")]
    Timeout {
        /// Elapsed budget.
        after: Duration,
    },
}
