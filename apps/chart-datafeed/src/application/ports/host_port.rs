//! Host Port (Driven Port)
//!
//! Interface to the host application that owns the domain data: optional
//! configuration and symbol overrides, and the bar source itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::bars::{Bar, BarRange};
use crate::domain::symbol::{Overrides, SymbolInfo};

/// A bar request forwarded to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarsRequest {
    /// Requested instrument.
    pub symbol_info: SymbolInfo,
    /// Resolution token, passed through unchanged.
    pub resolution: String,
    /// Requested time range.
    pub range: BarRange,
}

impl BarsRequest {
    /// Create a new request.
    #[must_use]
    pub fn new(symbol_info: SymbolInfo, resolution: impl Into<String>, range: BarRange) -> Self {
        Self {
            symbol_info,
            resolution: resolution.into(),
            range,
        }
    }
}

/// Host error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The host could not serve the request.
    #[error("host unavailable: {message}")]
    Unavailable {
        /// Error details.
        message: String,
    },

    /// The host has no data for the request.
    #[error("not found: {what}")]
    NotFound {
        /// What was looked up.
        what: String,
    },
}

/// Port to the host application.
///
/// `get_config` and `get_symbol` return `Ok(None)` when the host has no
/// overrides, in which case defaults apply unchanged.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HostPort: Send + Sync {
    /// Configuration overrides for `onReady`.
    async fn get_config(&self) -> Result<Option<Overrides>, HostError>;

    /// Symbol overrides for `resolveSymbol`.
    async fn get_symbol(&self, symbol_name: &str) -> Result<Option<Overrides>, HostError>;

    /// Bars for a symbol, resolution and range, in ascending time order.
    async fn get_bars(&self, request: &BarsRequest) -> Result<Vec<Bar>, HostError>;
}
