//! Datafeed Configuration and Symbol Records
//!
//! The records the widget asks for in `onReady` and `resolveSymbol`, their
//! defaults, and the shallow overlay used to apply host overrides.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Partial record supplied by the host. Keys replace default keys one for one.
pub type Overrides = Map<String, Value>;

/// Resolutions advertised by default.
pub const DEFAULT_RESOLUTIONS: &[&str] = &["1", "5", "15", "30", "60", "1D", "2D", "3D", "1W", "1M"];

/// Default instrument shown when the host supplies no symbol record.
pub const DEFAULT_SYMBOL: &str = "BTCUSDT";

fn default_resolutions() -> Vec<String> {
    DEFAULT_RESOLUTIONS.iter().map(|r| (*r).to_string()).collect()
}

// =============================================================================
// Configuration
// =============================================================================

/// Exchange entry in the widget's exchange filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    /// Filter value.
    pub value: String,
    /// Display name.
    pub name: String,
    /// Description.
    pub desc: String,
}

/// Symbol type entry in the widget's type filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolType {
    /// Display name.
    pub name: String,
    /// Filter value.
    pub value: String,
}

/// Configuration answered to `onReady`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatafeedConfiguration {
    /// Symbol search is supported.
    pub supports_search: bool,
    /// Group symbol requests are supported.
    pub supports_group_request: bool,
    /// Resolutions the widget may request.
    pub supported_resolutions: Vec<String>,
    /// Bar marks are supported.
    pub supports_marks: bool,
    /// Timescale marks are supported.
    pub supports_timescale_marks: bool,
    /// Server time is supported.
    pub supports_time: bool,
    /// Exchange filter entries.
    pub exchanges: Vec<Exchange>,
    /// Symbol type filter entries.
    pub symbols_types: Vec<SymbolType>,
    /// Host keys outside the fixed schema.
    #[serde(flatten)]
    pub extra: Overrides,
}

impl Default for DatafeedConfiguration {
    fn default() -> Self {
        Self {
            supports_search: true,
            supports_group_request: false,
            supported_resolutions: default_resolutions(),
            supports_marks: true,
            supports_timescale_marks: true,
            supports_time: true,
            exchanges: vec![Exchange {
                value: String::new(),
                name: "All Exchanges".to_string(),
                desc: String::new(),
            }],
            symbols_types: vec![SymbolType {
                name: "All types".to_string(),
                value: String::new(),
            }],
            extra: Overrides::new(),
        }
    }
}

// =============================================================================
// Symbol Info
// =============================================================================

/// Instrument description answered to `resolveSymbol`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    /// Symbol name.
    pub name: String,
    /// Exchange the symbol trades on.
    #[serde(rename = "exchange-traded")]
    pub exchange_traded: String,
    /// Exchange the symbol is listed on.
    #[serde(rename = "exchange-listed")]
    pub exchange_listed: String,
    /// IANA timezone of the session.
    pub timezone: String,
    /// Minimal price movement numerator.
    pub minmov: u32,
    /// Fractional price movement.
    pub minmov2: u32,
    /// Value of one point.
    pub pointvalue: u32,
    /// Prices are fractional.
    pub fractional: bool,
    /// Trading session.
    pub session: String,
    /// Intraday resolutions are available.
    pub has_intraday: bool,
    /// The symbol has no volume data.
    pub has_no_volume: bool,
    /// Human readable description.
    pub description: String,
    /// Price scale denominator.
    pub pricescale: u32,
    /// Unique ticker.
    pub ticker: String,
    /// Resolutions available for this symbol.
    pub supported_resolutions: Vec<String>,
    /// Host keys outside the fixed schema.
    #[serde(flatten)]
    pub extra: Overrides,
}

impl Default for SymbolInfo {
    fn default() -> Self {
        Self {
            name: DEFAULT_SYMBOL.to_string(),
            exchange_traded: String::new(),
            exchange_listed: String::new(),
            timezone: "Asia/Shanghai".to_string(),
            minmov: 1,
            minmov2: 0,
            pointvalue: 1,
            fractional: false,
            session: "24x7".to_string(),
            has_intraday: true,
            has_no_volume: false,
            description: DEFAULT_SYMBOL.to_string(),
            pricescale: 1,
            ticker: DEFAULT_SYMBOL.to_string(),
            supported_resolutions: default_resolutions(),
            extra: Overrides::new(),
        }
    }
}

impl SymbolInfo {
    /// Default record renamed to `ticker`.
    #[must_use]
    pub fn for_ticker(ticker: &str) -> Self {
        Self {
            name: ticker.to_string(),
            description: ticker.to_string(),
            ticker: ticker.to_string(),
            ..Self::default()
        }
    }
}

// =============================================================================
// Overlay
// =============================================================================

/// Apply `overrides` on top of `base`, key by key.
///
/// The merge is shallow: a nested object in `overrides` replaces the whole
/// value under that key. Keys unknown to `T` are kept in its flattened map.
///
/// # Errors
///
/// Returns an error if an override has a shape `T` cannot accept.
pub fn overlay<T>(base: &T, overrides: Overrides) -> Result<T, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let mut merged = match serde_json::to_value(base)? {
        Value::Object(map) => map,
        other => return serde_json::from_value(other),
    };

    merged.extend(overrides);
    serde_json::from_value(Value::Object(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn overrides(value: Value) -> Overrides {
        match value {
            Value::Object(map) => map,
            _ => panic!("test overrides must be an object"),
        }
    }

    #[test]
    fn default_configuration_matches_widget_expectations() {
        let config = DatafeedConfiguration::default();

        assert!(config.supports_search);
        assert!(!config.supports_group_request);
        assert_eq!(
            config.supported_resolutions,
            vec!["1", "5", "15", "30", "60", "1D", "2D", "3D", "1W", "1M"]
        );
        assert!(config.supports_marks);
        assert!(config.supports_timescale_marks);
        assert!(config.supports_time);
        assert_eq!(config.exchanges[0].name, "All Exchanges");
        assert_eq!(config.symbols_types[0].name, "All types");
    }

    #[test]
    fn default_symbol_is_btcusdt() {
        let symbol = SymbolInfo::default();

        assert_eq!(symbol.ticker, "BTCUSDT");
        assert_eq!(symbol.session, "24x7");
        assert_eq!(symbol.timezone, "Asia/Shanghai");
        assert!(!symbol.fractional);
        assert!(symbol.has_intraday);
        assert!(!symbol.has_no_volume);
        assert_eq!(symbol.pricescale, 1);
        assert_eq!(symbol.pointvalue, 1);
    }

    #[test]
    fn symbol_serializes_hyphenated_exchange_keys() {
        let json = serde_json::to_value(SymbolInfo::default()).unwrap();
        assert!(json.get("exchange-traded").is_some());
        assert!(json.get("exchange-listed").is_some());
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn overlay_replaces_only_overridden_fields() {
        let base = DatafeedConfiguration::default();
        let merged = overlay(&base, overrides(json!({"supports_marks": false}))).unwrap();

        assert!(!merged.supports_marks);
        assert_eq!(
            DatafeedConfiguration {
                supports_marks: true,
                ..merged
            },
            base
        );
    }

    #[test]
    fn overlay_keeps_unknown_keys() {
        let merged = overlay(
            &SymbolInfo::default(),
            overrides(json!({"ticker": "ETHUSDT", "volume_precision": 4})),
        )
        .unwrap();

        assert_eq!(merged.ticker, "ETHUSDT");
        assert_eq!(merged.name, "BTCUSDT");
        assert_eq!(merged.extra.get("volume_precision"), Some(&json!(4)));
    }

    #[test]
    fn overlay_replaces_nested_values_wholesale() {
        let merged = overlay(
            &DatafeedConfiguration::default(),
            overrides(json!({"exchanges": [{"value": "BN", "name": "Binance", "desc": ""}]})),
        )
        .unwrap();

        assert_eq!(merged.exchanges.len(), 1);
        assert_eq!(merged.exchanges[0].value, "BN");
    }

    #[test]
    fn overlay_rejects_wrong_shape() {
        let result = overlay(
            &DatafeedConfiguration::default(),
            overrides(json!({"supports_time": "yes"})),
        );
        assert!(result.is_err());
    }

    #[test]
    fn for_ticker_renames_default() {
        let symbol = SymbolInfo::for_ticker("ETHUSDT");
        assert_eq!(symbol.name, "ETHUSDT");
        assert_eq!(symbol.description, "ETHUSDT");
        assert_eq!(symbol.session, "24x7");
    }
}
