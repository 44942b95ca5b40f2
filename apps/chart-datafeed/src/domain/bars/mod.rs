//! Bar Types and History Normalization
//!
//! Candle data exchanged with the host and the charting widget, plus the
//! rule that turns a raw host response into a history answer.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Unix timestamp in seconds.
pub type UnixSeconds = i64;

/// One OHLCV candle.
///
/// Hosts commonly key candles by `id`; it is accepted as an alias of `time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar open time in unix seconds.
    #[serde(alias = "id")]
    pub time: UnixSeconds,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Traded volume.
    #[serde(default)]
    pub volume: Decimal,
}

impl Bar {
    /// Create a new bar.
    #[must_use]
    pub const fn new(
        time: UnixSeconds,
        open: Decimal,
        high: Decimal,
        low: Decimal,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

/// Requested time range, inclusive, in unix seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarRange {
    /// Leftmost requested bar time.
    pub from: UnixSeconds,
    /// Rightmost requested bar time.
    pub to: UnixSeconds,
}

impl BarRange {
    /// Create a new range.
    #[must_use]
    pub const fn new(from: UnixSeconds, to: UnixSeconds) -> Self {
        Self { from, to }
    }

    /// Range ending at `to` and reaching back `length_secs` seconds.
    ///
    /// Returns `None` for a negative length or when the start does not fit
    /// in [`UnixSeconds`].
    #[must_use]
    pub fn ending_at(to: UnixSeconds, length_secs: f64) -> Option<Self> {
        let length = whole_seconds(length_secs).filter(|l| *l >= 0)?;
        let from = to.checked_sub(length)?;
        Some(Self { from, to })
    }

    /// Whether a timestamp falls inside the range.
    #[must_use]
    pub const fn contains(&self, time: UnixSeconds) -> bool {
        self.from <= time && time <= self.to
    }
}

/// Round a length in seconds to whole seconds, if it fits in [`UnixSeconds`].
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn whole_seconds(secs: f64) -> Option<UnixSeconds> {
    let rounded = secs.round();
    // `i64::MAX as f64` is 2^63, one past the largest value
    (rounded >= i64::MIN as f64 && rounded < i64::MAX as f64).then(|| rounded as i64)
}

/// Metadata sent to the widget alongside a history answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMetadata {
    /// Tells the widget not to request older history.
    #[serde(rename = "noData")]
    pub no_data: bool,
}

impl HistoryMetadata {
    /// Metadata marking that no further history is available.
    pub const NO_DATA: Self = Self { no_data: true };
}

/// Bars plus metadata, as handed to the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Bars in ascending time order.
    pub bars: Vec<Bar>,
    /// Metadata for the widget.
    pub meta: HistoryMetadata,
}

impl HistoryResponse {
    /// Empty answer.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            bars: Vec::new(),
            meta: HistoryMetadata::NO_DATA,
        }
    }

    /// Most recent bar, if any.
    #[must_use]
    pub fn last_bar(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Whether the answer carries no bars.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

/// Normalize a host response for a request starting at `range_from`.
///
/// When the host's earliest bar starts after the requested range start, the
/// host could not cover the range; the answer is emptied so the widget stops
/// asking for older history. The `noData` marker is set in every branch.
#[must_use]
pub fn normalize_history(range_from: UnixSeconds, bars: Vec<Bar>) -> HistoryResponse {
    match bars.first() {
        Some(first) if range_from < first.time => HistoryResponse::empty(),
        Some(_) => HistoryResponse {
            bars,
            meta: HistoryMetadata::NO_DATA,
        },
        None => HistoryResponse::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(time: UnixSeconds) -> Bar {
        let price = Decimal::new(100, 0);
        Bar::new(time, price, price, price, price, Decimal::ONE)
    }

    #[test]
    fn truncated_host_window_yields_empty_no_data() {
        let t0 = 1_700_000_000;
        let response = normalize_history(t0, vec![bar(t0 + 100), bar(t0 + 160)]);

        assert!(response.bars.is_empty());
        assert!(response.meta.no_data);
    }

    #[test]
    fn full_window_keeps_bars_and_still_flags_no_data() {
        let t0 = 1_700_000_000;
        let bars = vec![bar(t0), bar(t0 + 60)];
        let response = normalize_history(t0, bars.clone());

        assert_eq!(response.bars, bars);
        assert!(response.meta.no_data);
    }

    #[test]
    fn earlier_first_bar_keeps_bars() {
        let t0 = 1_700_000_000;
        let response = normalize_history(t0, vec![bar(t0 - 60), bar(t0)]);
        assert_eq!(response.bars.len(), 2);
    }

    #[test]
    fn empty_host_response_yields_empty_no_data() {
        let response = normalize_history(0, Vec::new());
        assert_eq!(response, HistoryResponse::empty());
    }

    #[test]
    fn bar_accepts_id_alias() {
        let bar: Bar = serde_json::from_str(
            r#"{"id": 1700000000, "open": "1.5", "high": "2", "low": "1", "close": "1.75", "volume": "10"}"#,
        )
        .unwrap();

        assert_eq!(bar.time, 1_700_000_000);
        assert_eq!(bar.close, Decimal::new(175, 2));
    }

    #[test]
    fn metadata_serializes_camel_case() {
        let json = serde_json::to_value(HistoryMetadata::NO_DATA).unwrap();
        assert_eq!(json, serde_json::json!({"noData": true}));
    }

    #[test]
    fn range_ending_at_rounds_length() {
        let range = BarRange::ending_at(1_000_000, 36_000.000_000_000_004).unwrap();
        assert_eq!(range, BarRange::new(964_000, 1_000_000));
        assert!(range.contains(964_000));
        assert!(!range.contains(1_000_001));
    }

    #[test]
    fn range_ending_at_rejects_lengths_outside_unix_seconds() {
        assert_eq!(BarRange::ending_at(1_700_000_000, -6.0e20), None);
        assert_eq!(BarRange::ending_at(1_700_000_000, -60.0), None);
        assert_eq!(BarRange::ending_at(i64::MIN + 10, 60.0), None);
        assert_eq!(BarRange::ending_at(1_700_000_000, f64::INFINITY), None);
        assert_eq!(BarRange::ending_at(1_700_000_000, f64::NAN), None);
    }

    #[test]
    fn whole_seconds_bounds() {
        assert_eq!(whole_seconds(59.6), Some(60));
        assert_eq!(whole_seconds(-1.0e19), None);
        assert_eq!(whole_seconds(9.3e18), None);
        assert_eq!(whole_seconds(0.0), Some(0));
    }
}
