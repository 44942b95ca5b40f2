//! Lookback Window Calculation
//!
//! Converts a chart resolution token and a number of periods into a
//! lookback duration in seconds. The poller uses this to size the window
//! it re-fetches on every tick.
//!
//! # Resolution tokens
//!
//! - `D` / `1D`: one day per period
//! - `W` / `1W`: seven days per period
//! - `M` / `1M`: a fixed 31 days per period (not calendar-accurate)
//! - anything else: a leading integer number of minutes per period
//!
//! Only the exact tokens above are treated as day multiples. A token such as
//! `2D` falls through to the minutes branch and parses as 2 minutes.

/// Seconds in one day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Minutes in one day.
const MINUTES_PER_DAY: f64 = 1_440.0;

/// Number of periods the poller looks back on each tick.
pub const DEFAULT_LOOKBACK_PERIODS: u32 = 10;

/// Error computing a lookback window.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookbackError {
    /// The resolution is neither a day/week/month token nor starts with an integer.
    #[error("invalid resolution '{0}': expected D, W, M or a number of minutes")]
    InvalidResolution(String),
    /// The resolution parses, but its window cannot be placed on the time axis.
    #[error("resolution '{0}' gives a window outside the representable time range")]
    WindowOutOfRange(String),
}

/// Length in seconds of `required_periods` bars at `resolution`.
///
/// For minute resolutions the token is parsed to whole minutes first; the
/// conversion to days is fractional.
///
/// # Errors
///
/// Returns [`LookbackError::InvalidResolution`] if the token has no leading
/// integer.
#[allow(clippy::cast_precision_loss)]
pub fn period_length_seconds(resolution: &str, required_periods: u32) -> Result<f64, LookbackError> {
    let periods = f64::from(required_periods);

    let days = match resolution {
        "D" | "1D" => periods,
        "M" | "1M" => 31.0 * periods,
        "W" | "1W" => 7.0 * periods,
        other => {
            let minutes = parse_leading_int(other)
                .ok_or_else(|| LookbackError::InvalidResolution(other.to_string()))?;
            periods * minutes as f64 / MINUTES_PER_DAY
        }
    };

    Ok(days * SECONDS_PER_DAY)
}

/// Parse the leading integer of a string.
///
/// Skips leading whitespace, accepts an optional sign, then consumes ASCII
/// digits and ignores the rest. Returns `None` when no digit follows.
fn parse_leading_int(s: &str) -> Option<i64> {
    let trimmed = s.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    let value: i64 = rest[..digits_end].parse().ok()?;
    Some(if negative { -value } else { value })
}
