//! Decoding of `<unit> since <epoch>` time axes.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};

use crate::codec::Decoded;
use crate::error::{NcError, NcResult};
use ndarray::ArrayD;

/// Seconds per unit for the accepted unit names.
const TIME_UNITS: &[(&str, i64)] = &[
    ("day", 86_400),
    ("days", 86_400),
    ("d", 86_400),
    ("hour", 3_600),
    ("hours", 3_600),
    ("hr", 3_600),
    ("h", 3_600),
    ("minute", 60),
    ("minutes", 60),
    ("min", 60),
    ("second", 1),
    ("seconds", 1),
    ("sec", 1),
    ("s", 1),
];

const EPOCH_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// A parsed `units` attribute of a time axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeUnits {
    pub seconds_per_unit: i64,
    pub epoch: DateTime<Utc>,
}

impl TimeUnits {
    /// Parse `units` of variable `variable`.
    pub fn parse(variable: &str, units: &str) -> NcResult<Self> {
        let invalid = |message: String| NcError::InvalidUnitsFormat {
            variable: variable.to_string(),
            message,
        };
        let (unit, epoch) =
            split_since(units.trim()).ok_or_else(|| invalid(format!("'{}' is not '<unit> since <epoch>'", units)))?;
        let seconds_per_unit = TIME_UNITS
            .iter()
            .find(|(name, _)| *name == unit)
            .map(|(_, secs)| *secs)
            .ok_or_else(|| invalid(format!("'{}' is invalid for time units", unit)))?;
        let epoch = parse_epoch(epoch).ok_or_else(|| invalid(format!("cannot parse epoch '{}'", epoch)))?;
        Ok(Self {
            seconds_per_unit,
            epoch,
        })
    }

    /// Instant `value` units after the epoch, to millisecond precision.
    pub fn instant(&self, value: f64) -> Option<DateTime<Utc>> {
        let millis = value * self.seconds_per_unit as f64 * 1000.0;
        if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
            return None;
        }
        self.epoch.checked_add_signed(Duration::milliseconds(millis.round() as i64))
    }

    /// Convert decoded offsets; undefined or unrepresentable elements stay `None`.
    pub fn convert(&self, values: &Decoded) -> ArrayD<Option<DateTime<Utc>>> {
        values.mapv(|v| v.and_then(|x| self.instant(x)))
    }
}

// `(.+?)\s+since\s+(.+)`: the unit ends at the first whitespace-delimited "since".
fn split_since(units: &str) -> Option<(&str, &str)> {
    for (pos, _) in units.match_indices("since") {
        let before = &units[..pos];
        let after = &units[pos + "since".len()..];
        let unit = before.trim_end();
        let epoch = after.trim_start();
        let spaced = before.ends_with(char::is_whitespace) && after.starts_with(char::is_whitespace);
        if spaced && !unit.is_empty() && !epoch.is_empty() {
            return Some((unit, epoch.trim_end()));
        }
    }
    None
}

fn parse_epoch(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    let text = text
        .strip_suffix("UTC")
        .or_else(|| text.strip_suffix('Z'))
        .map(str::trim_end)
        .unwrap_or(text);
    for format in EPOCH_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
