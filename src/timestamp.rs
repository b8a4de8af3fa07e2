use chrono::{DateTime, Local, TimeZone};
use chrono_tz::Tz;

use crate::snapshot::UNAVAILABLE;

/// Fixed output pattern, independent of the host locale.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders feed epochs as wall-clock strings in a chosen zone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TimeFormatter {
    /// The host's local zone.
    #[default]
    Local,
    Zone(Tz),
}

impl TimeFormatter {
    /// Formats `epoch`, or returns the "unavailable" placeholder when there is
    /// no time or chrono cannot represent it.
    pub fn render(&self, epoch: Option<i64>) -> String {
        let Some(epoch) = epoch else {
            return UNAVAILABLE.to_string();
        };

        let formatted = match self {
            TimeFormatter::Local => format_in(&Local, epoch),
            TimeFormatter::Zone(tz) => format_in(tz, epoch),
        };
        formatted.unwrap_or_else(|| UNAVAILABLE.to_string())
    }
}

fn format_in<Z: TimeZone>(zone: &Z, epoch: i64) -> Option<String>
where
    Z::Offset: std::fmt::Display,
{
    let utc = DateTime::from_timestamp(epoch, 0)?;
    Some(utc.with_timezone(zone).format(TIME_FORMAT).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_time() {
        assert_eq!(TimeFormatter::Local.render(None), UNAVAILABLE);
    }

    #[test]
    fn test_named_zone() {
        let paris = TimeFormatter::Zone(chrono_tz::Europe::Paris);
        // 2023-11-14 22:13:20 UTC, winter time in Paris
        assert_eq!(paris.render(Some(1700000000)), "2023-11-14 23:13:20");

        let utc = TimeFormatter::Zone(chrono_tz::UTC);
        assert_eq!(utc.render(Some(1700000000)), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_summer_time_offset() {
        let paris = TimeFormatter::Zone(chrono_tz::Europe::Paris);
        // 2024-07-01 12:00:00 UTC
        assert_eq!(paris.render(Some(1719835200)), "2024-07-01 14:00:00");
    }

    #[test]
    fn test_local_matches_chrono_local() {
        let expected = Local
            .timestamp_opt(1700000000, 0)
            .unwrap()
            .format(TIME_FORMAT)
            .to_string();
        assert_eq!(TimeFormatter::Local.render(Some(1700000000)), expected);
    }

    #[test]
    fn test_out_of_range_epoch() {
        assert_eq!(TimeFormatter::Local.render(Some(i64::MAX)), UNAVAILABLE);
    }
}
