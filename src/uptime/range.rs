//! Time range selection and bucket boundary alignment.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error for a range selector outside the supported set.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid time range {0:?}: expected one of 30m, 1h, 3h, 6h, 1d, 2d, 7d")]
pub struct RangeParseError(pub String);

/// A selectable chart window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeRange {
    #[serde(rename = "30m")]
    ThirtyMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "3h")]
    ThreeHours,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "2d")]
    TwoDays,
    #[serde(rename = "7d")]
    SevenDays,
}

/// Calendar unit a range's bucket boundaries are anchored to. Buckets
/// start at a truncated minute/hour/day plus a whole number of widths,
/// never at an arbitrary epoch offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Minute,
    Hour,
    Day,
}

/// Resolved bucketing parameters for a range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    /// Width of one bucket, in seconds.
    pub bucket_secs: i64,
    /// Number of buckets in a full window.
    pub expected_buckets: usize,
    /// How far back from "now" the window reaches, in seconds.
    pub lookback_secs: i64,
    /// Calendar unit boundaries are aligned within.
    pub anchor: Anchor,
}

impl RangeSpec {
    pub fn bucket_width(&self) -> Duration {
        Duration::seconds(self.bucket_secs)
    }

    pub fn lookback(&self) -> Duration {
        Duration::seconds(self.lookback_secs)
    }
}

impl TimeRange {
    pub const ALL: [TimeRange; 7] = [
        TimeRange::ThirtyMinutes,
        TimeRange::OneHour,
        TimeRange::ThreeHours,
        TimeRange::SixHours,
        TimeRange::OneDay,
        TimeRange::TwoDays,
        TimeRange::SevenDays,
    ];

    /// The single lookup table shared by alignment, series building, and
    /// domain computation.
    pub fn spec(self) -> RangeSpec {
        match self {
            TimeRange::ThirtyMinutes => RangeSpec {
                bucket_secs: 30,
                expected_buckets: 60,
                lookback_secs: 30 * 60,
                anchor: Anchor::Minute,
            },
            TimeRange::OneHour => RangeSpec {
                bucket_secs: 60,
                expected_buckets: 60,
                lookback_secs: 3600,
                anchor: Anchor::Minute,
            },
            TimeRange::ThreeHours => RangeSpec {
                bucket_secs: 2 * 60,
                expected_buckets: 90,
                lookback_secs: 3 * 3600,
                anchor: Anchor::Hour,
            },
            TimeRange::SixHours => RangeSpec {
                bucket_secs: 5 * 60,
                expected_buckets: 72,
                lookback_secs: 6 * 3600,
                anchor: Anchor::Hour,
            },
            TimeRange::OneDay => RangeSpec {
                bucket_secs: 15 * 60,
                expected_buckets: 96,
                lookback_secs: 86400,
                anchor: Anchor::Hour,
            },
            TimeRange::TwoDays => RangeSpec {
                bucket_secs: 30 * 60,
                expected_buckets: 96,
                lookback_secs: 2 * 86400,
                anchor: Anchor::Hour,
            },
            TimeRange::SevenDays => RangeSpec {
                bucket_secs: 2 * 3600,
                expected_buckets: 84,
                lookback_secs: 7 * 86400,
                anchor: Anchor::Day,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeRange::ThirtyMinutes => "30m",
            TimeRange::OneHour => "1h",
            TimeRange::ThreeHours => "3h",
            TimeRange::SixHours => "6h",
            TimeRange::OneDay => "1d",
            TimeRange::TwoDays => "2d",
            TimeRange::SevenDays => "7d",
        }
    }
}

impl FromStr for TimeRange {
    type Err = RangeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "30m" => Ok(TimeRange::ThirtyMinutes),
            "1h" => Ok(TimeRange::OneHour),
            "3h" => Ok(TimeRange::ThreeHours),
            "6h" => Ok(TimeRange::SixHours),
            "1d" => Ok(TimeRange::OneDay),
            "2d" => Ok(TimeRange::TwoDays),
            "7d" => Ok(TimeRange::SevenDays),
            other => Err(RangeParseError(other.to_string())),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Align an instant to the start of its containing bucket.
///
/// The same rule buckets raw checks and positions the first expected
/// boundary of a window; applying it unevenly would silently drop checks
/// whose keys no longer match the walked boundaries.
pub fn bucket_start(instant: DateTime<Utc>, range: TimeRange) -> DateTime<Utc> {
    let spec = range.spec();
    let aligned = match spec.anchor {
        Anchor::Minute => {
            let step = spec.bucket_secs as u32;
            instant
                .with_nanosecond(0)
                .and_then(|t| t.with_second(t.second() - t.second() % step))
        }
        Anchor::Hour => {
            let step = (spec.bucket_secs / 60) as u32;
            instant
                .with_nanosecond(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_minute(t.minute() - t.minute() % step))
        }
        Anchor::Day => {
            let step = (spec.bucket_secs / 3600) as u32;
            instant
                .with_nanosecond(0)
                .and_then(|t| t.with_second(0))
                .and_then(|t| t.with_minute(0))
                .and_then(|t| t.with_hour(t.hour() - t.hour() % step))
        }
    };

    // `with_*` only rejects out-of-range components; floored values are
    // always in range.
    aligned.unwrap_or(instant)
}

/// Aligned start of the window ending at `now`. Alignment truncates
/// downward, so this can fall before `now - lookback`.
pub fn window_start(now: DateTime<Utc>, range: TimeRange) -> DateTime<Utc> {
    bucket_start(now - range.spec().lookback(), range)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_spec_table() {
        let expect = [
            (TimeRange::ThirtyMinutes, 30, 60, 1800),
            (TimeRange::OneHour, 60, 60, 3600),
            (TimeRange::ThreeHours, 120, 90, 10800),
            (TimeRange::SixHours, 300, 72, 21600),
            (TimeRange::OneDay, 900, 96, 86400),
            (TimeRange::TwoDays, 1800, 96, 172800),
            (TimeRange::SevenDays, 7200, 84, 604800),
        ];
        for (range, bucket, buckets, lookback) in expect {
            let spec = range.spec();
            assert_eq!(spec.bucket_secs, bucket, "{}", range);
            assert_eq!(spec.expected_buckets, buckets, "{}", range);
            assert_eq!(spec.lookback_secs, lookback, "{}", range);
        }
    }

    #[test]
    fn test_windows_tile_exactly() {
        // Every window is covered by a whole number of buckets.
        for range in TimeRange::ALL {
            let spec = range.spec();
            assert_eq!(
                spec.bucket_secs * spec.expected_buckets as i64,
                spec.lookback_secs,
                "{}",
                range
            );
        }
    }

    #[test]
    fn test_parse_round_trip() {
        for range in TimeRange::ALL {
            assert_eq!(range.as_str().parse::<TimeRange>().unwrap(), range);
        }
    }

    #[test]
    fn test_parse_rejects_unknown() {
        assert!("5h".parse::<TimeRange>().is_err());
        assert!("".parse::<TimeRange>().is_err());
        assert!("1H".parse::<TimeRange>().is_err());
        let err = "2w".parse::<TimeRange>().unwrap_err();
        assert_eq!(err, RangeParseError("2w".to_string()));
    }

    #[test]
    fn test_align_thirty_minutes() {
        // 30s buckets within the minute
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 56).unwrap();
        let aligned = bucket_start(dt, TimeRange::ThirtyMinutes);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 30).unwrap());

        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 14).unwrap();
        let aligned = bucket_start(dt, TimeRange::ThirtyMinutes);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 0).unwrap());
    }

    #[test]
    fn test_align_one_hour() {
        // minute start, seconds dropped
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 56).unwrap();
        let aligned = bucket_start(dt, TimeRange::OneHour);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 12, 34, 0).unwrap());
    }

    #[test]
    fn test_align_hour_anchored() {
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 12, 37, 56).unwrap();

        // 3h: 2-minute floor
        let aligned = bucket_start(dt, TimeRange::ThreeHours);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 12, 36, 0).unwrap());

        // 6h: 5-minute floor
        let aligned = bucket_start(dt, TimeRange::SixHours);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 12, 35, 0).unwrap());

        // 1d: 15-minute floor
        let aligned = bucket_start(dt, TimeRange::OneDay);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap());

        // 2d: 30-minute floor
        let aligned = bucket_start(dt, TimeRange::TwoDays);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 12, 30, 0).unwrap());
    }

    #[test]
    fn test_align_seven_days() {
        // day start, then 2-hour floor
        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 13, 34, 56).unwrap();
        let aligned = bucket_start(dt, TimeRange::SevenDays);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());

        let dt = Utc.with_ymd_and_hms(2024, 1, 1, 1, 5, 0).unwrap();
        let aligned = bucket_start(dt, TimeRange::SevenDays);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_align_is_idempotent() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 7, 23, 59, 59).unwrap();
        for range in TimeRange::ALL {
            let once = bucket_start(dt, range);
            assert_eq!(bucket_start(once, range), once, "{}", range);
            assert!(once <= dt, "{}", range);
        }
    }

    #[test]
    fn test_window_start_can_precede_raw_start() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
        let raw = now - TimeRange::OneHour.spec().lookback();
        let aligned = window_start(now, TimeRange::OneHour);
        assert_eq!(aligned, Utc.with_ymd_and_hms(2024, 1, 1, 11, 0, 0).unwrap());
        assert!(aligned < raw);
    }
}
