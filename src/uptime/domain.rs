//! Chart axis bounds derived from a built series.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::range::{window_start, TimeRange};
use super::series::AggregatedBucket;

/// Time axis bounds, epoch seconds on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeDomain {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub start: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub end: DateTime<Utc>,
}

/// Count axis bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CountDomain {
    pub min: u32,
    pub max: u32,
}

/// Both chart axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChartDomains {
    pub time: TimeDomain,
    pub count: CountDomain,
}

/// Compute axis bounds for a series.
///
/// The time axis runs from the aligned window start to at least `now`, so
/// the chart reaches the current moment even when the last data bucket is
/// older. The count axis never collapses below a height of one. Returns
/// `None` for an empty series, which only arises from a degenerate caller
/// state where `now` precedes the aligned window start.
pub fn bounds(
    series: &[AggregatedBucket],
    range: TimeRange,
    now: DateTime<Utc>,
) -> Option<ChartDomains> {
    let last = series.last()?;
    let max_total = series.iter().map(|b| b.total).max().unwrap_or(0);

    Some(ChartDomains {
        time: TimeDomain {
            start: window_start(now, range),
            end: now.max(last.key),
        },
        count: CountDomain {
            min: 0,
            max: max_total.max(1),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::CheckRecord;
    use crate::uptime::series::build_series;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_empty_series_has_no_domains() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        assert!(bounds(&[], TimeRange::OneHour, now).is_none());
    }

    #[test]
    fn test_zero_data_count_floor() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let series = build_series(&[], TimeRange::SevenDays, now);

        let domains = bounds(&series, TimeRange::SevenDays, now).unwrap();
        assert_eq!(domains.count, CountDomain { min: 0, max: 1 });
    }

    #[test]
    fn test_count_tracks_max_bucket_total() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let at = |minutes: i64, status: Option<u16>| CheckRecord {
            monitor_id: 1,
            timestamp: now - Duration::minutes(minutes),
            status,
            is_expected_status: false,
            response_time_ms: None,
        };
        let checks = vec![
            at(30, Some(200)),
            at(30, Some(200)),
            at(30, Some(500)),
            at(5, Some(200)),
        ];

        let series = build_series(&checks, TimeRange::OneHour, now);
        let domains = bounds(&series, TimeRange::OneHour, now).unwrap();
        assert_eq!(domains.count.max, 3);
    }

    #[test]
    fn test_time_axis_reaches_now() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
        let series = build_series(&[], TimeRange::OneHour, now);

        let domains = bounds(&series, TimeRange::OneHour, now).unwrap();
        assert_eq!(domains.time.start, window_start(now, TimeRange::OneHour));
        // The last bucket starts before `now`; the axis still ends at `now`.
        assert!(series.last().unwrap().key < now);
        assert_eq!(domains.time.end, now);
    }

    #[test]
    fn test_time_axis_extends_past_now_for_late_buckets() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut series = build_series(&[], TimeRange::OneHour, now);
        // A caller holding a series built against a later clock.
        if let Some(last) = series.last_mut() {
            last.key = now + Duration::minutes(2);
        }

        let domains = bounds(&series, TimeRange::OneHour, now).unwrap();
        assert_eq!(domains.time.end, now + Duration::minutes(2));
    }
}
