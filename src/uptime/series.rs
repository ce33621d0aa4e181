//! Aggregation of raw checks into a gap-filled, stacked uptime series.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

use super::range::{bucket_start, window_start, TimeRange};
use crate::db::CheckRecord;

/// Mutually exclusive classes a check's status falls into. Together they
/// cover every input: any status, or none at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    TwoXx,
    ThreeXx,
    FourXx,
    FiveXx,
    NoData,
}

impl StatusClass {
    /// Stacking order of the chart bars, bottom to top. Renderers and
    /// tests depend on this exact sequence.
    pub const STACK_ORDER: [StatusClass; 5] = [
        StatusClass::TwoXx,
        StatusClass::ThreeXx,
        StatusClass::FourXx,
        StatusClass::FiveXx,
        StatusClass::NoData,
    ];

    pub fn label(self) -> &'static str {
        match self {
            StatusClass::TwoXx => "2xx",
            StatusClass::ThreeXx => "3xx",
            StatusClass::FourXx => "4xx",
            StatusClass::FiveXx => "5xx",
            StatusClass::NoData => "No Data",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            StatusClass::TwoXx => "#22c55e",
            StatusClass::ThreeXx => "#facc15",
            StatusClass::FourXx => "#f97316",
            StatusClass::FiveXx => "#ef4444",
            StatusClass::NoData => "#ccc",
        }
    }
}

/// Classify a check's HTTP status. A missing code, or one outside
/// 100..=599, counts as no-data rather than an error.
pub fn classify(status: Option<u16>) -> StatusClass {
    match status {
        None => StatusClass::NoData,
        Some(code) if !(100..600).contains(&code) => StatusClass::NoData,
        Some(code) if code < 300 => StatusClass::TwoXx,
        Some(code) if code < 400 => StatusClass::ThreeXx,
        Some(code) if code < 500 => StatusClass::FourXx,
        Some(_) => StatusClass::FiveXx,
    }
}

/// Per-class tallies for one bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassCounts {
    pub two_xx: u32,
    pub three_xx: u32,
    pub four_xx: u32,
    pub five_xx: u32,
    pub no_data: u32,
}

impl ClassCounts {
    fn add(&mut self, class: StatusClass) {
        match class {
            StatusClass::TwoXx => self.two_xx += 1,
            StatusClass::ThreeXx => self.three_xx += 1,
            StatusClass::FourXx => self.four_xx += 1,
            StatusClass::FiveXx => self.five_xx += 1,
            StatusClass::NoData => self.no_data += 1,
        }
    }

    pub fn get(&self, class: StatusClass) -> u32 {
        match class {
            StatusClass::TwoXx => self.two_xx,
            StatusClass::ThreeXx => self.three_xx,
            StatusClass::FourXx => self.four_xx,
            StatusClass::FiveXx => self.five_xx,
            StatusClass::NoData => self.no_data,
        }
    }

    pub fn total(&self) -> u32 {
        self.two_xx + self.three_xx + self.four_xx + self.five_xx + self.no_data
    }
}

/// One stacked bar segment: a non-empty class and the cumulative count of
/// the classes stacked below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub class: StatusClass,
    pub offset: u32,
    pub size: u32,
}

/// One fixed-width bucket of the series. Keys serialize as epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedBucket {
    #[serde(with = "chrono::serde::ts_seconds")]
    pub key: DateTime<Utc>,
    #[serde(flatten)]
    pub counts: ClassCounts,
    pub total: u32,
    pub segments: Vec<Segment>,
}

/// Build the gap-filled series for the window ending at `now`.
///
/// The result is ascending by key, covers every expected boundary from the
/// aligned window start, and contains zero-count buckets where no checks
/// landed. An empty snapshot is not an error; it yields a fully zero-filled
/// series.
pub fn build_series(
    checks: &[CheckRecord],
    range: TimeRange,
    now: DateTime<Utc>,
) -> Vec<AggregatedBucket> {
    let start = window_start(now, range);
    let grouped = group_by_bucket(checks, range, start);
    fill_buckets(&grouped, range, start, now)
}

/// Group checks by aligned bucket key, dropping only those whose key falls
/// before the aligned window start. Keys past the nominal window end are
/// kept: a producer clock running ahead of ours must not lose checks. The
/// boundary walk in [`fill_buckets`] never reaches them, so they cannot
/// leak into the series.
fn group_by_bucket<'a>(
    checks: &'a [CheckRecord],
    range: TimeRange,
    aligned_start: DateTime<Utc>,
) -> HashMap<DateTime<Utc>, Vec<&'a CheckRecord>> {
    let mut grouped: HashMap<DateTime<Utc>, Vec<&CheckRecord>> = HashMap::new();

    for check in checks {
        let key = bucket_start(check.timestamp, range);
        if key < aligned_start {
            continue;
        }
        grouped.entry(key).or_default().push(check);
    }

    grouped
}

/// Walk the expected boundaries from `start`, one bucket width apart,
/// emitting a bucket per boundary. Stops early once a boundary passes
/// `now`; the series never holds a bucket that starts in the future.
fn fill_buckets(
    grouped: &HashMap<DateTime<Utc>, Vec<&CheckRecord>>,
    range: TimeRange,
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Vec<AggregatedBucket> {
    let spec = range.spec();
    let width = spec.bucket_width();

    let mut series = Vec::with_capacity(spec.expected_buckets);
    let mut key = start;

    for _ in 0..spec.expected_buckets {
        if key > now {
            break;
        }

        let mut counts = ClassCounts::default();
        if let Some(bucket_checks) = grouped.get(&key) {
            for check in bucket_checks {
                counts.add(classify(check.status));
            }
        }

        series.push(AggregatedBucket {
            key,
            counts,
            total: counts.total(),
            segments: stack_segments(&counts),
        });

        key = key + width;
    }

    series
}

/// Stacked layout for one bucket: non-empty classes in [`StatusClass::STACK_ORDER`],
/// each offset by the sum of those below it.
fn stack_segments(counts: &ClassCounts) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut offset = 0;

    for class in StatusClass::STACK_ORDER {
        let size = counts.get(class);
        if size == 0 {
            continue;
        }
        segments.push(Segment {
            class,
            offset,
            size,
        });
        offset += size;
    }

    segments
}
