//! Fixed-width, anchor-aligned bucketing of scalar metrics.
//!
//! A range is cut at `anchor + k * width` for every integer `k` (negative
//! included), so two ranges bucketed against the same anchor always share
//! boundaries. The first window is clipped to the range start and the last
//! one is truncated at the range end, never extended past it.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use futures_util::future::join_all;
use serde::Serialize;

use health_source::{Metric, SampleSource, SourceError, TimeRange};

/// One aggregated value over `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct TimeBucket {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub value: f64,
}

impl TimeBucket {
    pub fn new(window: TimeRange, value: f64) -> Self {
        Self {
            start: window.start(),
            end: window.end(),
            value,
        }
    }
}

/// Day-granularity view of a bucket.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Ordered, non-overlapping buckets.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BucketSeries(Vec<TimeBucket>);

impl BucketSeries {
    /// Sorts by start; callers are responsible for not overlapping windows.
    pub fn new(mut buckets: Vec<TimeBucket>) -> Self {
        buckets.sort_by_key(|b| b.start);
        Self(buckets)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn buckets(&self) -> &[TimeBucket] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimeBucket> {
        self.0.iter()
    }

    pub fn values(&self) -> Vec<f64> {
        self.0.iter().map(|b| b.value).collect()
    }

    /// Collapse to one point per bucket, dated by the bucket start.
    pub fn daily_points(&self) -> Vec<DailyPoint> {
        self.0
            .iter()
            .map(|b| DailyPoint {
                date: b.start.date(),
                value: b.value,
            })
            .collect()
    }

    pub fn into_inner(self) -> Vec<TimeBucket> {
        self.0
    }
}

impl<'a> IntoIterator for &'a BucketSeries {
    type Item = &'a TimeBucket;
    type IntoIter = std::slice::Iter<'a, TimeBucket>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Plan the windows for `range` cut every `width` from `anchor`.
///
/// Returns nothing for an empty range or a non-positive width.
pub fn bucket_windows(range: TimeRange, width: Duration, anchor: NaiveDateTime) -> Vec<TimeRange> {
    let width_secs = width.num_seconds();
    if width_secs <= 0 || range.is_empty() {
        return Vec::new();
    }

    let offset = (range.start() - anchor).num_seconds();
    let k = offset.div_euclid(width_secs);
    let mut boundary = anchor + Duration::seconds(k * width_secs);

    let mut windows = Vec::new();
    while boundary < range.end() {
        let next = boundary + width;
        let start = boundary.max(range.start());
        let end = next.min(range.end());
        if let Ok(window) = TimeRange::new(start, end)
            && !window.is_empty()
        {
            windows.push(window);
        }
        boundary = next;
    }
    windows
}

/// Sum `metric` into anchor-aligned buckets covering `range`.
///
/// One sum query per window, issued concurrently. A benign "no data"
/// answer becomes a zero bucket; any other failure fails the whole series.
pub async fn compute_buckets<S>(
    source: &S,
    metric: Metric,
    range: TimeRange,
    width: Duration,
    anchor: NaiveDateTime,
) -> Result<BucketSeries, SourceError>
where
    S: SampleSource + ?Sized,
{
    let windows = bucket_windows(range, width, anchor);
    let sums = join_all(windows.iter().map(|w| source.sum_quantity(metric, *w))).await;

    let mut buckets = Vec::with_capacity(windows.len());
    for (window, sum) in windows.into_iter().zip(sums) {
        let value = match sum {
            Ok(v) => v,
            Err(e) if e.is_benign() => 0.0,
            Err(e) => return Err(e),
        };
        buckets.push(TimeBucket::new(window, value));
    }
    Ok(BucketSeries::new(buckets))
}
