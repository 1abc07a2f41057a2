//! Per-day duration totals for interval metrics whose "day" is not midnight.
//!
//! Sleep is attributed to the night it happens in: with an anchor hour of
//! 18, the day labelled D runs from 18:00 on D-1 to 18:00 on D. The
//! accumulator works in a shifted clock where that anchored day starts at
//! midnight, splits every interval at shifted midnights, and finally names
//! each shifted day after the calendar day it ends on.
//!
//! With `anchor_hour == 0` no shift and no relabel happens, which is plain
//! midnight-aligned daily bucketing.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};

use health_source::{IntervalSample, SampleError, TimeRange};

use crate::bucket::{BucketSeries, TimeBucket};

const MILLIS_PER_MINUTE: f64 = 60_000.0;

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn relabel_offset(anchor_hour: u32) -> Duration {
    if anchor_hour == 0 {
        Duration::zero()
    } else {
        Duration::days(1)
    }
}

/// The real-time range whose anchored days are labelled `first..=last`.
pub fn anchored_day_range(
    first: NaiveDate,
    last: NaiveDate,
    anchor_hour: u32,
) -> Result<TimeRange, SampleError> {
    let shift = Duration::hours(i64::from(anchor_hour)) - relabel_offset(anchor_hour);
    TimeRange::new(
        midnight(first) + shift,
        midnight(last) + Duration::days(1) + shift,
    )
}

/// Minutes of matching interval samples per anchored day over `range`.
///
/// One bucket is emitted for every day the shifted range touches, zero
/// when nothing was recorded. Each bucket spans its labelled calendar day.
/// Samples are clipped to `range`; a sample crossing a shifted-day boundary
/// is split between the adjacent days with nothing lost or counted twice.
pub fn daily_interval_minutes<F>(
    samples: &[IntervalSample],
    range: TimeRange,
    anchor_hour: u32,
    filter: F,
) -> BucketSeries
where
    F: Fn(&IntervalSample) -> bool,
{
    let offset = -Duration::hours(i64::from(anchor_hour));
    let shifted_range = range.shift(offset);
    if shifted_range.is_empty() {
        return BucketSeries::empty();
    }

    let mut per_day: BTreeMap<NaiveDate, i64> = BTreeMap::new();
    for sample in samples.iter().filter(|s| s.end > s.start && filter(s)) {
        let Some(clipped) = sample.span().shift(offset).clip(&shifted_range) else {
            continue;
        };

        let mut current = clipped.start();
        while current < clipped.end() {
            let day_start = current.date();
            let boundary = midnight(day_start) + Duration::days(1);
            let segment_end = clipped.end().min(boundary);
            *per_day.entry(day_start).or_default() += (segment_end - current).num_milliseconds();
            current = segment_end;
        }
    }

    let first = shifted_range.start().date();
    let end = shifted_range.end();
    let last = if end.time() == NaiveTime::MIN {
        end.date() - Duration::days(1)
    } else {
        end.date()
    };

    let relabel = relabel_offset(anchor_hour);
    let buckets = first
        .iter_days()
        .take_while(|d| *d <= last)
        .map(|day| {
            let label = day + relabel;
            let millis = per_day.get(&day).copied().unwrap_or(0);
            TimeBucket {
                start: midnight(label),
                end: midnight(label) + Duration::days(1),
                value: millis as f64 / MILLIS_PER_MINUTE,
            }
        })
        .collect();
    BucketSeries::new(buckets)
}

/// Minutes of matching interval samples overlapping each of `windows`.
pub fn interval_minutes_in_windows<F>(
    samples: &[IntervalSample],
    windows: &[TimeRange],
    filter: F,
) -> BucketSeries
where
    F: Fn(&IntervalSample) -> bool,
{
    let matching: Vec<&IntervalSample> = samples
        .iter()
        .filter(|s| s.end > s.start && filter(s))
        .collect();

    let buckets = windows
        .iter()
        .map(|window| {
            let millis: i64 = matching
                .iter()
                .filter_map(|s| s.span().clip(window))
                .map(|overlap| overlap.duration().num_milliseconds())
                .sum();
            TimeBucket::new(*window, millis as f64 / MILLIS_PER_MINUTE)
        })
        .collect();
    BucketSeries::new(buckets)
}
