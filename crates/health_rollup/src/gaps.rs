//! Gap filling: one bucket per expected period, zero where nothing was found.
//!
//! Charts index series by position and rollups divide by period count, so
//! every series is made dense here before anything downstream looks at it.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate, NaiveTime};

use health_source::TimeRange;

use crate::bucket::{BucketSeries, TimeBucket};

/// Align `series` to `expected`, matching buckets by window start.
///
/// The result has exactly one bucket per distinct expected period, in
/// ascending order, each spanning the expected window. A partial bucket
/// (e.g. today, cut at "now") contributes its value to the full period.
/// Periods missing from `series` become zero buckets; buckets outside
/// `expected` are dropped.
pub fn fill_gaps(series: &BucketSeries, expected: &[TimeRange]) -> BucketSeries {
    let mut present: HashMap<_, f64> = HashMap::with_capacity(series.len());
    for bucket in series {
        present.entry(bucket.start).or_insert(bucket.value);
    }

    let mut periods = expected.to_vec();
    periods.sort();
    periods.dedup_by_key(|p| p.start());

    let filled = periods
        .into_iter()
        .map(|period| {
            let value = present.get(&period.start()).copied().unwrap_or(0.0);
            TimeBucket::new(period, value)
        })
        .collect();
    BucketSeries::new(filled)
}

/// `days` consecutive calendar-day periods starting at `first`.
pub fn daily_periods(first: NaiveDate, days: u32) -> Vec<TimeRange> {
    first
        .iter_days()
        .take(days as usize)
        .filter_map(|d| {
            let start = d.and_time(NaiveTime::MIN);
            TimeRange::new(start, start + Duration::days(1)).ok()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn at(d: u32, h: u32) -> NaiveDateTime {
        day(d).and_hms_opt(h, 0, 0).unwrap()
    }

    #[test]
    fn missing_days_are_inserted_as_zero() {
        let expected = daily_periods(day(1), 5);
        let sparse = BucketSeries::new(vec![
            TimeBucket::new(expected[3], 7.0),
            TimeBucket::new(expected[1], 3.0),
        ]);
        let filled = fill_gaps(&sparse, &expected);
        assert_eq!(filled.values(), vec![0.0, 3.0, 0.0, 7.0, 0.0]);
        let dates: Vec<_> = filled.daily_points().iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3), day(4), day(5)]);
    }

    #[test]
    fn length_always_matches_expected_period_count() {
        for days in [0u32, 1, 7, 30] {
            let expected = daily_periods(day(1), days);
            let filled = fill_gaps(&BucketSeries::empty(), &expected);
            assert_eq!(filled.len(), days as usize);
        }
    }

    #[test]
    fn partial_bucket_fills_its_whole_period() {
        let expected = daily_periods(day(10), 2);
        let partial = TimeRange::new(at(10, 0), at(10, 14)).unwrap();
        let filled = fill_gaps(&BucketSeries::new(vec![TimeBucket::new(partial, 9.0)]), &expected);
        assert_eq!(filled.buckets()[0].end, at(11, 0));
        assert_eq!(filled.buckets()[0].end, filled.buckets()[1].start);
        assert_eq!(filled.values(), vec![9.0, 0.0]);
    }

    #[test]
    fn unexpected_buckets_and_duplicate_periods_are_dropped() {
        let mut expected = daily_periods(day(2), 2);
        expected.push(expected[0]);
        let outside = TimeRange::new(at(20, 0), at(21, 0)).unwrap();
        let series = BucketSeries::new(vec![TimeBucket::new(outside, 50.0)]);
        let filled = fill_gaps(&series, &expected);
        assert_eq!(filled.len(), 2);
        assert_eq!(filled.values(), vec![0.0, 0.0]);
    }
}
