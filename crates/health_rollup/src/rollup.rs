//! Rollup statistics over bucket series: totals, averages and relative change.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::bucket::BucketSeries;

/// Which buckets an average divides by.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AveragePolicy {
    /// Average per calendar period, zeros included.
    #[default]
    AllPeriods,
    /// Average per active period; zero buckets are ignored.
    NonZeroOnly,
}

pub fn sum(series: &BucketSeries) -> f64 {
    series.iter().map(|b| b.value).sum()
}

pub fn average(series: &BucketSeries, policy: AveragePolicy) -> f64 {
    mean(&series.values(), policy)
}

fn mean(values: &[f64], policy: AveragePolicy) -> f64 {
    let counted: Vec<f64> = match policy {
        AveragePolicy::AllPeriods => values.to_vec(),
        AveragePolicy::NonZeroOnly => values.iter().copied().filter(|v| *v > 0.0).collect(),
    };
    if counted.is_empty() {
        return 0.0;
    }
    counted.iter().sum::<f64>() / counted.len() as f64
}

/// Whole-percent change from `baseline` to `current`.
///
/// `None` when the baseline is zero or negative: there is no meaningful
/// relative change, and callers must not render it as 0%.
pub fn percent_change(current: f64, baseline: f64) -> Option<i64> {
    if !current.is_finite() || !baseline.is_finite() || baseline <= 0.0 {
        return None;
    }
    Some(((current - baseline) / baseline * 100.0).round() as i64)
}

/// Change of the most recent 7 entries' mean over the 7 before them.
///
/// Needs at least 14 entries; anything shorter is `None`.
pub fn week_over_week_change(values: &[f64]) -> Option<i64> {
    if values.len() < 14 {
        return None;
    }
    let n = values.len();
    let recent = mean(&values[n - 7..], AveragePolicy::AllPeriods);
    let previous = mean(&values[n - 14..n - 7], AveragePolicy::AllPeriods);
    percent_change(recent, previous)
}

/// Total and average taken from the same series.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rollup {
    pub total: f64,
    pub average: f64,
}

impl Rollup {
    pub fn of(series: &BucketSeries, policy: AveragePolicy) -> Self {
        Self {
            total: sum(series),
            average: average(series, policy),
        }
    }
}
