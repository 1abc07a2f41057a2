//! In-memory `SampleSource` backed by plain vectors.
//!
//! Answers queries the way a platform health store does: sums only the
//! samples inside the window, returns every interval overlapping it, and
//! reports "no data of this kind" when a metric has never been recorded.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    IntervalSample, Metric, MetricKind, SampleError, SampleSource, ScalarSample, SourceError,
    TimeRange,
};

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("invalid fixture JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid sample in fixture: {0}")]
    Sample(#[from] SampleError),
}

/// JSON shape accepted by [`InMemorySampleSource::from_json`].
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Fixture {
    scalars: HashMap<Metric, Vec<ScalarSample>>,
    intervals: HashMap<Metric, Vec<IntervalSample>>,
    denied: Vec<Metric>,
    not_determined: Vec<Metric>,
    unavailable: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct InMemorySampleSource {
    scalars: HashMap<Metric, Vec<ScalarSample>>,
    intervals: HashMap<Metric, Vec<IntervalSample>>,
    denied: HashSet<Metric>,
    not_determined: HashSet<Metric>,
    unavailable: Option<String>,
}

impl InMemorySampleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load samples and access state from a JSON document.
    ///
    /// Interval samples go through [`IntervalSample::new`], so an empty or
    /// inverted span is rejected rather than silently stored.
    pub fn from_json(json: &str) -> Result<Self, FixtureError> {
        let fixture: Fixture = serde_json::from_str(json)?;
        let mut intervals: HashMap<Metric, Vec<IntervalSample>> = HashMap::new();
        for (metric, samples) in fixture.intervals {
            let checked = samples
                .into_iter()
                .map(|s| IntervalSample::new(s.start, s.end, s.category))
                .collect::<Result<Vec<_>, _>>()?;
            intervals.insert(metric, checked);
        }
        Ok(Self {
            scalars: fixture.scalars,
            intervals,
            denied: fixture.denied.into_iter().collect(),
            not_determined: fixture.not_determined.into_iter().collect(),
            unavailable: fixture.unavailable,
        })
    }

    pub fn with_scalar(mut self, metric: Metric, timestamp: NaiveDateTime, value: f64) -> Self {
        self.scalars
            .entry(metric)
            .or_default()
            .push(ScalarSample { timestamp, value });
        self
    }

    pub fn with_interval(mut self, metric: Metric, sample: IntervalSample) -> Self {
        self.intervals.entry(metric).or_default().push(sample);
        self
    }

    pub fn with_intervals(
        mut self,
        metric: Metric,
        samples: impl IntoIterator<Item = IntervalSample>,
    ) -> Self {
        self.intervals.entry(metric).or_default().extend(samples);
        self
    }

    /// Reads of `metric` fail with `PermissionDenied`.
    pub fn deny(mut self, metric: Metric) -> Self {
        self.denied.insert(metric);
        self
    }

    /// Reads of `metric` fail with `NotDetermined`.
    pub fn undetermined(mut self, metric: Metric) -> Self {
        self.not_determined.insert(metric);
        self
    }

    /// Every call fails with `SourceUnavailable`.
    pub fn unavailable(mut self, reason: impl Into<String>) -> Self {
        self.unavailable = Some(reason.into());
        self
    }

    fn check_access(&self, metric: Metric) -> Result<(), SourceError> {
        if let Some(reason) = &self.unavailable {
            return Err(SourceError::SourceUnavailable(reason.clone()));
        }
        if self.denied.contains(&metric) {
            return Err(SourceError::PermissionDenied(metric));
        }
        if self.not_determined.contains(&metric) {
            return Err(SourceError::NotDetermined(metric));
        }
        Ok(())
    }
}

#[async_trait]
impl SampleSource for InMemorySampleSource {
    async fn sum_quantity(&self, metric: Metric, range: TimeRange) -> Result<f64, SourceError> {
        self.check_access(metric)?;
        if metric.kind() != MetricKind::Scalar {
            return Err(SourceError::Unsupported(metric));
        }
        let samples = self
            .scalars
            .get(&metric)
            .filter(|s| !s.is_empty())
            .ok_or(SourceError::NoData(metric))?;
        Ok(samples
            .iter()
            .filter(|s| range.contains(s.timestamp))
            .map(|s| s.value)
            .sum())
    }

    async fn interval_samples(
        &self,
        metric: Metric,
        range: TimeRange,
    ) -> Result<Vec<IntervalSample>, SourceError> {
        self.check_access(metric)?;
        if metric.kind() != MetricKind::Interval {
            return Err(SourceError::Unsupported(metric));
        }
        let recorded = self
            .intervals
            .get(&metric)
            .filter(|s| !s.is_empty())
            .ok_or(SourceError::NoData(metric))?;
        let mut overlapping: Vec<IntervalSample> = recorded
            .iter()
            .filter(|s| s.start < range.end() && s.end > range.start())
            .copied()
            .collect();
        overlapping.sort_by_key(|s| s.start);
        Ok(overlapping)
    }

    async fn is_available(&self, metric: Metric) -> Result<bool, SourceError> {
        if let Some(reason) = &self.unavailable {
            return Err(SourceError::SourceUnavailable(reason.clone()));
        }
        Ok(!self.denied.contains(&metric) && !self.not_determined.contains(&metric))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SleepStage;
    use chrono::NaiveDate;

    fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, d)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn sum_counts_only_samples_inside_half_open_window() {
        let src = InMemorySampleSource::new()
            .with_scalar(Metric::Steps, at(10, 8, 0), 100.0)
            .with_scalar(Metric::Steps, at(10, 9, 0), 50.0)
            .with_scalar(Metric::Steps, at(10, 10, 0), 25.0);
        let range = TimeRange::new(at(10, 8, 0), at(10, 10, 0)).unwrap();
        assert_eq!(src.sum_quantity(Metric::Steps, range).await.unwrap(), 150.0);
    }

    #[tokio::test]
    async fn never_recorded_metric_reports_no_data() {
        let src = InMemorySampleSource::new();
        let range = TimeRange::new(at(10, 0, 0), at(11, 0, 0)).unwrap();
        let err = src.sum_quantity(Metric::Steps, range).await.unwrap_err();
        assert!(err.is_benign());
    }

    #[tokio::test]
    async fn never_recorded_interval_metric_reports_no_data() {
        let src = InMemorySampleSource::new();
        let range = TimeRange::new(at(10, 0, 0), at(11, 0, 0)).unwrap();
        assert_eq!(
            src.interval_samples(Metric::Sleep, range).await,
            Err(SourceError::NoData(Metric::Sleep))
        );
    }

    #[tokio::test]
    async fn recorded_interval_metric_outside_range_is_empty_not_no_data() {
        let night = IntervalSample::new(at(9, 23, 0), at(10, 6, 0), SleepStage::AsleepCore).unwrap();
        let src = InMemorySampleSource::new().with_interval(Metric::Sleep, night);
        let range = TimeRange::new(at(12, 0, 0), at(13, 0, 0)).unwrap();
        assert_eq!(src.interval_samples(Metric::Sleep, range).await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn interval_query_returns_overlapping_samples_unclipped() {
        let night = IntervalSample::new(at(9, 23, 0), at(10, 6, 0), SleepStage::AsleepCore).unwrap();
        let src = InMemorySampleSource::new().with_interval(Metric::Sleep, night);
        let range = TimeRange::new(at(10, 0, 0), at(11, 0, 0)).unwrap();
        let got = src.interval_samples(Metric::Sleep, range).await.unwrap();
        assert_eq!(got, vec![night]);
    }

    #[tokio::test]
    async fn denied_metric_fails_queries_and_probe() {
        let src = InMemorySampleSource::new().deny(Metric::Sleep);
        let range = TimeRange::new(at(10, 0, 0), at(11, 0, 0)).unwrap();
        assert_eq!(
            src.interval_samples(Metric::Sleep, range).await,
            Err(SourceError::PermissionDenied(Metric::Sleep))
        );
        assert!(!src.is_available(Metric::Sleep).await.unwrap());
        assert!(src.is_available(Metric::Steps).await.unwrap());
    }

    #[tokio::test]
    async fn scalar_query_on_interval_metric_is_unsupported() {
        let src = InMemorySampleSource::new();
        let range = TimeRange::new(at(10, 0, 0), at(11, 0, 0)).unwrap();
        assert_eq!(
            src.sum_quantity(Metric::Sleep, range).await,
            Err(SourceError::Unsupported(Metric::Sleep))
        );
    }
}
