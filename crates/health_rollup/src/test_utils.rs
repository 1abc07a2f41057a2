//! Fake sources for unit tests: one that always fails, one that never
//! answers in time.
#![cfg(test)]

use std::time::Duration;

use async_trait::async_trait;

use health_source::{IntervalSample, Metric, SampleSource, SourceError, TimeRange};

/// Every call fails with a transient error.
pub struct FailingSource;

#[async_trait]
impl SampleSource for FailingSource {
    async fn sum_quantity(&self, _metric: Metric, _range: TimeRange) -> Result<f64, SourceError> {
        Err(SourceError::Transient("query failed".into()))
    }

    async fn interval_samples(
        &self,
        _metric: Metric,
        _range: TimeRange,
    ) -> Result<Vec<IntervalSample>, SourceError> {
        Err(SourceError::Transient("query failed".into()))
    }

    async fn is_available(&self, _metric: Metric) -> Result<bool, SourceError> {
        Err(SourceError::Transient("probe failed".into()))
    }
}

/// Sleeps for `delay` before answering every call with empty data.
pub struct SlowSource {
    delay: Duration,
}

impl SlowSource {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl SampleSource for SlowSource {
    async fn sum_quantity(&self, _metric: Metric, _range: TimeRange) -> Result<f64, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(0.0)
    }

    async fn interval_samples(
        &self,
        _metric: Metric,
        _range: TimeRange,
    ) -> Result<Vec<IntervalSample>, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn is_available(&self, _metric: Metric) -> Result<bool, SourceError> {
        tokio::time::sleep(self.delay).await;
        Ok(true)
    }
}
