//! Middleware layer for cross-cutting concerns around a `SampleSource`.
//!
//! Wrapping a source in [`LoggingSource`] adds:
//! - `tracing` debug events for every query, with elapsed time
//! - `metrics` counters and a latency histogram labelled by operation,
//!   metric and outcome
//!
//! The wrapped source's answers pass through untouched.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::debug;

use crate::{IntervalSample, Metric, SampleSource, SourceError, TimeRange};

#[derive(Clone)]
pub struct LoggingSource<S: SampleSource> {
    inner: Arc<S>,
}

impl<S: SampleSource> LoggingSource<S> {
    pub fn new(source: S) -> Self {
        Self {
            inner: Arc::new(source),
        }
    }

    pub fn from_arc(source: Arc<S>) -> Self {
        Self { inner: source }
    }

    async fn with_logging<F, Fut, T>(
        &self,
        operation: F,
        name: &'static str,
        metric: Metric,
    ) -> Result<T, SourceError>
    where
        F: FnOnce(Arc<S>) -> Fut,
        Fut: std::future::Future<Output = Result<T, SourceError>>,
    {
        let start = Instant::now();
        debug!(operation = name, %metric, "sample source query started");

        let result = operation(self.inner.clone()).await;

        let elapsed = start.elapsed();
        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) if e.is_benign() => "no_data",
            Err(e) if e.is_access_problem() => "access",
            Err(_) => "error",
        };
        match &result {
            Ok(_) => debug!(operation = name, %metric, ?elapsed, "sample source query completed"),
            Err(e) => debug!(operation = name, %metric, ?elapsed, error = %e, "sample source query failed"),
        }

        metrics::counter!(
            "health_source_query_total",
            "operation" => name,
            "metric" => metric.as_str(),
            "outcome" => outcome,
        )
        .increment(1);
        metrics::histogram!(
            "health_source_query_duration_seconds",
            "operation" => name,
            "metric" => metric.as_str(),
        )
        .record(elapsed.as_secs_f64());

        result
    }
}

#[async_trait]
impl<S: SampleSource> SampleSource for LoggingSource<S> {
    async fn sum_quantity(&self, metric: Metric, range: TimeRange) -> Result<f64, SourceError> {
        self.with_logging(
            |source| async move { source.sum_quantity(metric, range).await },
            "sum_quantity",
            metric,
        )
        .await
    }

    async fn interval_samples(
        &self,
        metric: Metric,
        range: TimeRange,
    ) -> Result<Vec<IntervalSample>, SourceError> {
        self.with_logging(
            |source| async move { source.interval_samples(metric, range).await },
            "interval_samples",
            metric,
        )
        .await
    }

    async fn is_available(&self, metric: Metric) -> Result<bool, SourceError> {
        self.with_logging(
            |source| async move { source.is_available(metric).await },
            "is_available",
            metric,
        )
        .await
    }
}
