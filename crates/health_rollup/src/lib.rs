//! Health Rollup - bucketing and aggregation core for health observations.
//!
//! Turns irregular samples from a [`SampleSource`](health_source::SampleSource)
//! into dense, boundary-aligned series and rollup statistics:
//! scalar sources → [`bucket`] / interval sources → [`interval`] →
//! [`gaps`] → [`rollup`] → [`aggregator`] → [`dto`].
//!
//! ## Modules
//!
//! - [`bucket`]: fixed-width, anchor-aligned scalar buckets
//! - [`interval`]: anchor-shifted per-day interval durations (sleep)
//! - [`gaps`]: one bucket per expected period
//! - [`rollup`]: sum, average, percent change, week over week
//! - [`aggregator`]: concurrent, fault-tolerant multi-metric fan-out
//! - [`dto`]: rounded presentation values and connection status

pub mod aggregator;
pub mod bucket;
pub mod config;
pub mod dto;
pub mod error;
pub mod gaps;
pub mod interval;
pub mod rollup;

mod test_utils;

pub use aggregator::{Aggregation, Aggregator, MetricAggregate, WindowAggregate};
pub use bucket::{BucketSeries, DailyPoint, TimeBucket};
pub use config::AggregationConfig;
pub use dto::{ConnectionStatus, HealthSummary, MetricDto, MetricState};
pub use error::{RollupError, RollupResult};
pub use rollup::{AveragePolicy, Rollup};

pub use health_source::{Metric, SampleSource};
