//! `SampleSource` trait and the sample types exchanged across it.
//!
//! A sample source answers three kinds of question about a user's health
//! store: "what is the sum of this scalar metric over a window", "which
//! interval samples overlap this window", and "may I read this metric at
//! all". Everything above this crate is a pure function of those answers.

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod memory;
pub mod middleware;

/// Failures a sample source can report for a single query.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SourceError {
    #[error("read access to {0} was denied")]
    PermissionDenied(Metric),
    #[error("read access to {0} has not been requested yet")]
    NotDetermined(Metric),
    #[error("health data is unavailable on this device: {0}")]
    SourceUnavailable(String),
    #[error("transient query failure: {0}")]
    Transient(String),
    /// The provider reports that no data of this kind exists. Not a failure.
    #[error("no {0} data recorded")]
    NoData(Metric),
    #[error("{0} does not support this query")]
    Unsupported(Metric),
}

impl SourceError {
    /// Responses that callers should treat as "zero", not as an error.
    pub fn is_benign(&self) -> bool {
        matches!(self, SourceError::NoData(_))
    }

    /// Errors that mean the user (or platform) has to grant access first.
    pub fn is_access_problem(&self) -> bool {
        matches!(
            self,
            SourceError::PermissionDenied(_)
                | SourceError::NotDetermined(_)
                | SourceError::SourceUnavailable(_)
        )
    }
}

/// Invalid construction of a range or sample.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SampleError {
    #[error("range end {end} is before start {start}")]
    InvertedRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("interval sample must end after it starts ({start} .. {end})")]
    EmptyInterval {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MetricKind {
    /// Point-in-time values that are summed (steps, exercise minutes).
    Scalar,
    /// Spans of time with a category (sleep stages).
    Interval,
}

#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Steps,
    ExerciseMinutes,
    Sleep,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::Steps, Metric::ExerciseMinutes, Metric::Sleep];

    pub fn kind(self) -> MetricKind {
        match self {
            Metric::Steps | Metric::ExerciseMinutes => MetricKind::Scalar,
            Metric::Sleep => MetricKind::Interval,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Steps => "steps",
            Metric::ExerciseMinutes => "exercise_minutes",
            Metric::Sleep => "sleep",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sleep analysis categories reported by the health store.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SleepStage {
    InBed,
    Awake,
    AsleepUnspecified,
    AsleepCore,
    AsleepDeep,
    AsleepRem,
    #[serde(other)]
    Unknown,
}

impl SleepStage {
    /// Stages that count as actually sleeping. Lying in bed awake does not.
    pub const ASLEEP: [SleepStage; 4] = [
        SleepStage::AsleepUnspecified,
        SleepStage::AsleepCore,
        SleepStage::AsleepDeep,
        SleepStage::AsleepRem,
    ];

    pub fn is_asleep(self) -> bool {
        Self::ASLEEP.contains(&self)
    }
}

/// Half-open `[start, end)` window on the local wall clock.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeRange {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeRange {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self, SampleError> {
        if end < start {
            return Err(SampleError::InvertedRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, t: NaiveDateTime) -> bool {
        self.start <= t && t < self.end
    }

    /// Same width, moved by `offset`.
    pub fn shift(&self, offset: Duration) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
        }
    }

    /// Intersection with `other`, `None` when they do not overlap.
    pub fn clip(&self, other: &TimeRange) -> Option<TimeRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(TimeRange { start, end })
    }
}

/// One point observation of a scalar metric.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq)]
pub struct ScalarSample {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

/// A raw observed span, e.g. one sleep stage.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntervalSample {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub category: SleepStage,
}

impl IntervalSample {
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        category: SleepStage,
    ) -> Result<Self, SampleError> {
        if end <= start {
            return Err(SampleError::EmptyInterval { start, end });
        }
        Ok(Self {
            start,
            end,
            category,
        })
    }

    pub fn span(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end.max(self.start),
        }
    }
}

#[async_trait]
pub trait SampleSource: Send + Sync + 'static {
    /// Sum of a scalar metric over `range`.
    async fn sum_quantity(&self, metric: Metric, range: TimeRange) -> Result<f64, SourceError>;

    /// Interval samples of `metric` that overlap `range`. Samples are returned
    /// unclipped; callers do their own boundary accounting.
    async fn interval_samples(
        &self,
        metric: Metric,
        range: TimeRange,
    ) -> Result<Vec<IntervalSample>, SourceError>;

    /// Whether `metric` can currently be read.
    async fn is_available(&self, metric: Metric) -> Result<bool, SourceError>;
}
