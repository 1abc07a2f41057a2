//! Presentation DTOs.
//!
//! Everything a chart or summary card needs, rounded to whole numbers
//! (half away from zero) and packaged together with the connection status
//! so consumers can tell "not connected" apart from "connected, no data".

use chrono::{NaiveDate, NaiveDateTime};
use schemars::JsonSchema;
use serde::Serialize;

use health_source::Metric;

use crate::aggregator::{Aggregation, MetricAggregate, WindowAggregate};
use crate::bucket::BucketSeries;

/// Round half away from zero. Non-finite input maps to 0.
pub fn round_value(value: f64) -> i64 {
    if value.is_finite() {
        value.round() as i64
    } else {
        0
    }
}

/// Which metrics the source can currently supply.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq, JsonSchema)]
pub struct ConnectionStatus {
    pub steps_granted: bool,
    pub exercise_granted: bool,
    pub sleep_granted: bool,
    /// False when the platform reports health data as unavailable.
    pub source_available: bool,
}

impl ConnectionStatus {
    pub fn is_granted(&self, metric: Metric) -> bool {
        match metric {
            Metric::Steps => self.steps_granted,
            Metric::ExerciseMinutes => self.exercise_granted,
            Metric::Sleep => self.sleep_granted,
        }
    }

    pub fn set_granted(&mut self, metric: Metric, granted: bool) {
        match metric {
            Metric::Steps => self.steps_granted = granted,
            Metric::ExerciseMinutes => self.exercise_granted = granted,
            Metric::Sleep => self.sleep_granted = granted,
        }
    }
}

/// How a metric card should be rendered.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MetricState {
    /// Access missing: show a reconnect prompt.
    NotConnected,
    /// Connected but every value is zero: show "no data for this period".
    NoData,
    HasData,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq, JsonSchema)]
pub struct BucketDto {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub value: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq, JsonSchema)]
pub struct DailyPointDto {
    pub date: NaiveDate,
    pub value: i64,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq, JsonSchema)]
pub struct WindowDto {
    pub days: u32,
    pub series: Vec<DailyPointDto>,
    pub total: i64,
    pub average: i64,
}

impl WindowDto {
    /// `total` is the sum of the rounded points, so it always matches what
    /// a chart of `series` adds up to. `average` is rounded from the rollup.
    fn from_window(window: &WindowAggregate) -> Self {
        let series: Vec<DailyPointDto> = window
            .series
            .daily_points()
            .into_iter()
            .map(|p| DailyPointDto {
                date: p.date,
                value: round_value(p.value),
            })
            .collect();
        Self {
            days: window.days,
            total: series.iter().map(|p| p.value).sum(),
            average: round_value(window.rollup.average),
            series,
        }
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq, JsonSchema)]
pub struct MetricDto {
    pub metric: Metric,
    pub today_total: i64,
    pub today_intraday: Vec<BucketDto>,
    pub short_window: WindowDto,
    pub long_window: WindowDto,
    /// `None` renders as a neutral indicator, never as 0%.
    pub week_over_week_change: Option<i64>,
    pub short_window_change: Option<i64>,
}

impl MetricDto {
    pub fn from_aggregate(aggregate: &MetricAggregate) -> Self {
        Self {
            metric: aggregate.metric,
            today_total: round_value(aggregate.today_total),
            today_intraday: buckets(&aggregate.today_intraday),
            short_window: WindowDto::from_window(&aggregate.short_window),
            long_window: WindowDto::from_window(&aggregate.long_window),
            week_over_week_change: aggregate.week_over_week_change,
            short_window_change: aggregate.short_window_change,
        }
    }

    /// Zero everywhere, as produced for a metric with no usable data.
    pub fn is_all_zero(&self) -> bool {
        self.today_total == 0
            && self.today_intraday.iter().all(|b| b.value == 0)
            && self.short_window.series.iter().all(|p| p.value == 0)
            && self.long_window.series.iter().all(|p| p.value == 0)
    }
}

fn buckets(series: &BucketSeries) -> Vec<BucketDto> {
    series
        .iter()
        .map(|b| BucketDto {
            start: b.start,
            end: b.end,
            value: round_value(b.value),
        })
        .collect()
}

/// One request's worth of DTOs.
#[derive(Clone, Debug, Serialize, PartialEq, Eq, JsonSchema)]
pub struct HealthSummary {
    pub steps: MetricDto,
    pub exercise: MetricDto,
    pub sleep: MetricDto,
    pub connection: ConnectionStatus,
}

impl HealthSummary {
    pub fn from_aggregation(aggregation: &Aggregation) -> Self {
        Self {
            steps: MetricDto::from_aggregate(&aggregation.steps),
            exercise: MetricDto::from_aggregate(&aggregation.exercise),
            sleep: MetricDto::from_aggregate(&aggregation.sleep),
            connection: aggregation.connection,
        }
    }

    pub fn metric(&self, metric: Metric) -> &MetricDto {
        match metric {
            Metric::Steps => &self.steps,
            Metric::ExerciseMinutes => &self.exercise,
            Metric::Sleep => &self.sleep,
        }
    }

    pub fn state(&self, metric: Metric) -> MetricState {
        if !self.connection.source_available || !self.connection.is_granted(metric) {
            MetricState::NotConnected
        } else if self.metric(metric).is_all_zero() {
            MetricState::NoData
        } else {
            MetricState::HasData
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
