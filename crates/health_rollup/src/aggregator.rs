//! Concurrent multi-metric aggregation.
//!
//! For every tracked metric four independent branches are fetched at once
//! (today's total, today's intraday series, the short and the long daily
//! window) next to one availability probe per metric. Each branch runs
//! under its own timeout and degrades to zero / empty on failure, so the
//! caller always gets a complete summary. Totals and averages are derived
//! from the gap-filled series only.

use std::future::Future;
use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use futures_util::future::join_all;
use tracing::{debug, warn};

use health_source::{IntervalSample, Metric, MetricKind, SampleSource, SourceError, TimeRange};

use crate::bucket::{BucketSeries, bucket_windows, compute_buckets};
use crate::config::AggregationConfig;
use crate::dto::{ConnectionStatus, HealthSummary};
use crate::error::{RollupError, RollupResult};
use crate::gaps::{daily_periods, fill_gaps};
use crate::interval::{anchored_day_range, daily_interval_minutes, interval_minutes_in_windows};
use crate::rollup::{AveragePolicy, Rollup, percent_change, sum, week_over_week_change};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Branch {
    TodayTotal,
    Intraday,
    ShortWindow,
    LongWindow,
    Access,
}

impl Branch {
    fn as_str(self) -> &'static str {
        match self {
            Branch::TodayTotal => "today_total",
            Branch::Intraday => "intraday",
            Branch::ShortWindow => "short_window",
            Branch::LongWindow => "long_window",
            Branch::Access => "access",
        }
    }
}

/// A gap-filled daily window with its rollup.
#[derive(Clone, Debug, PartialEq)]
pub struct WindowAggregate {
    pub days: u32,
    pub series: BucketSeries,
    pub rollup: Rollup,
}

impl WindowAggregate {
    fn new(days: u32, series: BucketSeries, policy: AveragePolicy) -> Self {
        let rollup = Rollup::of(&series, policy);
        Self {
            days,
            series,
            rollup,
        }
    }
}

/// Floating-point aggregates for one metric, before presentation rounding.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricAggregate {
    pub metric: Metric,
    pub today_total: f64,
    pub today_intraday: BucketSeries,
    pub short_window: WindowAggregate,
    pub long_window: WindowAggregate,
    /// Last 7 entries of the long window against the 7 before them.
    pub week_over_week_change: Option<i64>,
    /// Short window total against the same number of days just before it.
    pub short_window_change: Option<i64>,
}

/// Everything one aggregation run produced, one aggregate per tracked metric.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregation {
    pub steps: MetricAggregate,
    pub exercise: MetricAggregate,
    pub sleep: MetricAggregate,
    pub connection: ConnectionStatus,
}

impl Aggregation {
    pub fn metric(&self, metric: Metric) -> &MetricAggregate {
        match metric {
            Metric::Steps => &self.steps,
            Metric::ExerciseMinutes => &self.exercise,
            Metric::Sleep => &self.sleep,
        }
    }
}

/// Raw branch outputs, possibly degraded, before gap filling.
struct Fetched {
    today_total: f64,
    intraday: BucketSeries,
    short_window: BucketSeries,
    long_window: BucketSeries,
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn is_asleep(sample: &IntervalSample) -> bool {
    sample.category.is_asleep()
}

/// Day-level calendar for one run, derived from `now`.
#[derive(Clone, Copy, Debug)]
struct Calendar {
    now: NaiveDateTime,
    today: NaiveDate,
}

impl Calendar {
    fn new(now: NaiveDateTime) -> Self {
        Self {
            now,
            today: now.date(),
        }
    }

    fn midnight(&self) -> NaiveDateTime {
        midnight(self.today)
    }

    fn first_day_of_window(&self, days: u32) -> NaiveDate {
        self.today - Duration::days(i64::from(days.saturating_sub(1)))
    }
}

#[derive(Clone)]
pub struct Aggregator {
    source: Arc<dyn SampleSource>,
    config: AggregationConfig,
}

impl Aggregator {
    pub fn new(source: Arc<dyn SampleSource>, config: AggregationConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Aggregate everything as of the local wall clock.
    pub async fn aggregate(&self) -> HealthSummary {
        self.aggregate_at(chrono::Local::now().naive_local()).await
    }

    /// Aggregate everything as of `now` and map it to presentation DTOs.
    pub async fn aggregate_at(&self, now: NaiveDateTime) -> HealthSummary {
        HealthSummary::from_aggregation(&self.collect_at(now).await)
    }

    /// Aggregate everything as of `now`, keeping floating-point values.
    pub async fn collect_at(&self, now: NaiveDateTime) -> Aggregation {
        let cal = Calendar::new(now);

        let (steps, exercise, sleep, access) = tokio::join!(
            self.collect_metric(Metric::Steps, cal),
            self.collect_metric(Metric::ExerciseMinutes, cal),
            self.collect_metric(Metric::Sleep, cal),
            join_all(Metric::ALL.map(|m| self.probe_access(m))),
        );

        let mut connection = ConnectionStatus {
            source_available: true,
            ..ConnectionStatus::default()
        };
        for (metric, probe) in Metric::ALL.into_iter().zip(access) {
            if let Err(RollupError::Source(SourceError::SourceUnavailable(_))) = &probe {
                connection.source_available = false;
            }
            connection.set_granted(metric, probe.unwrap_or(false));
        }

        debug!(
            %now,
            steps_granted = connection.steps_granted,
            exercise_granted = connection.exercise_granted,
            sleep_granted = connection.sleep_granted,
            source_available = connection.source_available,
            "aggregation finished"
        );

        Aggregation {
            steps,
            exercise,
            sleep,
            connection,
        }
    }

    async fn probe_access(&self, metric: Metric) -> RollupResult<bool> {
        self.guarded(metric, Branch::Access, self.probe(metric)).await
    }

    async fn probe(&self, metric: Metric) -> RollupResult<bool> {
        Ok(self.source.is_available(metric).await?)
    }

    async fn collect_metric(&self, metric: Metric, cal: Calendar) -> MetricAggregate {
        let short_first = cal.first_day_of_window(self.config.short_window_days);
        let long_first = cal.first_day_of_window(self.config.long_window_days);

        let (today_total, intraday, short_window, long_window) = match metric.kind() {
            MetricKind::Scalar => {
                let day = Duration::days(1);
                tokio::join!(
                    self.guarded(metric, Branch::TodayTotal, self.scalar_total(metric, cal)),
                    self.guarded(
                        metric,
                        Branch::Intraday,
                        self.scalar_series(metric, cal.midnight(), self.intraday_width(), cal),
                    ),
                    self.guarded(
                        metric,
                        Branch::ShortWindow,
                        self.scalar_series(metric, midnight(short_first), day, cal),
                    ),
                    self.guarded(
                        metric,
                        Branch::LongWindow,
                        self.scalar_series(metric, midnight(long_first), day, cal),
                    ),
                )
            }
            MetricKind::Interval => tokio::join!(
                self.guarded(metric, Branch::TodayTotal, self.interval_total(metric, cal)),
                self.guarded(metric, Branch::Intraday, self.interval_intraday(metric, cal)),
                self.guarded(
                    metric,
                    Branch::ShortWindow,
                    self.interval_daily(metric, short_first, cal),
                ),
                self.guarded(
                    metric,
                    Branch::LongWindow,
                    self.interval_daily(metric, long_first, cal),
                ),
            ),
        };

        let fetched = Fetched {
            today_total: today_total.unwrap_or_default(),
            intraday: intraday.unwrap_or_default(),
            short_window: short_window.unwrap_or_default(),
            long_window: long_window.unwrap_or_default(),
        };
        self.merge(metric, cal, fetched)
    }

    async fn scalar_total(&self, metric: Metric, cal: Calendar) -> RollupResult<f64> {
        let range = TimeRange::new(cal.midnight(), cal.now)?;
        match self.source.sum_quantity(metric, range).await {
            Ok(v) => Ok(v),
            Err(e) if e.is_benign() => Ok(0.0),
            Err(e) => Err(e.into()),
        }
    }

    /// Buckets from `from` up to now, cut against today's midnight.
    async fn scalar_series(
        &self,
        metric: Metric,
        from: NaiveDateTime,
        width: Duration,
        cal: Calendar,
    ) -> RollupResult<BucketSeries> {
        let range = TimeRange::new(from, cal.now)?;
        Ok(compute_buckets(self.source.as_ref(), metric, range, width, cal.midnight()).await?)
    }

    async fn interval_total(&self, metric: Metric, cal: Calendar) -> RollupResult<f64> {
        let series = self.interval_daily(metric, cal.today, cal).await?;
        Ok(sum(&series))
    }

    async fn interval_intraday(&self, metric: Metric, cal: Calendar) -> RollupResult<BucketSeries> {
        let range = anchored_day_range(cal.today, cal.today, self.config.anchor_hour)?;
        let samples = self.fetch_samples(metric, range).await?;
        let windows = bucket_windows(range, self.intraday_width(), range.start());
        Ok(interval_minutes_in_windows(&samples, &windows, is_asleep))
    }

    async fn interval_daily(
        &self,
        metric: Metric,
        first: NaiveDate,
        cal: Calendar,
    ) -> RollupResult<BucketSeries> {
        let anchor = self.config.anchor_hour;
        let range = anchored_day_range(first, cal.today, anchor)?;
        let samples = self.fetch_samples(metric, range).await?;
        Ok(daily_interval_minutes(&samples, range, anchor, is_asleep))
    }

    async fn fetch_samples(
        &self,
        metric: Metric,
        range: TimeRange,
    ) -> RollupResult<Vec<IntervalSample>> {
        match self.source.interval_samples(metric, range).await {
            Ok(samples) => Ok(samples),
            Err(e) if e.is_benign() => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Gap-fill every series and derive rollups from the filled series.
    fn merge(&self, metric: Metric, cal: Calendar, fetched: Fetched) -> MetricAggregate {
        let short_days = self.config.short_window_days;
        let long_days = self.config.long_window_days;

        let today_intraday = fill_gaps(&fetched.intraday, &self.intraday_periods(metric, cal));
        let short_series = fill_gaps(
            &fetched.short_window,
            &daily_periods(cal.first_day_of_window(short_days), short_days),
        );
        let long_series = fill_gaps(
            &fetched.long_window,
            &daily_periods(cal.first_day_of_window(long_days), long_days),
        );

        let long_values = long_series.values();
        let week_over_week_change = week_over_week_change(&long_values);
        let short_window_change = previous_period_change(&long_values, short_days as usize);

        MetricAggregate {
            metric,
            today_total: fetched.today_total,
            today_intraday,
            short_window: WindowAggregate::new(short_days, short_series, self.config.short_average),
            long_window: WindowAggregate::new(long_days, long_series, self.config.long_average),
            week_over_week_change,
            short_window_change,
        }
    }

    /// Expected intraday windows: the whole calendar day for scalar metrics,
    /// the whole anchored day for interval metrics.
    fn intraday_periods(&self, metric: Metric, cal: Calendar) -> Vec<TimeRange> {
        let width = self.intraday_width();
        let day = match metric.kind() {
            MetricKind::Scalar => TimeRange::new(cal.midnight(), cal.midnight() + Duration::days(1)),
            MetricKind::Interval => {
                anchored_day_range(cal.today, cal.today, self.config.anchor_hour)
            }
        };
        day.map(|d| bucket_windows(d, width, d.start()))
            .unwrap_or_default()
    }

    fn intraday_width(&self) -> Duration {
        Duration::hours(i64::from(self.config.intraday_bucket_hours))
    }

    /// Run one branch under the configured timeout, logging and counting
    /// any failure. Callers replace an `Err` with the branch default.
    async fn guarded<T, Fut>(&self, metric: Metric, branch: Branch, fut: Fut) -> RollupResult<T>
    where
        Fut: Future<Output = RollupResult<T>>,
    {
        let result = match tokio::time::timeout(self.config.branch_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(RollupError::Timeout(branch.as_str())),
        };
        if let Err(e) = &result {
            if e.is_access_problem() {
                debug!(%metric, branch = branch.as_str(), error = %e, "branch degraded: no access");
            } else {
                warn!(%metric, branch = branch.as_str(), error = %e, "branch degraded");
            }
            metrics::counter!(
                "health_rollup_branch_degraded_total",
                "metric" => metric.as_str(),
                "branch" => branch.as_str(),
            )
            .increment(1);
        }
        result
    }
}

/// Sum of the last `days` values against the sum of the `days` before them.
fn previous_period_change(values: &[f64], days: usize) -> Option<i64> {
    if days == 0 || values.len() < days * 2 {
        return None;
    }
    let n = values.len();
    let current: f64 = values[n - days..].iter().sum();
    let previous: f64 = values[n - 2 * days..n - days].iter().sum();
    percent_change(current, previous)
}
