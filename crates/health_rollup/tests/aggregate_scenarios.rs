use std::sync::Arc;

use chrono::{Duration, NaiveDate, NaiveDateTime};
use health_rollup::dto::MetricDto;
use health_rollup::{AggregationConfig, Aggregator, ConnectionStatus, Metric, MetricState};
use health_source::memory::InMemorySampleSource;
use health_source::middleware::LoggingSource;
use health_source::{IntervalSample, SleepStage};

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
}

fn at(d: u32, h: u32, m: u32) -> NaiveDateTime {
    day(d).and_hms_opt(h, m, 0).unwrap()
}

fn sleep(start: NaiveDateTime, end: NaiveDateTime, stage: SleepStage) -> IntervalSample {
    IntervalSample::new(start, end, stage).unwrap()
}

fn aggregator(source: InMemorySampleSource, config: AggregationConfig) -> Aggregator {
    Aggregator::new(Arc::new(LoggingSource::new(source)), config)
}

fn assert_dense(dto: &MetricDto, short_days: usize, long_days: usize) {
    assert_eq!(dto.today_intraday.len(), 8, "{} intraday", dto.metric);
    assert_eq!(dto.short_window.series.len(), short_days, "{} short", dto.metric);
    assert_eq!(dto.long_window.series.len(), long_days, "{} long", dto.metric);
    for pair in dto.today_intraday.windows(2) {
        assert_eq!(pair[0].end, pair[1].start, "{} intraday gap", dto.metric);
    }
    for pair in dto.long_window.series.windows(2) {
        assert_eq!(pair[0].date.succ_opt(), Some(pair[1].date), "{} daily gap", dto.metric);
    }
}

fn series_total(dto: &MetricDto) -> (i64, i64) {
    (
        dto.short_window.series.iter().map(|p| p.value).sum(),
        dto.long_window.series.iter().map(|p| p.value).sum(),
    )
}

#[tokio::test]
async fn denied_sleep_with_granted_steps_is_zero_filled_and_not_connected() {
    let source = InMemorySampleSource::new()
        .with_scalar(Metric::Steps, at(20, 9, 0), 3500.0)
        .with_scalar(Metric::Steps, at(17, 9, 0), 1500.0)
        .with_interval(
            Metric::Sleep,
            sleep(at(19, 23, 30), at(20, 6, 15), SleepStage::AsleepCore),
        )
        .deny(Metric::Sleep);

    let summary = aggregator(source, AggregationConfig::default())
        .aggregate_at(at(20, 12, 0))
        .await;

    assert_eq!(
        summary.connection,
        ConnectionStatus {
            steps_granted: true,
            exercise_granted: true,
            sleep_granted: false,
            source_available: true,
        }
    );

    assert_dense(&summary.sleep, 7, 30);
    assert!(summary.sleep.is_all_zero());
    assert_eq!(summary.sleep.short_window.total, 0);
    assert_eq!(summary.sleep.week_over_week_change, None);
    assert_eq!(summary.state(Metric::Sleep), MetricState::NotConnected);

    assert_eq!(summary.steps.today_total, 3500);
    assert_eq!(summary.steps.short_window.total, 5000);
    assert_eq!(summary.state(Metric::Steps), MetricState::HasData);
    assert_eq!(summary.state(Metric::ExerciseMinutes), MetricState::NoData);
}

#[tokio::test]
async fn overnight_sleep_lands_in_the_morning_day() {
    let source = InMemorySampleSource::new().with_intervals(
        Metric::Sleep,
        [
            sleep(at(19, 23, 0), at(19, 23, 30), SleepStage::InBed),
            sleep(at(19, 23, 30), at(20, 6, 15), SleepStage::AsleepCore),
            sleep(at(20, 6, 15), at(20, 6, 40), SleepStage::Awake),
        ],
    );

    let summary = aggregator(source, AggregationConfig::default())
        .aggregate_at(at(20, 9, 0))
        .await;
    let sleep = &summary.sleep;

    assert_eq!(sleep.today_total, 405);
    let last = sleep.short_window.series.last().unwrap();
    assert_eq!((last.date, last.value), (day(20), 405));
    assert_eq!(sleep.short_window.series.iter().filter(|p| p.value > 0).count(), 1);
    assert_eq!(sleep.today_intraday.iter().map(|b| b.value).sum::<i64>(), 405);
    assert_eq!(sleep.today_intraday[0].start, at(19, 18, 0));
    assert_eq!(summary.state(Metric::Sleep), MetricState::HasData);
}

#[tokio::test]
async fn midnight_anchor_splits_the_night_over_two_days() {
    let source = InMemorySampleSource::new().with_interval(
        Metric::Sleep,
        sleep(at(19, 23, 30), at(20, 6, 15), SleepStage::AsleepDeep),
    );
    let config = AggregationConfig {
        anchor_hour: 0,
        ..AggregationConfig::default()
    };

    let summary = aggregator(source, config).aggregate_at(at(20, 9, 0)).await;
    let values: Vec<i64> = summary.sleep.short_window.series.iter().map(|p| p.value).collect();

    assert_eq!(values[5..], [30, 375]);
    assert_eq!(summary.sleep.today_total, 375);
    assert_eq!(summary.sleep.today_intraday[0].start, at(20, 0, 0));
}

#[tokio::test]
async fn window_totals_equal_the_sum_of_their_series() {
    let mut source = InMemorySampleSource::new();
    for d in 1..=20 {
        source = source
            .with_scalar(Metric::Steps, at(d, 10, 0), f64::from(d * 100))
            .with_scalar(Metric::ExerciseMinutes, at(d, 18, 30), f64::from(d) * 2.5);
    }
    // Second-level spans give fractional minutes every night.
    for d in 1..=19 {
        let bedtime = at(d, 23, 0) + Duration::seconds(17);
        let wake = at(d + 1, 6, d) + Duration::seconds(40);
        source = source.with_interval(Metric::Sleep, sleep(bedtime, wake, SleepStage::AsleepCore));
    }

    let summary = aggregator(source, AggregationConfig::default())
        .aggregate_at(at(20, 20, 0))
        .await;

    for metric in Metric::ALL {
        let dto = summary.metric(metric);
        assert_dense(dto, 7, 30);
        let (short, long) = series_total(dto);
        assert_eq!(short, dto.short_window.total, "{metric} short");
        assert_eq!(long, dto.long_window.total, "{metric} long");
    }
    assert!(summary.sleep.short_window.series.iter().all(|p| p.value > 0));
    // Days before 1 March are zero-filled, not missing.
    assert_eq!(summary.steps.long_window.series[0].date, day(20) - Duration::days(29));
    assert_eq!(summary.steps.long_window.series[0].value, 0);
    assert_eq!(summary.steps.long_window.total, (1..=20).map(|d| d * 100).sum::<i64>());
}

#[tokio::test]
async fn half_minute_days_round_into_a_matching_total() {
    let source = InMemorySampleSource::new()
        .with_scalar(Metric::ExerciseMinutes, at(18, 7, 0), 10.5)
        .with_scalar(Metric::ExerciseMinutes, at(19, 7, 0), 10.5);

    let summary = aggregator(source, AggregationConfig::default())
        .aggregate_at(at(20, 12, 0))
        .await;
    let exercise = &summary.exercise;

    let (short, long) = series_total(exercise);
    assert_eq!(short, 22);
    assert_eq!(exercise.short_window.total, 22);
    assert_eq!(long, exercise.long_window.total);
    assert_eq!(exercise.short_window.average, 3);
}

#[tokio::test]
async fn week_over_week_and_short_window_change() {
    let mut source = InMemorySampleSource::new();
    for d in 7..=13 {
        source = source.with_scalar(Metric::Steps, at(d, 12, 0), 100.0);
    }
    for d in 14..=20 {
        source = source.with_scalar(Metric::Steps, at(d, 12, 0), 125.0);
    }
    let config = AggregationConfig {
        long_window_days: 14,
        ..AggregationConfig::default()
    };

    let summary = aggregator(source, config).aggregate_at(at(20, 14, 0)).await;

    assert_eq!(summary.steps.long_window.series.len(), 14);
    assert_eq!(summary.steps.week_over_week_change, Some(25));
    assert_eq!(summary.steps.short_window_change, Some(25));
    assert_eq!(summary.exercise.week_over_week_change, None);
}

#[tokio::test]
async fn unavailable_source_reports_nothing_connected() {
    let source = InMemorySampleSource::new()
        .with_scalar(Metric::Steps, at(20, 9, 0), 100.0)
        .unavailable("not supported");

    let summary = aggregator(source, AggregationConfig::default())
        .aggregate_at(at(20, 12, 0))
        .await;

    assert_eq!(summary.connection, ConnectionStatus::default());
    for metric in Metric::ALL {
        assert_eq!(summary.state(metric), MetricState::NotConnected);
        assert_dense(summary.metric(metric), 7, 30);
    }
}

#[tokio::test]
async fn aggregation_is_idempotent() {
    let source = InMemorySampleSource::new()
        .with_scalar(Metric::Steps, at(20, 9, 0), 4321.0)
        .with_scalar(Metric::ExerciseMinutes, at(19, 7, 0), 42.5)
        .with_interval(
            Metric::Sleep,
            sleep(at(18, 22, 0), at(19, 5, 0), SleepStage::AsleepRem),
        );
    let aggregator = aggregator(source, AggregationConfig::default());

    let first = aggregator.aggregate_at(at(20, 12, 0)).await;
    let second = aggregator.aggregate_at(at(20, 12, 0)).await;

    assert_eq!(first, second);
    assert_eq!(first.to_json().unwrap(), second.to_json().unwrap());
    assert_eq!(first.exercise.short_window.total, 43);
}
