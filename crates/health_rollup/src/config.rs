use std::time::Duration;

use crate::error::RollupError;
use crate::rollup::AveragePolicy;

/// Knobs for one aggregation run.
#[derive(Clone, Debug, PartialEq)]
pub struct AggregationConfig {
    /// Hour of day at which an interval metric's "day" starts (sleep: 18).
    pub anchor_hour: u32,
    /// Width of today's intraday buckets, in hours.
    pub intraday_bucket_hours: u32,
    pub short_window_days: u32,
    pub long_window_days: u32,
    /// Upper bound for each concurrent source query branch.
    pub branch_timeout: Duration,
    pub short_average: AveragePolicy,
    pub long_average: AveragePolicy,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            anchor_hour: 18,
            intraday_bucket_hours: 3,
            short_window_days: 7,
            long_window_days: 30,
            branch_timeout: Duration::from_secs(5),
            short_average: AveragePolicy::AllPeriods,
            long_average: AveragePolicy::AllPeriods,
        }
    }
}

impl AggregationConfig {
    pub fn from_env() -> Result<Self, RollupError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Read overrides through `get` so tests never touch the process env.
    /// Unset keys keep their defaults.
    pub fn from_env_with<F>(mut get: F) -> Result<Self, RollupError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = get("HEALTH_ROLLUP_ANCHOR_HOUR") {
            cfg.anchor_hour = parse_u32("HEALTH_ROLLUP_ANCHOR_HOUR", &v)?;
        }
        if let Some(v) = get("HEALTH_ROLLUP_INTRADAY_HOURS") {
            cfg.intraday_bucket_hours = parse_u32("HEALTH_ROLLUP_INTRADAY_HOURS", &v)?;
        }
        if let Some(v) = get("HEALTH_ROLLUP_SHORT_DAYS") {
            cfg.short_window_days = parse_u32("HEALTH_ROLLUP_SHORT_DAYS", &v)?;
        }
        if let Some(v) = get("HEALTH_ROLLUP_LONG_DAYS") {
            cfg.long_window_days = parse_u32("HEALTH_ROLLUP_LONG_DAYS", &v)?;
        }
        if let Some(v) = get("HEALTH_ROLLUP_BRANCH_TIMEOUT_MS") {
            let ms = v.trim().parse::<u64>().map_err(|_| {
                RollupError::Config(format!("HEALTH_ROLLUP_BRANCH_TIMEOUT_MS: not a number: {v}"))
            })?;
            cfg.branch_timeout = Duration::from_millis(ms);
        }
        if let Some(v) = get("HEALTH_ROLLUP_AVERAGE_POLICY") {
            let policy = match v.trim().to_ascii_lowercase().as_str() {
                "all" => AveragePolicy::AllPeriods,
                "nonzero" => AveragePolicy::NonZeroOnly,
                other => {
                    return Err(RollupError::Config(format!(
                        "HEALTH_ROLLUP_AVERAGE_POLICY: expected `all` or `nonzero`, got {other}"
                    )));
                }
            };
            cfg.short_average = policy;
            cfg.long_average = policy;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), RollupError> {
        if self.anchor_hour >= 24 {
            return Err(RollupError::Config(format!(
                "anchor hour must be below 24, got {}",
                self.anchor_hour
            )));
        }
        if self.intraday_bucket_hours == 0 || 24 % self.intraday_bucket_hours != 0 {
            return Err(RollupError::Config(format!(
                "intraday bucket hours must divide a day, got {}",
                self.intraday_bucket_hours
            )));
        }
        if self.short_window_days == 0 || self.long_window_days < self.short_window_days {
            return Err(RollupError::Config(format!(
                "windows must satisfy 1 <= short ({}) <= long ({})",
                self.short_window_days, self.long_window_days
            )));
        }
        if self.branch_timeout.is_zero() {
            return Err(RollupError::Config("branch timeout must be non-zero".into()));
        }
        Ok(())
    }
}

fn parse_u32(key: &str, value: &str) -> Result<u32, RollupError> {
    value
        .trim()
        .parse::<u32>()
        .map_err(|_| RollupError::Config(format!("{key}: not a number: {value}")))
}
