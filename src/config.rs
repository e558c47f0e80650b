//! Configuration for sync runs, scoring and goals
//!
//! Every policy constant lives here so product values can be overridden
//! without touching the engine. Loading order: defaults, then an optional JSON
//! file, then `FITPOINTS_*` environment variables (a `.env` file is honored).

use crate::error::SyncError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// First date synced when the store is empty
pub const DEFAULT_SYNC_START: (i32, u32, u32) = (2025, 2, 1);

/// Default SQLite file name
pub const DEFAULT_DATABASE_PATH: &str = "activities.db";

/// One step threshold and the points it adds once reached
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepTier {
    pub threshold: u32,
    pub points: u32,
}

/// Heart-rate zone: applies from `min_bpm` up to the next zone's floor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HrZone {
    pub min_bpm: u32,
    /// Points per minute
    pub weight: f64,
}

/// Maps average heart rate to a per-minute weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartRateZones {
    /// Sorted by `min_bpm`, ascending
    pub zones: Vec<HrZone>,
    /// Weight used when the session has no heart rate
    pub no_heart_rate_weight: f64,
}

impl HeartRateZones {
    /// Weight for a session's average heart rate.
    ///
    /// Rates below the lowest zone get zero weight.
    pub fn weight_for(&self, avg_heart_rate: Option<u32>) -> f64 {
        match avg_heart_rate {
            None => self.no_heart_rate_weight,
            Some(hr) => self
                .zones
                .iter()
                .rev()
                .find(|zone| hr >= zone.min_bpm)
                .map(|zone| zone.weight)
                .unwrap_or(0.0),
        }
    }

    fn validate(&self, label: &str) -> Result<(), SyncError> {
        if self.zones.is_empty() {
            return Err(SyncError::Config(format!("{label}: at least one zone required")));
        }
        if self
            .zones
            .windows(2)
            .any(|pair| pair[0].min_bpm >= pair[1].min_bpm)
        {
            return Err(SyncError::Config(format!(
                "{label}: zones must be strictly ascending by min_bpm"
            )));
        }
        let weights = self
            .zones
            .iter()
            .map(|z| z.weight)
            .chain(std::iter::once(self.no_heart_rate_weight));
        for weight in weights {
            if !weight.is_finite() || weight < 0.0 {
                return Err(SyncError::Config(format!(
                    "{label}: weights must be finite and non-negative"
                )));
            }
        }
        // Higher heart rate never earns less
        if self
            .zones
            .windows(2)
            .any(|pair| pair[1].weight < pair[0].weight)
        {
            return Err(SyncError::Config(format!(
                "{label}: zone weights must not decrease as heart rate rises"
            )));
        }
        if self.no_heart_rate_weight <= 0.0 {
            return Err(SyncError::Config(format!(
                "{label}: no_heart_rate_weight must be positive"
            )));
        }
        Ok(())
    }
}

/// Step tiers and per-type heart-rate zones
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringPolicy {
    /// Ascending thresholds; points accumulate across every tier reached
    pub step_tiers: Vec<StepTier>,
    pub cardio: HeartRateZones,
    pub strength: HeartRateZones,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            step_tiers: vec![
                StepTier { threshold: 7_000, points: 3 },
                StepTier { threshold: 10_000, points: 2 },
                StepTier { threshold: 12_500, points: 3 },
            ],
            // 5 points per 30 min at 90-110 bpm, 8 points above 110 bpm
            cardio: HeartRateZones {
                zones: vec![
                    HrZone { min_bpm: 0, weight: 0.0 },
                    HrZone { min_bpm: 90, weight: 5.0 / 30.0 },
                    HrZone { min_bpm: 111, weight: 8.0 / 30.0 },
                ],
                no_heart_rate_weight: 5.0 / 30.0,
            },
            // 8 points per 30 min regardless of heart rate
            strength: HeartRateZones {
                zones: vec![HrZone { min_bpm: 0, weight: 8.0 / 30.0 }],
                no_heart_rate_weight: 8.0 / 30.0,
            },
        }
    }
}

impl ScoringPolicy {
    pub fn validate(&self) -> Result<(), SyncError> {
        if self
            .step_tiers
            .windows(2)
            .any(|pair| pair[0].threshold >= pair[1].threshold)
        {
            return Err(SyncError::Config(
                "step_tiers must be strictly ascending by threshold".to_string(),
            ));
        }
        if self
            .step_tiers
            .iter()
            .try_fold(0u32, |sum, tier| sum.checked_add(tier.points))
            .is_none()
        {
            return Err(SyncError::Config(
                "step_tiers points overflow when summed".to_string(),
            ));
        }
        self.cardio.validate("cardio")?;
        self.strength.validate("strength")
    }
}

/// Heart-rate values outside this range are treated as absent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateBounds {
    pub min_bpm: u32,
    pub max_bpm: u32,
}

impl Default for HeartRateBounds {
    fn default() -> Self {
        Self {
            min_bpm: 30,
            max_bpm: 250,
        }
    }
}

impl HeartRateBounds {
    pub fn contains(&self, bpm: u32) -> bool {
        (self.min_bpm..=self.max_bpm).contains(&bpm)
    }
}

/// Daily and weekly point goals used by the aggregator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalPolicy {
    pub daily_points: f64,
    pub weekly_points: f64,
}

impl Default for GoalPolicy {
    fn default() -> Self {
        Self {
            daily_points: 8.0,
            weekly_points: 40.0,
        }
    }
}

/// Retry budget for transient transport failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per date, including the first
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), doubling each time
    pub fn backoff_for(&self, retry: u32) -> Duration {
        let factor = 1u64 << retry.saturating_sub(1).min(20);
        Duration::from_millis(
            self.base_backoff_ms
                .saturating_mul(factor)
                .min(self.max_backoff_ms),
        )
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync_start_date: NaiveDate,
    pub force_refresh: bool,
    pub database_path: PathBuf,
    pub scoring: ScoringPolicy,
    pub heart_rate_bounds: HeartRateBounds,
    pub goals: GoalPolicy,
    pub retry: RetryPolicy,
}

impl Default for Config {
    fn default() -> Self {
        let (y, m, d) = DEFAULT_SYNC_START;
        Self {
            sync_start_date: NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default(),
            force_refresh: false,
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            scoring: ScoringPolicy::default(),
            heart_rate_bounds: HeartRateBounds::default(),
            goals: GoalPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from an optional JSON file and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, SyncError> {
        dotenvy::dotenv().ok();

        let mut config = match path {
            Some(path) => {
                let content = fs::read_to_string(path).map_err(|e| {
                    SyncError::Config(format!("cannot read {}: {}", path.display(), e))
                })?;
                Self::from_json(&content)?
            }
            None => Self::default(),
        };

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        let config: Config = serde_json::from_str(json)?;
        Ok(config)
    }

    /// Apply `FITPOINTS_*` overrides
    pub fn apply_env(&mut self) -> Result<(), SyncError> {
        if let Ok(value) = env::var("FITPOINTS_SYNC_START_DATE") {
            self.sync_start_date = value.trim().parse().map_err(|_| {
                SyncError::Config(format!("FITPOINTS_SYNC_START_DATE is not a date: {value}"))
            })?;
        }
        if let Ok(value) = env::var("FITPOINTS_FORCE_REFRESH") {
            self.force_refresh = match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => true,
                "0" | "false" | "no" | "" => false,
                other => {
                    return Err(SyncError::Config(format!(
                        "FITPOINTS_FORCE_REFRESH is not a boolean: {other}"
                    )))
                }
            };
        }
        if let Ok(value) = env::var("FITPOINTS_DATABASE") {
            self.database_path = PathBuf::from(value.trim());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        self.scoring.validate()?;
        if self.heart_rate_bounds.min_bpm == 0
            || self.heart_rate_bounds.min_bpm > self.heart_rate_bounds.max_bpm
        {
            return Err(SyncError::Config(
                "heart_rate_bounds must be positive and ordered".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(SyncError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.goals.daily_points < 0.0 || self.goals.weekly_points < 0.0 {
            return Err(SyncError::Config("goals must be non-negative".to_string()));
        }
        Ok(())
    }
}
