//! Core types for the fitpoints engine
//!
//! This module defines the data structures that flow between the stages of a
//! sync run: raw remote days, canonical day summaries, and derived point
//! breakdowns.

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Activity category used for scoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    StrengthTraining,
    Cardio,
    /// Retained for display, never scored
    Other,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::StrengthTraining => "strength_training",
            ActivityType::Cardio => "cardio",
            ActivityType::Other => "other",
        }
    }
}

/// One logged exercise session, owned by its day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_type: ActivityType,
    /// Session length (minutes)
    pub duration_minutes: f64,
    /// Average heart rate over the session (bpm)
    pub avg_heart_rate: Option<u32>,
    /// Vendor activity name, for display
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Local start time of the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
}

impl ActivityRecord {
    pub fn new(activity_type: ActivityType, duration_minutes: f64, avg_heart_rate: Option<u32>) -> Self {
        Self {
            activity_type,
            duration_minutes,
            avg_heart_rate,
            name: None,
            start_time: None,
        }
    }
}

/// Canonical metrics for one calendar date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub date: NaiveDate,
    pub step_count: u32,
    /// Chronological by start time
    pub activities: Vec<ActivityRecord>,
}

impl DaySummary {
    /// A day with no steps and no activities
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            step_count: 0,
            activities: Vec::new(),
        }
    }
}

/// Points derived from a single day
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointBreakdown {
    pub step_points: u32,
    pub activity_points: f64,
    pub total: f64,
}

impl PointBreakdown {
    pub fn zero() -> Self {
        Self {
            step_points: 0,
            activity_points: 0.0,
            total: 0.0,
        }
    }
}

/// Unprocessed remote data for one date, as returned by a session provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDay {
    pub date: NaiveDate,
    pub payload: serde_json::Value,
}

/// Inclusive range of calendar dates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Returns `None` when `end` precedes `start`
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn single(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Number of days in the range
    pub fn num_days(&self) -> u32 {
        (self.end - self.start).num_days() as u32 + 1
    }

    /// Dates in ascending order
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..self.num_days() as i64).map(move |offset| start + Duration::days(offset))
    }
}
