//! Metric normalization
//!
//! This module turns one raw remote day into a canonical `DaySummary`.
//! - Missing step counts become zero
//! - Activities without a positive duration are dropped
//! - Vendor activity types map onto the fixed categories
//! - Implausible heart rates are treated as absent
//! - Unreadable activity start times are dropped, keeping the activity
//!
//! Payloads that cannot be read fail with a validation error so the caller can
//! skip that day.

use crate::config::HeartRateBounds;
use crate::error::SyncError;
use crate::types::{ActivityRecord, ActivityType, DaySummary, RawDay};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Deserialize;

const START_TIME_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Garmin `typeKey` fragments that count as cardio
const CARDIO_KEYS: [&str; 24] = [
    "run", "cycl", "bik", "walk", "swim", "hik", "row", "elliptical", "stair", "cardio",
    "ski", "paddl", "treadmill", "spinning", "hiit", "fitness_equipment", "boxing", "dance",
    "jump_rope", "aerobic", "kayak", "skat", "climb", "tennis",
];

/// Normalizer for converting raw remote days into canonical summaries
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    heart_rate_bounds: HeartRateBounds,
}

impl Normalizer {
    pub fn new(heart_rate_bounds: HeartRateBounds) -> Self {
        Self { heart_rate_bounds }
    }

    /// Normalize a raw remote day
    pub fn normalize(&self, raw: &RawDay) -> Result<DaySummary, SyncError> {
        let invalid = |reason: String| SyncError::Validation {
            date: raw.date,
            reason,
        };

        let remote = RemoteDay::deserialize(&raw.payload)
            .map_err(|e| invalid(format!("unreadable payload: {e}")))?;

        if let Some(reported) = &remote.calendar_date {
            let reported: NaiveDate = reported
                .parse()
                .map_err(|_| invalid(format!("unreadable calendar date {reported:?}")))?;
            if reported != raw.date {
                return Err(invalid(format!("payload is for {reported}")));
            }
        }

        let step_count = match remote.total_steps {
            None => 0,
            Some(steps) if steps.is_finite() && steps >= 0.0 && steps <= u32::MAX as f64 => {
                steps.round() as u32
            }
            Some(steps) => return Err(invalid(format!("step count out of range: {steps}"))),
        };

        let mut activities: Vec<ActivityRecord> = remote
            .activities
            .unwrap_or_default()
            .into_iter()
            .filter_map(|activity| self.convert_activity(activity, raw.date))
            .collect();

        // Stable sort keeps untimed activities in payload order, after timed ones
        activities.sort_by_key(|a: &ActivityRecord| (a.start_time.is_none(), a.start_time));

        Ok(DaySummary {
            date: raw.date,
            step_count,
            activities,
        })
    }

    fn convert_activity(
        &self,
        activity: RemoteActivity,
        date: NaiveDate,
    ) -> Option<ActivityRecord> {
        let start_time = activity.start_time_local.as_deref().and_then(|text| {
            let parsed = parse_start_time(text);
            if parsed.is_none() {
                tracing::debug!(%date, start_time = text, "Ignoring unreadable start time");
            }
            parsed
        });
        if start_time.is_some_and(|start| start.date() != date) {
            return None;
        }

        let duration_minutes = match activity.duration {
            Some(secs) if secs.is_finite() && secs > 0.0 => secs / 60.0,
            _ => {
                tracing::debug!(%date, name = ?activity.activity_name, "Dropping activity without duration");
                return None;
            }
        };

        let avg_heart_rate = activity.average_hr.and_then(|hr| {
            let rounded = hr.round();
            let plausible = hr.is_finite()
                && rounded >= 0.0
                && self.heart_rate_bounds.contains(rounded as u32);
            if !plausible {
                tracing::debug!(%date, heart_rate = hr, "Ignoring implausible heart rate");
            }
            plausible.then_some(rounded as u32)
        });

        Some(ActivityRecord {
            activity_type: activity
                .activity_type
                .as_ref()
                .map(RemoteActivityType::classify)
                .unwrap_or(ActivityType::Other),
            duration_minutes,
            avg_heart_rate,
            name: activity.activity_name,
            start_time,
        })
    }
}

fn parse_start_time(text: &str) -> Option<NaiveDateTime> {
    START_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

/// Map a Garmin type key onto a scoring category
pub fn classify_type_key(type_key: &str) -> ActivityType {
    let key = type_key.to_ascii_lowercase();
    if key.contains("strength") {
        ActivityType::StrengthTraining
    } else if CARDIO_KEYS.iter().any(|fragment| key.contains(fragment)) {
        ActivityType::Cardio
    } else {
        ActivityType::Other
    }
}

/// Map a numeric Garmin type id onto a scoring category
pub fn classify_type_id(type_id: i64) -> ActivityType {
    match type_id {
        // running, cycling, hiking, walking
        1 | 2 | 3 | 9 => ActivityType::Cardio,
        13 => ActivityType::StrengthTraining,
        _ => ActivityType::Other,
    }
}

// Accepted remote payload shapes

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteDay {
    #[serde(alias = "date")]
    calendar_date: Option<String>,
    #[serde(alias = "steps")]
    total_steps: Option<f64>,
    activities: Option<Vec<RemoteActivity>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteActivity {
    activity_name: Option<String>,
    activity_type: Option<RemoteActivityType>,
    /// Seconds
    duration: Option<f64>,
    #[serde(rename = "averageHR", alias = "averageHr")]
    average_hr: Option<f64>,
    start_time_local: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteActivityType {
    Key(String),
    Id(i64),
    Descriptor {
        #[serde(rename = "typeKey")]
        type_key: Option<String>,
        #[serde(rename = "typeId")]
        type_id: Option<i64>,
    },
}

impl RemoteActivityType {
    fn classify(&self) -> ActivityType {
        match self {
            RemoteActivityType::Key(key) => classify_type_key(key),
            RemoteActivityType::Id(id) => classify_type_id(*id),
            RemoteActivityType::Descriptor { type_key, type_id } => match (type_key, type_id) {
                (Some(key), _) => classify_type_key(key),
                (None, Some(id)) => classify_type_id(*id),
                (None, None) => ActivityType::Other,
            },
        }
    }
}
