//! Garmin export provider
//!
//! Serves raw days out of a Garmin Connect bulk export, grouping daily step
//! summaries and activities by calendar date.

use crate::error::{FetchError, SyncError};
use crate::types::{DateRange, RawDay};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use super::SessionProvider;

/// Provider backed by an in-memory Garmin export
#[derive(Debug, Clone, Default)]
pub struct GarminExportProvider {
    by_date: BTreeMap<NaiveDate, DayData>,
}

/// Internal structure to group Garmin data by date
#[derive(Debug, Clone, Default)]
struct DayData {
    daily: Option<Value>,
    activities: Vec<Value>,
}

impl GarminExportProvider {
    /// Parse an export of the form `{ "dailies": [...], "activities": [...] }`
    pub fn from_json(raw_json: &str) -> Result<Self, SyncError> {
        let payload: GarminExport = serde_json::from_str(raw_json)?;
        let mut by_date: BTreeMap<NaiveDate, DayData> = BTreeMap::new();

        // Process daily summaries
        for daily in payload.dailies.unwrap_or_default() {
            match field_date(&daily, "calendarDate") {
                Some(date) => by_date.entry(date).or_default().daily = Some(daily),
                None => tracing::warn!("Skipping daily summary without calendarDate"),
            }
        }

        // Process activities by local start date
        for activity in payload.activities.unwrap_or_default() {
            match field_date(&activity, "startTimeLocal") {
                Some(date) => by_date.entry(date).or_default().activities.push(activity),
                None => tracing::warn!("Skipping activity without startTimeLocal"),
            }
        }

        tracing::debug!(days = by_date.len(), "Loaded Garmin export");
        Ok(Self { by_date })
    }

    pub fn from_path(path: &Path) -> Result<Self, SyncError> {
        let content = fs::read_to_string(path).map_err(|e| {
            SyncError::Config(format!("cannot read export {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// First and last dates present in the export
    pub fn date_span(&self) -> Option<DateRange> {
        let first = *self.by_date.keys().next()?;
        let last = *self.by_date.keys().next_back()?;
        DateRange::new(first, last)
    }
}

impl SessionProvider for GarminExportProvider {
    /// Dates outside the export's span fail, so they stay unsynced until an
    /// export that reaches them is loaded.
    fn fetch_day(&mut self, date: NaiveDate) -> Result<RawDay, FetchError> {
        if !self.date_span().is_some_and(|span| span.contains(date)) {
            return Err(FetchError::Transport(format!("{date} is not in the export")));
        }

        let payload = match self.by_date.get(&date) {
            Some(day) => json!({
                "calendarDate": date.to_string(),
                "totalSteps": day
                    .daily
                    .as_ref()
                    .and_then(|d| d.get("totalSteps"))
                    .cloned()
                    .unwrap_or(Value::Null),
                "activities": day.activities,
            }),
            // Nothing recorded that day inside the exported span
            None => json!({ "calendarDate": date.to_string() }),
        };

        Ok(RawDay { date, payload })
    }
}

/// Read the leading `YYYY-MM-DD` of a string field
fn field_date(value: &Value, field: &str) -> Option<NaiveDate> {
    let text = value.get(field)?.as_str()?;
    text.get(..10)?.parse().ok()
}

// Garmin export structures

#[derive(Debug, Deserialize)]
struct GarminExport {
    dailies: Option<Vec<Value>>,
    activities: Option<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::normalizer::Normalizer;
    use crate::store::LocalStore;
    use crate::sync::{Reconciler, Sleeper, SyncRequest};
    use crate::types::ActivityType;
    use std::time::Duration;

    struct NoWait;

    impl Sleeper for NoWait {
        fn sleep(&mut self, _duration: Duration) {}
    }

    fn export_json() -> &'static str {
        r#"{
            "dailies": [
                { "calendarDate": "2025-02-01", "totalSteps": 10500, "restingHeartRate": 55 },
                { "calendarDate": "2025-02-03", "totalSteps": null }
            ],
            "activities": [
                {
                    "activityName": "Tempo Run",
                    "activityType": { "typeKey": "running", "typeId": 1 },
                    "duration": 1800.0,
                    "averageHR": 150.0,
                    "startTimeLocal": "2025-02-01 07:00:00"
                },
                {
                    "activityName": "Gym",
                    "activityType": { "typeKey": "strength_training", "typeId": 13 },
                    "duration": 3600.0,
                    "startTimeLocal": "2025-02-02 18:30:00"
                }
            ]
        }"#
    }

    #[test]
    fn test_groups_by_date() {
        let mut provider = GarminExportProvider::from_json(export_json()).unwrap();
        let span = provider.date_span().unwrap();
        assert_eq!(span.start.to_string(), "2025-02-01");
        assert_eq!(span.end.to_string(), "2025-02-03");

        let first = provider
            .fetch_day(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap())
            .unwrap();
        assert_eq!(first.payload["totalSteps"], 10500);
        assert_eq!(first.payload["activities"].as_array().unwrap().len(), 1);

        let second = provider
            .fetch_day(NaiveDate::from_ymd_opt(2025, 2, 2).unwrap())
            .unwrap();
        assert!(second.payload["totalSteps"].is_null());
    }

    #[test]
    fn test_payloads_normalize() {
        let mut provider = GarminExportProvider::from_json(export_json()).unwrap();
        let normalizer = Normalizer::default();

        let raw = provider
            .fetch_day(NaiveDate::from_ymd_opt(2025, 2, 2).unwrap())
            .unwrap();
        let day = normalizer.normalize(&raw).unwrap();
        assert_eq!(day.step_count, 0);
        assert_eq!(day.activities[0].activity_type, ActivityType::StrengthTraining);
        assert_eq!(day.activities[0].duration_minutes, 60.0);
    }

    #[test]
    fn test_gap_inside_span_is_empty_day() {
        let export = r#"{
            "dailies": [
                { "calendarDate": "2025-02-01", "totalSteps": 9000 },
                { "calendarDate": "2025-02-04", "totalSteps": 4000 }
            ]
        }"#;
        let mut provider = GarminExportProvider::from_json(export).unwrap();
        let raw = provider
            .fetch_day(NaiveDate::from_ymd_opt(2025, 2, 2).unwrap())
            .unwrap();
        let day = Normalizer::default().normalize(&raw).unwrap();
        assert_eq!(day.step_count, 0);
        assert!(day.activities.is_empty());
    }

    #[test]
    fn test_date_outside_span_fails() {
        let mut provider = GarminExportProvider::from_json(export_json()).unwrap();
        let result = provider.fetch_day(NaiveDate::from_ymd_opt(2024, 12, 25).unwrap());
        assert!(matches!(result, Err(FetchError::Transport(_))));

        let mut empty = GarminExportProvider::default();
        let result = empty.fetch_day(NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());
        assert!(matches!(result, Err(FetchError::Transport(_))));
    }

    #[test]
    fn test_later_export_fills_dates_past_earlier_span() {
        let d = |day| NaiveDate::from_ymd_opt(2025, 2, day).unwrap();
        let config = Config::default();
        let mut store = LocalStore::open_in_memory().unwrap();
        let request = SyncRequest::new(d(1), d(10), false).unwrap();

        let first = GarminExportProvider::from_json(
            r#"{ "dailies": [{ "calendarDate": "2025-02-01", "totalSteps": 8000 }] }"#,
        )
        .unwrap();
        let summary = Reconciler::new(first, &mut store, &config)
            .with_sleeper(NoWait)
            .run(&request, d(20))
            .unwrap();
        assert_eq!(summary.synced, 1);
        assert_eq!(summary.failed.len(), 9);
        assert!(store.get(d(5)).unwrap().is_none());

        let second = GarminExportProvider::from_json(
            r#"{ "dailies": [{ "calendarDate": "2025-02-05", "totalSteps": 15000 }] }"#,
        )
        .unwrap();
        let summary = Reconciler::new(second, &mut store, &config)
            .with_sleeper(NoWait)
            .run(&request, d(20))
            .unwrap();
        assert_eq!(summary.planned, 9);
        assert_eq!(store.get(d(5)).unwrap().unwrap().step_count, 15_000);
        assert!(summary.coverage.contains(d(5)));
        assert!(!summary.coverage.contains(d(6)));
    }

    #[test]
    fn test_unreadable_export_file_is_config_error() {
        let path = std::env::temp_dir().join(format!("fitpoints-missing-{}.json", uuid::Uuid::new_v4()));
        assert!(matches!(
            GarminExportProvider::from_path(&path),
            Err(SyncError::Config(_))
        ));
    }

    #[test]
    fn test_invalid_export() {
        assert!(GarminExportProvider::from_json("not json").is_err());
    }
}
