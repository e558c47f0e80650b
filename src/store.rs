//! Local store
//!
//! SQLite-backed mapping from calendar date to `DaySummary`, plus the persisted
//! sync coverage. Each write runs in its own transaction, so a day is either
//! fully stored or not stored at all.

use crate::coverage::Coverage;
use crate::error::SyncError;
use crate::types::{ActivityRecord, DateRange, DaySummary};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SCHEMA_VERSION: i64 = 1;

/// Persistent day records and sync coverage
pub struct LocalStore {
    conn: Connection,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<Self, SyncError> {
        let conn = Connection::open(path).map_err(|e| {
            SyncError::Persistence(format!("cannot open {}: {}", path.display(), e))
        })?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, SyncError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, SyncError> {
        let store = Self { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<(), SyncError> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS daily_stats (
                    date TEXT PRIMARY KEY,
                    steps INTEGER NOT NULL,
                    activities_json TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS sync_coverage (
                    range_start TEXT NOT NULL,
                    range_end TEXT NOT NULL
                );",
            )?;
            self.conn
                .pragma_update(None, "user_version", SCHEMA_VERSION)?;
        }

        Ok(())
    }

    /// Insert or replace the record for `day.date`
    pub fn upsert(&mut self, day: &DaySummary) -> Result<(), SyncError> {
        let activities_json = serde_json::to_string(&day.activities)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "INSERT INTO daily_stats (date, steps, activities_json)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(date) DO UPDATE SET
                steps = excluded.steps,
                activities_json = excluded.activities_json",
            params![day.date.to_string(), day.step_count, activities_json],
        )?;
        tx.commit()?;

        Ok(())
    }

    pub fn get(&self, date: NaiveDate) -> Result<Option<DaySummary>, SyncError> {
        let row = self
            .conn
            .query_row(
                "SELECT date, steps, activities_json FROM daily_stats WHERE date = ?1",
                params![date.to_string()],
                read_row,
            )
            .optional()?;

        row.map(decode_row).transpose()
    }

    /// Stored days within `[start, end]`, ascending. Missing dates are omitted.
    pub fn get_range(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<DaySummary>, SyncError> {
        let mut stmt = self.conn.prepare(
            "SELECT date, steps, activities_json FROM daily_stats
             WHERE date >= ?1 AND date <= ?2
             ORDER BY date ASC",
        )?;
        let rows = stmt
            .query_map(params![start.to_string(), end.to_string()], read_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(decode_row).collect()
    }

    pub fn latest_date(&self) -> Result<Option<NaiveDate>, SyncError> {
        let latest: Option<String> =
            self.conn
                .query_row("SELECT MAX(date) FROM daily_stats", [], |row| row.get(0))?;
        latest.map(|text| parse_date(&text)).transpose()
    }

    /// Number of stored days
    pub fn len(&self) -> Result<usize, SyncError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM daily_stats", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> Result<bool, SyncError> {
        Ok(self.len()? == 0)
    }

    /// Dates already reconciled with the remote source
    pub fn covered_range(&self) -> Result<Coverage, SyncError> {
        let mut stmt = self
            .conn
            .prepare("SELECT range_start, range_end FROM sync_coverage ORDER BY range_start ASC")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut ranges = Vec::with_capacity(rows.len());
        for (start, end) in rows {
            let (start, end) = (parse_date(&start)?, parse_date(&end)?);
            let range = DateRange::new(start, end).ok_or_else(|| {
                SyncError::Persistence(format!("corrupt coverage range {start}..{end}"))
            })?;
            ranges.push(range);
        }

        Ok(Coverage::from_ranges(ranges))
    }

    /// Replace the persisted coverage
    pub fn save_coverage(&mut self, coverage: &Coverage) -> Result<(), SyncError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM sync_coverage", [])?;
        {
            let mut stmt = tx.prepare("INSERT INTO sync_coverage (range_start, range_end) VALUES (?1, ?2)")?;
            for range in coverage.ranges() {
                stmt.execute(params![range.start.to_string(), range.end.to_string()])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn parse_date(text: &str) -> Result<NaiveDate, SyncError> {
    text.parse()
        .map_err(|_| SyncError::Persistence(format!("corrupt date in store: {text:?}")))
}

type DayRow = (String, i64, String);

fn read_row(row: &Row<'_>) -> rusqlite::Result<DayRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn decode_row((date, steps, activities_json): DayRow) -> Result<DaySummary, SyncError> {
    let date = parse_date(&date)?;
    let step_count = u32::try_from(steps)
        .map_err(|_| SyncError::Persistence(format!("corrupt step count for {date}: {steps}")))?;
    let activities: Vec<ActivityRecord> = serde_json::from_str(&activities_json).map_err(|e| {
        SyncError::Persistence(format!("corrupt activities for {date}: {e}"))
    })?;

    Ok(DaySummary {
        date,
        step_count,
        activities,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityType;
    use pretty_assertions::assert_eq;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, day).unwrap()
    }

    fn sample(day: u32, steps: u32) -> DaySummary {
        DaySummary {
            date: d(day),
            step_count: steps,
            activities: vec![ActivityRecord::new(ActivityType::Cardio, 32.5, Some(118))],
        }
    }

    #[test]
    fn test_upsert_and_get() {
        let mut store = LocalStore::open_in_memory().unwrap();
        assert_eq!(store.get(d(1)).unwrap(), None);

        store.upsert(&sample(1, 8000)).unwrap();
        assert_eq!(store.get(d(1)).unwrap(), Some(sample(1, 8000)));
    }

    #[test]
    fn test_upsert_is_idempotent_and_replaces() {
        let mut store = LocalStore::open_in_memory().unwrap();
        store.upsert(&sample(1, 8000)).unwrap();
        store.upsert(&sample(1, 8000)).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(d(1)).unwrap(), Some(sample(1, 8000)));

        let replacement = DaySummary::empty(d(1));
        store.upsert(&replacement).unwrap();
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.get(d(1)).unwrap(), Some(replacement));
    }

    #[test]
    fn test_get_range_is_ordered_and_sparse() {
        let mut store = LocalStore::open_in_memory().unwrap();
        for (day, steps) in [(5, 500), (2, 200), (9, 900), (3, 300)] {
            store.upsert(&sample(day, steps)).unwrap();
        }

        let days: Vec<NaiveDate> = store
            .get_range(d(2), d(5))
            .unwrap()
            .into_iter()
            .map(|s| s.date)
            .collect();
        assert_eq!(days, vec![d(2), d(3), d(5)]);
        assert_eq!(store.latest_date().unwrap(), Some(d(9)));
    }

    #[test]
    fn test_coverage_round_trip() {
        let mut store = LocalStore::open_in_memory().unwrap();
        assert!(store.covered_range().unwrap().is_empty());

        let coverage = Coverage::from_ranges([
            DateRange::new(d(1), d(4)).unwrap(),
            DateRange::new(d(7), d(7)).unwrap(),
        ]);
        store.save_coverage(&coverage).unwrap();
        assert_eq!(store.covered_range().unwrap(), coverage);
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let path = std::env::temp_dir().join(format!("fitpoints-{}.db", uuid::Uuid::new_v4()));
        {
            let mut store = LocalStore::open(&path).unwrap();
            store.upsert(&sample(3, 12_000)).unwrap();
            let mut coverage = Coverage::new();
            coverage.insert(d(3));
            store.save_coverage(&coverage).unwrap();
        }

        let store = LocalStore::open(&path).unwrap();
        assert_eq!(store.get(d(3)).unwrap(), Some(sample(3, 12_000)));
        assert!(store.covered_range().unwrap().contains(d(3)));

        let _ = std::fs::remove_file(&path);
    }
}
