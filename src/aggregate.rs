//! Weekly and monthly roll-ups
//!
//! Read-only views over the local store for presentation. Dates without a
//! stored record count as zero-activity days. Weeks start on Monday.

use crate::config::{Config, GoalPolicy, ScoringPolicy};
use crate::error::SyncError;
use crate::scoring;
use crate::store::LocalStore;
use crate::types::{DaySummary, PointBreakdown};
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;

/// Points for one date in a view
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DayPoints {
    pub date: NaiveDate,
    pub breakdown: PointBreakdown,
    /// Whether the store holds a record for this date
    pub recorded: bool,
    /// Daily goal reached
    pub goal_met: bool,
}

/// Seven consecutive days starting at `week_start`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeekSummary {
    pub week_start: NaiveDate,
    pub per_day: Vec<DayPoints>,
    pub weekly_total: f64,
    pub goal_met: bool,
}

/// One Monday-first row of a month grid
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GridWeek {
    /// `None` for slots outside the month
    pub days: [Option<DayPoints>; 7],
    /// Sum over in-month days only
    pub week_total: f64,
    pub goal_met: bool,
}

/// Calendar-shaped view of a month
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub weeks: Vec<GridWeek>,
    pub month_total: f64,
}

/// Monday of the week containing `date`
pub fn week_containing(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Builds roll-ups from stored days
pub struct Aggregator<'a> {
    store: &'a LocalStore,
    scoring: &'a ScoringPolicy,
    goals: GoalPolicy,
}

impl<'a> Aggregator<'a> {
    pub fn new(store: &'a LocalStore, config: &'a Config) -> Self {
        Self {
            store,
            scoring: &config.scoring,
            goals: config.goals,
        }
    }

    /// Points for a single date, zero-filled when absent
    pub fn day_points(&self, date: NaiveDate) -> Result<DayPoints, SyncError> {
        let stored = self.store.get(date)?;
        self.points_for(date, stored.as_ref())
    }

    pub fn week_summary(&self, week_start: NaiveDate) -> Result<WeekSummary, SyncError> {
        let week_end = week_start + Duration::days(6);
        let stored = self.load(week_start, week_end)?;

        let per_day = (0..7)
            .map(|offset| {
                let date = week_start + Duration::days(offset);
                self.points_for(date, stored.get(&date))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let weekly_total = per_day.iter().map(|day| day.breakdown.total).sum();

        Ok(WeekSummary {
            week_start,
            per_day,
            weekly_total,
            goal_met: self.week_goal_met(weekly_total),
        })
    }

    pub fn month_grid(&self, year: i32, month: u32) -> Result<MonthGrid, SyncError> {
        let invalid = || SyncError::InvalidMonth { year, month };
        let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next_first = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        let last = next_first - Duration::days(1);

        let stored = self.load(first, last)?;

        let mut weeks = Vec::new();
        let mut month_total = 0.0;
        let mut cursor = week_containing(first);

        while cursor <= last {
            let mut days = [None; 7];
            let mut week_total = 0.0;

            for slot in days.iter_mut() {
                if cursor.month() == month && cursor.year() == year {
                    let points = self.points_for(cursor, stored.get(&cursor))?;
                    week_total += points.breakdown.total;
                    *slot = Some(points);
                }
                cursor += Duration::days(1);
            }

            month_total += week_total;
            weeks.push(GridWeek {
                days,
                week_total,
                goal_met: self.week_goal_met(week_total),
            });
        }

        Ok(MonthGrid {
            year,
            month,
            weeks,
            month_total,
        })
    }

    fn load(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, DaySummary>, SyncError> {
        Ok(self
            .store
            .get_range(start, end)?
            .into_iter()
            .map(|day| (day.date, day))
            .collect())
    }

    fn points_for(&self, date: NaiveDate, stored: Option<&DaySummary>) -> Result<DayPoints, SyncError> {
        let breakdown = match stored {
            Some(day) => scoring::score(day, self.scoring)?,
            None => scoring::score(&DaySummary::empty(date), self.scoring)?,
        };

        Ok(DayPoints {
            date,
            breakdown,
            recorded: stored.is_some(),
            goal_met: breakdown.total > 0.0 && breakdown.total >= self.goals.daily_points,
        })
    }

    fn week_goal_met(&self, total: f64) -> bool {
        total > 0.0 && total >= self.goals.weekly_points
    }
}
