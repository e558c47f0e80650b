//! Sync coverage bookkeeping
//!
//! `Coverage` records which dates have been reconciled with the remote source.
//! It is kept as a sorted list of disjoint, non-adjacent inclusive ranges, so a
//! date that failed mid-run leaves a hole that the next run fills.

use crate::types::DateRange;
use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Set of dates already synced, stored as merged ranges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    ranges: Vec<DateRange>,
}

impl Coverage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from arbitrary ranges, merging overlaps and neighbours
    pub fn from_ranges(ranges: impl IntoIterator<Item = DateRange>) -> Self {
        let mut coverage = Self::new();
        for range in ranges {
            coverage.insert_range(range);
        }
        coverage
    }

    pub fn ranges(&self) -> &[DateRange] {
        &self.ranges
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.ranges.iter().any(|range| range.contains(date))
    }

    /// Total number of covered dates
    pub fn covered_days(&self) -> u32 {
        self.ranges.iter().map(DateRange::num_days).sum()
    }

    /// Latest covered date
    pub fn latest(&self) -> Option<NaiveDate> {
        self.ranges.last().map(|range| range.end)
    }

    /// Mark one date as covered
    pub fn insert(&mut self, date: NaiveDate) {
        self.insert_range(DateRange::single(date));
    }

    pub fn insert_range(&mut self, range: DateRange) {
        let mut merged = range;
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);

        for existing in self.ranges.drain(..) {
            if touches(&existing, &merged) {
                merged.start = merged.start.min(existing.start);
                merged.end = merged.end.max(existing.end);
            } else {
                kept.push(existing);
            }
        }

        kept.push(merged);
        kept.sort_by_key(|r| r.start);
        self.ranges = kept;
    }

    /// Dates in `range` not yet covered, ascending
    pub fn missing_in(&self, range: DateRange) -> Vec<NaiveDate> {
        range.days().filter(|date| !self.contains(*date)).collect()
    }
}

/// Overlapping or directly adjacent
fn touches(a: &DateRange, b: &DateRange) -> bool {
    a.start <= b.end + Duration::days(1) && b.start <= a.end + Duration::days(1)
}
