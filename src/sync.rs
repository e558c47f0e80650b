//! Sync reconciliation
//!
//! This module merges remote history into the local store. A run moves through
//! five stages for every planned date:
//! 1. Plan - dates in the request not yet covered (all of them when forced)
//! 2. Fetch - raw day from the session provider, with bounded retries
//! 3. Normalize - raw day to `DaySummary`
//! 4. Persist - upsert into the store
//! 5. Advance - mark the date covered, only after the upsert committed
//!
//! Dates are processed in ascending order. Bad records and exhausted transport
//! retries skip a single date; authentication and store failures abort the run.

use crate::adapters::SessionProvider;
use crate::config::{Config, RetryPolicy};
use crate::coverage::Coverage;
use crate::error::{FetchError, SyncError};
use crate::normalizer::Normalizer;
use crate::store::LocalStore;
use crate::types::{DateRange, DaySummary, RawDay};
use chrono::{Duration as DateDuration, NaiveDate};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Dates a caller wants reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncRequest {
    pub range: DateRange,
    /// Re-fetch dates that are already covered
    pub force: bool,
}

impl SyncRequest {
    pub fn new(start: NaiveDate, end: NaiveDate, force: bool) -> Result<Self, SyncError> {
        let range = DateRange::new(start, end).ok_or_else(|| {
            SyncError::Config(format!("sync range end {end} precedes start {start}"))
        })?;
        Ok(Self { range, force })
    }

    /// Everything from the configured start date through yesterday.
    ///
    /// Returns `None` when that range is empty.
    pub fn catch_up(config: &Config, today: NaiveDate) -> Option<Self> {
        let yesterday = today - DateDuration::days(1);
        DateRange::new(config.sync_start_date, yesterday).map(|range| Self {
            range,
            force: config.force_refresh,
        })
    }
}

/// A date left out of a run, with the reason
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDay {
    pub date: NaiveDate,
    pub reason: String,
}

/// Outcome of a completed (or cancelled) sync run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub requested: DateRange,
    /// Dates the plan selected for fetching
    pub planned: usize,
    /// Dates fetched, normalized and committed
    pub synced: usize,
    /// Dates dropped for malformed records
    pub skipped: Vec<SkippedDay>,
    /// Dates whose fetch kept failing
    pub failed: Vec<SkippedDay>,
    pub cancelled: bool,
    /// Coverage after the run
    pub coverage: Coverage,
}

/// Waits between retries
pub trait Sleeper {
    fn sleep(&mut self, duration: Duration);
}

/// Blocks the current thread
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Dates a run will fetch, ascending
pub fn plan(coverage: &Coverage, request: &SyncRequest) -> Vec<NaiveDate> {
    if request.force {
        request.range.days().collect()
    } else {
        coverage.missing_in(request.range)
    }
}

/// Merges remote days into a `LocalStore`
pub struct Reconciler<'a, P: SessionProvider> {
    provider: P,
    store: &'a mut LocalStore,
    normalizer: Normalizer,
    retry: RetryPolicy,
    sleeper: Box<dyn Sleeper + 'a>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a, P: SessionProvider> Reconciler<'a, P> {
    pub fn new(provider: P, store: &'a mut LocalStore, config: &Config) -> Self {
        Self {
            provider,
            store,
            normalizer: Normalizer::new(config.heart_rate_bounds),
            retry: config.retry,
            sleeper: Box::new(ThreadSleeper),
            cancel: None,
        }
    }

    /// Replace the backoff sleeper
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'a) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Stop between dates once `flag` is set
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Run one sync over `request`.
    ///
    /// Dates on or after `today` are stored but left uncovered, so the next
    /// run picks up the rest of the day.
    pub fn run(&mut self, request: &SyncRequest, today: NaiveDate) -> Result<RunSummary, SyncError> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("sync", %run_id);
        let _guard = span.enter();

        let mut coverage = self.store.covered_range()?;
        let planned = plan(&coverage, request);

        tracing::info!(
            start = %request.range.start,
            end = %request.range.end,
            force = request.force,
            planned = planned.len(),
            "Starting sync"
        );

        let mut summary = RunSummary {
            run_id,
            requested: request.range,
            planned: planned.len(),
            synced: 0,
            skipped: Vec::new(),
            failed: Vec::new(),
            cancelled: false,
            coverage: Coverage::new(),
        };

        for date in planned {
            if self.is_cancelled() {
                tracing::info!(%date, "Sync cancelled");
                summary.cancelled = true;
                break;
            }

            let raw = match self.fetch_with_retry(date) {
                Ok(raw) => raw,
                Err(FetchError::Auth(reason)) => {
                    tracing::error!(%date, synced = summary.synced, %reason, "Session rejected, aborting sync");
                    return Err(SyncError::Auth(reason));
                }
                Err(FetchError::Transport(reason)) => {
                    tracing::warn!(%date, %reason, "Giving up on date after retries");
                    summary.failed.push(SkippedDay { date, reason });
                    continue;
                }
            };

            let day = match self.normalize(date, &raw) {
                Ok(day) => day,
                Err(e) => {
                    tracing::warn!(%date, error = %e, "Skipping malformed day");
                    summary.skipped.push(SkippedDay {
                        date,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            if let Err(e) = self.commit(&day, &mut coverage, today) {
                tracing::error!(%date, synced = summary.synced, error = %e, "Store failure, aborting sync");
                return Err(e);
            }
            summary.synced += 1;
        }

        tracing::info!(
            synced = summary.synced,
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            cancelled = summary.cancelled,
            "Sync finished"
        );

        summary.coverage = coverage;
        Ok(summary)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
    }

    fn fetch_with_retry(&mut self, date: NaiveDate) -> Result<RawDay, FetchError> {
        let mut attempt = 1;
        loop {
            match self.provider.fetch_day(date) {
                Err(FetchError::Transport(reason)) if attempt < self.retry.max_attempts => {
                    let delay = self.retry.backoff_for(attempt);
                    tracing::debug!(%date, attempt, ?delay, %reason, "Retrying fetch");
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn normalize(&self, date: NaiveDate, raw: &RawDay) -> Result<DaySummary, SyncError> {
        if raw.date != date {
            return Err(SyncError::Validation {
                date,
                reason: format!("provider returned data for {}", raw.date),
            });
        }
        self.normalizer.normalize(raw)
    }

    /// Persist, then advance coverage
    fn commit(
        &mut self,
        day: &DaySummary,
        coverage: &mut Coverage,
        today: NaiveDate,
    ) -> Result<(), SyncError> {
        self.store.upsert(day)?;

        if day.date < today {
            coverage.insert(day.date);
            self.store.save_coverage(coverage)?;
        } else {
            tracing::debug!(date = %day.date, "Stored in-progress day without covering it");
        }
        Ok(())
    }
}
