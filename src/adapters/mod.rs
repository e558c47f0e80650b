//! Session providers
//!
//! A session provider hands the reconciler one raw remote day at a time. The
//! authenticated HTTP client lives outside this crate; anything that can
//! produce Garmin-shaped day payloads can implement `SessionProvider`.

mod garmin;

pub use garmin::GarminExportProvider;

use crate::error::FetchError;
use crate::types::RawDay;
use chrono::NaiveDate;

/// Source of raw remote days
pub trait SessionProvider {
    /// Fetch the raw data for one calendar date.
    ///
    /// `FetchError::Auth` aborts the sync run; `FetchError::Transport` is
    /// retried and then skipped.
    fn fetch_day(&mut self, date: NaiveDate) -> Result<RawDay, FetchError>;
}

impl<P: SessionProvider + ?Sized> SessionProvider for &mut P {
    fn fetch_day(&mut self, date: NaiveDate) -> Result<RawDay, FetchError> {
        (**self).fetch_day(date)
    }
}
