//! Error types for fitpoints

use chrono::NaiveDate;
use thiserror::Error;

/// Errors surfaced by the sync-and-score engine
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid day record for {date}: {reason}")]
    Validation { date: NaiveDate, reason: String },

    #[error("Remote fetch failed: {0}")]
    Transport(String),

    #[error("Session invalid or expired: {0}")]
    Auth(String),

    #[error("Local store failure: {0}")]
    Persistence(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid calendar month: {year}-{month}")]
    InvalidMonth { year: i32, month: u32 },

    #[error("Scoring failed: {0}")]
    Score(#[from] ScoreError),
}

impl SyncError {
    /// Whether this error must abort a whole sync run
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Auth(_) | SyncError::Persistence(_))
    }
}

impl From<rusqlite::Error> for SyncError {
    fn from(e: rusqlite::Error) -> Self {
        SyncError::Persistence(e.to_string())
    }
}

impl From<FetchError> for SyncError {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Auth(msg) => SyncError::Auth(msg),
            FetchError::Transport(msg) => SyncError::Transport(msg),
        }
    }
}

/// Failure reported by a session provider when fetching one day
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Raised by the scoring engine for inputs that were never validated
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoreError {
    #[error("Validation error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SyncError::Auth("expired".into()).is_fatal());
        assert!(SyncError::Persistence("disk full".into()).is_fatal());
        assert!(!SyncError::Transport("timeout".into()).is_fatal());
        assert!(!SyncError::Validation {
            date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            reason: "bad".into(),
        }
        .is_fatal());
    }

    #[test]
    fn test_fetch_error_conversion() {
        let err: SyncError = FetchError::Auth("token revoked".into()).into();
        assert!(matches!(err, SyncError::Auth(ref m) if m == "token revoked"));

        let err: SyncError = FetchError::Transport("503".into()).into();
        assert!(matches!(err, SyncError::Transport(_)));
    }
}
