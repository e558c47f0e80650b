//! fitpoints - Sync-and-score engine for fitness tracker history
//!
//! fitpoints pulls a user's activity history from a remote account, reconciles
//! it into a local store and turns each day into activity points through a
//! deterministic pipeline: session provider → normalization → local store →
//! scoring → weekly/monthly aggregation.
//!
//! ## Modules
//!
//! - **Sync**: idempotent, resumable reconciliation of remote days
//! - **Scoring**: step tiers and heart-rate weighted activity points
//! - **Aggregation**: zero-filled week summaries and month grids

pub mod adapters;
pub mod aggregate;
pub mod config;
pub mod coverage;
pub mod error;
pub mod normalizer;
pub mod scoring;
pub mod store;
pub mod sync;
pub mod types;

pub use adapters::{GarminExportProvider, SessionProvider};
pub use aggregate::{week_containing, Aggregator, MonthGrid, WeekSummary};
pub use config::Config;
pub use coverage::Coverage;
pub use error::{FetchError, ScoreError, SyncError};
pub use normalizer::Normalizer;
pub use scoring::score;
pub use store::LocalStore;
pub use sync::{Reconciler, RunSummary, SyncRequest};
pub use types::{ActivityRecord, ActivityType, DateRange, DaySummary, PointBreakdown, RawDay};

/// fitpoints version
pub const FITPOINTS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "fitpoints";
