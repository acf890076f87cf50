//! Error types for ingestion runs.

use shortwatch_db::DatabaseError;
use shortwatch_sources::SourceError;
use thiserror::Error;

/// Errors raised by the coordinator and the position store.
#[derive(Error, Debug)]
pub enum IngestError {
    /// A run is already holding the run lock
    #[error("an ingestion run is already in progress")]
    AlreadyRunning,

    /// The jurisdiction has no registered adapter
    #[error("unsupported jurisdiction: {0}")]
    UnsupportedJurisdiction(String),

    /// Locating or fetching failed
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Every located resource failed
    #[error("every resource failed: {0}")]
    ResourcesFailed(String),

    /// The position store failed
    #[error("persistence failed: {0}")]
    Database(#[from] DatabaseError),

    /// The run was cancelled between steps
    #[error("cancelled")]
    Cancelled,
}

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, IngestError>;
