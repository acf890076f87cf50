//! Shortwatch Ingest - active-state resolution and incremental ingestion.
//!
//! # Modules
//!
//! - [`resolver`] - Per-jurisdiction activity rules and transition classification
//! - [`diff`] - Watermark and lookback selection
//! - [`store`] - The [`PositionStore`] seam and its `SQLite` implementation
//! - [`run_lock`] - Run-level mutual exclusion and cooperative cancellation
//! - [`summary`] - Run summaries and status snapshots
//! - [`coordinator`] - The [`IngestionCoordinator`] driving whole runs
//!
//! # Example
//!
//! ```ignore
//! use shortwatch_ingest::IngestionCoordinator;
//! use shortwatch_sources::{HttpClient, SourceContext, SourceRegistry};
//!
//! let db = shortwatch_db::Database::open(path, &config.database).await?;
//! let ctx = SourceContext::new(HttpClient::new(&config.http)?);
//! let coordinator = IngestionCoordinator::new(SourceRegistry::with_default_sources(), Arc::new(db), ctx);
//! let summary = coordinator.run_all().await?;
//! println!("added {} positions", summary.total_added());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod coordinator;
pub mod diff;
pub mod error;
pub mod resolver;
pub mod run_lock;
pub mod store;
pub mod summary;

// Re-export commonly used types
pub use coordinator::{IngestionCoordinator, IngestionSettings, Stage};
pub use error::{IngestError, Result};
pub use run_lock::{CancelHandle, RunGuard, RunLock};
pub use store::{PositionStore, UpsertOutcome};
pub use summary::{IngestionStatus, JurisdictionOutcome, RunSummary};
