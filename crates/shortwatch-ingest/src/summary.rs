//! Run summaries and status reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shortwatch_core::{RunAuditRecord, RunStatus};
use shortwatch_db::JurisdictionTotals;

/// Result of one jurisdiction within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionOutcome {
    /// Jurisdiction code
    pub jurisdiction: String,
    /// Final state
    pub status: RunStatus,
    /// Candidates left after diffing
    pub records_found: usize,
    /// Rows inserted
    pub records_added: usize,
    /// Exact duplicates skipped
    pub records_skipped: usize,
    /// Stale verdicts refreshed
    pub records_updated: usize,
    /// Rows dropped by extraction rules or validation
    pub records_rejected: usize,
    /// Failed resources, layout problems or the fatal error
    pub error: Option<String>,
    /// Wall-clock time spent on this jurisdiction
    pub duration_ms: u64,
}

impl JurisdictionOutcome {
    /// A zeroed outcome, to be filled while processing.
    #[must_use]
    pub fn new(jurisdiction: impl Into<String>) -> Self {
        Self {
            jurisdiction: jurisdiction.into(),
            status: RunStatus::Success,
            records_found: 0,
            records_added: 0,
            records_skipped: 0,
            records_updated: 0,
            records_rejected: 0,
            error: None,
            duration_ms: 0,
        }
    }

    /// A failed outcome with nothing processed.
    #[must_use]
    pub fn failed(jurisdiction: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            status: RunStatus::Error,
            error: Some(error.into()),
            ..Self::new(jurisdiction)
        }
    }
}

/// Aggregate of one coordinator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Identifier shared with the run's audit records
    pub run_id: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub completed_at: DateTime<Utc>,
    /// Total wall-clock time
    pub duration_ms: u64,
    /// One entry per requested jurisdiction, in processing order
    pub outcomes: Vec<JurisdictionOutcome>,
}

impl RunSummary {
    /// Sum of candidates across jurisdictions.
    #[must_use]
    pub fn total_found(&self) -> usize {
        self.outcomes.iter().map(|o| o.records_found).sum()
    }

    /// Sum of inserted rows across jurisdictions.
    #[must_use]
    pub fn total_added(&self) -> usize {
        self.outcomes.iter().map(|o| o.records_added).sum()
    }

    /// Sum of skipped duplicates across jurisdictions.
    #[must_use]
    pub fn total_skipped(&self) -> usize {
        self.outcomes.iter().map(|o| o.records_skipped).sum()
    }

    /// Jurisdictions that failed outright.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.count(RunStatus::Error)
    }

    /// Jurisdictions that finished with `status`.
    #[must_use]
    pub fn count(&self, status: RunStatus) -> usize {
        self.outcomes.iter().filter(|o| o.status == status).count()
    }

    /// Outcome for one jurisdiction code.
    #[must_use]
    pub fn outcome(&self, jurisdiction: &str) -> Option<&JurisdictionOutcome> {
        self.outcomes.iter().find(|o| o.jurisdiction == jurisdiction)
    }
}

/// Snapshot returned by `status()`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionStatus {
    /// Whether a run holds the run lock
    pub in_progress: bool,
    /// Audits of the last seven days, newest first
    pub recent_runs: Vec<RunAuditRecord>,
    /// Stored position counts per jurisdiction
    pub totals: Vec<JurisdictionTotals>,
}
