//! Incremental ingestion coordinator.
//!
//! Jurisdictions are processed one after another. Each moves through
//! fetching, extracting, resolving, diffing and persisting, and ends as
//! success, partial or error. A failure only affects its own jurisdiction;
//! the run summary is always returned.

use crate::diff::{cutoff, select_candidates};
use crate::error::{IngestError, Result};
use crate::resolver::resolve;
use crate::run_lock::{CancelHandle, RunLock};
use crate::store::{PositionStore, UpsertOutcome};
use crate::summary::{IngestionStatus, JurisdictionOutcome, RunSummary};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use shortwatch_core::{
    validate_record, AppConfig, CanonicalPosition, JurisdictionCode, RawExtractedRecord,
    ResolvedRecord, RunAuditRecord, RunStatus, ValidationOptions,
};
use shortwatch_sources::{SourceAdapter, SourceContext, SourceRegistry};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// How far back `status()` reports audits.
const STATUS_WINDOW_DAYS: i64 = 7;

/// Processing step of one jurisdiction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Locating and downloading resources
    Fetching,
    /// Turning payloads into raw records
    Extracting,
    /// Validating and deciding activity
    Resolving,
    /// Applying the watermark
    Diffing,
    /// Writing to the store
    Persisting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::Extracting => "extracting",
            Self::Resolving => "resolving",
            Self::Diffing => "diffing",
            Self::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// Tunables taken from the `[ingestion]` and `[general]` config sections.
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    /// Days before the watermark still reconsidered
    pub lookback_days: u32,
    /// Positions written between progress logs
    pub batch_size: usize,
    /// Title-case names before deriving identities
    pub title_case: bool,
    /// Jurisdictions processed by `run_all`; empty means every registered one
    pub jurisdictions: Vec<JurisdictionCode>,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            batch_size: 100,
            title_case: true,
            jurisdictions: Vec::new(),
        }
    }
}

impl IngestionSettings {
    /// Settings from the application config. Invalid codes are skipped
    /// with a warning.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let jurisdictions = config
            .ingestion
            .jurisdictions
            .iter()
            .filter_map(|code| match JurisdictionCode::new(code) {
                Ok(code) => Some(code),
                Err(e) => {
                    tracing::warn!("Ignoring configured jurisdiction: {}", e);
                    None
                }
            })
            .collect();
        Self {
            lookback_days: config.ingestion.lookback_days,
            batch_size: config.ingestion.batch_size.max(1),
            title_case: config.general.title_case_names,
            jurisdictions,
        }
    }
}

/// Drives adapters, the resolver and the store for whole runs.
pub struct IngestionCoordinator {
    registry: SourceRegistry,
    store: Arc<dyn PositionStore>,
    ctx: SourceContext,
    settings: IngestionSettings,
    lock: RunLock,
    cancel: CancelHandle,
}

impl IngestionCoordinator {
    /// Create a coordinator with default settings.
    #[must_use]
    pub fn new(registry: SourceRegistry, store: Arc<dyn PositionStore>, ctx: SourceContext) -> Self {
        Self {
            registry,
            store,
            ctx,
            settings: IngestionSettings::default(),
            lock: RunLock::new(),
            cancel: CancelHandle::default(),
        }
    }

    /// Replace the settings.
    #[must_use]
    pub fn with_settings(mut self, settings: IngestionSettings) -> Self {
        self.settings = settings;
        self
    }

    /// The run lock, shared with anything that needs to observe it.
    #[must_use]
    pub fn run_lock(&self) -> &RunLock {
        &self.lock
    }

    /// Handle that cancels the current run at the next step boundary.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Request cancellation of the current run.
    pub fn cancel(&self) {
        tracing::info!("Cancellation requested");
        self.cancel.cancel();
    }

    /// Codes with a registered adapter, sorted.
    #[must_use]
    pub fn list_supported(&self) -> Vec<JurisdictionCode> {
        self.registry.codes()
    }

    /// Whether `code` has a registered adapter. Malformed codes are not.
    #[must_use]
    pub fn is_supported(&self, code: &str) -> bool {
        JurisdictionCode::new(code).is_ok_and(|code| self.registry.contains(&code))
    }

    /// Run every configured jurisdiction, or every registered one.
    pub async fn run_all(&self) -> Result<RunSummary> {
        let codes = if self.settings.jurisdictions.is_empty() {
            self.registry.codes()
        } else {
            self.settings.jurisdictions.clone()
        };
        self.run_for(&codes).await
    }

    /// Run the given jurisdictions in order.
    ///
    /// Fails only when another run holds the lock; per-jurisdiction
    /// failures are reported in the summary.
    pub async fn run_for(&self, codes: &[JurisdictionCode]) -> Result<RunSummary> {
        let _guard = self.lock.try_acquire()?;
        self.cancel.reset();

        let run_id = uuid::Uuid::new_v4().to_string();
        let started_at = Utc::now();
        let timer = Instant::now();
        tracing::info!(run_id = %run_id, jurisdictions = codes.len(), "Starting ingestion run");

        let mut outcomes = Vec::with_capacity(codes.len());
        for code in codes {
            let jurisdiction_start = Utc::now();
            let outcome = if self.cancel.is_cancelled() {
                JurisdictionOutcome::failed(code.as_str(), IngestError::Cancelled.to_string())
            } else if let Some(adapter) = self.registry.get(code) {
                let span = tracing::info_span!("jurisdiction", code = %code);
                self.process(adapter.as_ref()).instrument(span).await
            } else {
                tracing::error!(jurisdiction = %code, "No adapter registered");
                JurisdictionOutcome::failed(
                    code.as_str(),
                    IngestError::UnsupportedJurisdiction(code.to_string()).to_string(),
                )
            };

            self.record_audit(&run_id, code, &outcome, jurisdiction_start).await;
            outcomes.push(outcome);
        }

        let summary = RunSummary {
            run_id,
            started_at,
            completed_at: Utc::now(),
            duration_ms: elapsed_ms(timer),
            outcomes,
        };
        tracing::info!(
            run_id = %summary.run_id,
            found = summary.total_found(),
            added = summary.total_added(),
            skipped = summary.total_skipped(),
            errors = summary.error_count(),
            duration_ms = summary.duration_ms,
            "Ingestion run finished"
        );
        Ok(summary)
    }

    /// Lock state, recent audits and per-jurisdiction totals.
    pub async fn status(&self) -> Result<IngestionStatus> {
        let since = Utc::now() - Duration::days(STATUS_WINDOW_DAYS);
        Ok(IngestionStatus {
            in_progress: self.lock.is_held(),
            recent_runs: self.store.recent_run_audits(since).await?,
            totals: self.store.jurisdiction_totals().await?,
        })
    }

    async fn record_audit(
        &self,
        run_id: &str,
        code: &JurisdictionCode,
        outcome: &JurisdictionOutcome,
        started_at: DateTime<Utc>,
    ) {
        let audit = RunAuditRecord {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            jurisdiction: code.clone(),
            status: outcome.status,
            records_found: to_i64(outcome.records_found),
            records_added: to_i64(outcome.records_added),
            records_skipped: to_i64(outcome.records_skipped),
            records_updated: to_i64(outcome.records_updated),
            error_message: outcome.error.clone(),
            started_at,
            completed_at: Some(Utc::now()),
        };
        if let Err(e) = self.store.append_run_audit(&audit).await {
            tracing::error!(jurisdiction = %code, "Failed to record run audit: {}", e);
        }
    }

    async fn process(&self, adapter: &dyn SourceAdapter) -> JurisdictionOutcome {
        let code = adapter.code().clone();
        let timer = Instant::now();
        let mut outcome = JurisdictionOutcome::new(code.as_str());
        let mut problems = Vec::new();

        match self.ingest(adapter, &mut outcome, &mut problems).await {
            Ok(()) if problems.is_empty() => {
                outcome.status = RunStatus::Success;
            }
            Ok(()) => {
                outcome.status = RunStatus::Partial;
                let detail = problems.join("; ");
                tracing::warn!(jurisdiction = %code, "Partially failed: {}", detail);
                outcome.error = Some(detail);
            }
            Err(e) => {
                outcome.status = RunStatus::Error;
                tracing::error!(jurisdiction = %code, "Ingestion failed: {}", e);
                problems.insert(0, e.to_string());
                outcome.error = Some(problems.join("; "));
            }
        }

        outcome.duration_ms = elapsed_ms(timer);
        tracing::info!(
            jurisdiction = %code,
            status = %outcome.status,
            found = outcome.records_found,
            added = outcome.records_added,
            skipped = outcome.records_skipped,
            updated = outcome.records_updated,
            rejected = outcome.records_rejected,
            "Jurisdiction processed"
        );
        outcome
    }

    fn checkpoint(&self, stage: Stage) -> Result<()> {
        if self.cancel.is_cancelled() {
            tracing::info!(stage = %stage, "Stopping at step boundary");
            return Err(IngestError::Cancelled);
        }
        tracing::debug!(stage = %stage, "Entering stage");
        Ok(())
    }

    async fn ingest(
        &self,
        adapter: &dyn SourceAdapter,
        outcome: &mut JurisdictionOutcome,
        problems: &mut Vec<String>,
    ) -> Result<()> {
        self.checkpoint(Stage::Fetching)?;
        let raw = self.fetch_and_extract(adapter, outcome, problems).await?;

        self.checkpoint(Stage::Resolving)?;
        let resolved = self.validate_and_resolve(adapter, raw, outcome);

        self.checkpoint(Stage::Diffing)?;
        let watermark = self.store.find_latest_date(adapter.code()).await?;
        let (candidates, excluded) =
            select_candidates(resolved, cutoff(watermark, self.settings.lookback_days));
        tracing::debug!(
            watermark = ?watermark,
            candidates = candidates.len(),
            excluded,
            "Applied watermark"
        );
        outcome.records_found = candidates.len();

        self.checkpoint(Stage::Persisting)?;
        self.persist(candidates, outcome).await
    }

    async fn fetch_and_extract(
        &self,
        adapter: &dyn SourceAdapter,
        outcome: &mut JurisdictionOutcome,
        problems: &mut Vec<String>,
    ) -> Result<Vec<RawExtractedRecord>> {
        let resources = adapter.locate(&self.ctx).await?;
        if resources.is_empty() {
            return Err(IngestError::ResourcesFailed("no resources located".to_string()));
        }

        let mut records = Vec::new();
        let mut fetched = 0usize;
        for resource in &resources {
            self.checkpoint(Stage::Fetching)?;
            let payload = match adapter.fetch(&self.ctx, resource).await {
                Ok(payload) => payload,
                Err(e) => {
                    tracing::warn!(resource = %resource.label, url = %resource.url, "Fetch failed: {}", e);
                    problems.push(format!("{}: {}", resource.label, e));
                    continue;
                }
            };
            fetched += 1;

            self.checkpoint(Stage::Extracting)?;
            let extraction = adapter.extract(resource, &payload);
            for issue in &extraction.layout_issues {
                tracing::warn!(resource = %resource.label, "Layout problem: {}", issue);
                problems.push(format!("{}: {}", resource.label, issue));
            }
            outcome.records_rejected += extraction.dropped;
            tracing::debug!(
                resource = %resource.label,
                records = extraction.records.len(),
                dropped = extraction.dropped,
                "Extracted resource"
            );
            records.extend(extraction.records);
        }

        if fetched == 0 {
            return Err(IngestError::ResourcesFailed(problems.drain(..).collect::<Vec<_>>().join("; ")));
        }
        Ok(records)
    }

    fn validate_and_resolve(
        &self,
        adapter: &dyn SourceAdapter,
        raw: Vec<RawExtractedRecord>,
        outcome: &mut JurisdictionOutcome,
    ) -> Vec<ResolvedRecord> {
        let profile = adapter.profile();
        let options = ValidationOptions {
            date_order: profile.date_order,
            scale: profile.scale,
            title_case: self.settings.title_case,
        };
        let today = Utc::now().date_naive();

        let mut normalized = Vec::with_capacity(raw.len());
        for record in &raw {
            match validate_record(record, &options, today) {
                Ok(record) => normalized.push(record),
                Err(reason) => {
                    tracing::debug!(
                        manager = ?record.manager_name,
                        issuer = ?record.company_name,
                        "Dropped record: {}",
                        reason
                    );
                    outcome.records_rejected += 1;
                }
            }
        }

        let resolved = resolve(normalized, &profile.activity_rule, today);
        tracing::debug!(
            records = resolved.len(),
            active = resolved.iter().filter(|r| r.is_active).count(),
            "Resolved activity"
        );
        resolved
    }

    async fn persist(&self, candidates: Vec<ResolvedRecord>, outcome: &mut JurisdictionOutcome) -> Result<()> {
        let mut positions = Vec::with_capacity(candidates.len());
        for resolved in &candidates {
            positions.push(self.to_position(resolved).await?);
        }

        let (positions, folded) = collapse_duplicates(positions);
        if folded > 0 {
            tracing::debug!(folded, "Folded repeated rows");
            outcome.records_skipped += folded;
        }

        let total = positions.len();
        let mut written = 0usize;
        for batch in positions.chunks(self.settings.batch_size.max(1)) {
            for position in batch {
                match self.store.upsert_position(position).await? {
                    UpsertOutcome::Inserted => outcome.records_added += 1,
                    UpsertOutcome::Updated => outcome.records_updated += 1,
                    UpsertOutcome::Skipped => outcome.records_skipped += 1,
                }
            }
            written += batch.len();
            tracing::debug!(written, total, "Persisted batch");
        }
        Ok(())
    }

    async fn to_position(&self, resolved: &ResolvedRecord) -> Result<CanonicalPosition> {
        let record = &resolved.record;
        let manager = self.store.get_or_create_manager(&record.manager).await?;
        let issuer = self
            .store
            .get_or_create_issuer(&record.issuer, record.isin.as_ref(), &record.jurisdiction)
            .await?;

        Ok(CanonicalPosition {
            id: None,
            jurisdiction: record.jurisdiction.clone(),
            manager_id: manager.id,
            issuer_id: issuer.id,
            isin: record.isin.as_ref().map(|isin| isin.as_str().to_string()),
            position_size: record.position_size,
            disclosure_date: record.disclosure_date,
            is_active: resolved.is_active,
            was_active_at_row_time: resolved.was_active_at_row_time,
            transition: resolved.transition,
            provenance: record.provenance.label.clone(),
            source_url: record.source_url.clone(),
        })
    }
}

impl fmt::Debug for IngestionCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionCoordinator")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("in_progress", &self.lock.is_held())
            .finish_non_exhaustive()
    }
}

type DedupKey = (String, String, NaiveDate, Decimal);

/// Fold positions repeating the same manager, issuer, date and size into
/// one row, so a feed listing a disclosure twice cannot overwrite its own
/// verdict. The active copy wins, then the copy carrying a transition, then
/// the first seen. Returns the kept rows in first-seen order and the number
/// folded away.
fn collapse_duplicates(positions: Vec<CanonicalPosition>) -> (Vec<CanonicalPosition>, usize) {
    let mut kept: Vec<CanonicalPosition> = Vec::with_capacity(positions.len());
    let mut slots: HashMap<DedupKey, usize> = HashMap::new();
    let mut folded = 0;

    for position in positions {
        let key = (
            position.manager_id.clone(),
            position.issuer_id.clone(),
            position.disclosure_date,
            position.position_size.normalize(),
        );
        match slots.get(&key) {
            Some(&slot) => {
                folded += 1;
                if verdict_rank(&position) > verdict_rank(&kept[slot]) {
                    kept[slot] = position;
                }
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(position);
            }
        }
    }
    (kept, folded)
}

fn verdict_rank(position: &CanonicalPosition) -> (bool, bool) {
    (position.is_active, position.transition.is_some())
}

fn elapsed_ms(timer: Instant) -> u64 {
    u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn to_i64(count: usize) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}
