//! Plain-text rendering of summaries and status.

use shortwatch_core::CapabilityRegistry;
use shortwatch_ingest::{IngestionStatus, RunSummary};
use shortwatch_sources::SourceRegistry;
use std::fmt::Write;

pub fn summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "run {} ({} ms)", summary.run_id, summary.duration_ms);
    let _ = writeln!(
        out,
        "{:<4} {:<8} {:>7} {:>7} {:>7} {:>7} {:>8}  error",
        "code", "status", "found", "added", "skipped", "updated", "rejected"
    );
    for o in &summary.outcomes {
        let _ = writeln!(
            out,
            "{:<4} {:<8} {:>7} {:>7} {:>7} {:>7} {:>8}  {}",
            o.jurisdiction,
            o.status.as_str(),
            o.records_found,
            o.records_added,
            o.records_skipped,
            o.records_updated,
            o.records_rejected,
            o.error.as_deref().unwrap_or("")
        );
    }
    let _ = writeln!(
        out,
        "total: found {}, added {}, skipped {}, errors {}",
        summary.total_found(),
        summary.total_added(),
        summary.total_skipped(),
        summary.error_count()
    );
    out
}

pub fn status(status: &IngestionStatus) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "in progress: {}", status.in_progress);

    let _ = writeln!(out, "\npositions:");
    for totals in &status.totals {
        let latest = totals
            .latest_disclosure_date
            .map_or_else(|| "-".to_string(), |d| d.to_string());
        let _ = writeln!(
            out,
            "  {:<4} total {:>7}  active {:>6}  latest {}",
            totals.jurisdiction, totals.total_positions, totals.active_positions, latest
        );
    }

    let _ = writeln!(out, "\nruns (last 7 days):");
    for audit in &status.recent_runs {
        let _ = writeln!(
            out,
            "  {}  {:<4} {:<8} found {:>6}  added {:>6}  {}",
            audit.started_at.format("%Y-%m-%d %H:%M"),
            audit.jurisdiction.as_str(),
            audit.status.as_str(),
            audit.records_found,
            audit.records_added,
            audit.error_message.as_deref().unwrap_or("")
        );
    }
    out
}

pub fn sources(registry: &SourceRegistry, capabilities: &CapabilityRegistry) -> String {
    let available = registry.available(capabilities);
    let mut out = String::new();
    for profile in registry.profiles() {
        let marker = if available.contains(&profile.code) { "" } else { "  (unavailable)" };
        let _ = writeln!(
            out,
            "{:<4} {:<16} {:<22} {}{}",
            profile.code.as_str(),
            profile.name,
            profile.regulator,
            profile.transport,
            marker
        );
    }
    out
}
