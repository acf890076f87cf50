//! Append-only audit trail of ingestion runs.

use crate::error::{DatabaseError, Result};
use chrono::{DateTime, Utc};
use shortwatch_core::{JurisdictionCode, RunAuditRecord, RunStatus};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| DatabaseError::decode(column, e))
}

fn from_row(row: &SqliteRow) -> Result<RunAuditRecord> {
    let jurisdiction: String = row.try_get("jurisdiction")?;
    let status: String = row.try_get("status")?;
    let started_at: String = row.try_get("started_at")?;
    let completed_at: Option<String> = row.try_get("completed_at")?;

    Ok(RunAuditRecord {
        id: row.try_get("id")?,
        run_id: row.try_get("run_id")?,
        jurisdiction: JurisdictionCode::new(&jurisdiction)
            .map_err(|e| DatabaseError::decode("jurisdiction", e))?,
        status: RunStatus::from_str(&status).map_err(|e| DatabaseError::decode("status", e))?,
        records_found: row.try_get("records_found")?,
        records_added: row.try_get("records_added")?,
        records_skipped: row.try_get("records_skipped")?,
        records_updated: row.try_get("records_updated")?,
        error_message: row.try_get("error_message")?,
        started_at: parse_timestamp("started_at", &started_at)?,
        completed_at: completed_at
            .map(|ts| parse_timestamp("completed_at", &ts))
            .transpose()?,
    })
}

/// Append one audit entry.
pub async fn append_run_audit(pool: &SqlitePool, audit: &RunAuditRecord) -> Result<()> {
    sqlx::query(
        "INSERT INTO run_audits (id, run_id, jurisdiction, status, records_found, records_added,
             records_skipped, records_updated, error_message, started_at, completed_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&audit.id)
    .bind(&audit.run_id)
    .bind(audit.jurisdiction.as_str())
    .bind(audit.status.as_str())
    .bind(audit.records_found)
    .bind(audit.records_added)
    .bind(audit.records_skipped)
    .bind(audit.records_updated)
    .bind(&audit.error_message)
    .bind(audit.started_at.to_rfc3339())
    .bind(audit.completed_at.map(|ts| ts.to_rfc3339()))
    .execute(pool)
    .await?;

    tracing::debug!(
        run_id = %audit.run_id,
        jurisdiction = %audit.jurisdiction,
        status = %audit.status,
        "Recorded run audit"
    );
    Ok(())
}

/// Audits started at or after `since`, newest first.
pub async fn recent_run_audits(pool: &SqlitePool, since: DateTime<Utc>) -> Result<Vec<RunAuditRecord>> {
    let rows = sqlx::query(
        "SELECT id, run_id, jurisdiction, status, records_found, records_added, records_skipped,
                records_updated, error_message, started_at, completed_at
         FROM run_audits WHERE started_at >= ?
         ORDER BY started_at DESC",
    )
    .bind(since.to_rfc3339())
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Every audit of one run, in insertion order.
pub async fn run_audits_for(pool: &SqlitePool, run_id: &str) -> Result<Vec<RunAuditRecord>> {
    let rows = sqlx::query(
        "SELECT id, run_id, jurisdiction, status, records_found, records_added, records_skipped,
                records_updated, error_message, started_at, completed_at
         FROM run_audits WHERE run_id = ? ORDER BY rowid",
    )
    .bind(run_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use chrono::Duration;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        db
    }

    fn audit(run_id: &str, code: &str, status: RunStatus, started_at: DateTime<Utc>) -> RunAuditRecord {
        RunAuditRecord {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.to_string(),
            jurisdiction: JurisdictionCode::new(code).unwrap(),
            status,
            records_found: 10,
            records_added: 4,
            records_skipped: 6,
            records_updated: 0,
            error_message: (status != RunStatus::Success).then(|| "historical: timed out".to_string()),
            started_at,
            completed_at: Some(started_at + Duration::seconds(3)),
        }
    }

    #[tokio::test]
    async fn test_append_and_read_back() {
        let db = setup_test_db().await;
        let now = Utc::now();

        append_run_audit(db.pool(), &audit("run-1", "BE", RunStatus::Partial, now))
            .await
            .unwrap();
        append_run_audit(db.pool(), &audit("run-1", "GB", RunStatus::Success, now))
            .await
            .unwrap();

        let audits = run_audits_for(db.pool(), "run-1").await.unwrap();
        assert_eq!(audits.len(), 2);
        assert_eq!(audits[0].status, RunStatus::Partial);
        assert_eq!(audits[0].error_message.as_deref(), Some("historical: timed out"));
        assert_eq!(audits[1].jurisdiction.as_str(), "GB");
    }

    #[tokio::test]
    async fn test_recent_excludes_old_runs() {
        let db = setup_test_db().await;
        let now = Utc::now();

        append_run_audit(db.pool(), &audit("old", "FR", RunStatus::Error, now - Duration::days(10)))
            .await
            .unwrap();
        append_run_audit(db.pool(), &audit("new", "FR", RunStatus::Success, now - Duration::hours(1)))
            .await
            .unwrap();
        append_run_audit(db.pool(), &audit("newest", "DE", RunStatus::Success, now))
            .await
            .unwrap();

        let recent = recent_run_audits(db.pool(), now - Duration::days(7)).await.unwrap();

        let runs: Vec<_> = recent.iter().map(|a| a.run_id.as_str()).collect();
        assert_eq!(runs, vec!["newest", "new"]);
    }
}
