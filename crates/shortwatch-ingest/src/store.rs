//! The persistence seam used by the coordinator.

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shortwatch_core::{
    CanonicalPosition, EntityName, Isin, IssuerIdentity, JurisdictionCode, ManagerIdentity,
    RunAuditRecord,
};
use shortwatch_db::{issuers, managers, positions, run_audits, Database, JurisdictionTotals, StoredVerdict};

/// What an upsert did with a candidate position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No row matched; a new one was written
    Inserted,
    /// An exact match existed with a stale verdict, which was refreshed
    Updated,
    /// An exact match existed with the same verdict
    Skipped,
}

/// Storage operations the ingestion pipeline depends on.
#[async_trait]
pub trait PositionStore: Send + Sync {
    /// Latest stored disclosure date for a jurisdiction.
    async fn find_latest_date(&self, jurisdiction: &JurisdictionCode) -> Result<Option<NaiveDate>>;

    /// Stored row matching (jurisdiction, manager, issuer, date, size).
    async fn find_existing(
        &self,
        jurisdiction: &JurisdictionCode,
        manager_id: &str,
        issuer_id: &str,
        disclosure_date: NaiveDate,
        position_size: Decimal,
    ) -> Result<Option<StoredVerdict>>;

    /// Write a new position row.
    async fn insert_position(&self, position: &CanonicalPosition) -> Result<String>;

    /// Replace the activity verdict of an existing row.
    async fn update_verdict(&self, id: &str, position: &CanonicalPosition) -> Result<()>;

    /// Deduplicated manager for a normalized name.
    async fn get_or_create_manager(&self, name: &EntityName) -> Result<ManagerIdentity>;

    /// Deduplicated issuer for a normalized name and optional ISIN.
    async fn get_or_create_issuer(
        &self,
        name: &EntityName,
        isin: Option<&Isin>,
        jurisdiction: &JurisdictionCode,
    ) -> Result<IssuerIdentity>;

    /// Append one audit entry.
    async fn append_run_audit(&self, audit: &RunAuditRecord) -> Result<()>;

    /// Audits started at or after `since`, newest first.
    async fn recent_run_audits(&self, since: DateTime<Utc>) -> Result<Vec<RunAuditRecord>>;

    /// Per-jurisdiction position totals.
    async fn jurisdiction_totals(&self) -> Result<Vec<JurisdictionTotals>>;

    /// Skip an exact duplicate, refresh a stale verdict or insert.
    async fn upsert_position(&self, position: &CanonicalPosition) -> Result<UpsertOutcome> {
        let existing = self
            .find_existing(
                &position.jurisdiction,
                &position.manager_id,
                &position.issuer_id,
                position.disclosure_date,
                position.position_size,
            )
            .await?;

        match existing {
            None => {
                self.insert_position(position).await?;
                Ok(UpsertOutcome::Inserted)
            }
            Some(stored)
                if stored.is_active != position.is_active
                    || stored.transition != position.transition
                    || stored.was_active_at_row_time != position.was_active_at_row_time =>
            {
                self.update_verdict(&stored.id, position).await?;
                Ok(UpsertOutcome::Updated)
            }
            Some(_) => Ok(UpsertOutcome::Skipped),
        }
    }
}

#[async_trait]
impl PositionStore for Database {
    async fn find_latest_date(&self, jurisdiction: &JurisdictionCode) -> Result<Option<NaiveDate>> {
        Ok(positions::find_latest_date(self.pool(), jurisdiction).await?)
    }

    async fn find_existing(
        &self,
        jurisdiction: &JurisdictionCode,
        manager_id: &str,
        issuer_id: &str,
        disclosure_date: NaiveDate,
        position_size: Decimal,
    ) -> Result<Option<StoredVerdict>> {
        Ok(positions::find_existing(
            self.pool(),
            jurisdiction,
            manager_id,
            issuer_id,
            disclosure_date,
            position_size,
        )
        .await?)
    }

    async fn insert_position(&self, position: &CanonicalPosition) -> Result<String> {
        Ok(positions::insert_position(self.pool(), position).await?)
    }

    async fn update_verdict(&self, id: &str, position: &CanonicalPosition) -> Result<()> {
        Ok(positions::update_verdict(self.pool(), id, position).await?)
    }

    async fn get_or_create_manager(&self, name: &EntityName) -> Result<ManagerIdentity> {
        Ok(managers::get_or_create_manager(self.pool(), name).await?)
    }

    async fn get_or_create_issuer(
        &self,
        name: &EntityName,
        isin: Option<&Isin>,
        jurisdiction: &JurisdictionCode,
    ) -> Result<IssuerIdentity> {
        Ok(issuers::get_or_create_issuer(self.pool(), name, isin, jurisdiction).await?)
    }

    async fn append_run_audit(&self, audit: &RunAuditRecord) -> Result<()> {
        Ok(run_audits::append_run_audit(self.pool(), audit).await?)
    }

    async fn recent_run_audits(&self, since: DateTime<Utc>) -> Result<Vec<RunAuditRecord>> {
        Ok(run_audits::recent_run_audits(self.pool(), since).await?)
    }

    async fn jurisdiction_totals(&self) -> Result<Vec<JurisdictionTotals>> {
        Ok(positions::jurisdiction_totals(self.pool()).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use shortwatch_core::Transition;

    async fn setup() -> (Database, CanonicalPosition) {
        let db = Database::new(":memory:").await.unwrap();
        db.run_migrations().await.unwrap();
        let gb = JurisdictionCode::new("GB").unwrap();
        let manager = db
            .get_or_create_manager(&EntityName {
                display: "Acme Capital".to_string(),
                slug: "acme-capital".to_string(),
            })
            .await
            .unwrap();
        let issuer = db
            .get_or_create_issuer(
                &EntityName {
                    display: "Foo PLC".to_string(),
                    slug: "foo-plc".to_string(),
                },
                None,
                &gb,
            )
            .await
            .unwrap();
        let position = CanonicalPosition {
            id: None,
            jurisdiction: gb,
            manager_id: manager.id,
            issuer_id: issuer.id,
            isin: None,
            position_size: dec!(0.75),
            disclosure_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            is_active: true,
            was_active_at_row_time: None,
            transition: None,
            provenance: "sheet:current".to_string(),
            source_url: None,
        };
        (db, position)
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_skips() {
        let (db, position) = setup().await;

        assert_eq!(db.upsert_position(&position).await.unwrap(), UpsertOutcome::Inserted);
        assert_eq!(db.upsert_position(&position).await.unwrap(), UpsertOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_upsert_refreshes_stale_verdict() {
        let (db, mut position) = setup().await;
        db.upsert_position(&position).await.unwrap();

        position.is_active = false;
        position.transition = Some(Transition::Exited);

        assert_eq!(db.upsert_position(&position).await.unwrap(), UpsertOutcome::Updated);
        let totals = db.jurisdiction_totals().await.unwrap();
        assert_eq!(totals[0].total_positions, 1);
        assert_eq!(totals[0].active_positions, 0);
    }
}
