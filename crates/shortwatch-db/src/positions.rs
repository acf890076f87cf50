//! Persisted short positions.
//!
//! Sizes are stored as normalized decimal text so that the exact-match
//! dedup compares `0.50` and `0.5` as equal.

use crate::error::{DatabaseError, Result};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shortwatch_core::{CanonicalPosition, JurisdictionCode, Transition};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use std::str::FromStr;

/// Activity verdict of a stored row, as found by the dedup lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredVerdict {
    /// Row identifier
    pub id: String,
    /// Stored activity flag
    pub is_active: bool,
    /// Stored threshold status at disclosure time
    pub was_active_at_row_time: Option<bool>,
    /// Stored transition
    pub transition: Option<Transition>,
}

/// Position counts for one jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JurisdictionTotals {
    /// Jurisdiction code
    pub jurisdiction: String,
    /// Every stored row
    pub total_positions: i64,
    /// Rows currently flagged active
    pub active_positions: i64,
    /// Watermark
    pub latest_disclosure_date: Option<NaiveDate>,
}

fn size_text(size: Decimal) -> String {
    size.normalize().to_string()
}

fn parse_date(column: &'static str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|e| DatabaseError::decode(column, e))
}

fn parse_transition(value: Option<String>) -> Result<Option<Transition>> {
    value
        .map(|text| Transition::from_str(&text).map_err(|e| DatabaseError::decode("transition", e)))
        .transpose()
}

fn from_row(row: &SqliteRow) -> Result<CanonicalPosition> {
    let jurisdiction: String = row.try_get("jurisdiction")?;
    let size: String = row.try_get("position_size")?;
    let date: String = row.try_get("disclosure_date")?;
    Ok(CanonicalPosition {
        id: Some(row.try_get("id")?),
        jurisdiction: JurisdictionCode::new(&jurisdiction)
            .map_err(|e| DatabaseError::decode("jurisdiction", e))?,
        manager_id: row.try_get("manager_id")?,
        issuer_id: row.try_get("issuer_id")?,
        isin: row.try_get("isin")?,
        position_size: Decimal::from_str(&size)
            .map_err(|e| DatabaseError::decode("position_size", e))?,
        disclosure_date: parse_date("disclosure_date", &date)?,
        is_active: row.try_get("is_active")?,
        was_active_at_row_time: row.try_get("was_active_at_row_time")?,
        transition: parse_transition(row.try_get("transition")?)?,
        provenance: row.try_get("provenance")?,
        source_url: row.try_get("source_url")?,
    })
}

/// Latest stored disclosure date for `jurisdiction`, if any row exists.
pub async fn find_latest_date(
    pool: &SqlitePool,
    jurisdiction: &JurisdictionCode,
) -> Result<Option<NaiveDate>> {
    let latest: Option<String> =
        sqlx::query_scalar("SELECT MAX(disclosure_date) FROM positions WHERE jurisdiction = ?")
            .bind(jurisdiction.as_str())
            .fetch_one(pool)
            .await?;
    latest
        .map(|date| parse_date("disclosure_date", &date))
        .transpose()
}

/// Stored row matching the exact dedup key, if any.
pub async fn find_existing(
    pool: &SqlitePool,
    jurisdiction: &JurisdictionCode,
    manager_id: &str,
    issuer_id: &str,
    disclosure_date: NaiveDate,
    position_size: Decimal,
) -> Result<Option<StoredVerdict>> {
    let row = sqlx::query(
        "SELECT id, is_active, was_active_at_row_time, transition FROM positions
         WHERE jurisdiction = ? AND manager_id = ? AND issuer_id = ?
           AND disclosure_date = ? AND position_size = ?
         LIMIT 1",
    )
    .bind(jurisdiction.as_str())
    .bind(manager_id)
    .bind(issuer_id)
    .bind(disclosure_date.to_string())
    .bind(size_text(position_size))
    .fetch_optional(pool)
    .await?;

    row.map(|row| {
        Ok(StoredVerdict {
            id: row.try_get("id")?,
            is_active: row.try_get("is_active")?,
            was_active_at_row_time: row.try_get("was_active_at_row_time")?,
            transition: parse_transition(row.try_get("transition")?)?,
        })
    })
    .transpose()
}

/// Clear the active flag of other rows of the same key.
///
/// An active row supersedes every other row of its key; an inactive one
/// only supersedes rows disclosed before it.
async fn deactivate_superseded(
    tx: &mut Transaction<'_, Sqlite>,
    position: &CanonicalPosition,
    keep_id: &str,
    now: &str,
) -> Result<u64> {
    let before = if position.is_active {
        None
    } else {
        Some(position.disclosure_date.to_string())
    };
    let result = sqlx::query(
        "UPDATE positions SET is_active = 0, updated_at = ?
         WHERE jurisdiction = ? AND manager_id = ? AND issuer_id = ?
           AND is_active = 1 AND id != ?
           AND (? IS NULL OR disclosure_date < ?)",
    )
    .bind(now)
    .bind(position.jurisdiction.as_str())
    .bind(&position.manager_id)
    .bind(&position.issuer_id)
    .bind(keep_id)
    .bind(&before)
    .bind(&before)
    .execute(&mut **tx)
    .await?;
    Ok(result.rows_affected())
}

/// Insert a new position and return its identifier.
///
/// Superseded active rows of the same (jurisdiction, manager, issuer) key
/// are deactivated in the same transaction, so a closure never leaves an
/// older disclosure flagged active.
pub async fn insert_position(pool: &SqlitePool, position: &CanonicalPosition) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO positions (id, jurisdiction, manager_id, issuer_id, isin, position_size,
             disclosure_date, is_active, was_active_at_row_time, transition, provenance,
             source_url, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(position.jurisdiction.as_str())
    .bind(&position.manager_id)
    .bind(&position.issuer_id)
    .bind(&position.isin)
    .bind(size_text(position.position_size))
    .bind(position.disclosure_date.to_string())
    .bind(position.is_active)
    .bind(position.was_active_at_row_time)
    .bind(position.transition.map(|t| t.as_str()))
    .bind(&position.provenance)
    .bind(&position.source_url)
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    let cleared = deactivate_superseded(&mut tx, position, &id, &now).await?;
    if cleared > 0 {
        tracing::debug!(count = cleared, "Superseded active rows");
    }

    tx.commit().await?;
    Ok(id)
}

/// Overwrite the activity verdict of a stored row.
pub async fn update_verdict(pool: &SqlitePool, id: &str, position: &CanonicalPosition) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let mut tx = pool.begin().await?;

    let result = sqlx::query(
        "UPDATE positions SET is_active = ?, was_active_at_row_time = ?, transition = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(position.is_active)
    .bind(position.was_active_at_row_time)
    .bind(position.transition.map(|t| t.as_str()))
    .bind(&now)
    .bind(id)
    .execute(&mut *tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::PositionNotFound(id.to_string()));
    }

    if position.is_active {
        deactivate_superseded(&mut tx, position, id, &now).await?;
    }

    tx.commit().await?;
    Ok(())
}

/// All positions of a jurisdiction, newest disclosure first.
pub async fn list_positions(
    pool: &SqlitePool,
    jurisdiction: &JurisdictionCode,
) -> Result<Vec<CanonicalPosition>> {
    let rows = sqlx::query(
        "SELECT id, jurisdiction, manager_id, issuer_id, isin, position_size, disclosure_date,
                is_active, was_active_at_row_time, transition, provenance, source_url
         FROM positions WHERE jurisdiction = ?
         ORDER BY disclosure_date DESC, created_at DESC",
    )
    .bind(jurisdiction.as_str())
    .fetch_all(pool)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Per-jurisdiction totals, ordered by code.
pub async fn jurisdiction_totals(pool: &SqlitePool) -> Result<Vec<JurisdictionTotals>> {
    let rows = sqlx::query(
        "SELECT jurisdiction, COUNT(*) AS total, SUM(is_active) AS active,
                MAX(disclosure_date) AS latest
         FROM positions GROUP BY jurisdiction ORDER BY jurisdiction",
    )
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let latest: Option<String> = row.try_get("latest")?;
            Ok(JurisdictionTotals {
                jurisdiction: row.try_get("jurisdiction")?,
                total_positions: row.try_get("total")?,
                active_positions: row.try_get::<Option<i64>, _>("active")?.unwrap_or(0),
                latest_disclosure_date: latest
                    .map(|date| parse_date("latest", &date))
                    .transpose()?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;
    use rust_decimal_macros::dec;

    async fn setup_test_db() -> Database {
        let db = Database::new(":memory:").await.expect("create test database");
        db.run_migrations().await.expect("run migrations");
        sqlx::query(
            "INSERT INTO managers (id, name, slug, created_at, updated_at)
             VALUES ('m-1', 'Acme Capital', 'acme-capital', datetime('now'), datetime('now'))",
        )
        .execute(db.pool())
        .await
        .expect("seed manager");
        sqlx::query(
            "INSERT INTO issuers (id, name, slug, isin, jurisdiction, created_at, updated_at)
             VALUES ('i-1', 'Foo SA', 'foo-sa', 'FR0000120271', 'FR', datetime('now'), datetime('now'))",
        )
        .execute(db.pool())
        .await
        .expect("seed issuer");
        db
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn position(size: Decimal, disclosed: NaiveDate, is_active: bool) -> CanonicalPosition {
        CanonicalPosition {
            id: None,
            jurisdiction: JurisdictionCode::new("FR").unwrap(),
            manager_id: "m-1".to_string(),
            issuer_id: "i-1".to_string(),
            isin: Some("FR0000120271".to_string()),
            position_size: size,
            disclosure_date: disclosed,
            is_active,
            was_active_at_row_time: Some(size >= dec!(0.5)),
            transition: None,
            provenance: "file:mixed".to_string(),
            source_url: None,
        }
    }

    #[tokio::test]
    async fn test_latest_date_and_dedup_lookup() {
        let db = setup_test_db().await;
        let fr = JurisdictionCode::new("FR").unwrap();

        assert_eq!(find_latest_date(db.pool(), &fr).await.unwrap(), None);

        insert_position(db.pool(), &position(dec!(0.50), date(2024, 2, 1), false))
            .await
            .unwrap();
        insert_position(db.pool(), &position(dec!(0.62), date(2024, 3, 1), true))
            .await
            .unwrap();

        assert_eq!(
            find_latest_date(db.pool(), &fr).await.unwrap(),
            Some(date(2024, 3, 1))
        );
        let found = find_existing(db.pool(), &fr, "m-1", "i-1", date(2024, 2, 1), dec!(0.5))
            .await
            .unwrap();
        assert!(found.is_some_and(|verdict| !verdict.is_active));
        let missing = find_existing(db.pool(), &fr, "m-1", "i-1", date(2024, 2, 1), dec!(0.51))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_new_active_row_supersedes_previous() {
        let db = setup_test_db().await;
        let fr = JurisdictionCode::new("FR").unwrap();

        insert_position(db.pool(), &position(dec!(0.7), date(2024, 2, 1), true))
            .await
            .unwrap();
        insert_position(db.pool(), &position(dec!(0.9), date(2024, 3, 1), true))
            .await
            .unwrap();

        let rows = list_positions(db.pool(), &fr).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows[0].is_active);
        assert!(!rows[1].is_active);
    }

    #[tokio::test]
    async fn test_closure_deactivates_older_rows_only() {
        let db = setup_test_db().await;
        let fr = JurisdictionCode::new("FR").unwrap();

        insert_position(db.pool(), &position(dec!(0.7), date(2024, 2, 1), true))
            .await
            .unwrap();
        // An older historical row must not touch the newer active one
        insert_position(db.pool(), &position(dec!(0.6), date(2024, 1, 1), false))
            .await
            .unwrap();
        assert!(list_positions(db.pool(), &fr).await.unwrap()[0].is_active);

        insert_position(db.pool(), &position(dec!(0), date(2024, 3, 1), false))
            .await
            .unwrap();
        let rows = list_positions(db.pool(), &fr).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| !row.is_active));
        assert_eq!(rows[0].position_size, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_update_verdict() {
        let db = setup_test_db().await;
        let fr = JurisdictionCode::new("FR").unwrap();
        let mut stale = position(dec!(0.7), date(2024, 3, 1), true);
        let id = insert_position(db.pool(), &stale).await.unwrap();

        stale.is_active = false;
        stale.transition = Some(Transition::Exited);
        update_verdict(db.pool(), &id, &stale).await.unwrap();

        let rows = list_positions(db.pool(), &fr).await.unwrap();
        assert!(!rows[0].is_active);
        assert_eq!(rows[0].transition, Some(Transition::Exited));

        let missing = update_verdict(db.pool(), "nope", &stale).await;
        assert!(matches!(missing, Err(DatabaseError::PositionNotFound(_))));
    }

    #[tokio::test]
    async fn test_jurisdiction_totals() {
        let db = setup_test_db().await;
        insert_position(db.pool(), &position(dec!(0.4), date(2024, 1, 5), false))
            .await
            .unwrap();
        insert_position(db.pool(), &position(dec!(0.8), date(2024, 3, 1), true))
            .await
            .unwrap();

        let totals = jurisdiction_totals(db.pool()).await.unwrap();

        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].jurisdiction, "FR");
        assert_eq!(totals[0].total_positions, 2);
        assert_eq!(totals[0].active_positions, 1);
        assert_eq!(totals[0].latest_disclosure_date, Some(date(2024, 3, 1)));
    }
}
