//! Issuers of the shorted instruments.

use crate::error::{DatabaseError, Result};
use chrono::Utc;
use shortwatch_core::{EntityName, Isin, IssuerIdentity, JurisdictionCode};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

const COLUMNS: &str = "id, name, slug, isin, jurisdiction";

fn from_row(row: &SqliteRow) -> Result<IssuerIdentity> {
    let jurisdiction: String = row.try_get("jurisdiction")?;
    Ok(IssuerIdentity {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        slug: row.try_get("slug")?,
        isin: row.try_get("isin")?,
        jurisdiction: JurisdictionCode::new(&jurisdiction)
            .map_err(|e| DatabaseError::decode("jurisdiction", e))?,
    })
}

/// Find an issuer by ISIN within `jurisdiction`, then by exact name, then
/// by case-insensitive name.
pub async fn find_issuer(
    pool: &SqlitePool,
    name: &EntityName,
    isin: Option<&Isin>,
    jurisdiction: &JurisdictionCode,
) -> Result<Option<IssuerIdentity>> {
    if let Some(isin) = isin {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM issuers WHERE isin = ? AND jurisdiction = ? LIMIT 1"
        ))
        .bind(isin.as_str())
        .bind(jurisdiction.as_str())
        .fetch_optional(pool)
        .await?;
        if let Some(row) = row {
            return from_row(&row).map(Some);
        }
    }

    for condition in ["name = ?", "LOWER(name) = LOWER(?)"] {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM issuers WHERE {condition} ORDER BY created_at LIMIT 1"
        ))
        .bind(&name.display)
        .fetch_optional(pool)
        .await?;
        if let Some(row) = row {
            return from_row(&row).map(Some);
        }
    }
    Ok(None)
}

/// Return the issuer matching `name`/`isin`, creating it on first sight.
///
/// An issuer first stored without an ISIN gets it back-filled once a
/// record carrying one is seen.
pub async fn get_or_create_issuer(
    pool: &SqlitePool,
    name: &EntityName,
    isin: Option<&Isin>,
    jurisdiction: &JurisdictionCode,
) -> Result<IssuerIdentity> {
    if let Some(mut existing) = find_issuer(pool, name, isin, jurisdiction).await? {
        if let (None, Some(isin)) = (&existing.isin, isin) {
            sqlx::query("UPDATE issuers SET isin = ?, updated_at = ? WHERE id = ?")
                .bind(isin.as_str())
                .bind(Utc::now().to_rfc3339())
                .bind(&existing.id)
                .execute(pool)
                .await?;
            tracing::debug!(issuer = %existing.name, isin = %isin, "Back-filled issuer ISIN");
            existing.isin = Some(isin.as_str().to_string());
        }
        return Ok(existing);
    }

    let id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();
    let isin = isin.map(|isin| isin.as_str().to_string());

    sqlx::query(
        "INSERT INTO issuers (id, name, slug, isin, jurisdiction, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(&name.display)
    .bind(&name.slug)
    .bind(&isin)
    .bind(jurisdiction.as_str())
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await?;

    tracing::debug!(issuer = %name.display, jurisdiction = %jurisdiction, "Created issuer");
    Ok(IssuerIdentity {
        id,
        name: name.display.clone(),
        slug: name.slug.clone(),
        isin,
        jurisdiction: jurisdiction.clone(),
    })
}
