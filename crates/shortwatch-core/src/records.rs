//! Record shapes flowing through the ingestion pipeline.
//!
//! Adapters emit [`RawExtractedRecord`]s, validation turns them into
//! [`NormalizedRecord`]s, the resolver wraps those into [`ResolvedRecord`]s,
//! and the store persists [`CanonicalPosition`]s.

use crate::types::{Isin, JurisdictionCode, Provenance, RunStatus, Transition};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// A loosely typed cell value as read from a source.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum RawValue {
    /// No value
    #[default]
    Empty,
    /// Text as published
    Text(String),
    /// Numeric spreadsheet cell
    Number(f64),
    /// Native spreadsheet date cell
    Date(NaiveDate),
}

impl RawValue {
    /// Wrap a text value, mapping blank strings to `Empty`.
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.trim().is_empty() {
            Self::Empty
        } else {
            Self::Text(value)
        }
    }

    /// Whether the value carries nothing usable.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => n.is_nan(),
            Self::Date(_) => false,
        }
    }

    /// Render the value as text, if it has one.
    #[must_use]
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Empty => None,
            Self::Text(s) => Some(Cow::Borrowed(s.as_str())),
            Self::Number(n) if n.is_nan() => None,
            Self::Number(n) => Some(Cow::Owned(n.to_string())),
            Self::Date(d) => Some(Cow::Owned(d.format("%Y-%m-%d").to_string())),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::text(value)
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::text(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<NaiveDate> for RawValue {
    fn from(value: NaiveDate) -> Self {
        Self::Date(value)
    }
}

/// A source-local record before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawExtractedRecord {
    /// Jurisdiction that published the record
    pub jurisdiction: JurisdictionCode,
    /// Position holder as published
    pub manager_name: RawValue,
    /// Issuer as published
    pub company_name: RawValue,
    /// ISIN as published
    pub isin: RawValue,
    /// Net short position as published (percent)
    pub position_size: RawValue,
    /// Disclosure date as published
    pub date: RawValue,
    /// Publication end date, for feeds that record one
    pub end_date: RawValue,
    /// Where in the source the record was found
    pub provenance: Provenance,
    /// URL of the resource the record was read from
    pub source_url: Option<String>,
}

impl RawExtractedRecord {
    /// Start a record with empty fields.
    #[must_use]
    pub fn new(jurisdiction: JurisdictionCode, provenance: Provenance) -> Self {
        Self {
            jurisdiction,
            manager_name: RawValue::Empty,
            company_name: RawValue::Empty,
            isin: RawValue::Empty,
            position_size: RawValue::Empty,
            date: RawValue::Empty,
            end_date: RawValue::Empty,
            provenance,
            source_url: None,
        }
    }
}

/// Display name plus identity slug of a manager or issuer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityName {
    /// Whitespace-normalized display name, original script preserved
    pub display: String,
    /// Identity slug derived from the display name
    pub slug: String,
}

/// A validated record with typed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    /// Jurisdiction that published the record
    pub jurisdiction: JurisdictionCode,
    /// Position holder
    pub manager: EntityName,
    /// Issuer
    pub issuer: EntityName,
    /// ISIN when published
    pub isin: Option<Isin>,
    /// Net short position in percent, within `[0, 100]`
    pub position_size: Decimal,
    /// Disclosure date, never in the future
    pub disclosure_date: NaiveDate,
    /// Publication end date, if the feed records one
    pub end_date: Option<NaiveDate>,
    /// Where in the source the record was found
    pub provenance: Provenance,
    /// URL of the resource the record was read from
    pub source_url: Option<String>,
}

impl NormalizedRecord {
    /// Grouping key: manager slug plus ISIN, or the issuer slug without one.
    #[must_use]
    pub fn identity_key(&self) -> (String, String) {
        let issuer_key = match &self.isin {
            Some(isin) => isin.as_str().to_string(),
            None => self.issuer.slug.clone(),
        };
        (self.manager.slug.clone(), issuer_key)
    }
}

/// A normalized record with its activity verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedRecord {
    /// The record being classified
    pub record: NormalizedRecord,
    /// Whether the disclosure is currently in force
    pub is_active: bool,
    /// Whether the size was above threshold when disclosed (composite rule only)
    pub was_active_at_row_time: Option<bool>,
    /// Change against the previous disclosure (composite rule, newest row only)
    pub transition: Option<Transition>,
}

/// A deduplicated position holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerIdentity {
    /// Row identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Unique slug
    pub slug: String,
}

/// A deduplicated issuer within a jurisdiction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerIdentity {
    /// Row identifier
    pub id: String,
    /// Display name
    pub name: String,
    /// Slug of the display name
    pub slug: String,
    /// ISIN, once known
    pub isin: Option<String>,
    /// Jurisdiction the issuer was first seen in
    pub jurisdiction: JurisdictionCode,
}

/// A persisted short position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalPosition {
    /// Row identifier, assigned by the store
    pub id: Option<String>,
    /// Jurisdiction that published the position
    pub jurisdiction: JurisdictionCode,
    /// Referenced manager
    pub manager_id: String,
    /// Referenced issuer
    pub issuer_id: String,
    /// ISIN as disclosed
    pub isin: Option<String>,
    /// Net short position in percent
    pub position_size: Decimal,
    /// Disclosure date
    pub disclosure_date: NaiveDate,
    /// Whether the disclosure is currently in force
    pub is_active: bool,
    /// Threshold status at disclosure time (composite jurisdictions)
    pub was_active_at_row_time: Option<bool>,
    /// Change against the previous disclosure
    pub transition: Option<Transition>,
    /// Provenance label
    pub provenance: String,
    /// Resource URL
    pub source_url: Option<String>,
}

/// One audit entry per jurisdiction per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAuditRecord {
    /// Row identifier
    pub id: String,
    /// Identifier shared by every jurisdiction in the same run
    pub run_id: String,
    /// Jurisdiction processed
    pub jurisdiction: JurisdictionCode,
    /// Outcome
    pub status: RunStatus,
    /// Records considered after diffing
    pub records_found: i64,
    /// Rows inserted
    pub records_added: i64,
    /// Exact duplicates skipped
    pub records_skipped: i64,
    /// Rows whose activity verdict was refreshed
    pub records_updated: i64,
    /// Error detail for partial or failed runs
    pub error_message: Option<String>,
    /// When processing started
    pub started_at: DateTime<Utc>,
    /// When processing finished
    pub completed_at: Option<DateTime<Utc>>,
}
