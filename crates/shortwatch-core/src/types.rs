//! Shared types used across shortwatch.
//!
//! This module defines the newtypes and enums that the adapters, resolver,
//! coordinator and store agree on.

use crate::error::ShortwatchError;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Two-letter jurisdiction code (ISO 3166-1 alpha-2, uppercase).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JurisdictionCode(String);

impl JurisdictionCode {
    /// Create a new `JurisdictionCode`, accepting any letter case.
    ///
    /// # Errors
    /// Returns error if the code is not exactly two ASCII letters.
    pub fn new(code: impl AsRef<str>) -> Result<Self, ShortwatchError> {
        let code = code.as_ref().trim().to_ascii_uppercase();
        Self::validate(&code)?;
        Ok(Self(code))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(code: &str) -> Result<(), ShortwatchError> {
        static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = CODE_REGEX.get_or_init(|| Regex::new(r"^[A-Z]{2}$").expect("valid regex"));

        if regex.is_match(code) {
            Ok(())
        } else {
            Err(ShortwatchError::Validation(format!(
                "invalid jurisdiction code: must be two letters, got '{code}'"
            )))
        }
    }
}

impl fmt::Display for JurisdictionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JurisdictionCode {
    type Err = ShortwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for JurisdictionCode {
    type Error = ShortwatchError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<JurisdictionCode> for String {
    fn from(code: JurisdictionCode) -> Self {
        code.0
    }
}

/// Normalized ISIN: trimmed, uppercase, whitespace removed.
///
/// No checksum is enforced; regulators publish non-compliant codes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Isin(String);

impl Isin {
    pub(crate) fn from_normalized(value: String) -> Self {
        Self(value)
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Isin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of named entity, used for legal-form aware title casing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Position holder (fund manager)
    Manager,
    /// Share issuer (company)
    Issuer,
}

/// How a source writes ambiguous numeric dates such as `03/04/2024`.
///
/// ISO forms (`2024-04-03`) are always accepted regardless of order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    /// `dd/mm/yyyy`, `dd-mm-yyyy`, `dd.mm.yyyy`
    #[default]
    DayFirst,
    /// `mm/dd/yyyy`
    MonthFirst,
}

/// Whether a record came from a current, historical or mixed resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvenanceKind {
    /// Source reports the row as currently in force
    Current,
    /// Source reports the row as closed or superseded
    Historical,
    /// Source mixes current and historical rows without saying which is which
    Mixed,
}

/// Where inside a source a record was found.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Provenance {
    /// Current/historical classification reported by the source
    pub kind: ProvenanceKind,
    /// Free-form origin such as `sheet:Current Disclosures` or `file:historical`
    pub label: String,
}

impl Provenance {
    /// Build a provenance tag.
    #[must_use]
    pub fn new(kind: ProvenanceKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
        }
    }

    /// Current-resource provenance.
    #[must_use]
    pub fn current(label: impl Into<String>) -> Self {
        Self::new(ProvenanceKind::Current, label)
    }

    /// Historical-resource provenance.
    #[must_use]
    pub fn historical(label: impl Into<String>) -> Self {
        Self::new(ProvenanceKind::Historical, label)
    }

    /// Mixed-feed provenance.
    #[must_use]
    pub fn mixed(label: impl Into<String>) -> Self {
        Self::new(ProvenanceKind::Mixed, label)
    }

    /// The activity flag the source itself reports, if any.
    #[must_use]
    pub fn reported_active(&self) -> Option<bool> {
        match self.kind {
            ProvenanceKind::Current => Some(true),
            ProvenanceKind::Historical => Some(false),
            ProvenanceKind::Mixed => None,
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Parameters of the composite activity rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeRule {
    /// Minimum position size (percent) for a disclosure to count as active
    pub threshold: Decimal,
    /// Maximum age in days of an active disclosure
    pub recency_days: u32,
}

impl Default for CompositeRule {
    /// Values observed for the French feed: 0.5% and 730 days.
    fn default() -> Self {
        Self {
            threshold: Decimal::new(5, 1),
            recency_days: 730,
        }
    }
}

/// Per-jurisdiction rule deciding which records are active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ActivityRule {
    /// The resource a record came from says whether it is current
    Provenance,
    /// One feed mixes current and historical rows; rank per key and apply
    /// the threshold, end-date and recency checks
    Composite(CompositeRule),
}

/// Change between the two most recent disclosures of a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Crossed the threshold upwards, or first disclosure above it
    Entered,
    /// Dropped below the threshold
    Exited,
    /// Above the threshold before and after, with a different size
    ActiveSizeChange,
    /// Above the threshold before and after, same size
    ActiveUnchanged,
    /// First disclosure, below the threshold
    InactiveFirst,
    /// Below the threshold before and after
    InactiveUnchanged,
}

impl Transition {
    /// Stable storage name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entered => "entered",
            Self::Exited => "exited",
            Self::ActiveSizeChange => "active_size_change",
            Self::ActiveUnchanged => "active_unchanged",
            Self::InactiveFirst => "inactive_first",
            Self::InactiveUnchanged => "inactive_unchanged",
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transition {
    type Err = ShortwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entered" => Ok(Self::Entered),
            "exited" => Ok(Self::Exited),
            "active_size_change" => Ok(Self::ActiveSizeChange),
            "active_unchanged" => Ok(Self::ActiveUnchanged),
            "inactive_first" => Ok(Self::InactiveFirst),
            "inactive_unchanged" => Ok(Self::InactiveUnchanged),
            other => Err(ShortwatchError::Validation(format!(
                "unknown transition '{other}'"
            ))),
        }
    }
}

/// Outcome of one jurisdiction within an ingestion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every resource was fetched and persisted
    Success,
    /// Some resources failed; whatever resolved was still persisted
    Partial,
    /// Nothing could be persisted for this jurisdiction
    Error,
}

impl RunStatus {
    /// Stable storage name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunStatus {
    type Err = ShortwatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "error" => Ok(Self::Error),
            other => Err(ShortwatchError::Validation(format!(
                "unknown run status '{other}'"
            ))),
        }
    }
}
