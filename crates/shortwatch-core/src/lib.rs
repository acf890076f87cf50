//! Shortwatch Core - Foundation crate for the shortwatch ingestion pipeline.
//!
//! This crate provides shared record types, the field normalizer, record
//! validation, configuration management and capability detection that all
//! other shortwatch crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`JurisdictionCode`, `Isin`, `Transition`)
//! - [`records`] - Raw, normalized, resolved and persisted record shapes
//! - [`normalize`] - Pure parsers for names, percentages, dates and ISINs
//! - [`validation`] - Raw record to normalized record conversion
//! - [`capabilities`] - Transport capability registry
//!
//! # Example
//!
//! ```rust
//! use shortwatch_core::normalize::{parse_date, parse_percentage};
//! use shortwatch_core::{DateOrder, RawValue};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let size = parse_percentage(&RawValue::from("0,62 %"))?;
//! assert_eq!(size.to_string(), "0.62");
//!
//! let date = parse_date(&RawValue::from("31-12-2024"), DateOrder::DayFirst)?;
//! assert_eq!(date.to_string(), "2024-12-31");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod capabilities;
pub mod config;
pub mod error;
pub mod normalize;
pub mod records;
pub mod types;
pub mod validation;

// Re-export commonly used types
pub use capabilities::{Capability, CapabilityRegistry};
pub use config::{
    AppConfig, BrowserConfig, DatabaseConfig, GeneralConfig, HttpConfig, IngestionConfig,
};
pub use error::{ConfigError, ConfigResult, Result, ShortwatchError};
pub use normalize::FieldError;
pub use records::{
    CanonicalPosition, EntityName, IssuerIdentity, ManagerIdentity, NormalizedRecord,
    RawExtractedRecord, RawValue, ResolvedRecord, RunAuditRecord,
};
pub use types::{
    ActivityRule, CompositeRule, DateOrder, EntityKind, Isin, JurisdictionCode, Provenance,
    ProvenanceKind, RunStatus, Transition,
};
pub use validation::{validate_record, RecordRejection, ValidationOptions};
