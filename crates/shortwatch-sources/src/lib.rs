//! Shortwatch Sources - Regulator adapters for net short position registers.
//!
//! Each jurisdiction publishes its register differently: static CSV files,
//! multi-tab workbooks, session-bound exports or pages that only render in a
//! browser. This crate hides those differences behind the
//! [`SourceAdapter`] contract so the ingestion coordinator can treat every
//! source the same way.
//!
//! # Modules
//!
//! - [`adapter`] - The adapter contract, payloads and extraction results
//! - [`definition`] - Static source profiles and transports
//! - [`http`] - Retrying HTTP client with cookie sessions
//! - [`tabular`] - CSV, workbook and HTML table decoding
//! - [`headers`] - Column identification by exact name and keyword
//! - [`extract`] - Table to raw record extraction
//! - [`flows`] - Session and browser retrieval flows
//! - [`jurisdictions`] - The twelve built-in sources
//! - [`registry`] - Code to adapter lookup and capability filtering
//!
//! # Example
//!
//! ```rust
//! use shortwatch_core::{CapabilityRegistry, JurisdictionCode};
//! use shortwatch_sources::SourceRegistry;
//!
//! let registry = SourceRegistry::with_default_sources();
//! let gb = JurisdictionCode::new("GB").unwrap();
//! assert_eq!(registry.country_name(&gb).as_deref(), Some("United Kingdom"));
//!
//! // Browser-only sources are skipped unless automation is enabled
//! let usable = registry.available(&CapabilityRegistry::new());
//! assert!(usable.contains(&gb));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod adapter;
pub mod definition;
pub mod error;
pub mod extract;
pub mod flows;
pub mod headers;
pub mod http;
pub mod jurisdictions;
pub mod registry;
pub mod retry;
pub mod tabular;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use adapter::{
    Extraction, FetchedPage, PayloadBody, RawPayload, ResourceDescriptor, SourceAdapter,
    SourceContext,
};
pub use definition::{SourceProfile, Transport};
pub use error::{Result, SourceError};
pub use http::{HttpClient, HttpResponse};
pub use registry::SourceRegistry;
pub use retry::RetryPolicy;
