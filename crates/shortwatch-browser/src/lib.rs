//! Browser automation for dynamically rendered disclosure pages.
//!
//! Provides headless browser control with a shared request fingerprint,
//! per-domain politeness spacing and a controlled download directory for
//! client-side exports.

pub mod actions;
pub mod downloads;
pub mod engine;
pub mod error;
pub mod fingerprint;

pub use actions::{BrowserActions, PageLink};
pub use downloads::{DownloadDir, DownloadedFile};
pub use engine::{BrowserEngine, BrowserLauncher, BrowserSession, EngineSettings};
pub use error::{BrowserError, Result};
pub use fingerprint::FingerprintConfig;
