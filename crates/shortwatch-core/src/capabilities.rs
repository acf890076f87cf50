//! Capability registry for optional retrieval transports.
//!
//! Some sources can only be read through a headless browser. This registry
//! lets the rest of the system check which transports are usable at runtime
//! so those sources can be skipped when a browser is not available.

use crate::config::AppConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifies retrieval capabilities that can be enabled or disabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Plain HTTP download of a file at a known URL
    StaticDownload,
    /// Multi-step HTTP flow sharing one cookie session
    SessionDownload,
    /// Headless browser rendering and client-side exports
    BrowserAutomation,
    /// Decoding of xlsx/xls/ods workbooks
    SpreadsheetParsing,
}

impl Capability {
    /// Get a human-readable name for this capability.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::StaticDownload => "Static Download",
            Self::SessionDownload => "Session Download",
            Self::BrowserAutomation => "Browser Automation",
            Self::SpreadsheetParsing => "Spreadsheet Parsing",
        }
    }

    /// Get a description of what this capability provides.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::StaticDownload => "Fetch published files over HTTP",
            Self::SessionDownload => "Load a page, discover a generated link and fetch it",
            Self::BrowserAutomation => "Render dynamic pages and read exported files",
            Self::SpreadsheetParsing => "Read Excel and OpenDocument workbooks",
        }
    }

    /// All known capabilities.
    #[must_use]
    pub fn all() -> &'static [Capability] {
        &[
            Self::StaticDownload,
            Self::SessionDownload,
            Self::BrowserAutomation,
            Self::SpreadsheetParsing,
        ]
    }
}

/// Registry tracking which capabilities are currently available.
#[derive(Debug, Clone)]
pub struct CapabilityRegistry {
    enabled: HashSet<Capability>,
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CapabilityRegistry {
    /// Create a registry with every HTTP-based capability enabled.
    ///
    /// Browser automation starts disabled; see [`CapabilityRegistry::from_config`].
    #[must_use]
    pub fn new() -> Self {
        let enabled = [
            Capability::StaticDownload,
            Capability::SessionDownload,
            Capability::SpreadsheetParsing,
        ]
        .into_iter()
        .collect();

        Self { enabled }
    }

    /// Create a registry reflecting the application configuration.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        if config.browser.enabled {
            registry.enable(Capability::BrowserAutomation);
        }
        registry
    }

    /// Check if a capability is currently available.
    #[must_use]
    pub fn is_available(&self, capability: Capability) -> bool {
        self.enabled.contains(&capability)
    }

    /// Check if every capability in `required` is available.
    #[must_use]
    pub fn supports_all(&self, required: &[Capability]) -> bool {
        required.iter().all(|c| self.is_available(*c))
    }

    /// Enable a capability.
    pub fn enable(&mut self, capability: Capability) {
        tracing::debug!("Enabling capability: {:?}", capability);
        self.enabled.insert(capability);
    }

    /// Disable a capability.
    pub fn disable(&mut self, capability: Capability) {
        tracing::debug!("Disabling capability: {:?}", capability);
        self.enabled.remove(&capability);
    }

    /// Get all currently enabled capabilities.
    #[must_use]
    pub fn enabled(&self) -> Vec<Capability> {
        let mut enabled: Vec<_> = self.enabled.iter().copied().collect();
        enabled.sort_by_key(|c| Capability::all().iter().position(|k| k == c));
        enabled
    }
}
