//! Static description of a source.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shortwatch_core::{ActivityRule, Capability, DateOrder, JurisdictionCode};
use std::fmt;

/// How a source's resources are retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// One downloadable file
    StaticFile,
    /// Separate current and historical downloads
    CurrentAndHistorical,
    /// One workbook whose sheet names say current or historical
    MultiTab,
    /// Load a page, discover a generated link, fetch it in the same session
    Session,
    /// Rendered pages driven through a headless browser
    Browser,
}

impl Transport {
    /// Capabilities a source with this transport needs.
    #[must_use]
    pub fn required_capabilities(&self) -> Vec<Capability> {
        match self {
            Self::StaticFile | Self::CurrentAndHistorical => vec![Capability::StaticDownload],
            Self::MultiTab => vec![Capability::StaticDownload, Capability::SpreadsheetParsing],
            Self::Session => vec![Capability::SessionDownload],
            Self::Browser => vec![Capability::BrowserAutomation],
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StaticFile => "static file",
            Self::CurrentAndHistorical => "current + historical files",
            Self::MultiTab => "multi-tab workbook",
            Self::Session => "session download",
            Self::Browser => "browser automation",
        };
        f.write_str(name)
    }
}

/// Everything the pipeline needs to know about a source besides its code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProfile {
    /// Jurisdiction code
    pub code: JurisdictionCode,
    /// Country display name
    pub name: String,
    /// Publishing regulator
    pub regulator: String,
    /// Retrieval style
    pub transport: Transport,
    /// How active records are decided
    pub activity_rule: ActivityRule,
    /// How ambiguous numeric dates are written
    pub date_order: DateOrder,
    /// Multiplier for sizes published as fractions
    pub scale: Option<Decimal>,
}

impl SourceProfile {
    /// Build a profile with day-first dates, no scaling and the provenance rule.
    #[must_use]
    pub fn new(code: JurisdictionCode, name: &str, regulator: &str, transport: Transport) -> Self {
        Self {
            code,
            name: name.to_string(),
            regulator: regulator.to_string(),
            transport,
            activity_rule: ActivityRule::Provenance,
            date_order: DateOrder::DayFirst,
            scale: None,
        }
    }

    /// Profile of a built-in adapter, from a code literal.
    pub(crate) fn builtin(code: &'static str, name: &str, regulator: &str, transport: Transport) -> Self {
        Self::new(
            JurisdictionCode::new(code).expect("valid jurisdiction literal"),
            name,
            regulator,
            transport,
        )
    }

    /// Use a different activity rule.
    #[must_use]
    pub fn with_rule(mut self, rule: ActivityRule) -> Self {
        self.activity_rule = rule;
        self
    }

    /// Scale published sizes by `scale`.
    #[must_use]
    pub fn with_scale(mut self, scale: Decimal) -> Self {
        self.scale = Some(scale);
        self
    }

    /// Capabilities this source needs.
    #[must_use]
    pub fn required_capabilities(&self) -> Vec<Capability> {
        self.transport.required_capabilities()
    }
}
