use super::{decode_tables, sheet_provenance};
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::Result;
use crate::extract::TableExtractor;
use crate::headers::{Field, HeaderSpec, COMMON_KEYWORDS};
use crate::tabular::{is_workbook, Table};
use async_trait::async_trait;
use chrono::Utc;
use shortwatch_core::Provenance;

const WORKBOOK_URL: &str =
    "https://www.consob.it/documents/11973/395154/PncPubl.xlsx/fbefe0a2-795b-bad3-9369-beccbeb14f27";

/// Publication-date sheets carry no positions.
const SKIPPED_SHEETS: [&str; 2] = ["pubb. data", "pubb. date"];

const CURRENT_SHEET_KEYWORDS: &[&str] = &["correnti", "current", "attuali"];

const HEADERS: HeaderSpec = HeaderSpec::with_keywords(
    &[
        (
            Field::Manager,
            &["Detentore", "Position holder", "Titolare della posizione", "Holder", "Manager"],
        ),
        (Field::Issuer, &["Emittente", "Issuer", "Company", "Name of Share Issuer"]),
        (Field::Isin, &["ISIN"]),
        (
            Field::PositionSize,
            &[
                "Perc. posizione netta corta",
                "Net short position",
                "Posizione netta corta",
                "Position size",
                "Net short position (%)",
            ],
        ),
        (
            Field::Date,
            &["Data della posizione", "Position date", "Data posizione", "Date"],
        ),
    ],
    COMMON_KEYWORDS,
);

/// CONSOB workbook of current and past net short positions.
pub struct Italy {
    profile: SourceProfile,
}

impl Italy {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("IT", "Italy", "CONSOB", Transport::StaticFile),
        }
    }

    fn extract_sheets(&self, tables: &[Table], source_url: &str) -> Extraction {
        let extractor = TableExtractor::new(&HEADERS);
        let mut extraction = Extraction::default();
        for table in tables {
            if SKIPPED_SHEETS.contains(&table.name.trim().to_lowercase().as_str()) {
                tracing::debug!(sheet = %table.name, "Skipping publication date sheet");
                continue;
            }
            let provenance = sheet_provenance(&table.name, CURRENT_SHEET_KEYWORDS);
            extraction.merge(extractor.extract(table, &self.profile.code, &provenance, source_url));
        }
        extraction
    }
}

impl Default for Italy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for Italy {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    // The cache-busting parameter makes the CDN serve the latest upload.
    async fn locate(&self, _ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>> {
        let url = format!("{WORKBOOK_URL}?t={}", Utc::now().timestamp_millis());
        Ok(vec![ResourceDescriptor::new(
            "workbook",
            url,
            Provenance::mixed("file:workbook"),
        )])
    }

    fn extract(&self, resource: &ResourceDescriptor, payload: &RawPayload) -> Extraction {
        let workbook = payload.as_bytes().is_some_and(is_workbook);
        let tables = match decode_tables(&self.profile, payload, &resource.label, None) {
            Ok(tables) => tables,
            Err(layout) => return layout,
        };

        if workbook {
            return self.extract_sheets(&tables, &payload.source_url);
        }

        tracing::info!(jurisdiction = %self.profile.code, "Payload is not a workbook, reading as CSV");
        let extractor = TableExtractor::new(&HEADERS);
        let provenance = Provenance::current("file:csv");
        let mut extraction = Extraction::default();
        for table in &tables {
            extraction.merge(extractor.extract(
                table,
                &self.profile.code,
                &provenance,
                &payload.source_url,
            ));
        }
        extraction
    }
}
