use super::decode_tables;
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::Result;
use crate::extract::TableExtractor;
use crate::headers::{Field, HeaderSpec, COMMON_KEYWORDS};
use crate::tabular::{cell_text, Table};
use async_trait::async_trait;
use shortwatch_core::{Provenance, RawExtractedRecord};
use std::collections::HashSet;

const WORKBOOK_URL: &str = "https://www.cnmv.es/DocPortal/Posiciones-Cortas/NetShortPositions.xls";

const HEADER_SEARCH_ROWS: usize = 8;

const HEADERS: HeaderSpec = HeaderSpec::with_keywords(
    &[
        (Field::Manager, &["Tenedor de la Posición / Position holder"]),
        (Field::Issuer, &["Emisor / Issuer"]),
        (Field::Isin, &["ISIN"]),
        (Field::PositionSize, &["Posición corta (%) / Net short position (%)"]),
        (Field::Date, &["Fecha posición / Position date"]),
    ],
    COMMON_KEYWORDS,
);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetKind {
    Current,
    Series,
    Previous,
}

fn classify_sheet(name: &str) -> Option<SheetKind> {
    let lower = name.to_lowercase();
    if lower.contains("última") || lower.contains("ultima") || lower.contains("current") {
        Some(SheetKind::Current)
    } else if lower.contains("serie") {
        Some(SheetKind::Series)
    } else if lower.contains("anteriores") || lower.contains("previous") {
        Some(SheetKind::Previous)
    } else {
        None
    }
}

fn is_header_row(row: &[String]) -> bool {
    let joined = row.join(" ");
    joined.contains("LEI") && joined.contains("ISIN")
}

/// The CNMV legacy workbook decodes a few accented vowels to C1 controls.
fn fix_mojibake(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\u{9c}' | '\u{9d}' | '\u{9e}' => 'o',
            other => other,
        })
        .collect()
}

type RowKey = [String; 5];

fn row_key(record: &RawExtractedRecord) -> RowKey {
    [
        cell_text(&record.date),
        cell_text(&record.position_size),
        cell_text(&record.company_name).to_lowercase(),
        cell_text(&record.manager_name).to_lowercase(),
        cell_text(&record.isin).to_uppercase(),
    ]
}

/// CNMV workbook with current, series and previous sheets.
pub struct Spain {
    profile: SourceProfile,
}

impl Spain {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("ES", "Spain", "CNMV", Transport::MultiTab),
        }
    }
}

impl Default for Spain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for Spain {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn locate(&self, _ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>> {
        Ok(vec![ResourceDescriptor::new(
            "workbook",
            WORKBOOK_URL,
            Provenance::mixed("file:workbook"),
        )])
    }

    fn extract(&self, resource: &ResourceDescriptor, payload: &RawPayload) -> Extraction {
        match decode_tables(&self.profile, payload, &resource.label, None) {
            Ok(tables) => self.extract_sheets(&tables, &payload.source_url),
            Err(layout) => layout,
        }
    }
}

impl Spain {
    fn extract_sheets(&self, tables: &[Table], source_url: &str) -> Extraction {
        let extractor = TableExtractor::new(&HEADERS)
            .header_search_rows(HEADER_SEARCH_ROWS)
            .header_row_where(is_header_row)
            .fix_text(fix_mojibake);

        let mut sheets = Vec::new();
        for table in tables {
            match classify_sheet(&table.name) {
                Some(kind) => sheets.push((kind, table)),
                None => tracing::debug!(sheet = %table.name, "Skipping unrecognized sheet"),
            }
        }

        // Current sheets first so series rows can be checked against them
        sheets.sort_by_key(|(kind, _)| *kind != SheetKind::Current);

        let mut extraction = Extraction::default();
        let mut current_keys: HashSet<RowKey> = HashSet::new();
        for (kind, table) in sheets {
            let label = format!("sheet:{}", table.name);
            let provenance = match kind {
                SheetKind::Current => Provenance::current(label),
                SheetKind::Series | SheetKind::Previous => Provenance::historical(label),
            };
            let mut sheet = extractor.extract(table, &self.profile.code, &provenance, source_url);

            match kind {
                SheetKind::Current => current_keys.extend(sheet.records.iter().map(row_key)),
                SheetKind::Series => {
                    let before = sheet.records.len();
                    sheet.records.retain(|record| !current_keys.contains(&row_key(record)));
                    let duplicates = before - sheet.records.len();
                    if duplicates > 0 {
                        tracing::debug!(sheet = %table.name, count = duplicates, "Dropped series rows duplicating current positions");
                    }
                    sheet.dropped += duplicates;
                }
                SheetKind::Previous => {}
            }
            extraction.merge(sheet);
        }
        extraction
    }
}
