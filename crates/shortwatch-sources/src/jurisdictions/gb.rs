use super::{decode_tables, sheet_provenance};
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::Result;
use crate::extract::TableExtractor;
use crate::headers::{Field, HeaderSpec};
use async_trait::async_trait;
use shortwatch_core::Provenance;

const WORKBOOK_URL: &str = "https://www.fca.org.uk/publication/data/short-positions-daily-update.xlsx";

const HEADERS: HeaderSpec = HeaderSpec::exact(&[
    (Field::Manager, &["Position Holder"]),
    (Field::Issuer, &["Name of Share Issuer"]),
    (Field::Isin, &["ISIN"]),
    (Field::PositionSize, &["Net Short Position (%)"]),
    (Field::Date, &["Position Date"]),
]);

/// FCA daily workbook with "Current" and "Historic" disclosure sheets.
pub struct UnitedKingdom {
    profile: SourceProfile,
}

impl UnitedKingdom {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("GB", "United Kingdom", "FCA", Transport::MultiTab),
        }
    }
}

impl Default for UnitedKingdom {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for UnitedKingdom {
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
        let tables = match decode_tables(&self.profile, payload, &resource.label, None) {
            Ok(tables) => tables,
            Err(layout) => return layout,
        };

        let extractor = TableExtractor::new(&HEADERS);
        let mut extraction = Extraction::default();
        for table in &tables {
            let provenance = sheet_provenance(&table.name, &["current"]);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tabular::Table;
    use shortwatch_core::{ProvenanceKind, RawValue};

    #[test]
    fn test_sheets_map_to_provenance() {
        let header = vec![
            "Position Holder",
            "Name of Share Issuer",
            "ISIN",
            "Net Short Position (%)",
            "Position Date",
        ];
        let current = Table::from_strings(
            "Current Disclosures",
            &[header.clone(), vec!["Acme LLP", "Foo plc", "GB00B03MLX29", "0.62", "2024-03-01"]],
        );
        let historic = Table::from_strings(
            "Historic Disclosures",
            &[header, vec!["Acme LLP", "Foo plc", "GB00B03MLX29", "0.48", "2024-02-01"]],
        );

        let adapter = UnitedKingdom::new();
        let extractor = TableExtractor::new(&HEADERS);
        let mut extraction = Extraction::default();
        for table in [&current, &historic] {
            let provenance = sheet_provenance(&table.name, &["current"]);
            extraction.merge(extractor.extract(table, &adapter.profile.code, &provenance, WORKBOOK_URL));
        }

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.records[0].provenance.kind, ProvenanceKind::Current);
        assert_eq!(extraction.records[1].provenance.kind, ProvenanceKind::Historical);
        assert_eq!(extraction.records[1].position_size, RawValue::from("0.48"));
    }

    #[test]
    fn test_non_workbook_payload_is_layout_issue() {
        let adapter = UnitedKingdom::new();
        let resource = ResourceDescriptor::new("workbook", WORKBOOK_URL, Provenance::mixed("file"));
        let payload = RawPayload::bytes(WORKBOOK_URL, None, Vec::new());

        let extraction = adapter.extract(&resource, &payload);
        assert!(extraction.records.is_empty());
        assert!(extraction.is_degraded());
    }
}
