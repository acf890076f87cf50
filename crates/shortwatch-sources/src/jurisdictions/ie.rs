use super::{decode_tables, sheet_provenance};
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::Result;
use crate::extract::TableExtractor;
use crate::headers::{Field, HeaderSpec};
use async_trait::async_trait;
use rust_decimal::Decimal;
use shortwatch_core::Provenance;

const WORKBOOK_URL: &str = "https://www.centralbank.ie/docs/default-source/regulation/industry-market-sectors/securities-markets/short-selling-regulation/public-net-short-positions/table-of-significant-net-short-positions-in-shares.xlsx";

// Header colons are stripped during normalization, so the "Position Holder:"
// and "Position Holder" layouts share names.
const HEADERS: HeaderSpec = HeaderSpec::exact(&[
    (Field::Manager, &["Position Holder"]),
    (Field::Issuer, &["Name of the Issuer", "Issuer"]),
    (Field::Isin, &["ISIN"]),
    (
        Field::PositionSize,
        &["Net short position %", "Net short position"],
    ),
    (Field::Date, &["Position Date", "Date"]),
]);

/// Central Bank of Ireland workbook; sizes are published as fractions.
pub struct Ireland {
    profile: SourceProfile,
}

impl Ireland {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("IE", "Ireland", "Central Bank of Ireland", Transport::MultiTab)
                .with_scale(Decimal::ONE_HUNDRED),
        }
    }
}

impl Default for Ireland {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for Ireland {
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
        for table in tables.iter().filter(|t| !t.is_empty()) {
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
