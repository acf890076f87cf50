use super::decode_tables;
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::Result;
use crate::extract::TableExtractor;
use crate::flows::download;
use crate::headers::{Field, HeaderSpec};
use async_trait::async_trait;
use shortwatch_core::Provenance;

const CURRENT_URL: &str = "https://www.fsma.be/en/de-shortselling?page&_format=csv";
const HISTORICAL_URL: &str = "https://www.fsma.be/en/de-shortselling-history?page&_format=csv";

const HEADERS: HeaderSpec = HeaderSpec::exact(&[
    (Field::Manager, &["Position holder"]),
    (Field::Issuer, &["Issuer"]),
    (Field::Isin, &["ISIN"]),
    (Field::PositionSize, &["Net short position"]),
    (Field::Date, &["Position date"]),
]);

/// FSMA current and historical CSV exports.
pub struct Belgium {
    profile: SourceProfile,
}

impl Belgium {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("BE", "Belgium", "FSMA", Transport::CurrentAndHistorical),
        }
    }
}

impl Default for Belgium {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for Belgium {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn locate(&self, _ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>> {
        Ok(vec![
            ResourceDescriptor::new("current", CURRENT_URL, Provenance::current("file:current")),
            ResourceDescriptor::new(
                "historical",
                HISTORICAL_URL,
                Provenance::historical("file:historical"),
            ),
        ])
    }

    // The FSMA endpoints render the whole register server-side and are slow.
    async fn fetch(&self, ctx: &SourceContext, resource: &ResourceDescriptor) -> Result<RawPayload> {
        download(&ctx.http, &resource.url, Some(ctx.http.long_timeout())).await
    }

    fn extract(&self, resource: &ResourceDescriptor, payload: &RawPayload) -> Extraction {
        let tables = match decode_tables(&self.profile, payload, &resource.label, None) {
            Ok(tables) => tables,
            Err(layout) => return layout,
        };

        let extractor = TableExtractor::new(&HEADERS);
        let mut extraction = Extraction::default();
        for table in &tables {
            extraction.merge(extractor.extract(
                table,
                &self.profile.code,
                &resource.provenance,
                &payload.source_url,
            ));
        }
        extraction
    }
}
