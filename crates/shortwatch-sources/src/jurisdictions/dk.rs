use super::decode_tables;
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::{Result, SourceError};
use crate::extract::TableExtractor;
use crate::flows::{browser_links, download};
use crate::headers::{Field, HeaderSpec};
use crate::tabular::Table;
use async_trait::async_trait;
use shortwatch_browser::PageLink;
use shortwatch_core::Provenance;

const PAGE_URL: &str = "https://www.dfsa.dk/financial-themes/capital-market/short-selling/published-net-short-positions";

const HEADERS: HeaderSpec = HeaderSpec::exact(&[
    (Field::Issuer, &["Name of the issuer"]),
    (Field::Isin, &["ISIN"]),
    (Field::Manager, &["Position holder"]),
    (Field::PositionSize, &["Net short position (%)"]),
    (
        Field::Date,
        &["Date, where position was created, changed or ceased to be held (dd-mm-yyyy)"],
    ),
    (Field::Status, &["Active/Historical"]),
]);

/// Danish FSA workbook linked from a script-rendered page. One sheet holds
/// every position with a per-row active or historical flag.
pub struct Denmark {
    profile: SourceProfile,
}

impl Denmark {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("DK", "Denmark", "Finanstilsynet (DFSA)", Transport::Browser),
        }
    }
}

impl Default for Denmark {
    fn default() -> Self {
        Self::new()
    }
}

fn workbook_link(links: &[PageLink]) -> Option<&PageLink> {
    links.iter().find(|link| link.href.to_lowercase().contains(".xlsx"))
}

/// The English sheet if there is one, otherwise the first.
fn pick_sheet(tables: &[Table]) -> Option<&Table> {
    tables
        .iter()
        .find(|table| table.name.to_lowercase().contains("english"))
        .or_else(|| tables.first())
}

#[async_trait]
impl SourceAdapter for Denmark {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn locate(&self, ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>> {
        let links = browser_links(ctx, PAGE_URL).await?;
        let link = workbook_link(&links)
            .ok_or_else(|| SourceError::NotFound(format!("no workbook link on {PAGE_URL}")))?;
        tracing::debug!(url = %link.href, "Found workbook link");
        Ok(vec![ResourceDescriptor::new(
            "workbook",
            link.href.clone(),
            Provenance::mixed("row"),
        )])
    }

    async fn fetch(&self, ctx: &SourceContext, resource: &ResourceDescriptor) -> Result<RawPayload> {
        download(&ctx.http, &resource.url, Some(ctx.http.long_timeout())).await
    }

    fn extract(&self, resource: &ResourceDescriptor, payload: &RawPayload) -> Extraction {
        let tables = match decode_tables(&self.profile, payload, &resource.label, None) {
            Ok(tables) => tables,
            Err(layout) => return layout,
        };
        let Some(sheet) = pick_sheet(&tables) else {
            return Extraction::layout(format!("{}: workbook has no sheets", resource.label));
        };

        TableExtractor::new(&HEADERS).extract(
            sheet,
            &self.profile.code,
            &resource.provenance,
            &payload.source_url,
        )
    }
}
