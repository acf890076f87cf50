use super::decode_tables;
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::Result;
use crate::extract::TableExtractor;
use crate::flows::{browser_export, browser_links, download};
use crate::headers::{Field, HeaderSpec};
use async_trait::async_trait;
use shortwatch_browser::PageLink;
use shortwatch_core::Provenance;

const REGISTER_PAGE: &str = "https://www.fi.se/en/our-registers/net-short-positions";
const CURRENT_FILE_URL: &str =
    "https://www.fi.se/en/our-registers/net-short-positions/GetAktuellFile/";
const HISTORICAL_FILE_URL: &str =
    "https://www.fi.se/en/our-registers/net-short-positions/GetHistFile/";

const SE_KEYWORDS: &[(Field, &[&str])] = &[
    (Field::Isin, &["isin"]),
    (Field::Date, &["position date", "datum"]),
    (Field::Manager, &["position holder", "innehavare"]),
    (Field::Issuer, &["name of the issuer", "emittent"]),
    (Field::PositionSize, &["position in per cent", "procent"]),
];

const HEADERS: HeaderSpec = HeaderSpec::with_keywords(&[], SE_KEYWORDS);

fn is_header_row(row: &[String]) -> bool {
    row.first().is_some_and(|first| {
        let first = first.to_lowercase();
        first.contains("position holder") || first.contains("innehavare")
    })
}

struct FileKind {
    label: &'static str,
    href_fragment: &'static str,
    fallback_url: &'static str,
    export_labels: &'static [&'static str],
}

const FILES: [FileKind; 2] = [
    FileKind {
        label: "current",
        href_fragment: "getaktuellfile",
        fallback_url: CURRENT_FILE_URL,
        export_labels: &["Current positions", "Aktuella positioner"],
    },
    FileKind {
        label: "historical",
        href_fragment: "gethistfile",
        fallback_url: HISTORICAL_FILE_URL,
        export_labels: &["Historical positions", "Historiska positioner"],
    },
];

/// Finansinspektionen register with current and historical spreadsheet
/// downloads behind generated links.
pub struct Sweden {
    profile: SourceProfile,
}

impl Sweden {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("SE", "Sweden", "Finansinspektionen", Transport::Browser),
        }
    }
}

impl Default for Sweden {
    fn default() -> Self {
        Self::new()
    }
}

fn resolve_files(links: &[PageLink]) -> Vec<ResourceDescriptor> {
    FILES
        .iter()
        .map(|file| {
            let url = links
                .iter()
                .find(|link| link.href.to_lowercase().contains(file.href_fragment))
                .map_or(file.fallback_url, |link| link.href.as_str());
            let provenance = if file.label == "current" {
                Provenance::current("file:current")
            } else {
                Provenance::historical("file:historical")
            };
            ResourceDescriptor::new(file.label, url, provenance)
        })
        .collect()
}

#[async_trait]
impl SourceAdapter for Sweden {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn locate(&self, ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>> {
        let links = match browser_links(ctx, REGISTER_PAGE).await {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!(page = %REGISTER_PAGE, "Cannot read download links, using known URLs: {}", e);
                Vec::new()
            }
        };
        Ok(resolve_files(&links))
    }

    async fn fetch(&self, ctx: &SourceContext, resource: &ResourceDescriptor) -> Result<RawPayload> {
        let http_error = match download(&ctx.http, &resource.url, Some(ctx.http.long_timeout())).await {
            Ok(payload) => return Ok(payload),
            Err(e) => e,
        };
        if !ctx.has_browser() {
            return Err(http_error);
        }

        tracing::warn!(url = %resource.url, "Direct download failed, clicking through the page: {}", http_error);
        let labels = FILES
            .iter()
            .find(|file| file.label == resource.label)
            .map_or(&[][..], |file| file.export_labels);
        browser_export(ctx, REGISTER_PAGE, labels).await
    }

    fn extract(&self, resource: &ResourceDescriptor, payload: &RawPayload) -> Extraction {
        let tables = match decode_tables(&self.profile, payload, &resource.label, None) {
            Ok(tables) => tables,
            Err(layout) => return layout,
        };

        let extractor = TableExtractor::new(&HEADERS).header_row_where(is_header_row);
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
