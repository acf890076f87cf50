use super::decode_tables;
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::Result;
use crate::extract::TableExtractor;
use crate::flows::browser_export;
use crate::headers::{Field, HeaderSpec, COMMON_KEYWORDS};
use async_trait::async_trait;
use shortwatch_core::Provenance;

const CURRENT_PAGE: &str = "https://www.finanssivalvonta.fi/en/financial-market-participants/capital-markets/issuers-and-investors/short-positions/Current-net-short-positions/";
const HISTORIC_PAGE: &str = "https://www.finanssivalvonta.fi/en/financial-market-participants/capital-markets/issuers-and-investors/short-positions/Historic-net-short-positions/";

const EXPORT_LABELS: &[&str] = &["Save as excel (.csv)", "Save as excel"];

const HEADERS: HeaderSpec = HeaderSpec::with_keywords(
    &[
        (Field::Manager, &["Position holder", "Holder"]),
        (Field::Issuer, &["Name of the issuer", "Issuer"]),
        (Field::Isin, &["ISIN"]),
        (Field::PositionSize, &["Net short position (%)", "Net short position"]),
        (Field::Date, &["Position date", "Date"]),
    ],
    COMMON_KEYWORDS,
);

/// FIN-FSA pages whose export button only works in a rendered page.
pub struct Finland {
    profile: SourceProfile,
}

impl Finland {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("FI", "Finland", "FIN-FSA", Transport::Browser),
        }
    }
}

impl Default for Finland {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for Finland {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn locate(&self, _ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>> {
        Ok(vec![
            ResourceDescriptor::new("current", CURRENT_PAGE, Provenance::current("file:current")),
            ResourceDescriptor::new(
                "historical",
                HISTORIC_PAGE,
                Provenance::historical("file:historical"),
            ),
        ])
    }

    async fn fetch(&self, ctx: &SourceContext, resource: &ResourceDescriptor) -> Result<RawPayload> {
        browser_export(ctx, &resource.url, EXPORT_LABELS).await
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SourceError;
    use crate::testing::ScriptedBrowser;
    use shortwatch_core::{HttpConfig, ProvenanceKind, RawValue};
    use std::sync::Arc;

    #[test]
    fn test_extract_export() {
        let csv = "\u{feff}Position holder;Name of the issuer;ISIN;Net short position (%);Position date\n\
Acme Capital LLP;Nokia Oyj;FI0009000681;0,61;1.3.2024\n";
        let resource = ResourceDescriptor::new("historical", HISTORIC_PAGE, Provenance::historical("file:historical"));
        let payload = RawPayload::bytes(HISTORIC_PAGE, None, csv.as_bytes().to_vec());

        let extraction = Finland::new().extract(&resource, &payload);

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].date, RawValue::from("1.3.2024"));
        assert_eq!(extraction.records[0].provenance.kind, ProvenanceKind::Historical);
    }

    #[tokio::test]
    async fn test_fetch_without_browser_is_unsupported() {
        let ctx = SourceContext::new(crate::http::HttpClient::new(&HttpConfig::default()).unwrap());
        let finland = Finland::new();
        let resources = finland.locate(&ctx).await.unwrap();

        let err = finland.fetch(&ctx, &resources[0]).await.unwrap_err();
        assert!(matches!(err, SourceError::Unsupported(_)));
    }

    #[tokio::test]
    async fn test_fetch_reads_browser_download() {
        let csv = b"Position holder;Name of the issuer;ISIN;Net short position (%);Position date\nAcme;Nokia Oyj;FI0009000681;0,61;1.3.2024\n";
        let browser = ScriptedBrowser::default().download(CURRENT_PAGE, csv);
        let ctx = SourceContext::new(crate::http::HttpClient::new(&HttpConfig::default()).unwrap())
            .with_browser(Arc::new(browser));
        let finland = Finland::new();
        let resources = finland.locate(&ctx).await.unwrap();

        let payload = finland.fetch(&ctx, &resources[0]).await.unwrap();
        let extraction = finland.extract(&resources[0], &payload);

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].provenance.kind, ProvenanceKind::Current);
    }
}
