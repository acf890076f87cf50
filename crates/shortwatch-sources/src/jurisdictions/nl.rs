use super::decode_tables;
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::Result;
use crate::extract::TableExtractor;
use crate::flows::{download_linked, LinkMatcher};
use crate::headers::{Field, HeaderSpec, COMMON_KEYWORDS};
use async_trait::async_trait;
use shortwatch_core::Provenance;

const CURRENT_PAGE: &str =
    "https://www.afm.nl/en/sector/registers/meldingenregisters/netto-shortposities-actueel";
const HISTORICAL_PAGE: &str =
    "https://www.afm.nl/en/sector/registers/meldingenregisters/netto-shortposities-historie";

const EXPORT_LINK: LinkMatcher = LinkMatcher {
    texts: &["Export as CSV", "Exporteer als CSV"],
    href_fragments: &["csv"],
};

const HEADERS: HeaderSpec = HeaderSpec::with_keywords(
    &[
        (
            Field::Manager,
            &["Position holder", "Positie houder", "Position Owner", "Holder"],
        ),
        (
            Field::Issuer,
            &["Name of the issuer", "Name of share issuer", "Naam van de emittent", "Issuer", "Company"],
        ),
        (Field::Isin, &["ISIN"]),
        (
            Field::PositionSize,
            &["Net short position", "Netto Shortpositie", "Short position", "Position"],
        ),
        (Field::Date, &["Position date", "Positiedatum", "Date", "Datum"]),
    ],
    COMMON_KEYWORDS,
);

/// AFM registers of current and historical net short positions.
pub struct Netherlands {
    profile: SourceProfile,
}

impl Netherlands {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("NL", "Netherlands", "AFM", Transport::Session),
        }
    }

    fn extract_with(&self, resource: &ResourceDescriptor, payload: &RawPayload, delimiter: u8) -> Extraction {
        let tables = match decode_tables(&self.profile, payload, &resource.label, Some(delimiter)) {
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

impl Default for Netherlands {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for Netherlands {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn locate(&self, _ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>> {
        Ok(vec![
            ResourceDescriptor::new("current", CURRENT_PAGE, Provenance::current("file:current")),
            ResourceDescriptor::new(
                "historical",
                HISTORICAL_PAGE,
                Provenance::historical("file:historical"),
            ),
        ])
    }

    async fn fetch(&self, ctx: &SourceContext, resource: &ResourceDescriptor) -> Result<RawPayload> {
        let http = ctx.http.new_session()?;
        download_linked(&http, &resource.url, &EXPORT_LINK, None).await
    }

    // Exports are semicolon separated; older ones used commas.
    fn extract(&self, resource: &ResourceDescriptor, payload: &RawPayload) -> Extraction {
        let extraction = self.extract_with(resource, payload, b';');
        if extraction.layout_issues.is_empty() {
            return extraction;
        }
        tracing::debug!(resource = %resource.label, "Retrying with comma delimiter");
        self.extract_with(resource, payload, b',')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortwatch_core::{ProvenanceKind, RawValue};

    fn resource() -> ResourceDescriptor {
        ResourceDescriptor::new("current", CURRENT_PAGE, Provenance::current("file:current"))
    }

    #[test]
    fn test_semicolon_export() {
        let csv = "Position holder;Name of the issuer;ISIN;Net short position;Position date\n\
Acme Capital;Foo N.V.;NL0010273215;0,55;2024-03-01\n";
        let payload = RawPayload::bytes(CURRENT_PAGE, None, csv.as_bytes().to_vec());

        let extraction = Netherlands::new().extract(&resource(), &payload);

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].position_size, RawValue::from("0,55"));
        assert_eq!(extraction.records[0].provenance.kind, ProvenanceKind::Current);
    }

    #[test]
    fn test_comma_export_retried() {
        let csv = "Position holder,Name of the issuer,ISIN,Net short position,Position date\n\
Acme Capital,Foo N.V.,NL0010273215,0.55,2024-03-01\n";
        let payload = RawPayload::bytes(CURRENT_PAGE, None, csv.as_bytes().to_vec());

        let extraction = Netherlands::new().extract(&resource(), &payload);

        assert_eq!(extraction.records.len(), 1);
        assert!(extraction.layout_issues.is_empty());
        assert_eq!(extraction.records[0].isin, RawValue::from("NL0010273215"));
    }
}
