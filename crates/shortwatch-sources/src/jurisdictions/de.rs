use super::decode_tables;
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::{Result, SourceError};
use crate::extract::TableExtractor;
use crate::flows::{download, download_linked, LinkMatcher};
use crate::headers::{Field, HeaderSpec, COMMON_KEYWORDS};
use crate::http::HttpClient;
use crate::tabular::{find_form, find_links, FormInput};
use async_trait::async_trait;
use shortwatch_core::Provenance;

const LANDING_URL: &str = "https://www.bundesanzeiger.de/pub/en/nlp?4";
const FALLBACK_CSV_URL: &str =
    "https://www.bundesanzeiger.de/pub/en/nlp?0--top~csv~form~panel-form-csv~resource~link";

const CSV_LINK: LinkMatcher = LinkMatcher {
    texts: &["Download as CSV"],
    href_fragments: &["csv"],
};

const HEADERS: HeaderSpec = HeaderSpec::with_keywords(
    &[
        (
            Field::Manager,
            &["Positionsinhaber", "Position owner", "Owner", "Manager", "Holder"],
        ),
        (Field::Issuer, &["Emittent", "Issuer", "Company", "Name of Share Issuer"]),
        (Field::Isin, &["ISIN"]),
        (
            Field::PositionSize,
            &["Position", "Position Size", "Net short position", "Short Position"],
        ),
        (Field::Date, &["Datum", "Date", "Position Date", "Publication Date"]),
    ],
    COMMON_KEYWORDS,
);

/// Form fields that ask the Bundesanzeiger filter for historical positions.
fn historical_form_fields(inputs: &[FormInput]) -> Vec<(String, String)> {
    let mut fields: Vec<(String, String)> = Vec::new();
    for input in inputs {
        let name = input.name.to_lowercase();
        if input.input_type == "checkbox" {
            if name.contains("historic") || name.contains("history") || input.checked {
                fields.push((input.name.clone(), "on".to_string()));
            }
            continue;
        }
        fields.push((input.name.clone(), input.value.clone()));
    }
    if !fields.iter().any(|(name, _)| name == "isHistorical") {
        fields.push(("isHistorical".to_string(), "on".to_string()));
    }
    fields
}

/// Bundesanzeiger register: current CSV plus a filtered historical export,
/// both bound to a server-side session.
pub struct Germany {
    profile: SourceProfile,
}

impl Germany {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("DE", "Germany", "Bundesanzeiger", Transport::Session),
        }
    }

    async fn fetch_historical(&self, http: &HttpClient) -> Result<RawPayload> {
        let landing = http.get(LANDING_URL).await?;
        let html = landing.text_lossy();
        let form = find_form(&html, &landing.url, &["filter", "nlp"])
            .ok_or_else(|| SourceError::NotFound(format!("no search form on {LANDING_URL}")))?;

        let fields = historical_form_fields(&form.inputs);
        tracing::debug!(action = %form.action, fields = fields.len(), "Submitting historical filter");
        let filtered = http.post_form(&form.action, &fields, &landing.url).await?;

        let links = find_links(&filtered.text_lossy(), &filtered.url);
        let link = CSV_LINK.pick(&links).ok_or_else(|| {
            SourceError::NotFound("no CSV link after applying the historical filter".to_string())
        })?;
        download(http, &link.href, Some(http.long_timeout())).await
    }
}

impl Default for Germany {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for Germany {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn locate(&self, _ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>> {
        Ok(vec![
            ResourceDescriptor::new("current", LANDING_URL, Provenance::current("file:current")),
            ResourceDescriptor::new(
                "historical",
                LANDING_URL,
                Provenance::historical("file:historical"),
            ),
        ])
    }

    async fn fetch(&self, ctx: &SourceContext, resource: &ResourceDescriptor) -> Result<RawPayload> {
        // Links are only valid for the cookie session that rendered them
        let http = ctx.http.new_session()?;
        if resource.label == "historical" {
            self.fetch_historical(&http).await
        } else {
            download_linked(&http, &resource.url, &CSV_LINK, Some(FALLBACK_CSV_URL)).await
        }
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
    use shortwatch_core::{ProvenanceKind, RawValue};

    fn input(name: &str, value: &str, input_type: &str, checked: bool) -> FormInput {
        FormInput {
            name: name.to_string(),
            value: value.to_string(),
            input_type: input_type.to_string(),
            checked,
        }
    }

    #[test]
    fn test_historical_form_fields() {
        let fields = historical_form_fields(&[
            input("id1_hf_0", "", "hidden", false),
            input("fulltext", "", "text", false),
            input("showHistoric", "1", "checkbox", false),
            input("onlyActive", "1", "checkbox", false),
            input("sort", "date", "checkbox", true),
            input("period", "all", "select", false),
        ]);

        assert!(fields.contains(&("showHistoric".to_string(), "on".to_string())));
        assert!(fields.contains(&("sort".to_string(), "on".to_string())));
        assert!(fields.contains(&("period".to_string(), "all".to_string())));
        assert!(fields.contains(&("isHistorical".to_string(), "on".to_string())));
        assert!(!fields.iter().any(|(name, _)| name == "onlyActive"));
    }

    #[test]
    fn test_extract_comma_separated_export() {
        let csv = "Positionsinhaber,Emittent,ISIN,Position,Datum\n\
\"Acme Capital LLP\",\"Foo AG\",DE0007164600,\"0,52\",2024-03-01\n";
        let adapter = Germany::new();
        let resource = ResourceDescriptor::new("historical", LANDING_URL, Provenance::historical("file:historical"));
        let payload = RawPayload::bytes(FALLBACK_CSV_URL, Some("text/csv".to_string()), csv.as_bytes().to_vec());

        let extraction = adapter.extract(&resource, &payload);

        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].company_name, RawValue::from("Foo AG"));
        assert_eq!(extraction.records[0].position_size, RawValue::from("0,52"));
        assert_eq!(extraction.records[0].provenance.kind, ProvenanceKind::Historical);
    }
}
