use super::decode_tables;
use crate::adapter::{Extraction, RawPayload, ResourceDescriptor, SourceAdapter, SourceContext};
use crate::definition::{SourceProfile, Transport};
use crate::error::Result;
use crate::extract::TableExtractor;
use crate::headers::{Field, HeaderSpec};
use async_trait::async_trait;
use shortwatch_core::{ActivityRule, CompositeRule, Provenance};

const DATASET_URL: &str =
    "https://www.data.gouv.fr/api/1/datasets/r/c2539d1c-8531-4937-9cba-3bd8e9786cc5";

const HEADERS: HeaderSpec = HeaderSpec::exact(&[
    (Field::Manager, &["Detenteur de la position courte nette"]),
    (Field::Issuer, &["Emetteur / issuer"]),
    (Field::Isin, &["code ISIN"]),
    (Field::PositionSize, &["Ratio"]),
    (Field::Date, &["Date de debut position"]),
    (Field::FallbackDate, &["Date de debut de publication position"]),
    (Field::EndDate, &["Date de fin de publication position"]),
]);

/// AMF open-data history of every declaration. The file does not say which
/// positions are still open, so activity is derived from the rows.
pub struct France {
    profile: SourceProfile,
}

impl France {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("FR", "France", "AMF", Transport::StaticFile)
                .with_rule(ActivityRule::Composite(CompositeRule::default())),
        }
    }
}

impl Default for France {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SourceAdapter for France {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn locate(&self, _ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>> {
        Ok(vec![ResourceDescriptor::new(
            "dataset",
            DATASET_URL,
            Provenance::mixed("file:mixed"),
        )])
    }

    fn extract(&self, resource: &ResourceDescriptor, payload: &RawPayload) -> Extraction {
        let tables = match decode_tables(&self.profile, payload, &resource.label, Some(b';')) {
            Ok(tables) => tables,
            Err(layout) => return layout,
        };

        let extractor = TableExtractor::new(&HEADERS);
        let mut extraction = Extraction::default();
        for table in &tables {
            let mut part = extractor.extract(
                table,
                &self.profile.code,
                &resource.provenance,
                &payload.source_url,
            );
            let before = part.records.len();
            part.records.retain(|record| !record.isin.is_blank());
            part.dropped += before - part.records.len();
            extraction.merge(part);
        }

        if extraction.dropped > 0 {
            tracing::debug!(count = extraction.dropped, "Dropped rows without ISIN");
        }
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortwatch_core::RawValue;

    const CSV: &str = "Detenteur de la position courte nette;Emetteur / issuer;code ISIN;Ratio;Date de debut position;Date de debut de publication position;Date de fin de publication position\n\
Acme Capital;Foo SA;FR0000120271;0,62;2024-03-01;2024-03-04;\n\
Acme Capital;Foo SA;FR0000120271;0,48;;2024-02-02;2024-03-04\n\
Bar Fund;Unlisted;;0,70;2024-03-01;2024-03-04;\n";

    #[test]
    fn test_extract_drops_rows_without_isin() {
        let resource = ResourceDescriptor::new("dataset", DATASET_URL, Provenance::mixed("file:mixed"));
        let payload = RawPayload::bytes(DATASET_URL, None, CSV.as_bytes().to_vec());

        let extraction = France::new().extract(&resource, &payload);

        assert_eq!(extraction.records.len(), 2);
        assert_eq!(extraction.dropped, 1);
        assert_eq!(extraction.records[1].date, RawValue::from("2024-02-02"));
        assert_eq!(extraction.records[1].end_date, RawValue::from("2024-03-04"));
        assert_eq!(extraction.records[0].end_date, RawValue::Empty);
    }

    #[test]
    fn test_profile_uses_composite_rule() {
        let france = France::new();
        assert!(matches!(france.profile().activity_rule, ActivityRule::Composite(_)));
    }
}
