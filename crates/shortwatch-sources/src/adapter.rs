//! The source adapter contract.
//!
//! Each jurisdiction implements [`SourceAdapter`] in three steps:
//! `locate` lists the resources to read, `fetch` retrieves one resource and
//! `extract` turns its payload into raw records. Fetch errors propagate;
//! extraction never fails and reports layout trouble through
//! [`Extraction::layout_issues`] instead.

use crate::definition::SourceProfile;
use crate::error::{Result, SourceError};
use crate::http::HttpClient;
use crate::tabular::{is_workbook, parse_delimited, parse_workbook, Table};
use async_trait::async_trait;
use shortwatch_browser::BrowserLauncher;
use shortwatch_core::{JurisdictionCode, Provenance, RawExtractedRecord};
use std::sync::Arc;

/// Shared retrieval handles passed to adapters.
#[derive(Clone)]
pub struct SourceContext {
    /// HTTP client; adapters needing an isolated cookie session call
    /// [`HttpClient::new_session`]
    pub http: HttpClient,
    browser: Option<Arc<dyn BrowserLauncher>>,
}

impl SourceContext {
    /// Context without browser automation.
    #[must_use]
    pub fn new(http: HttpClient) -> Self {
        Self { http, browser: None }
    }

    /// Attach a browser launcher.
    #[must_use]
    pub fn with_browser(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.browser = Some(launcher);
        self
    }

    /// The browser launcher, or [`SourceError::Unsupported`] when disabled.
    pub fn browser(&self) -> Result<&dyn BrowserLauncher> {
        self.browser
            .as_deref()
            .ok_or_else(|| SourceError::Unsupported("browser automation is disabled".to_string()))
    }

    /// Whether a browser launcher is attached.
    #[must_use]
    pub fn has_browser(&self) -> bool {
        self.browser.is_some()
    }
}

impl std::fmt::Debug for SourceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceContext")
            .field("http", &self.http)
            .field("browser", &self.browser.is_some())
            .finish()
    }
}

/// One resource a source publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Short name used in logs and audit messages (`current`, `historical`)
    pub label: String,
    /// Entry URL
    pub url: String,
    /// Provenance applied to records from this resource
    pub provenance: Provenance,
}

impl ResourceDescriptor {
    /// Describe a resource.
    #[must_use]
    pub fn new(label: impl Into<String>, url: impl Into<String>, provenance: Provenance) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
            provenance,
        }
    }
}

/// A page fetched as part of a multi-page resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Page URL
    pub url: String,
    /// Rendered HTML
    pub html: String,
    /// Issuer name known from the page that linked here
    pub issuer: Option<String>,
    /// ISIN known from the page that linked here
    pub isin: Option<String>,
}

/// Body of a fetched resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayloadBody {
    /// A downloaded file
    Bytes(Vec<u8>),
    /// Several rendered pages
    Pages(Vec<FetchedPage>),
}

/// A fetched resource, ready for extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPayload {
    /// URL the content was finally read from
    pub source_url: String,
    /// `Content-Type` if known
    pub content_type: Option<String>,
    /// Content
    pub body: PayloadBody,
    /// Parts of the resource that could not be fetched
    pub skipped: Vec<String>,
}

impl RawPayload {
    /// A downloaded file.
    #[must_use]
    pub fn bytes(source_url: impl Into<String>, content_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self {
            source_url: source_url.into(),
            content_type,
            body: PayloadBody::Bytes(bytes),
            skipped: Vec::new(),
        }
    }

    /// A set of rendered pages.
    #[must_use]
    pub fn pages(source_url: impl Into<String>, pages: Vec<FetchedPage>) -> Self {
        Self {
            source_url: source_url.into(),
            content_type: Some("text/html".to_string()),
            body: PayloadBody::Pages(pages),
            skipped: Vec::new(),
        }
    }

    /// Record the URLs that were given up on while fetching.
    #[must_use]
    pub fn with_skipped(mut self, skipped: Vec<String>) -> Self {
        self.skipped = skipped;
        self
    }

    /// File content, if this payload is a file.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match &self.body {
            PayloadBody::Bytes(bytes) => Some(bytes),
            PayloadBody::Pages(_) => None,
        }
    }

    /// Decode a file payload into tables: workbooks yield one table per
    /// sheet, anything else is read as delimited text.
    pub fn tables(&self, name: &str, delimiter: Option<u8>) -> Result<Vec<Table>> {
        let bytes = self
            .as_bytes()
            .ok_or_else(|| SourceError::Parse(format!("{name}: expected a file, got pages")))?;
        if is_workbook(bytes) {
            parse_workbook(bytes)
        } else {
            parse_delimited(bytes, delimiter, name).map(|table| vec![table])
        }
    }
}

/// Records read from one payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Raw records in source order
    pub records: Vec<RawExtractedRecord>,
    /// Rows discarded by source-specific rules
    pub dropped: usize,
    /// Resource-level layout problems (no header found, sheet missing)
    pub layout_issues: Vec<String>,
}

impl Extraction {
    /// An extraction with records and nothing dropped.
    #[must_use]
    pub fn from_records(records: Vec<RawExtractedRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// An empty extraction carrying one layout problem.
    #[must_use]
    pub fn layout(issue: impl Into<String>) -> Self {
        Self {
            layout_issues: vec![issue.into()],
            ..Self::default()
        }
    }

    /// Append another extraction.
    pub fn merge(&mut self, other: Extraction) {
        self.records.extend(other.records);
        self.dropped += other.dropped;
        self.layout_issues.extend(other.layout_issues);
    }

    /// Whether any layout problem was reported.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        !self.layout_issues.is_empty()
    }
}

/// A jurisdiction's retrieval and extraction strategy.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Static description of the source.
    fn profile(&self) -> &SourceProfile;

    /// Jurisdiction code.
    fn code(&self) -> &JurisdictionCode {
        &self.profile().code
    }

    /// Resources to read in this run.
    async fn locate(&self, ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>>;

    /// Retrieve one resource. The default downloads `resource.url`.
    async fn fetch(&self, ctx: &SourceContext, resource: &ResourceDescriptor) -> Result<RawPayload> {
        crate::flows::download(&ctx.http, &resource.url, None).await
    }

    /// Turn a payload into raw records.
    fn extract(&self, resource: &ResourceDescriptor, payload: &RawPayload) -> Extraction;
}

#[cfg(test)]
mod tests {
    use super::*;
    use shortwatch_core::{HttpConfig, RawValue};

    fn record() -> RawExtractedRecord {
        let mut record = RawExtractedRecord::new(
            JurisdictionCode::new("BE").unwrap(),
            Provenance::current("file:current"),
        );
        record.manager_name = RawValue::from("Acme");
        record
    }

    #[test]
    fn test_extraction_merge() {
        let mut total = Extraction::from_records(vec![record()]);
        total.merge(Extraction::layout("historical: no header"));
        total.merge(Extraction {
            records: vec![record()],
            dropped: 2,
            layout_issues: vec![],
        });

        assert_eq!(total.records.len(), 2);
        assert_eq!(total.dropped, 2);
        assert!(total.is_degraded());
    }

    #[test]
    fn test_payload_tables_csv() {
        let payload = RawPayload::bytes("https://x", None, b"a;b\n1;2\n".to_vec());
        let tables = payload.tables("x", None).unwrap();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].row_text(1), vec!["1", "2"]);

        let pages = RawPayload::pages("https://x", vec![]);
        assert!(pages.tables("x", None).is_err());
    }

    #[test]
    fn test_context_without_browser() {
        let ctx = SourceContext::new(HttpClient::new(&HttpConfig::default()).unwrap());
        assert!(!ctx.has_browser());
        assert!(matches!(ctx.browser(), Err(SourceError::Unsupported(_))));
    }
}
