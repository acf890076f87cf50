use crate::adapter::{
    Extraction, FetchedPage, PayloadBody, RawPayload, ResourceDescriptor, SourceAdapter,
    SourceContext,
};
use crate::definition::{SourceProfile, Transport};
use crate::error::{Result, SourceError};
use crate::flows::{close_session, CONSENT_LABELS};
use crate::retry::with_retry;
use crate::tabular::{parse_html_tables, resolve_url, HtmlTable};
use async_trait::async_trait;
use shortwatch_browser::BrowserActions;
use shortwatch_core::{JurisdictionCode, Provenance, RawExtractedRecord, RawValue};
use std::time::Duration;

const OVERVIEW_URL: &str = "https://ssr.finanstilsynet.no/";

const TABLE_WAIT: Duration = Duration::from_secs(20);

const TOTAL_LABELS: [&str; 3] = ["SUM", "TOTAL", "SUMMARY"];

/// Finanstilsynet short sale register: an overview of issuers, each linking
/// to a page with active and historic position tables.
pub struct Norway {
    profile: SourceProfile,
}

impl Norway {
    /// Adapter with the built-in profile.
    #[must_use]
    pub fn new() -> Self {
        Self {
            profile: SourceProfile::builtin("NO", "Norway", "Finanstilsynet", Transport::Browser),
        }
    }
}

impl Default for Norway {
    fn default() -> Self {
        Self::new()
    }
}

/// Issuer rows of the overview table: ISIN, issuer name and detail URL.
fn overview_entries(html: &str, base_url: &str) -> Vec<(String, String, String)> {
    let Some(table) = parse_html_tables(html).into_iter().next() else {
        return Vec::new();
    };
    table
        .rows
        .iter()
        .skip(1)
        .filter_map(|row| {
            let isin = row.cells.first()?.clone();
            let issuer = row.cells.get(1)?.clone();
            let href = row.links.first()?;
            let url = resolve_url(base_url, href)?;
            Some((isin, issuer, url))
        })
        .collect()
}

fn section_provenance(table: &HtmlTable) -> Option<Provenance> {
    let heading = table.heading.to_lowercase();
    if heading.contains("historic") {
        Some(Provenance::historical("section:historical"))
    } else if heading.contains("active") {
        Some(Provenance::current("section:active"))
    } else {
        None
    }
}

fn page_records(
    code: &JurisdictionCode,
    page: &FetchedPage,
) -> Vec<RawExtractedRecord> {
    let mut records = Vec::new();
    for table in parse_html_tables(&page.html) {
        let Some(provenance) = section_provenance(&table) else {
            continue;
        };
        for row in table.rows.iter().skip(1) {
            if row.cells.len() < 4 {
                continue;
            }
            let holder = row.cells[0].trim();
            if TOTAL_LABELS.contains(&holder.to_uppercase().as_str()) {
                continue;
            }
            let mut record = RawExtractedRecord::new(code.clone(), provenance.clone());
            record.manager_name = RawValue::text(holder);
            record.company_name = page.issuer.clone().map(RawValue::text).unwrap_or_default();
            record.isin = page.isin.clone().map(RawValue::text).unwrap_or_default();
            record.position_size = RawValue::text(row.cells[2].as_str());
            record.date = RawValue::text(row.cells[3].as_str());
            record.source_url = Some(page.url.clone());
            records.push(record);
        }
    }
    records
}

async fn render(session: &dyn BrowserActions, url: &str) -> Result<String> {
    session.navigate(url).await?;
    session.wait_for_selector("table", TABLE_WAIT).await?;
    Ok(session.page_html().await?)
}

/// Walk the overview and every issuer page in one tab. Issuer pages that
/// fail to render are listed in the payload's skipped URLs.
async fn crawl(session: &dyn BrowserActions, overview_url: &str) -> Result<RawPayload> {
    session.navigate(overview_url).await?;
    session.dismiss_consent(CONSENT_LABELS).await?;
    session.wait_for_selector("table", TABLE_WAIT).await?;
    let overview = session.page_html().await?;

    let entries = overview_entries(&overview, overview_url);
    if entries.is_empty() {
        return Err(SourceError::Layout(format!("no issuer links on {overview_url}")));
    }
    tracing::info!(issuers = entries.len(), "Visiting issuer pages");

    let mut pages = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();
    for (isin, issuer, url) in entries {
        match render(session, &url).await {
            Ok(html) => pages.push(FetchedPage {
                url,
                html,
                issuer: Some(issuer),
                isin: Some(isin),
            }),
            Err(e) => {
                tracing::warn!(url = %url, issuer = %issuer, "Skipping issuer page: {}", e);
                skipped.push(url);
            }
        }
    }

    Ok(RawPayload::pages(overview_url, pages).with_skipped(skipped))
}

async fn crawl_once(ctx: &SourceContext, overview_url: &str) -> Result<RawPayload> {
    let session = ctx.browser()?.open_session().await?;
    let result = crawl(session.as_ref(), overview_url).await;
    close_session(session.as_ref()).await;
    result
}

#[async_trait]
impl SourceAdapter for Norway {
    fn profile(&self) -> &SourceProfile {
        &self.profile
    }

    async fn locate(&self, _ctx: &SourceContext) -> Result<Vec<ResourceDescriptor>> {
        Ok(vec![ResourceDescriptor::new(
            "register",
            OVERVIEW_URL,
            Provenance::mixed("section"),
        )])
    }

    async fn fetch(&self, ctx: &SourceContext, resource: &ResourceDescriptor) -> Result<RawPayload> {
        let policy = ctx.http.retry_policy();
        with_retry(&policy, &resource.url, || crawl_once(ctx, &resource.url)).await
    }

    fn extract(&self, resource: &ResourceDescriptor, payload: &RawPayload) -> Extraction {
        let PayloadBody::Pages(pages) = &payload.body else {
            return Extraction::layout(format!("{}: expected rendered pages", resource.label));
        };

        let records: Vec<RawExtractedRecord> = pages
            .iter()
            .flat_map(|page| page_records(&self.profile.code, page))
            .collect();
        tracing::debug!(pages = pages.len(), count = records.len(), "Extracted issuer pages");

        let mut extraction = Extraction::from_records(records);
        extraction
            .layout_issues
            .extend(payload.skipped.iter().map(|url| format!("issuer page not rendered: {url}")));
        extraction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpClient;
    use crate::retry::RetryPolicy;
    use crate::testing::{ScriptedBrowser, TabCount};
    use shortwatch_core::{HttpConfig, ProvenanceKind};
    use std::sync::Arc;

    const OVERVIEW: &str = r#"<html><body><table>
        <tr><th>ISIN</th><th>Issuer</th><th>Net short</th></tr>
        <tr><td>NO0010096985</td><td><a href="/en/Instrument/NO0010096985">Equinor ASA</a></td><td>1.2</td></tr>
        <tr><td>NO0003054108</td><td><a href="/en/Instrument/NO0003054108">Mowi ASA</a></td><td>0.9</td></tr>
    </table></body></html>"#;

    const DETAIL: &str = r#"<html><body>
        <h2>Active positions</h2>
        <table>
          <tr><th>Position holder</th><th>Country</th><th>Short %</th><th>Date</th></tr>
          <tr><td>Acme Capital</td><td>GB</td><td>0,62</td><td>01.03.2024</td></tr>
          <tr><td>SUM</td><td></td><td>0,62</td><td></td></tr>
        </table>
        <h2>Historic positions</h2>
        <table>
          <tr><th>Position holder</th><th>Country</th><th>Short %</th><th>Date</th></tr>
          <tr><td>Acme Capital</td><td>GB</td><td>0,41</td><td>01.02.2024</td></tr>
        </table>
    </body></html>"#;

    #[test]
    fn test_overview_entries() {
        let entries = overview_entries(OVERVIEW, OVERVIEW_URL);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "NO0010096985");
        assert_eq!(entries[0].1, "Equinor ASA");
        assert_eq!(entries[0].2, "https://ssr.finanstilsynet.no/en/Instrument/NO0010096985");
    }

    #[tokio::test]
    async fn test_fetch_visits_issuer_pages_and_skips_failures() {
        // Mowi has no scripted page, so navigation fails and it is skipped
        let browser = ScriptedBrowser::default()
            .page(OVERVIEW_URL, OVERVIEW)
            .page("https://ssr.finanstilsynet.no/en/Instrument/NO0010096985", DETAIL);
        let ctx = SourceContext::new(HttpClient::new(&HttpConfig::default()).unwrap())
            .with_browser(Arc::new(browser.clone()));

        let norway = Norway::new();
        let resource = norway.locate(&ctx).await.unwrap().remove(0);
        let payload = norway.fetch(&ctx, &resource).await.unwrap();
        let extraction = norway.extract(&resource, &payload);

        assert_eq!(browser.visited().len(), 2);
        assert_eq!(extraction.records.len(), 2);
        assert_eq!(
            payload.skipped,
            vec!["https://ssr.finanstilsynet.no/en/Instrument/NO0003054108".to_string()]
        );
        assert!(extraction.is_degraded());
        assert_eq!(
            extraction.layout_issues,
            vec!["issuer page not rendered: https://ssr.finanstilsynet.no/en/Instrument/NO0003054108".to_string()]
        );
        assert_eq!(browser.tabs(), TabCount { opened: 1, closed: 1 });

        let active = &extraction.records[0];
        assert_eq!(active.provenance.kind, ProvenanceKind::Current);
        assert_eq!(active.provenance.label, "section:active");
        assert_eq!(active.company_name, RawValue::from("Equinor ASA"));
        assert_eq!(active.isin, RawValue::from("NO0010096985"));
        assert_eq!(active.position_size, RawValue::from("0,62"));
        assert_eq!(active.date, RawValue::from("01.03.2024"));

        assert_eq!(extraction.records[1].provenance.kind, ProvenanceKind::Historical);
    }

    #[tokio::test]
    async fn test_fetch_retries_overview_in_new_tab() {
        let browser = ScriptedBrowser::default()
            .page(OVERVIEW_URL, OVERVIEW)
            .page("https://ssr.finanstilsynet.no/en/Instrument/NO0010096985", DETAIL)
            .page("https://ssr.finanstilsynet.no/en/Instrument/NO0003054108", DETAIL)
            .fail_first(OVERVIEW_URL, 1);
        let http = HttpClient::with_policy(&HttpConfig::default(), RetryPolicy::immediate(2)).unwrap();
        let ctx = SourceContext::new(http).with_browser(Arc::new(browser.clone()));

        let norway = Norway::new();
        let resource = norway.locate(&ctx).await.unwrap().remove(0);
        let payload = norway.fetch(&ctx, &resource).await.unwrap();
        let extraction = norway.extract(&resource, &payload);

        assert!(payload.skipped.is_empty());
        assert!(!extraction.is_degraded());
        assert_eq!(extraction.records.len(), 4);
        assert_eq!(browser.tabs(), TabCount { opened: 2, closed: 2 });
    }

    #[test]
    fn test_file_payload_is_layout_issue() {
        let norway = Norway::new();
        let resource = ResourceDescriptor::new("register", OVERVIEW_URL, Provenance::mixed("section"));
        let payload = RawPayload::bytes(OVERVIEW_URL, None, b"x".to_vec());
        assert!(norway.extract(&resource, &payload).is_degraded());
    }
}
