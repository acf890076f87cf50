//! Retrieval flows shared by several sources.

use crate::adapter::{RawPayload, SourceContext};
use crate::error::{Result, SourceError};
use crate::http::HttpClient;
use crate::retry::with_retry;
use crate::tabular::find_links;
use shortwatch_browser::{BrowserActions, PageLink};
use std::time::Duration;

/// Consent button labels seen on regulator sites, matched exactly.
pub const CONSENT_LABELS: &[&str] = &[
    "accept all",
    "accept all cookies",
    "accept",
    "allow all",
    "i accept",
    "godkänn",
    "godkänn alla",
    "hyväksy kaikki",
    "accepter",
    "ok",
];

/// Plain download of one URL.
pub async fn download(http: &HttpClient, url: &str, timeout: Option<Duration>) -> Result<RawPayload> {
    let response = match timeout {
        Some(timeout) => http.get_with_timeout(url, timeout).await?,
        None => http.get(url).await?,
    };
    Ok(RawPayload::bytes(response.url, response.content_type, response.bytes))
}

/// Rules for picking a generated download link on a page.
#[derive(Debug, Clone, Copy)]
pub struct LinkMatcher {
    /// Anchor texts tried first, case-insensitive substring match
    pub texts: &'static [&'static str],
    /// Fragments of the `href` tried when no text matches
    pub href_fragments: &'static [&'static str],
}

impl LinkMatcher {
    /// Pick the best link: text matches win over href matches.
    #[must_use]
    pub fn pick<'a>(&self, links: &'a [PageLink]) -> Option<&'a PageLink> {
        let by_text = self.texts.iter().find_map(|label| {
            let label = label.to_lowercase();
            links.iter().find(|link| link.text.to_lowercase().contains(&label))
        });
        by_text.or_else(|| {
            self.href_fragments.iter().find_map(|fragment| {
                let fragment = fragment.to_lowercase();
                links.iter().find(|link| link.href.to_lowercase().contains(&fragment))
            })
        })
    }
}

/// Two-step session flow: load `page_url`, find the generated link and fetch
/// it with the same cookie session.
///
/// `fallback_url` is fetched when the page carries no matching link.
pub async fn download_linked(
    http: &HttpClient,
    page_url: &str,
    matcher: &LinkMatcher,
    fallback_url: Option<&str>,
) -> Result<RawPayload> {
    let page = http.get(page_url).await?;
    let html = page.text_lossy();
    let links = find_links(&html, &page.url);

    let target = match matcher.pick(&links) {
        Some(link) => {
            tracing::debug!(page = %page_url, link = %link.href, "Found download link");
            link.href.clone()
        }
        None => match fallback_url {
            Some(url) => {
                tracing::warn!(page = %page_url, "No download link found, trying {}", url);
                url.to_string()
            }
            None => {
                return Err(SourceError::NotFound(format!(
                    "no download link on {page_url}"
                )))
            }
        },
    };

    download(http, &target, Some(http.long_timeout())).await
}

/// Close a finished tab. Failures are logged, the caller's result stands.
pub(crate) async fn close_session(session: &dyn BrowserActions) {
    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close browser tab: {}", e);
    }
}

async fn export_in(
    session: &dyn BrowserActions,
    page_url: &str,
    export_labels: &[&str],
) -> Result<RawPayload> {
    session.navigate(page_url).await?;
    session.dismiss_consent(CONSENT_LABELS).await?;

    let file = session.download_after_click(export_labels).await?;
    tracing::info!(
        page = %page_url,
        file = %file.file_name,
        size = file.bytes.len(),
        "Downloaded export"
    );
    Ok(RawPayload::bytes(page_url, None, file.bytes))
}

async fn export_once(
    ctx: &SourceContext,
    page_url: &str,
    export_labels: &[&str],
) -> Result<RawPayload> {
    let session = ctx.browser()?.open_session().await?;
    let result = export_in(session.as_ref(), page_url, export_labels).await;
    close_session(session.as_ref()).await;
    result
}

/// Browser export flow: render the page, dismiss consent, click the export
/// control and read the downloaded file.
///
/// Each attempt runs in a fresh tab, closed whatever the outcome.
pub async fn browser_export(
    ctx: &SourceContext,
    page_url: &str,
    export_labels: &[&str],
) -> Result<RawPayload> {
    let policy = ctx.http.retry_policy();
    with_retry(&policy, page_url, || export_once(ctx, page_url, export_labels)).await
}

async fn links_in(session: &dyn BrowserActions, page_url: &str) -> Result<Vec<PageLink>> {
    session.navigate(page_url).await?;
    session.dismiss_consent(CONSENT_LABELS).await?;
    Ok(session.links().await?)
}

async fn links_once(ctx: &SourceContext, page_url: &str) -> Result<Vec<PageLink>> {
    let session = ctx.browser()?.open_session().await?;
    let result = links_in(session.as_ref(), page_url).await;
    close_session(session.as_ref()).await;
    result
}

/// Render a page in the browser and return its links.
pub async fn browser_links(ctx: &SourceContext, page_url: &str) -> Result<Vec<PageLink>> {
    let policy = ctx.http.retry_policy();
    with_retry(&policy, page_url, || links_once(ctx, page_url)).await
}
