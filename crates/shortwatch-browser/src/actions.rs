use crate::downloads::DownloadedFile;
use crate::error::{BrowserError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// An anchor found on a rendered page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    /// Visible text, whitespace-collapsed
    pub text: String,
    /// Absolute URL as resolved by the page
    pub href: String,
}

/// Browser actions for automation
#[async_trait::async_trait]
pub trait BrowserActions: Send + Sync {
    /// Navigate to a URL and wait for the load to finish
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Click an element by selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Click the first button or link whose text contains one of `labels`
    /// (case-insensitive). Returns whether something was clicked.
    async fn click_by_text(&self, labels: &[&str]) -> Result<bool>;

    /// Wait for a selector to appear
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()>;

    /// Dismiss a cookie/consent banner if one is shown.
    ///
    /// Labels are matched exactly (case-insensitive) so ordinary links are
    /// never clicked by accident.
    async fn dismiss_consent(&self, labels: &[&str]) -> Result<bool>;

    /// Current DOM serialized as HTML
    async fn page_html(&self) -> Result<String>;

    /// Every anchor on the page
    async fn links(&self) -> Result<Vec<PageLink>>;

    /// Click an element by text (as [`BrowserActions::click_by_text`]) and
    /// return the file the click caused the browser to download
    async fn download_after_click(&self, labels: &[&str]) -> Result<DownloadedFile>;

    /// Close the tab. The session must not be used afterwards.
    async fn close(&self) -> Result<()>;
}

/// Helper to extract domain from URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("Invalid URL: {}", e)))?;

    url.host_str()
        .ok_or_else(|| BrowserError::NavigationError("No host in URL".to_string()))
        .map(|s| s.to_string())
}

/// Escape a list of labels into a JSON array literal for injected scripts
pub(crate) fn labels_literal(labels: &[&str]) -> Result<String> {
    serde_json::to_string(labels).map_err(|e| BrowserError::ScriptError(e.to_string()))
}

/// Script clicking the first clickable element whose text contains a label
pub(crate) fn click_by_text_script(labels_json: &str) -> String {
    format!(
        r#"(() => {{
    const labels = {labels_json}.map(l => l.toLowerCase());
    const nodes = document.querySelectorAll('button, a, [role="button"], input[type="button"], input[type="submit"]');
    for (const node of nodes) {{
        const text = (node.innerText || node.value || '').replace(/\s+/g, ' ').trim().toLowerCase();
        if (labels.some(l => text.includes(l))) {{ node.click(); return true; }}
    }}
    return false;
}})()"#
    )
}

/// Script clicking a consent button whose text equals a label
pub(crate) fn consent_script(labels_json: &str) -> String {
    format!(
        r#"(() => {{
    const labels = {labels_json}.map(l => l.toLowerCase());
    const nodes = document.querySelectorAll('button, a, [role="button"]');
    for (const node of nodes) {{
        const text = (node.innerText || '').replace(/\s+/g, ' ').trim().toLowerCase();
        if (labels.includes(text)) {{ node.click(); return true; }}
    }}
    return false;
}})()"#
    )
}

pub(crate) const LINKS_SCRIPT: &str = r#"Array.from(document.querySelectorAll('a[href]')).map(a => ({
    text: (a.innerText || a.textContent || '').replace(/\s+/g, ' ').trim(),
    href: a.href
}))"#;
