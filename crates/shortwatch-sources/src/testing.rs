//! Scripted browser used by adapter tests.

use async_trait::async_trait;
use shortwatch_browser::{
    BrowserActions, BrowserError, BrowserLauncher, DownloadedFile, PageLink, Result,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serves canned HTML, links and a download per URL.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBrowser {
    pages: HashMap<String, String>,
    links: HashMap<String, Vec<PageLink>>,
    downloads: HashMap<String, Vec<u8>>,
    visited: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<HashMap<String, usize>>>,
    tabs: Arc<Mutex<TabCount>>,
}

/// Tabs opened and closed over the browser's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TabCount {
    pub opened: usize,
    pub closed: usize,
}

impl ScriptedBrowser {
    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn links(mut self, url: &str, links: &[(&str, &str)]) -> Self {
        let links = links
            .iter()
            .map(|(text, href)| PageLink {
                text: (*text).to_string(),
                href: (*href).to_string(),
            })
            .collect();
        self.links.insert(url.to_string(), links);
        self
    }

    pub fn download(mut self, url: &str, bytes: &[u8]) -> Self {
        self.downloads.insert(url.to_string(), bytes.to_vec());
        self
    }

    /// Fail the next `times` navigations to `url` before serving it.
    pub fn fail_first(self, url: &str, times: usize) -> Self {
        self.failures.lock().unwrap().insert(url.to_string(), times);
        self
    }

    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().unwrap().clone()
    }

    pub fn tabs(&self) -> TabCount {
        *self.tabs.lock().unwrap()
    }
}

#[async_trait]
impl BrowserLauncher for ScriptedBrowser {
    async fn open_session(&self) -> Result<Box<dyn BrowserActions>> {
        self.tabs.lock().unwrap().opened += 1;
        Ok(Box::new(ScriptedSession {
            browser: self.clone(),
            current: Mutex::new(String::new()),
        }))
    }
}

struct ScriptedSession {
    browser: ScriptedBrowser,
    current: Mutex<String>,
}

impl ScriptedSession {
    fn current(&self) -> String {
        self.current.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrowserActions for ScriptedSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let known = self.browser.pages.contains_key(url)
            || self.browser.links.contains_key(url)
            || self.browser.downloads.contains_key(url);
        if !known {
            return Err(BrowserError::NavigationError(format!("no script for {url}")));
        }
        if let Some(remaining) = self.browser.failures.lock().unwrap().get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BrowserError::NavigationError(format!("{url} did not load")));
            }
        }
        self.browser.visited.lock().unwrap().push(url.to_string());
        *self.current.lock().unwrap() = url.to_string();
        Ok(())
    }

    async fn click(&self, _selector: &str) -> Result<()> {
        Ok(())
    }

    async fn click_by_text(&self, _labels: &[&str]) -> Result<bool> {
        Ok(true)
    }

    async fn wait_for_selector(&self, _selector: &str, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn dismiss_consent(&self, _labels: &[&str]) -> Result<bool> {
        Ok(false)
    }

    async fn page_html(&self) -> Result<String> {
        Ok(self.browser.pages.get(&self.current()).cloned().unwrap_or_default())
    }

    async fn links(&self) -> Result<Vec<PageLink>> {
        Ok(self.browser.links.get(&self.current()).cloned().unwrap_or_default())
    }

    async fn download_after_click(&self, labels: &[&str]) -> Result<DownloadedFile> {
        let bytes = self
            .browser
            .downloads
            .get(&self.current())
            .cloned()
            .ok_or_else(|| BrowserError::TextNotFound(labels.iter().map(|l| (*l).to_string()).collect()))?;
        Ok(DownloadedFile {
            path: PathBuf::from("export.csv"),
            file_name: "export.csv".to_string(),
            bytes,
        })
    }

    async fn close(&self) -> Result<()> {
        self.browser.tabs.lock().unwrap().closed += 1;
        Ok(())
    }
}
