use crate::actions::{
    click_by_text_script, consent_script, extract_domain, labels_literal, BrowserActions, PageLink,
    LINKS_SCRIPT,
};
use crate::downloads::{DownloadDir, DownloadedFile};
use crate::error::{BrowserError, Result};
use crate::fingerprint::FingerprintConfig;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::Page;
use futures_util::stream::StreamExt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Minimum spacing between navigations to the same domain
#[derive(Debug)]
struct PolitenessLimiter {
    last_access: HashMap<String, Instant>,
    min_delay: Duration,
}

impl PolitenessLimiter {
    fn new(min_delay: Duration) -> Self {
        Self {
            last_access: HashMap::new(),
            min_delay,
        }
    }

    /// Reserve the next slot for `domain` and return how long to wait for it
    fn reserve(&mut self, domain: &str, now: Instant) -> Duration {
        let slot = match self.last_access.get(domain) {
            Some(last) => (*last + self.min_delay).max(now),
            None => now,
        };
        self.last_access.insert(domain.to_string(), slot);
        slot.saturating_duration_since(now)
    }
}

/// Launch settings for the browser engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub navigation_timeout: Duration,
    pub download_timeout: Duration,
    pub chrome_executable: Option<PathBuf>,
    pub min_domain_delay: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from_config(&shortwatch_core::BrowserConfig::default())
    }
}

impl EngineSettings {
    pub fn from_config(config: &shortwatch_core::BrowserConfig) -> Self {
        Self {
            headless: config.headless,
            window_width: config.window_width,
            window_height: config.window_height,
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
            download_timeout: Duration::from_secs(config.download_timeout_secs),
            chrome_executable: config.chrome_executable.clone(),
            min_domain_delay: Duration::from_secs(1),
        }
    }
}

/// Something that can open browser sessions.
///
/// Sources receive this instead of a concrete engine so that flows can be
/// driven by a scripted session in tests.
#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn open_session(&self) -> Result<Box<dyn BrowserActions>>;
}

/// Browser automation engine
pub struct BrowserEngine {
    browser: Browser,
    handler_task: JoinHandle<()>,
    fingerprint: FingerprintConfig,
    settings: EngineSettings,
    downloads: Arc<DownloadDir>,
    limiter: Arc<Mutex<PolitenessLimiter>>,
}

impl BrowserEngine {
    /// Launch a browser with default settings and a randomized fingerprint
    pub async fn new() -> Result<Self> {
        Self::launch(EngineSettings::default(), FingerprintConfig::randomized()).await
    }

    /// Launch a browser with explicit settings
    pub async fn launch(settings: EngineSettings, fingerprint: FingerprintConfig) -> Result<Self> {
        let downloads = DownloadDir::new()?;

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(settings.window_width, settings.window_height)
            .request_timeout(settings.navigation_timeout)
            .arg("--disable-blink-features=AutomationControlled")
            .arg(format!("--user-agent={}", fingerprint.user_agent));
        if !settings.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder.build().map_err(BrowserError::ChromiumError)?;

        let (browser, mut handler) = Browser::launch(config).await?;

        // Spawn browser handler
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                let _ = event;
            }
        });

        let download_behavior = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(downloads.path().to_string_lossy().into_owned())
            .build()
            .map_err(BrowserError::ChromiumError)?;
        browser.execute(download_behavior).await?;

        tracing::info!(
            headless = settings.headless,
            downloads = %downloads.path().display(),
            "Browser launched"
        );

        Ok(Self {
            browser,
            handler_task,
            limiter: Arc::new(Mutex::new(PolitenessLimiter::new(settings.min_domain_delay))),
            fingerprint,
            settings,
            downloads: Arc::new(downloads),
        })
    }

    /// Open a fresh tab sharing this engine's download directory
    pub async fn new_session(&self) -> Result<BrowserSession> {
        let page = self.browser.new_page("about:blank").await?;

        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(self.fingerprint.user_agent.clone())
            .accept_language(self.fingerprint.accept_language.clone())
            .build()
            .map_err(BrowserError::ChromiumError)?;
        page.set_user_agent(user_agent).await?;

        Ok(BrowserSession {
            page,
            downloads: Arc::clone(&self.downloads),
            limiter: Arc::clone(&self.limiter),
            navigation_timeout: self.settings.navigation_timeout,
            download_timeout: self.settings.download_timeout,
        })
    }

    /// Close the browser and stop the event handler
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        tracing::debug!("Browser closed");
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserLauncher for BrowserEngine {
    async fn open_session(&self) -> Result<Box<dyn BrowserActions>> {
        Ok(Box::new(self.new_session().await?))
    }
}

/// One browser tab
pub struct BrowserSession {
    page: Page,
    downloads: Arc<DownloadDir>,
    limiter: Arc<Mutex<PolitenessLimiter>>,
    navigation_timeout: Duration,
    download_timeout: Duration,
}

impl BrowserSession {
    async fn evaluate_bool(&self, script: String) -> Result<bool> {
        self.page
            .evaluate(script)
            .await?
            .into_value::<bool>()
            .map_err(|e| BrowserError::ScriptError(e.to_string()))
    }
}

#[async_trait::async_trait]
impl BrowserActions for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        let domain = extract_domain(url)?;
        let wait = self.limiter.lock().await.reserve(&domain, Instant::now());
        if !wait.is_zero() {
            tracing::debug!(domain = %domain, "Waiting {:?} before navigating", wait);
            tokio::time::sleep(wait).await;
        }

        tracing::debug!(url = %url, "Navigating");
        tokio::time::timeout(self.navigation_timeout, self.page.goto(url))
            .await
            .map_err(|_| BrowserError::Timeout(format!("navigation to {url}")))?
            .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))?;
        element.click().await?;
        Ok(())
    }

    async fn click_by_text(&self, labels: &[&str]) -> Result<bool> {
        let literal = labels_literal(labels)?;
        self.evaluate_bool(click_by_text_script(&literal)).await
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(BrowserError::Timeout(format!(
                    "waiting for selector '{selector}'"
                )));
            }
            tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
        }
    }

    async fn dismiss_consent(&self, labels: &[&str]) -> Result<bool> {
        let literal = labels_literal(labels)?;
        let clicked = self.evaluate_bool(consent_script(&literal)).await?;
        if clicked {
            tracing::debug!("Dismissed consent banner");
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
        Ok(clicked)
    }

    async fn page_html(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    async fn links(&self) -> Result<Vec<PageLink>> {
        self.page
            .evaluate(LINKS_SCRIPT)
            .await?
            .into_value::<Vec<PageLink>>()
            .map_err(|e| BrowserError::ScriptError(e.to_string()))
    }

    async fn download_after_click(&self, labels: &[&str]) -> Result<DownloadedFile> {
        let before = self.downloads.snapshot().await?;
        if !self.click_by_text(labels).await? {
            return Err(BrowserError::TextNotFound(
                labels.iter().map(|l| (*l).to_string()).collect(),
            ));
        }
        self.downloads
            .wait_for_download(&before, self.download_timeout)
            .await
    }

    async fn close(&self) -> Result<()> {
        self.page.clone().close().await?;
        tracing::debug!("Tab closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limiter_spaces_same_domain() {
        let mut limiter = PolitenessLimiter::new(Duration::from_millis(100));
        let now = Instant::now();

        assert_eq!(limiter.reserve("www.fi.se", now), Duration::ZERO);
        assert_eq!(limiter.reserve("www.fi.se", now), Duration::from_millis(100));
        assert_eq!(limiter.reserve("www.fi.se", now), Duration::from_millis(200));
    }

    #[test]
    fn test_limiter_different_domains() {
        let mut limiter = PolitenessLimiter::new(Duration::from_millis(100));
        let now = Instant::now();

        assert_eq!(limiter.reserve("www.fi.se", now), Duration::ZERO);
        assert_eq!(limiter.reserve("www.dfsa.dk", now), Duration::ZERO);
    }

    #[test]
    fn test_limiter_after_delay() {
        let mut limiter = PolitenessLimiter::new(Duration::from_millis(100));
        let start = Instant::now();
        limiter.reserve("www.fi.se", start);

        let later = start + Duration::from_millis(150);
        assert_eq!(limiter.reserve("www.fi.se", later), Duration::ZERO);
    }

    #[test]
    fn test_settings_from_config() {
        let mut config = shortwatch_core::BrowserConfig::default();
        config.headless = false;
        config.download_timeout_secs = 45;

        let settings = EngineSettings::from_config(&config);
        assert!(!settings.headless);
        assert_eq!(settings.download_timeout, Duration::from_secs(45));
        assert_eq!(settings.navigation_timeout, Duration::from_secs(30));
    }
}
