//! Configuration management for shortwatch.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/shortwatch/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General settings
    pub general: GeneralConfig,
    /// Incremental ingestion settings
    pub ingestion: IngestionConfig,
    /// HTTP retrieval settings
    pub http: HttpConfig,
    /// Browser automation settings
    pub browser: BrowserConfig,
    /// Persistence settings
    pub database: DatabaseConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(config_path)
    }

    /// Load configuration from an explicit path, falling back to defaults if
    /// the file does not exist.
    pub fn load_from(config_path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let config_path = config_path.into();

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SHORTWATCH_DATABASE_PATH`: Override the SQLite database path
    /// - `SHORTWATCH_LOOKBACK_DAYS`: Override the watermark lookback window
    /// - `SHORTWATCH_HEADLESS`: Override browser headless mode (true/false)
    /// - `SHORTWATCH_BROWSER_ENABLED`: Enable or disable browser-driven sources
    /// - `SHORTWATCH_HTTP_TIMEOUT_SECS`: Override the default HTTP timeout
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SHORTWATCH_*` environment overrides to this configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SHORTWATCH_DATABASE_PATH") {
            if !val.trim().is_empty() {
                tracing::debug!("Override database.path from env: {}", val);
                self.database.path = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("SHORTWATCH_LOOKBACK_DAYS") {
            if let Ok(days) = val.parse() {
                self.ingestion.lookback_days = days;
                tracing::debug!("Override ingestion.lookback_days from env: {}", days);
            }
        }

        if let Ok(val) = std::env::var("SHORTWATCH_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Ok(val) = std::env::var("SHORTWATCH_BROWSER_ENABLED") {
            if let Ok(enabled) = val.parse() {
                self.browser.enabled = enabled;
                tracing::debug!("Override browser.enabled from env: {}", enabled);
            }
        }

        if let Ok(val) = std::env::var("SHORTWATCH_HTTP_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.http.timeout_secs = secs;
                tracing::debug!("Override http.timeout_secs from env: {}", secs);
            }
        }
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.http.max_retries == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.max_retries".to_string(),
                reason: "at least one attempt is required".to_string(),
            });
        }

        if self.http.jitter_min_ms > self.http.jitter_max_ms {
            return Err(ConfigError::InvalidValue {
                field: "http.jitter_min_ms".to_string(),
                reason: format!(
                    "must not exceed jitter_max_ms ({} > {})",
                    self.http.jitter_min_ms, self.http.jitter_max_ms
                ),
            });
        }

        if self.ingestion.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ingestion.batch_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Resolve the database file path, defaulting to the data directory.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        match &self.database.path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("shortwatch.db")),
        }
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/shortwatch/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/shortwatch`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    /// Get the cache directory path.
    ///
    /// Uses XDG base directories: `~/.cache/shortwatch`
    pub fn cache_dir() -> ConfigResult<PathBuf> {
        Ok(Self::project_dirs()?.cache_dir().to_path_buf())
    }

    fn project_dirs() -> ConfigResult<ProjectDirs> {
        ProjectDirs::from("com", "shortwatch", "shortwatch").ok_or(ConfigError::NoConfigDir)
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Title-case manager and issuer names (with legal-form fix-ups) before
    /// deriving identities
    pub title_case_names: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            title_case_names: true,
        }
    }
}

/// Incremental ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestionConfig {
    /// Days subtracted from the watermark when selecting candidates
    pub lookback_days: u32,
    /// Rows persisted between progress reports
    pub batch_size: usize,
    /// Enabled jurisdiction codes; empty means every registered source
    pub jurisdictions: Vec<String>,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            lookback_days: 30,
            batch_size: 100,
            jurisdictions: Vec::new(),
        }
    }
}

/// HTTP retrieval settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Default request timeout in seconds
    pub timeout_secs: u64,
    /// Timeout for slow endpoints in seconds
    pub long_timeout_secs: u64,
    /// Total attempts per request (including the first)
    pub max_retries: u32,
    /// Base delay for exponential backoff in milliseconds
    pub retry_base_delay_ms: u64,
    /// Upper bound for a single backoff delay in milliseconds
    pub retry_max_delay_ms: u64,
    /// Minimum random jitter added to each backoff delay
    pub jitter_min_ms: u64,
    /// Maximum random jitter added to each backoff delay
    pub jitter_max_ms: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl HttpConfig {
    /// Default request timeout as a `Duration`.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Long request timeout as a `Duration`.
    #[must_use]
    pub fn long_timeout(&self) -> Duration {
        Duration::from_secs(self.long_timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            long_timeout_secs: 60,
            max_retries: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 8000,
            jitter_min_ms: 1000,
            jitter_max_ms: 3000,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// Browser automation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Whether browser-driven sources may run at all
    pub enabled: bool,
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Maximum wait for a triggered download in seconds
    pub download_timeout_secs: u64,
    /// Explicit Chrome/Chromium executable, if not on `PATH`
    pub chrome_executable: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            navigation_timeout_secs: 30,
            download_timeout_secs: 60,
            chrome_executable: None,
        }
    }
}

/// Persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite database file; defaults to `<data_dir>/shortwatch.db`
    pub path: Option<PathBuf>,
    /// Connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: 5,
        }
    }
}
