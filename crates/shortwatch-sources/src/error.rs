//! Error types for source retrieval and extraction.

use thiserror::Error;

/// Errors raised while locating, fetching or decoding a source resource.
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network failure (connection refused, DNS, TLS, body read)
    #[error("fetch failed for {url}: {reason}")]
    Fetch {
        /// Requested URL
        url: String,
        /// Underlying failure
        reason: String,
    },

    /// The server answered with a non-success status
    #[error("HTTP {status} from {url}")]
    HttpStatus {
        /// Requested URL
        url: String,
        /// Status code
        status: u16,
    },

    /// A request or browser step exceeded its timeout
    #[error("timed out: {0}")]
    Timeout(String),

    /// Expected columns, sheets or links are missing
    #[error("unexpected layout: {0}")]
    Layout(String),

    /// Bytes could not be decoded as the expected format
    #[error("parse error: {0}")]
    Parse(String),

    /// Browser automation failed
    #[error("browser error: {0}")]
    Browser(#[from] shortwatch_browser::BrowserError),

    /// A discovered link or resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// The requested operation needs a capability that is not available
    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl SourceError {
    /// Whether retrying the same request may succeed.
    ///
    /// Network failures, timeouts, 408, 425, 429 and 5xx are transient.
    /// Other statuses and layout problems are terminal.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Fetch { .. } | Self::Timeout(_) => true,
            Self::HttpStatus { status, .. } => {
                matches!(status, 408 | 425 | 429) || (500..600).contains(status)
            }
            Self::Browser(err) => matches!(
                err,
                shortwatch_browser::BrowserError::Timeout(_)
                    | shortwatch_browser::BrowserError::NavigationError(_)
                    | shortwatch_browser::BrowserError::DownloadError(_)
            ),
            Self::Layout(_) | Self::Parse(_) | Self::NotFound(_) | Self::Unsupported(_) => false,
        }
    }

    /// Whether this is a rate-limit response.
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::HttpStatus { status: 429, .. })
    }
}

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;
