//! HTTP retrieval client.
//!
//! Wraps a cookie-keeping `reqwest` client so that multi-step flows (load a
//! page, discover a generated link, fetch it) share one session. Every
//! request goes through [`with_retry`].

use crate::error::{Result, SourceError};
use crate::retry::{with_retry, RetryPolicy};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER};
use shortwatch_core::HttpConfig;
use std::time::Duration;

/// Raw response of a completed request.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// URL after redirects
    pub url: String,
    /// Status code
    pub status: u16,
    /// `Content-Type` header, if any
    pub content_type: Option<String>,
    /// Response body
    pub bytes: Vec<u8>,
}

impl HttpResponse {
    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// HTTP client with a cookie jar, timeouts and bounded retries.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    config: HttpConfig,
    policy: RetryPolicy,
}

impl HttpClient {
    /// Create a client with a fresh cookie session.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        Self::with_policy(config, RetryPolicy::from_config(config))
    }

    /// Create a client with an explicit retry policy.
    pub fn with_policy(config: &HttpConfig, policy: RetryPolicy) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .cookie_store(true)
            .timeout(config.timeout())
            .build()
            .map_err(|e| SourceError::Fetch {
                url: String::new(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            config: config.clone(),
            policy,
        })
    }

    /// A client with the same settings and an empty cookie jar.
    pub fn new_session(&self) -> Result<Self> {
        Self::with_policy(&self.config, self.policy)
    }

    /// Retry policy shared with flows that do not go through this client.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        self.policy
    }

    /// The long timeout configured for slow endpoints.
    #[must_use]
    pub fn long_timeout(&self) -> Duration {
        self.config.long_timeout()
    }

    /// GET with the default timeout.
    pub async fn get(&self, url: &str) -> Result<HttpResponse> {
        self.get_with_timeout(url, self.config.timeout()).await
    }

    /// GET with an explicit timeout.
    pub async fn get_with_timeout(&self, url: &str, timeout: Duration) -> Result<HttpResponse> {
        with_retry(&self.policy, url, || async move {
            tracing::debug!(url = %url, "GET");
            let response = self
                .client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(|e| request_error(url, &e))?;
            read_response(url, response).await
        })
        .await
    }

    /// POST an url-encoded form, sending `referer` as the `Referer` header.
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(String, String)],
        referer: &str,
    ) -> Result<HttpResponse> {
        with_retry(&self.policy, url, || async move {
            tracing::debug!(url = %url, fields = form.len(), "POST form");
            let response = self
                .client
                .post(url)
                .header(REFERER, referer)
                .form(form)
                .send()
                .await
                .map_err(|e| request_error(url, &e))?;
            read_response(url, response).await
        })
        .await
    }
}

fn request_error(url: &str, err: &reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout(format!("GET {url}"))
    } else {
        SourceError::Fetch {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

async fn read_response(url: &str, response: reqwest::Response) -> Result<HttpResponse> {
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::HttpStatus {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let final_url = response.url().to_string();
    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = response
        .bytes()
        .await
        .map_err(|e| request_error(url, &e))?
        .to_vec();

    tracing::debug!(url = %final_url, size = bytes.len(), "Fetched");

    Ok(HttpResponse {
        url: final_url,
        status: status.as_u16(),
        content_type,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builds_from_default_config() {
        let client = HttpClient::new(&HttpConfig::default()).expect("client");
        assert_eq!(client.long_timeout(), Duration::from_secs(60));
        assert!(client.new_session().is_ok());
    }

    #[test]
    fn test_text_lossy() {
        let response = HttpResponse {
            url: "https://example.com".to_string(),
            status: 200,
            content_type: Some("text/csv".to_string()),
            bytes: b"caf\xe9".to_vec(),
        };
        assert_eq!(response.text_lossy(), "caf\u{fffd}");
    }
}
