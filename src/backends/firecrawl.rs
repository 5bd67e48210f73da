//! Firecrawl render provider.
//!
//! This module provides a [`RenderProvider`] backed by the Firecrawl
//! scrape API, which loads pages in a headless browser.
//!
//! # Requirements
//!
//! - Firecrawl API key
//! - Network access to api.firecrawl.dev
//!
//! # API Usage
//!
//! One `POST /v1/scrape` per render, asking for both HTML and markdown and
//! waiting a few seconds for client-side rendering to settle.

use crate::core::{FetchError, RenderProvider, RenderedPage};
use crate::manager::config::{env_parse, env_string};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Firecrawl provider configuration.
#[derive(Debug, Clone)]
pub struct FirecrawlConfig {
    /// API key (kept secret).
    pub api_key: SecretString,

    /// Base URL for the API.
    pub base_url: String,

    /// Request timeout.
    pub timeout: Duration,

    /// How long the headless browser waits before capturing the page.
    pub wait_for: Duration,

    /// Whether Firecrawl should strip navigation and boilerplate.
    pub only_main_content: bool,
}

impl FirecrawlConfig {
    /// Creates a new configuration with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: SecretString::new(api_key.into().into()),
            base_url: "https://api.firecrawl.dev".to_string(),
            timeout: Duration::from_secs(30),
            wait_for: Duration::from_millis(5000),
            only_main_content: false,
        }
    }

    /// Reads `FIRECRAWL_API_KEY`, `FIRECRAWL_TIMEOUT` (seconds) and
    /// `FIRECRAWL_BASE_URL`.
    ///
    /// Returns `Ok(None)` when no API key is set.
    pub fn from_env() -> Result<Option<Self>, FetchError> {
        let Some(api_key) = env_string("FIRECRAWL_API_KEY") else {
            return Ok(None);
        };

        let mut config = Self::new(api_key);
        if let Some(secs) = env_parse::<u64>("FIRECRAWL_TIMEOUT")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(base_url) = env_string("FIRECRAWL_BASE_URL") {
            config.base_url = base_url;
        }
        Ok(Some(config))
    }

    /// Sets the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the render wait.
    pub fn with_wait_for(mut self, wait_for: Duration) -> Self {
        self.wait_for = wait_for;
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeRequest<'a> {
    url: &'a str,
    formats: [&'static str; 2],
    only_main_content: bool,
    wait_for: u64,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    data: Option<ScrapeData>,
    error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ScrapeData {
    html: Option<String>,
    markdown: Option<String>,
    #[serde(default)]
    metadata: ScrapeMetadata,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScrapeMetadata {
    url: Option<String>,
    #[serde(rename = "sourceURL")]
    source_url: Option<String>,
    status_code: Option<u16>,
    content_type: Option<String>,
}

/// Firecrawl render provider.
///
/// # Example
///
/// ```rust,no_run
/// use pagebridge::backends::firecrawl::{FirecrawlConfig, FirecrawlProvider};
///
/// let provider = FirecrawlProvider::new(FirecrawlConfig::new("fc-your-key"))?;
/// # Ok::<(), pagebridge::core::FetchError>(())
/// ```
#[derive(Debug)]
pub struct FirecrawlProvider {
    config: FirecrawlConfig,
    client: reqwest::Client,
}

impl FirecrawlProvider {
    /// Creates a new Firecrawl provider with the given configuration.
    pub fn new(config: FirecrawlConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FetchError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/scrape", self.config.base_url.trim_end_matches('/'))
    }

    fn map_error(&self, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::timeout(self.name(), self.config.timeout)
        } else {
            FetchError::provider(self.name(), error.to_string())
        }
    }
}

#[async_trait]
impl RenderProvider for FirecrawlProvider {
    fn name(&self) -> &str {
        "firecrawl"
    }

    async fn render(&self, url: &str) -> Result<RenderedPage, FetchError> {
        let request = ScrapeRequest {
            url,
            formats: ["html", "markdown"],
            only_main_content: self.config.only_main_content,
            wait_for: self.config.wait_for.as_millis() as u64,
        };

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_error(e))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(FetchError::RateLimited {
                source_name: self.name().to_string(),
                retry_after,
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(FetchError::provider(
                self.name(),
                format!("API error {status}: {snippet}"),
            ));
        }

        let body: ScrapeResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::timeout(self.name(), self.config.timeout)
            } else {
                FetchError::provider(self.name(), format!("invalid response: {e}"))
            }
        })?;

        if !body.success {
            return Err(FetchError::provider(
                self.name(),
                body.error.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        let data = body.data.unwrap_or_default();
        let html = data
            .html
            .filter(|h| !h.is_empty())
            .or(data.markdown)
            .unwrap_or_default();
        if html.is_empty() {
            return Err(FetchError::provider(self.name(), "empty content"));
        }

        let metadata = data.metadata;
        tracing::debug!(
            url = %url,
            bytes = html.len(),
            status = ?metadata.status_code,
            "Firecrawl scrape finished"
        );

        Ok(RenderedPage {
            html,
            final_url: metadata.url.or(metadata.source_url),
            status_code: metadata.status_code,
            content_type: metadata.content_type,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn provider(server: &MockServer, timeout: Duration) -> FirecrawlProvider {
        FirecrawlProvider::new(
            FirecrawlConfig::new("fc-test")
                .with_base_url(server.uri())
                .with_timeout(timeout),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_render_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/scrape"))
            .and(header("authorization", "Bearer fc-test"))
            .and(body_partial_json(json!({
                "url": "https://example.com/",
                "formats": ["html", "markdown"],
                "onlyMainContent": false,
                "waitFor": 5000
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": {
                    "html": "<html>rendered</html>",
                    "markdown": "rendered",
                    "metadata": {
                        "sourceURL": "https://example.com/",
                        "url": "https://example.com/home",
                        "statusCode": 200,
                        "contentType": "text/html"
                    }
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = provider(&server, Duration::from_secs(5))
            .await
            .render("https://example.com/")
            .await
            .unwrap();

        assert_eq!(page.html, "<html>rendered</html>");
        assert_eq!(page.final_url.as_deref(), Some("https://example.com/home"));
        assert_eq!(page.status_code, Some(200));
        assert_eq!(page.content_type.as_deref(), Some("text/html"));
    }

    #[tokio::test]
    async fn test_markdown_used_when_html_missing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "markdown": "# Title" }
            })))
            .mount(&server)
            .await;

        let page = provider(&server, Duration::from_secs(5))
            .await
            .render("https://example.com/")
            .await
            .unwrap();

        assert_eq!(page.html, "# Title");
        assert!(page.final_url.is_none());
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "12"))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .await
            .render("https://example.com/")
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(12)));
    }

    #[tokio::test]
    async fn test_unsuccessful_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error": "Insufficient credits"
            })))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .await
            .render("https://example.com/")
            .await
            .unwrap_err();

        match err {
            FetchError::ProviderError { provider, message } => {
                assert_eq!(provider, "firecrawl");
                assert_eq!(message, "Insufficient credits");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_secs(5))
            .await
            .render("https://example.com/")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::ProviderError { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let err = provider(&server, Duration::from_millis(50))
            .await
            .render("https://example.com/")
            .await
            .unwrap_err();

        assert!(err.is_timeout(), "{err}");
    }

    #[test]
    fn test_secret_not_in_debug() {
        let config = FirecrawlConfig::new("fc-very-secret");
        assert!(!format!("{config:?}").contains("fc-very-secret"));
    }
}
