//! HTTP transport backed by `reqwest`.
//!
//! Redirects are not followed here. The direct fetcher follows them hop by
//! hop so each target can be re-validated before it is contacted.

use crate::core::{FetchError, HttpResponse, HttpTransport};

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::time::Duration;

/// A desktop Chrome user agent; many sites serve bots a different page.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// A [`HttpTransport`] over a pooled `reqwest::Client`.
///
/// # Example
///
/// ```rust,no_run
/// use pagebridge::backends::http::{ReqwestTransport, BROWSER_USER_AGENT};
/// use std::time::Duration;
///
/// let transport = ReqwestTransport::new(BROWSER_USER_AGENT, Duration::from_secs(15))?;
/// # Ok::<(), pagebridge::core::FetchError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Creates a transport with the given user agent and per-request timeout.
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.9"),
        );

        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::none())
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::configuration(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }

    fn map_error(&self, url: &str, error: reqwest::Error) -> FetchError {
        if error.is_timeout() {
            FetchError::timeout(url, self.timeout)
        } else {
            FetchError::connection_failed(url, error.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    fn name(&self) -> &str {
        "reqwest"
    }

    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.map_error(url, e))?;

        let headers = response.headers();
        let header_str = |name: header::HeaderName| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned)
        };

        let mut page = HttpResponse::new(response.status().as_u16(), String::new());
        page.content_type = header_str(header::CONTENT_TYPE);
        page.location = header_str(header::LOCATION);
        page.retry_after = header_str(header::RETRY_AFTER);

        tracing::debug!(url = %url, status = page.status, "HTTP response received");

        page.body = response.text().await.map_err(|e| self.map_error(url, e))?;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(timeout: Duration) -> ReqwestTransport {
        ReqwestTransport::new(BROWSER_USER_AGENT, timeout).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(header_regex("user-agent", r"^Mozilla/5\.0 .*Chrome/120"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("<html>hello</html>", "text/html; charset=utf-8"),
            )
            .mount(&server)
            .await;

        let response = transport(Duration::from_secs(5))
            .get(&format!("{}/page", server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "<html>hello</html>");
        assert_eq!(
            response.content_type.as_deref(),
            Some("text/html; charset=utf-8")
        );
    }

    #[tokio::test]
    async fn test_redirects_are_not_followed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/old"))
            .respond_with(ResponseTemplate::new(301).insert_header("location", "/new"))
            .mount(&server)
            .await;

        let response = transport(Duration::from_secs(5))
            .get(&format!("{}/old", server.uri()))
            .await
            .unwrap();

        assert_eq!(response.status, 301);
        assert_eq!(response.location.as_deref(), Some("/new"));
        assert!(response.is_redirect());
    }

    #[tokio::test]
    async fn test_rate_limit_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
            .mount(&server)
            .await;

        let response = transport(Duration::from_secs(5))
            .get(&server.uri())
            .await
            .unwrap();

        assert_eq!(response.status, 429);
        assert_eq!(response.retry_after.as_deref(), Some("7"));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let err = transport(Duration::from_millis(50))
            .get(&server.uri())
            .await
            .unwrap_err();

        assert!(err.is_timeout(), "{err}");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let err = transport(Duration::from_secs(2))
            .get("http://127.0.0.1:1/")
            .await
            .unwrap_err();

        assert!(matches!(err, FetchError::ConnectionFailed { .. }), "{err}");
    }
}
