//! Core traits for the pagebridge library.
//!
//! These are the seams between the fetch logic and the outside world:
//!
//! - [`HttpTransport`] issues a single HTTP GET without following redirects.
//! - [`RenderProvider`] is the paid headless-render service.
//! - [`HostResolver`] turns a host name into IP addresses for the SSRF guard.
//!
//! Production implementations live in [`crate::backends`]; the test doubles
//! in [`crate::backends::mock`] implement the same traits.

use crate::core::error::FetchError;

use async_trait::async_trait;
use std::fmt::Debug;
use std::net::IpAddr;
use std::sync::Arc;

/// A single HTTP response, as seen by the fetch tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header.
    pub content_type: Option<String>,
    /// `Location` header (redirects).
    pub location: Option<String>,
    /// Raw `Retry-After` header (rate limiting).
    pub retry_after: Option<String>,
    /// Decoded body text.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response with the given status and body.
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            ..Self::default()
        }
    }

    /// Creates a redirect response pointing at `location`.
    pub fn redirect(status: u16, location: impl Into<String>) -> Self {
        Self {
            status,
            location: Some(location.into()),
            ..Self::default()
        }
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the raw `Retry-After` header.
    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    /// Returns `true` for 3xx statuses that carry a `Location`.
    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }
}

/// Issues plain HTTP GET requests.
///
/// # Implementation Notes
///
/// - Implementations must not follow redirects; the direct fetcher follows
///   them itself so it can record the chain and re-check every hop.
/// - A request that exceeds the per-attempt timeout must be reported as
///   [`FetchError::Timeout`], any other I/O failure as
///   [`FetchError::ConnectionFailed`].
/// - HTTP error statuses are not errors; they are returned as responses.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    /// Returns a short name for logging.
    fn name(&self) -> &str;

    /// Performs a GET request for `url`.
    async fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

/// Content returned by a headless-render provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedPage {
    /// Rendered HTML (or markdown when the provider has no HTML).
    pub html: String,
    /// The URL the provider ended up on.
    pub final_url: Option<String>,
    /// Status code the provider observed.
    pub status_code: Option<u16>,
    /// Content type the provider observed.
    pub content_type: Option<String>,
}

impl RenderedPage {
    /// Creates a rendered page with the given body.
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Self::default()
        }
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Sets the final URL.
    pub fn with_final_url(mut self, url: impl Into<String>) -> Self {
        self.final_url = Some(url.into());
        self
    }

    /// Sets the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }
}

/// The paid headless-render service behind the fallback tier.
///
/// Exactly one concrete provider is chosen at configuration time.
///
/// # Errors
///
/// Implementations report:
/// - [`FetchError::RateLimited`] when the provider throttles us,
/// - [`FetchError::Timeout`] when the render call times out,
/// - [`FetchError::ProviderError`] for everything else.
///
/// Only the first two are retried by the fallback adapter.
#[async_trait]
pub trait RenderProvider: Send + Sync + Debug {
    /// Returns the name of this provider.
    fn name(&self) -> &str;

    /// Renders `url` in a headless browser and returns the page.
    async fn render(&self, url: &str) -> Result<RenderedPage, FetchError>;
}

/// Resolves host names for the SSRF guard.
#[async_trait]
pub trait HostResolver: Send + Sync + Debug {
    /// Resolves `host` to its addresses.
    ///
    /// An `Err` means resolution itself failed; the guard treats that as
    /// "unknown" rather than "blocked".
    async fn resolve(&self, host: &str) -> Result<Vec<IpAddr>, FetchError>;
}

/// An arc-wrapped transport for shared ownership.
pub type ArcTransport = Arc<dyn HttpTransport>;

/// An arc-wrapped render provider.
pub type ArcProvider = Arc<dyn RenderProvider>;

/// An arc-wrapped host resolver.
pub type ArcResolver = Arc<dyn HostResolver>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_detection() {
        assert!(HttpResponse::redirect(301, "/next").is_redirect());
        assert!(!HttpResponse::new(304, "").is_redirect());
        assert!(!HttpResponse::new(200, "ok").is_redirect());
    }

    #[test]
    fn test_rendered_page_builder() {
        let page = RenderedPage::new("<html></html>")
            .with_content_type("application/pdf")
            .with_status(200);
        assert_eq!(page.content_type.as_deref(), Some("application/pdf"));
        assert_eq!(page.status_code, Some(200));
        assert!(page.final_url.is_none());
    }
}
