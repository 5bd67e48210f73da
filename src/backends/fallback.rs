//! Tier-2: the fallback adapter.
//!
//! Tries one more cheap direct GET before spending money on the render
//! provider, and turns every provider failure into a placeholder result.

use crate::backends::direct::DirectFetcher;
use crate::core::{ArcProvider, FetchError, FetchMethod, FetchReason, FetchResult, RenderedPage};
use crate::manager::{retry_async, RetryPolicy};

/// A pre-check body must be at least this long to be used.
pub const MIN_PRECHECK_BODY_BYTES: usize = 1000;

/// Pre-check bodies containing any of these are treated as blocked.
pub const PRECHECK_BLOCK_MARKERS: &[&str] = &["403 Forbidden", "Access Denied", "Cloudflare"];

/// Rendered pages above this size that contain scripts are tagged as such.
pub const RENDERED_JS_MIN_BYTES: usize = 1000;

/// Whether and how the paid provider was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderContact {
    /// No provider call was made.
    None,
    /// The provider returned content.
    Succeeded,
    /// The provider was called and failed.
    Failed,
}

/// The result of a fallback attempt.
#[derive(Debug, Clone)]
pub struct FallbackOutcome {
    /// The page (or placeholder) produced.
    pub result: FetchResult,
    /// Whether the paid provider was reached.
    pub provider: ProviderContact,
}

impl FallbackOutcome {
    /// Returns `true` if the paid provider was called.
    pub fn provider_called(&self) -> bool {
        self.provider != ProviderContact::None
    }
}

/// Tier-2 fallback adapter.
#[derive(Debug, Clone)]
pub struct FallbackAdapter {
    precheck: DirectFetcher,
    provider: Option<ArcProvider>,
    retry: RetryPolicy,
}

impl FallbackAdapter {
    /// Creates an adapter.
    ///
    /// `precheck` is used as-is; give it a no-retry policy. Without a
    /// provider every fetch that fails the pre-check ends in a placeholder.
    pub fn new(precheck: DirectFetcher, provider: Option<ArcProvider>) -> Self {
        Self {
            precheck,
            provider,
            retry: RetryPolicy::provider(),
        }
    }

    /// Sets the provider retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the provider name, if one is configured.
    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.name())
    }

    /// Acquires `normalized_url` through the fallback tier.
    pub async fn fetch(&self, requested_url: &str, normalized_url: &str) -> FallbackOutcome {
        let precheck = self.precheck.fetch(requested_url, normalized_url).await;
        if precheck_usable(&precheck) {
            tracing::info!(
                url = %normalized_url,
                bytes = precheck.html.len(),
                "Fallback pre-check succeeded, skipping render provider"
            );
            let mut result = precheck;
            result.reason = FetchReason::FallbackPrecheckOk;
            result.method = Some(FetchMethod::Fallback);
            return FallbackOutcome {
                result,
                provider: ProviderContact::None,
            };
        }

        let Some(provider) = self.provider.as_ref() else {
            tracing::warn!(url = %normalized_url, "No render provider configured");
            return FallbackOutcome {
                result: placeholder(
                    requested_url,
                    normalized_url,
                    FetchReason::FallbackProviderError,
                    "no_render_provider",
                    "no render provider configured",
                ),
                provider: ProviderContact::None,
            };
        };

        tracing::info!(
            url = %normalized_url,
            provider = provider.name(),
            precheck_reason = %precheck.reason,
            "Escalating to render provider"
        );

        let rendered =
            retry_async(&self.retry, provider.name(), || provider.render(normalized_url)).await;

        match rendered {
            Ok(page) => {
                let result = classify(requested_url, normalized_url, page);
                tracing::info!(url = %normalized_url, reason = %result.reason, "Render provider succeeded");
                FallbackOutcome {
                    result,
                    provider: ProviderContact::Succeeded,
                }
            }
            Err(e) => {
                let (reason, code) = match &e {
                    FetchError::RateLimited { .. } => (FetchReason::FallbackExhausted, "rate_limited"),
                    FetchError::Timeout { .. } => (FetchReason::FallbackExhausted, "timeout"),
                    _ => (FetchReason::FallbackProviderError, "error"),
                };
                tracing::warn!(
                    url = %normalized_url,
                    provider = provider.name(),
                    reason = %reason,
                    error = %e,
                    "Render provider failed"
                );
                FallbackOutcome {
                    result: placeholder(
                        requested_url,
                        normalized_url,
                        reason,
                        &format!("{}_{code}", provider.name()),
                        &e.to_string(),
                    ),
                    provider: ProviderContact::Failed,
                }
            }
        }
    }
}

/// The HTML body returned when the fallback could not fetch anything.
pub fn placeholder_html(reason: &str) -> String {
    format!(
        "<html><head><title>Fetch Failed</title></head><body><p>Failed to fetch: {reason}</p></body></html>"
    )
}

fn precheck_usable(result: &FetchResult) -> bool {
    result.reason == FetchReason::Ok
        && result.html.len() >= MIN_PRECHECK_BODY_BYTES
        && !PRECHECK_BLOCK_MARKERS
            .iter()
            .any(|marker| result.html.contains(marker))
}

fn classify(requested_url: &str, normalized_url: &str, page: RenderedPage) -> FetchResult {
    let is_pdf = page
        .content_type
        .as_deref()
        .is_some_and(|ct| ct.to_ascii_lowercase().starts_with("application/pdf"));

    let reason = if is_pdf {
        FetchReason::FallbackPdf
    } else if page.html.len() > RENDERED_JS_MIN_BYTES
        && page.html.to_ascii_lowercase().contains("<script")
    {
        FetchReason::FallbackRenderedJs
    } else {
        FetchReason::FallbackOk
    };

    let final_url = page
        .final_url
        .unwrap_or_else(|| normalized_url.to_string());

    FetchResult::new(requested_url, normalized_url, reason)
        .with_method(FetchMethod::Fallback)
        .with_final_url(final_url)
        .with_status(page.status_code.unwrap_or(200))
        .with_content_type(page.content_type.or_else(|| Some("text/html".to_string())))
        .with_html(page.html)
}

fn placeholder(
    requested_url: &str,
    normalized_url: &str,
    reason: FetchReason,
    code: &str,
    error: &str,
) -> FetchResult {
    FetchResult::failure(requested_url, normalized_url, reason, error)
        .with_method(FetchMethod::Fallback)
        .with_content_type(Some("text/html".to_string()))
        .with_html(placeholder_html(code))
}
