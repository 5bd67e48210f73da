//! Tier-1: the plain HTTP fetcher.
//!
//! One GET through the configured [`HttpTransport`], following redirects
//! by hand, retrying rate limits and timeouts under a [`RetryPolicy`], and
//! classifying the response into a [`FetchResult`].

use crate::core::{
    ArcTransport, FetchError, FetchMethod, FetchReason, FetchResult, HttpResponse,
};
use crate::guard::SsrfGuard;
use crate::manager::{retry_async, RetryPolicy};

use std::time::Duration;
use url::Url;

/// Bodies smaller than this are inspected for bot-challenge markers.
pub const CHALLENGE_SCAN_LIMIT: usize = 5000;

/// Case-insensitive markers of an anti-bot interstitial.
pub const CHALLENGE_MARKERS: &[&str] = &["captcha", "recaptcha", "cloudflare", "cf-chl"];

/// Wait used for a 429 without a usable `Retry-After`.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(5);

/// The final hop of a redirect chain.
#[derive(Debug)]
struct Landing {
    final_url: String,
    response: HttpResponse,
    redirect_chain: Vec<String>,
}

/// Tier-1 direct fetcher.
#[derive(Debug, Clone)]
pub struct DirectFetcher {
    transport: ArcTransport,
    guard: Option<SsrfGuard>,
    retry: RetryPolicy,
    max_redirects: usize,
}

impl DirectFetcher {
    /// Creates a fetcher with the default retry policy and 5 redirects.
    ///
    /// Redirect targets are not re-validated until a guard is set with
    /// [`with_guard`](Self::with_guard).
    pub fn new(transport: ArcTransport) -> Self {
        Self {
            transport,
            guard: None,
            retry: RetryPolicy::direct(2),
            max_redirects: 5,
        }
    }

    /// Re-validates every redirect target with `guard`.
    pub fn with_guard(mut self, guard: SsrfGuard) -> Self {
        self.guard = Some(guard);
        self
    }

    /// Sets the retry policy.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the redirect limit.
    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// Fetches `normalized_url` and classifies the outcome.
    ///
    /// Never fails: every error becomes a result with a reason code.
    pub async fn fetch(&self, requested_url: &str, normalized_url: &str) -> FetchResult {
        let landing = retry_async(&self.retry, normalized_url, || self.attempt(normalized_url)).await;

        match landing {
            Ok(landing) => classify(requested_url, normalized_url, landing),
            Err(e) => {
                tracing::debug!(url = %normalized_url, error = %e, "Direct fetch failed");
                error_result(requested_url, normalized_url, e)
            }
        }
    }

    async fn attempt(&self, url: &str) -> Result<Landing, FetchError> {
        let mut current = url.to_string();
        let mut redirect_chain = Vec::new();

        loop {
            let response = self.transport.get(&current).await?;

            if response.status == 429 {
                return Err(FetchError::RateLimited {
                    source_name: current,
                    retry_after: Some(parse_retry_after(response.retry_after.as_deref())),
                });
            }

            let Some(location) = response.location.as_deref().filter(|_| response.is_redirect())
            else {
                return Ok(Landing {
                    final_url: current,
                    response,
                    redirect_chain,
                });
            };

            if redirect_chain.len() >= self.max_redirects {
                return Err(FetchError::TooManyRedirects {
                    limit: self.max_redirects,
                });
            }

            let next = Url::parse(&current)
                .and_then(|base| base.join(location))
                .map_err(|e| {
                    FetchError::connection_failed(&current, format!("bad redirect location: {e}"))
                })?;

            if let Some(guard) = &self.guard {
                guard.validate(next.as_str()).await?;
            }

            tracing::debug!(from = %current, to = %next, "Following redirect");
            redirect_chain.push(std::mem::replace(&mut current, next.into()));
        }
    }
}

/// Parses `Retry-After` as whole seconds, defaulting to 5 s.
pub fn parse_retry_after(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Returns `true` if a small body looks like an anti-bot interstitial.
pub fn looks_like_challenge(body: &str) -> bool {
    if body.len() >= CHALLENGE_SCAN_LIMIT {
        return false;
    }
    let lower = body.to_ascii_lowercase();
    CHALLENGE_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn classify(requested_url: &str, normalized_url: &str, landing: Landing) -> FetchResult {
    let Landing {
        final_url,
        response,
        redirect_chain,
    } = landing;
    let status = response.status;

    let (reason, error) = match status {
        200 if looks_like_challenge(&response.body) => (
            FetchReason::BlockedChallenge,
            Some("Bot challenge detected".to_string()),
        ),
        200 => (FetchReason::Ok, None),
        code => (FetchReason::Status(code), Some(format!("HTTP {code}"))),
    };

    let result = FetchResult::new(requested_url, normalized_url, reason)
        .with_method(FetchMethod::Direct)
        .with_final_url(final_url)
        .with_status(status)
        .with_content_type(response.content_type)
        .with_html(response.body)
        .with_redirect_chain(redirect_chain);

    // A non-200 status that still carries a usable page is returned as content.
    match error {
        Some(error)
            if !matches!(result.reason, FetchReason::Status(_)) || !result.is_sufficient() =>
        {
            result.with_error(error)
        }
        _ => result,
    }
}

fn error_result(requested_url: &str, normalized_url: &str, error: FetchError) -> FetchResult {
    let result = match &error {
        FetchError::RateLimited { .. } => {
            FetchResult::new(requested_url, normalized_url, FetchReason::RateLimited)
                .with_status(429)
        }
        FetchError::Timeout { .. } => {
            FetchResult::new(requested_url, normalized_url, FetchReason::Timeout)
        }
        _ => FetchResult::new(requested_url, normalized_url, FetchReason::TransportError),
    };
    result
        .with_method(FetchMethod::Direct)
        .with_error(error.to_string())
}
