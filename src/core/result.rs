//! Fetch result structures.
//!
//! `FetchResult` is the unit handed to downstream collectors. Every tier
//! describes its outcome with one, and the orchestrator decides whether
//! to escalate purely from its fields.

use crate::core::types::{FetchMethod, FetchReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bodies at or below this size never count as sufficient.
pub const MIN_SUFFICIENT_BODY_BYTES: usize = 500;

/// The complete result of a page acquisition.
///
/// `error` is set exactly when the acquisition did not produce usable
/// content. A populated `html` alongside an error is allowed (challenge
/// pages kept for diagnostics, fallback placeholders); the `reason` code
/// tells the two apart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    /// The URL exactly as the caller supplied it.
    pub requested_url: String,

    /// The canonical form used for fetching and locking.
    pub normalized_url: String,

    /// The URL that produced the body, after redirects.
    pub final_url: String,

    /// HTTP status code; absent on total failure.
    pub status_code: Option<u16>,

    /// Response content type, if known.
    pub content_type: Option<String>,

    /// Response body (possibly empty).
    pub html: String,

    /// Which tier produced this result; absent when no tier ran.
    pub method: Option<FetchMethod>,

    /// Why the fetch ended the way it did.
    pub reason: FetchReason,

    /// Every URL that answered with a redirect, in order.
    pub redirect_chain: Vec<String>,

    /// When the result was produced.
    pub fetched_at: DateTime<Utc>,

    /// Error message when no usable content was produced.
    pub error: Option<String>,
}

impl FetchResult {
    /// Creates a result with no content for the given URLs and reason.
    ///
    /// `final_url` starts out equal to `normalized_url`.
    pub fn new(
        requested_url: impl Into<String>,
        normalized_url: impl Into<String>,
        reason: FetchReason,
    ) -> Self {
        let normalized_url = normalized_url.into();
        Self {
            requested_url: requested_url.into(),
            final_url: normalized_url.clone(),
            normalized_url,
            status_code: None,
            content_type: None,
            html: String::new(),
            method: None,
            reason,
            redirect_chain: Vec::new(),
            fetched_at: Utc::now(),
            error: None,
        }
    }

    /// Creates a failed result carrying an error message.
    pub fn failure(
        requested_url: impl Into<String>,
        normalized_url: impl Into<String>,
        reason: FetchReason,
        error: impl Into<String>,
    ) -> Self {
        Self::new(requested_url, normalized_url, reason).with_error(error)
    }

    /// Sets the method tag.
    pub fn with_method(mut self, method: FetchMethod) -> Self {
        self.method = Some(method);
        self
    }

    /// Sets the final URL.
    pub fn with_final_url(mut self, url: impl Into<String>) -> Self {
        self.final_url = url.into();
        self
    }

    /// Sets the status code.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type;
        self
    }

    /// Sets the body.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    /// Sets the redirect chain.
    pub fn with_redirect_chain(mut self, chain: Vec<String>) -> Self {
        self.redirect_chain = chain;
        self
    }

    /// Sets the error message.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Returns `true` if the status code is in `[200, 400)`.
    pub fn is_success(&self) -> bool {
        matches!(self.status_code, Some(code) if (200..400).contains(&code))
    }

    /// Returns `true` if the result is good enough to skip the fallback tier.
    pub fn is_sufficient(&self) -> bool {
        self.is_success() && self.html.len() > MIN_SUFFICIENT_BODY_BYTES
    }

    /// Returns `true` if usable content was produced.
    ///
    /// A direct result with a 3xx status and a sufficient body counts as
    /// content; its `reason` still names the status.
    pub fn has_content(&self) -> bool {
        self.error.is_none()
    }

    /// Number of redirects followed.
    pub fn redirect_count(&self) -> usize {
        self.redirect_chain.len()
    }
}
