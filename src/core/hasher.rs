//! Stable lock keys for normalized URLs.
//!
//! The fetch lock registry is keyed by a BLAKE3 digest of the normalized
//! URL rather than the URL itself, so keys have a fixed size no matter how
//! long the query string is.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A hex-encoded BLAKE3 digest identifying one normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UrlKey(String);

impl UrlKey {
    /// Derives the key for a normalized URL.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use pagebridge::core::UrlKey;
    ///
    /// let a = UrlKey::for_url("https://example.com/");
    /// let b = UrlKey::for_url("https://example.com/");
    /// assert_eq!(a, b);
    /// assert_eq!(a.as_str().len(), 64);
    /// ```
    pub fn for_url(normalized_url: &str) -> Self {
        Self(blake3::hash(normalized_url.as_bytes()).to_hex().to_string())
    }

    /// Returns the hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the first 12 hex characters, for logs.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for UrlKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
