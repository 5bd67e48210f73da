//! Page fetcher configuration and environment parsing.

use crate::backends::http::BROWSER_USER_AGENT;
use crate::core::FetchError;

use std::str::FromStr;
use std::time::Duration;

/// Configuration for the page fetcher.
#[derive(Debug, Clone)]
pub struct PageFetcherConfig {
    /// Per-attempt timeout for direct HTTP requests.
    pub http_timeout: Duration,

    /// Retries after the first direct attempt.
    pub max_retries: u32,

    /// Maximum redirects followed by the direct fetcher.
    pub max_redirects: usize,

    /// User agent sent on direct requests.
    pub user_agent: String,

    /// Whether each redirect target is checked by the SSRF guard.
    pub revalidate_redirects: bool,
}

impl Default for PageFetcherConfig {
    fn default() -> Self {
        Self {
            http_timeout: Duration::from_secs(15),
            max_retries: 2,
            max_redirects: 5,
            user_agent: BROWSER_USER_AGENT.to_string(),
            revalidate_redirects: true,
        }
    }
}

impl PageFetcherConfig {
    /// Creates a new configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `HTTP_TIMEOUT` (seconds), `HTTP_MAX_RETRIES` and
    /// `HTTP_MAX_REDIRECTS`, keeping defaults for unset variables.
    pub fn from_env() -> Result<Self, FetchError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env) but reads variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, FetchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(secs) = parse_var::<u64>("HTTP_TIMEOUT", lookup("HTTP_TIMEOUT"))? {
            config.http_timeout = Duration::from_secs(secs);
        }
        if let Some(retries) = parse_var("HTTP_MAX_RETRIES", lookup("HTTP_MAX_RETRIES"))? {
            config.max_retries = retries;
        }
        if let Some(redirects) = parse_var("HTTP_MAX_REDIRECTS", lookup("HTTP_MAX_REDIRECTS"))? {
            config.max_redirects = redirects;
        }
        Ok(config)
    }

    /// Sets the HTTP timeout.
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Sets the number of retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Sets the redirect limit.
    pub fn with_max_redirects(mut self, redirects: usize) -> Self {
        self.max_redirects = redirects;
        self
    }

    /// Sets the user agent.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Enables or disables redirect re-validation.
    pub fn with_revalidate_redirects(mut self, enabled: bool) -> Self {
        self.revalidate_redirects = enabled;
        self
    }
}

/// Returns a non-empty environment variable.
#[cfg(feature = "firecrawl")]
pub(crate) fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parses an environment variable, `Ok(None)` when unset.
#[cfg(feature = "firecrawl")]
pub(crate) fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>, FetchError> {
    parse_var(name, env_string(name))
}

fn parse_var<T: FromStr>(name: &str, raw: Option<String>) -> Result<Option<T>, FetchError> {
    let Some(raw) = raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| FetchError::configuration(format!("{name} has invalid value '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = PageFetcherConfig::default();
        assert_eq!(config.http_timeout, Duration::from_secs(15));
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.max_redirects, 5);
        assert!(config.revalidate_redirects);
        assert_eq!(config.user_agent, BROWSER_USER_AGENT);
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = PageFetcherConfig::from_lookup(lookup(&[
            ("HTTP_TIMEOUT", "20"),
            ("HTTP_MAX_RETRIES", " 0 "),
            ("HTTP_MAX_REDIRECTS", ""),
        ]))
        .unwrap();

        assert_eq!(config.http_timeout, Duration::from_secs(20));
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.max_redirects, 5);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = PageFetcherConfig::from_lookup(lookup(&[("HTTP_TIMEOUT", "soon")])).unwrap_err();
        assert!(matches!(err, FetchError::Configuration { .. }));
        assert!(err.to_string().contains("HTTP_TIMEOUT"));
    }

    #[cfg(feature = "firecrawl")]
    #[test]
    fn test_env_helpers_treat_unset_as_none() {
        let name = "PAGEBRIDGE_TEST_UNSET_VARIABLE";
        assert!(env_string(name).is_none());
        assert!(matches!(env_parse::<u64>(name), Ok(None)));
    }
}
