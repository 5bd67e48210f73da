//! URL canonicalization.
//!
//! Two spellings of the same page must map to the same string, since the
//! normalized form is what gets fetched, locked and reported.

use crate::core::FetchError;

use url::{form_urlencoded, Host, Url};

/// Query parameters dropped during normalization (besides every `utm_*`).
pub const TRACKING_PARAMS: &[&str] = &[
    "fbclid",
    "gclid",
    "msclkid",
    "ref",
    "source",
    "mc_cid",
    "mc_eid",
    "_ga",
    "_gl",
    "gad_source",
    "gbraid",
    "wbraid",
];

/// Returns `true` if the query parameter `name` only tracks the visitor.
pub fn is_tracking_param(name: &str) -> bool {
    name.starts_with("utm_") || TRACKING_PARAMS.contains(&name)
}

/// Canonicalizes a raw, user-supplied URL.
///
/// Rules, in order:
///
/// 1. prepend `https://` when no scheme is present (and upgrade `http`),
/// 2. lowercase the host,
/// 3. strip leading `www.` labels,
/// 4. drop tracking query parameters, keeping the rest verbatim and in order,
/// 5. drop the fragment,
/// 6. drop trailing slashes unless the path is exactly `/`.
///
/// The function is idempotent.
///
/// # Examples
///
/// ```rust
/// use pagebridge::guard::normalize;
///
/// assert_eq!(
///     normalize("http://www.EXAMPLE.com/Path/").unwrap(),
///     "https://example.com/Path"
/// );
/// assert_eq!(
///     normalize("https://example.com/?utm_source=x&id=1").unwrap(),
///     "https://example.com/?id=1"
/// );
/// ```
///
/// # Errors
///
/// Returns [`FetchError::InvalidUrl`] when the input cannot be parsed.
pub fn normalize(raw: &str) -> Result<String, FetchError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FetchError::invalid_url(raw, "empty URL"));
    }

    let candidate = if has_scheme(trimmed) {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let mut url =
        Url::parse(&candidate).map_err(|e| FetchError::invalid_url(raw, e.to_string()))?;

    if url.scheme() == "http" && url.set_scheme("https").is_err() {
        return Err(FetchError::invalid_url(raw, "cannot upgrade scheme to https"));
    }

    if let Some(Host::Domain(domain)) = url.host().map(|h| h.to_owned()) {
        let host = strip_www(&domain.to_ascii_lowercase());
        if host != domain {
            url.set_host(Some(&host))
                .map_err(|e| FetchError::invalid_url(raw, e.to_string()))?;
        }
    }

    if let Some(query) = url.query().map(str::to_owned) {
        let kept: Vec<&str> = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .filter(|pair| {
                let name = form_urlencoded::parse(pair.as_bytes())
                    .next()
                    .map(|(name, _)| name.into_owned())
                    .unwrap_or_default();
                !is_tracking_param(&name)
            })
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.set_query(Some(&kept.join("&")));
        }
    }

    url.set_fragment(None);

    if !url.cannot_be_a_base() {
        let path = url.path().to_owned();
        if path != "/" {
            let trimmed_path = path.trim_end_matches('/');
            if trimmed_path.len() != path.len() {
                url.set_path(if trimmed_path.is_empty() { "/" } else { trimmed_path });
            }
        }
    }

    Ok(url.into())
}

/// Returns `true` if `raw` starts with `<scheme>://`.
fn has_scheme(raw: &str) -> bool {
    let Some((scheme, _)) = raw.split_once("://") else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

// Repeated so that "www.www.example.com" is stable after one pass.
fn strip_www(host: &str) -> String {
    let mut host = host;
    while let Some(rest) = host.strip_prefix("www.") {
        if rest.is_empty() {
            break;
        }
        host = rest;
    }
    host.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLES: &[&str] = &[
        "example.com",
        "EXAMPLE.com/a/b/",
        "http://www.EXAMPLE.com/Path/",
        "https://example.com/?utm_source=x&id=1",
        "https://www.www.example.com/a//",
        "https://example.com/search?q=rust+lang&utm_medium=mail&page=2#results",
        "https://example.com/?fbclid=abc",
        "https://example.com:8443/x/?a=1&&b=2",
        "https://[::1]:8080/path/",
        "https://192.168.0.1/admin/",
        "ftp://files.example.com/pub/",
        "https://example.com/%7Euser/?name=J%C3%BCrgen",
    ];

    #[test]
    fn test_normalize_is_idempotent() {
        for raw in SAMPLES {
            let once = normalize(raw).unwrap();
            let twice = normalize(&once).unwrap();
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[test]
    fn test_strips_tracking_params_keeping_order() {
        assert_eq!(
            normalize("https://example.com/?utm_source=x&id=1").unwrap(),
            "https://example.com/?id=1"
        );
        assert_eq!(
            normalize("https://example.com/p?z=9&gclid=1&a=b%20c&utm_campaign=q&ref=x").unwrap(),
            "https://example.com/p?z=9&a=b%20c"
        );
        assert_eq!(
            normalize("https://example.com/?fbclid=abc").unwrap(),
            "https://example.com/"
        );
    }

    #[test]
    fn test_strips_percent_encoded_tracking_params() {
        assert_eq!(
            normalize("https://example.com/?%75tm_source=x&id=1").unwrap(),
            "https://example.com/?id=1"
        );
        assert_eq!(
            normalize("https://example.com/?id=1&%66bclid=abc").unwrap(),
            "https://example.com/?id=1"
        );
    }

    #[test]
    fn test_host_scheme_and_trailing_slash() {
        assert_eq!(
            normalize("http://www.EXAMPLE.com/Path/").unwrap(),
            "https://example.com/Path"
        );
        assert_eq!(normalize("example.com").unwrap(), "https://example.com/");
        assert_eq!(normalize("example.com/").unwrap(), "https://example.com/");
        assert_eq!(
            normalize("https://www.www.example.com/a//").unwrap(),
            "https://example.com/a"
        );
    }

    #[test]
    fn test_drops_fragment() {
        assert_eq!(
            normalize("https://example.com/docs#intro").unwrap(),
            "https://example.com/docs"
        );
    }

    #[test]
    fn test_keeps_other_schemes_for_the_validator() {
        assert_eq!(
            normalize("ftp://files.example.com/pub/").unwrap(),
            "ftp://files.example.com/pub"
        );
    }

    #[test]
    fn test_invalid_input() {
        assert!(matches!(normalize("   "), Err(FetchError::InvalidUrl { .. })));
        assert!(matches!(
            normalize("https://exa mple.com/"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn test_tracking_param_names() {
        assert!(is_tracking_param("utm_anything"));
        assert!(is_tracking_param("gbraid"));
        assert!(!is_tracking_param("id"));
        assert!(!is_tracking_param("UTM_SOURCE"));
    }
}
