//! SSRF validation for untrusted URLs.
//!
//! [`SsrfGuard`] decides whether a URL may be contacted at all. It is
//! consulted before the first request and again for every redirect target.

use crate::backends::dns::SystemResolver;
use crate::core::{ArcResolver, FetchError};

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;
use url::{Host, Url};

/// Host names that are refused without resolving them.
pub const BLOCKED_HOSTS: &[&str] = &[
    "localhost",
    "metadata.google.internal",
    "metadata.goog",
    "169.254.169.254",
];

/// Address ranges no resolved IP may fall into.
pub const BLOCKED_RANGES: &[IpRange] = &[
    IpRange::v4([10, 0, 0, 0], 8),
    IpRange::v4([172, 16, 0, 0], 12),
    IpRange::v4([192, 168, 0, 0], 16),
    IpRange::v4([127, 0, 0, 0], 8),
    IpRange::v4([169, 254, 0, 0], 16),
    IpRange::v4([0, 0, 0, 0], 8),
    IpRange::v6([0, 0, 0, 0, 0, 0, 0, 1], 128),
    IpRange::v6([0xfc00, 0, 0, 0, 0, 0, 0, 0], 7),
    IpRange::v6([0xfe80, 0, 0, 0, 0, 0, 0, 0], 10),
];

/// A CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpRange {
    network: IpAddr,
    prefix: u8,
}

impl IpRange {
    /// An IPv4 block.
    pub const fn v4(octets: [u8; 4], prefix: u8) -> Self {
        Self {
            network: IpAddr::V4(Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3])),
            prefix,
        }
    }

    /// An IPv6 block.
    pub const fn v6(segments: [u16; 8], prefix: u8) -> Self {
        Self {
            network: IpAddr::V6(Ipv6Addr::new(
                segments[0],
                segments[1],
                segments[2],
                segments[3],
                segments[4],
                segments[5],
                segments[6],
                segments[7],
            )),
            prefix,
        }
    }

    /// Returns `true` if `ip` lies inside this block. Families never mix.
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.network, ip) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = if self.prefix == 0 {
                    0
                } else {
                    u32::MAX << (32 - u32::from(self.prefix))
                };
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = if self.prefix == 0 {
                    0
                } else {
                    u128::MAX << (128 - u32::from(self.prefix))
                };
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network, self.prefix)
    }
}

/// Validates URLs against the SSRF blocklists.
///
/// # Example
///
/// ```rust,no_run
/// use pagebridge::guard::SsrfGuard;
///
/// # async fn example() {
/// let guard = SsrfGuard::system();
/// assert!(guard.validate("http://127.0.0.1/").await.is_err());
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SsrfGuard {
    resolver: ArcResolver,
}

impl SsrfGuard {
    /// Creates a guard that resolves hosts through `resolver`.
    pub fn new(resolver: ArcResolver) -> Self {
        Self { resolver }
    }

    /// Creates a guard backed by the operating system resolver.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemResolver::default()))
    }

    /// Checks whether `url` may be fetched.
    ///
    /// Checks short-circuit in order: scheme, host presence, host
    /// blocklist, then every address the host resolves to. A host that
    /// fails to resolve is let through; the transport will fail on it
    /// anyway.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::SsrfBlocked`] with a reason naming the
    /// offending host, address or range.
    pub async fn validate(&self, url: &str) -> Result<(), FetchError> {
        let parsed = Url::parse(url)
            .map_err(|e| FetchError::ssrf_blocked(format!("Could not parse URL: {e}")))?;

        match parsed.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::ssrf_blocked(format!("Invalid scheme: {other}"))),
        }

        let host = parsed
            .host()
            .ok_or_else(|| FetchError::ssrf_blocked("Empty hostname"))?;

        match host {
            Host::Domain(domain) => {
                let domain = domain.to_ascii_lowercase();
                if domain.is_empty() {
                    return Err(FetchError::ssrf_blocked("Empty hostname"));
                }
                check_host_name(&domain)?;
                self.check_resolved(&domain).await
            }
            Host::Ipv4(ip) => {
                check_host_name(&ip.to_string())?;
                check_ip(IpAddr::V4(ip))
            }
            Host::Ipv6(ip) => check_ip(IpAddr::V6(ip)),
        }
    }

    async fn check_resolved(&self, host: &str) -> Result<(), FetchError> {
        match self.resolver.resolve(host).await {
            Ok(addrs) if addrs.is_empty() => {
                tracing::warn!(host = %host, "DNS returned no addresses, allowing");
                Ok(())
            }
            Ok(addrs) => addrs.into_iter().try_for_each(check_ip),
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "DNS resolution failed, allowing");
                Ok(())
            }
        }
    }
}

fn check_host_name(host: &str) -> Result<(), FetchError> {
    if BLOCKED_HOSTS.contains(&host) {
        return Err(FetchError::ssrf_blocked(format!("Blocked hostname: {host}")));
    }
    Ok(())
}

/// Rejects `ip` if it lies in any of the [`BLOCKED_RANGES`].
///
/// IPv4-mapped IPv6 addresses are checked as their IPv4 form.
pub fn check_ip(ip: IpAddr) -> Result<(), FetchError> {
    let canonical = match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(ip),
        IpAddr::V4(_) => ip,
    };
    match BLOCKED_RANGES.iter().find(|range| range.contains(canonical)) {
        Some(range) => Err(FetchError::ssrf_blocked(format!(
            "IP {ip} is in blocked range {range}"
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::dns::StaticResolver;

    fn guard() -> SsrfGuard {
        SsrfGuard::new(Arc::new(
            StaticResolver::new()
                .with_host("example.com", ["93.184.216.34".parse().unwrap()])
                .with_host("internal.example.com", ["10.1.2.3".parse().unwrap()])
                .with_host(
                    "mixed.example.com",
                    ["93.184.216.34".parse().unwrap(), "192.168.1.10".parse().unwrap()],
                ),
        ))
    }

    fn reason(err: FetchError) -> String {
        match err {
            FetchError::SsrfBlocked { reason } => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_range_contains() {
        let range = IpRange::v4([172, 16, 0, 0], 12);
        assert!(range.contains("172.31.255.255".parse().unwrap()));
        assert!(!range.contains("172.32.0.1".parse().unwrap()));
        assert!(!range.contains("::1".parse().unwrap()));
        assert_eq!(range.to_string(), "172.16.0.0/12");
        assert_eq!(IpRange::v6([0xfc00, 0, 0, 0, 0, 0, 0, 0], 7).to_string(), "fc00::/7");
    }

    #[tokio::test]
    async fn test_loopback_literal_names_range() {
        let err = guard().validate("http://127.0.0.1/").await.unwrap_err();
        let reason = reason(err);
        assert!(reason.contains("127.0.0.0/8"), "{reason}");
        assert!(reason.contains("127.0.0.1"), "{reason}");
    }

    #[tokio::test]
    async fn test_public_host_allowed() {
        assert!(guard().validate("https://example.com").await.is_ok());
    }

    #[tokio::test]
    async fn test_blocked_names() {
        let g = guard();
        for url in [
            "http://localhost:8080/",
            "http://metadata.google.internal/computeMetadata/v1/",
            "http://169.254.169.254/latest/meta-data/",
        ] {
            let reason = reason(g.validate(url).await.unwrap_err());
            assert!(reason.starts_with("Blocked hostname"), "{url}: {reason}");
        }
    }

    #[tokio::test]
    async fn test_scheme_rejected() {
        let reason = reason(guard().validate("ftp://example.com/").await.unwrap_err());
        assert_eq!(reason, "Invalid scheme: ftp");
    }

    #[tokio::test]
    async fn test_any_private_address_blocks() {
        let g = guard();
        let internal = reason(g.validate("https://internal.example.com/").await.unwrap_err());
        assert!(internal.contains("10.0.0.0/8"));

        let mixed = reason(g.validate("https://mixed.example.com/").await.unwrap_err());
        assert!(mixed.contains("192.168.0.0/16"));
    }

    #[tokio::test]
    async fn test_ipv6_literals() {
        let g = guard();
        assert!(reason(g.validate("http://[::1]/").await.unwrap_err()).contains("::1/128"));
        assert!(reason(g.validate("http://[fe80::1]/").await.unwrap_err()).contains("fe80::/10"));
        assert!(
            reason(g.validate("http://[::ffff:10.0.0.1]/").await.unwrap_err())
                .contains("10.0.0.0/8")
        );
        assert!(g.validate("http://[2606:4700::1111]/").await.is_ok());
    }

    #[tokio::test]
    async fn test_unresolvable_host_passes_through() {
        assert!(guard().validate("https://unknown.example.org/").await.is_ok());
    }
}
