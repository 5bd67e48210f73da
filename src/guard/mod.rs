//! Input hardening for untrusted URLs.
//!
//! - [`normalize()`] turns user input into one canonical URL string.
//! - [`SsrfGuard`] refuses URLs that point at private or metadata hosts.

pub mod normalize;
pub mod ssrf;

pub use normalize::{is_tracking_param, normalize, TRACKING_PARAMS};
pub use ssrf::{check_ip, IpRange, SsrfGuard, BLOCKED_HOSTS, BLOCKED_RANGES};
