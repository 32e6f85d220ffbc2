//! Scope matcher: decides whether a domain or route belongs to the target.

use std::net::IpAddr;

use url::Url;

use crate::normalize::{normalize_domain, route_token};

/// Predicate over the configured target.
///
/// A hostname target matches itself and its strict subdomains; an IP target
/// matches only the same literal. IPs never match a hostname scope and vice
/// versa. The matcher never errors: unparseable input is simply out of scope.
#[derive(Debug, Clone)]
pub struct Scope {
    host: String,
    ip: Option<IpAddr>,
}

impl Scope {
    /// Build the scope from the user-supplied target string.
    #[must_use]
    pub fn new(target: &str) -> Self {
        let host = normalize_domain(target)
            .unwrap_or_else(|| target.trim().to_ascii_lowercase());
        let ip = host.parse().ok();
        Self { host, ip }
    }

    /// The normalized scope host (or IP literal rendering).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// True iff the scope was built from an IP literal.
    #[must_use]
    pub fn is_ip(&self) -> bool {
        self.ip.is_some()
    }

    /// True iff `d` normalizes non-empty and equals the scope host, equals
    /// the scope IP, or is a strict subdomain of the scope host.
    #[must_use]
    pub fn allows_domain(&self, d: &str) -> bool {
        let Some(norm) = normalize_domain(d) else {
            return false;
        };

        if let Some(scope_ip) = self.ip {
            return norm.parse::<IpAddr>() == Ok(scope_ip);
        }
        if norm.parse::<IpAddr>().is_ok() {
            return false;
        }

        norm == self.host || norm.ends_with(&format!(".{}", self.host))
    }

    /// Route admission.
    ///
    /// URLs with an explicit host reduce to that host; scheme-relative URLs
    /// likewise; path-only strings always pass; scheme-less domain-like
    /// strings are treated as domains; URLs without a host (`mailto:` and
    /// friends) always pass.
    #[must_use]
    pub fn allows_route(&self, r: &str) -> bool {
        let token = route_token(r);
        if token.is_empty() {
            return false;
        }

        if let Ok(url) = Url::parse(token) {
            return match url.host_str() {
                Some(host) => self.allows_domain(host),
                None => true,
            };
        }

        if let Some(rest) = token.strip_prefix("//") {
            let authority = rest
                .split(['/', '?', '#'])
                .next()
                .unwrap_or_default();
            return self.allows_domain(authority);
        }

        if token.starts_with(['/', '?', '#', '.']) {
            return true;
        }

        self.allows_domain(token)
    }
}
