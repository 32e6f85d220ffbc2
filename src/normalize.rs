//! Canonicalization of domains and routes.
//!
//! Every value entering the pipeline goes through one of these normalizers
//! before scope checks, deduplication and storage, so two spellings of the
//! same entity always collapse to one canonical form.

use std::net::IpAddr;

use url::Url;

/// Canonicalize a domain-like value.
///
/// Strips comments and trailing tokens, extracts the hostname from URL-shaped
/// input, removes credentials, ports and IPv6 brackets, lowercases, and drops
/// a single leading wildcard label. Returns `None` for values that do not
/// reduce to a hostname or IP literal: wildcards in other positions, or
/// non-IP values without a dot.
#[must_use]
pub fn normalize_domain(input: &str) -> Option<String> {
    let mut token = input.trim();
    if token.is_empty() {
        return None;
    }

    // Comment handling: drop everything from the first '#'.
    if let Some(idx) = token.find('#') {
        token = token[..idx].trim();
    }

    // Metadata after the value is separated by whitespace.
    token = token.split_whitespace().next()?;

    let mut host = if token.contains("://") {
        let url = Url::parse(token).ok()?;
        url.host_str()?.to_string()
    } else {
        strip_userinfo_and_port(token)
    };

    // IPv6 literals may arrive bracketed; DNS output may append the FQDN dot.
    host = host
        .trim_start_matches('[')
        .trim_end_matches(']')
        .trim_end_matches('.')
        .to_ascii_lowercase();

    if let Some(stripped) = host.strip_prefix("*.") {
        host = stripped.to_string();
    }
    if host.is_empty() || host.contains('*') {
        return None;
    }

    if host.parse::<IpAddr>().is_ok() {
        return Some(host);
    }
    if !host.contains('.') || host.contains(['/', ':', '?', '=', '&']) {
        return None;
    }
    Some(host)
}

/// Drop a `user:pass@` prefix and a trailing `:port` from a raw host token.
fn strip_userinfo_and_port(token: &str) -> String {
    let after_creds = match token.rfind('@') {
        Some(idx) => &token[idx + 1..],
        None => token,
    };

    // Bracketed IPv6 keeps its colons; the port follows the bracket.
    if let Some(end) = after_creds.find(']') {
        return after_creds[..=end].to_string();
    }

    // A bare IPv6 literal has multiple colons and no port to strip.
    if after_creds.parse::<IpAddr>().is_ok() {
        return after_creds.to_string();
    }

    match after_creds.rsplit_once(':') {
        Some((host, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
            host.to_string()
        }
        _ => after_creds.to_string(),
    }
}

/// Canonicalize an absolute URL.
///
/// Lowercases scheme and host, drops the default port for http/https,
/// removes an empty fragment, and preserves user-info, path, query and any
/// non-empty fragment. Returns `None` for inputs without a scheme; a bare
/// domain is not a route.
#[must_use]
pub fn normalize_route(input: &str) -> Option<String> {
    let token = route_token(input);
    if token.is_empty() || !token.contains(':') {
        return None;
    }

    let mut url = Url::parse(token).ok()?;
    if url.fragment() == Some("") {
        url.set_fragment(None);
    }
    Some(url.to_string())
}

/// The route value itself: everything up to the first whitespace. Trailing
/// tokens (status brackets, titles) are metadata.
#[must_use]
pub fn route_token(input: &str) -> &str {
    input.trim().split_whitespace().next().unwrap_or("")
}

/// Parse the first bracketed metadata group of a route line as an HTTP
/// status code, e.g. `https://x/login [404] [Not Found]` → 404.
#[must_use]
pub fn parse_bracket_status(line: &str) -> Option<i32> {
    let open = line.find('[')?;
    let close = line[open..].find(']')? + open;
    line[open + 1..close].trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_lowercases_and_trims() {
        assert_eq!(normalize_domain("  App.Example.COM  "), Some("app.example.com".into()));
    }

    #[test]
    fn domain_strips_wildcard_label() {
        assert_eq!(normalize_domain("*.example.com"), Some("example.com".into()));
        assert_eq!(normalize_domain("a.*.example.com"), None);
    }

    #[test]
    fn domain_from_url_input() {
        assert_eq!(
            normalize_domain("https://user:pw@App.Example.com:8443/path?q=1"),
            Some("app.example.com".into())
        );
    }

    #[test]
    fn domain_strips_credentials_and_port() {
        assert_eq!(normalize_domain("admin@example.com:8080"), Some("example.com".into()));
    }

    #[test]
    fn domain_keeps_ip_literals() {
        assert_eq!(normalize_domain("192.168.1.1"), Some("192.168.1.1".into()));
        assert_eq!(normalize_domain("[2001:DB8::1]"), Some("2001:db8::1".into()));
        assert_eq!(normalize_domain("2001:db8::1"), Some("2001:db8::1".into()));
    }

    #[test]
    fn domain_rejects_dotless_and_comments() {
        assert_eq!(normalize_domain("localhost"), None);
        assert_eq!(normalize_domain("# a comment"), None);
        assert_eq!(normalize_domain("example.com # seen in scan"), Some("example.com".into()));
    }

    #[test]
    fn domain_strips_fqdn_dot() {
        assert_eq!(normalize_domain("a.example.com."), Some("a.example.com".into()));
    }

    #[test]
    fn domain_takes_first_token() {
        assert_eq!(normalize_domain("example.com extra data"), Some("example.com".into()));
    }

    #[test]
    fn route_lowercases_scheme_and_host() {
        assert_eq!(
            normalize_route("HTTPS://App.Example.com/Path"),
            Some("https://app.example.com/Path".into())
        );
    }

    #[test]
    fn route_drops_default_ports() {
        assert_eq!(
            normalize_route("https://app.example.com:443/Path"),
            Some("https://app.example.com/Path".into())
        );
        assert_eq!(
            normalize_route("http://app.example.com:80/"),
            Some("http://app.example.com/".into())
        );
        assert_eq!(
            normalize_route("http://app.example.com:8080/"),
            Some("http://app.example.com:8080/".into())
        );
    }

    #[test]
    fn route_preserves_userinfo_query_fragment() {
        assert_eq!(
            normalize_route("https://u:p@example.com/a?b=C#Frag"),
            Some("https://u:p@example.com/a?b=C#Frag".into())
        );
    }

    #[test]
    fn route_strips_empty_fragment() {
        assert_eq!(
            normalize_route("https://example.com/a#"),
            Some("https://example.com/a".into())
        );
    }

    #[test]
    fn route_rejects_bare_domains_and_paths() {
        assert_eq!(normalize_route("example.com"), None);
        assert_eq!(normalize_route("/admin/login"), None);
    }

    #[test]
    fn route_token_cuts_at_whitespace() {
        assert_eq!(route_token("https://x.example.com/a [200] [Home]"), "https://x.example.com/a");
    }

    #[test]
    fn bracket_status() {
        assert_eq!(parse_bracket_status("https://x/a [404] [Not Found]"), Some(404));
        assert_eq!(parse_bracket_status("https://x/a [weird]"), None);
        assert_eq!(parse_bracket_status("https://x/a"), None);
    }
}
