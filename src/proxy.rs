//! Proxy plumbing: environment variables for child tools, reqwest proxy for
//! the HTTP sources.

use std::time::Duration;

use anyhow::{Context, Result};

/// HTTP client defaults shared by every HTTP source.
const HTTP_TIMEOUT: Duration = Duration::from_secs(60);
const USER_AGENT: &str = concat!("passiverec/", env!("CARGO_PKG_VERSION"));

/// Export the proxy to child processes in both spellings.
///
/// This is the only process-global state the pipeline writes.
pub fn apply_proxy_env(proxy: &str) {
    for key in [
        "HTTP_PROXY",
        "http_proxy",
        "HTTPS_PROXY",
        "https_proxy",
        "ALL_PROXY",
        "all_proxy",
    ] {
        std::env::set_var(key, proxy);
    }
}

/// Build the shared HTTP client, routed through the proxy when configured.
pub fn build_http_client(proxy: Option<&str>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(HTTP_TIMEOUT);

    if let Some(proxy) = proxy {
        let proxy = reqwest::Proxy::all(proxy)
            .with_context(|| format!("invalid proxy URL: {proxy}"))?;
        builder = builder.proxy(proxy);
    }

    builder.build().context("failed to build HTTP client")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_builds_without_proxy() {
        assert!(build_http_client(None).is_ok());
    }

    #[test]
    fn client_builds_with_proxy() {
        assert!(build_http_client(Some("http://127.0.0.1:8080")).is_ok());
    }

    #[test]
    fn invalid_proxy_is_rejected() {
        assert!(build_http_client(Some("not a proxy \u{0}")).is_err());
    }
}
