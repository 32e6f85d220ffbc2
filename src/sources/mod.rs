//! External source adapters.
//!
//! Each adapter is a thin wrapper around one discovery tool — a CLI binary
//! streamed line by line, or an HTTP API — that feeds the sink through a
//! per-producer [`ToolSender`](crate::sink::ToolSender). Adapters never
//! classify; they only translate tool output into the sink's line protocol.

mod amass;
mod assetfinder;
mod censys;
pub mod command;
mod crtsh;
pub mod dedupe;
mod dnsx;
mod gau;
mod httpx;
mod linkfinderevo;
mod rdap;
mod subfinder;
mod subjs;
mod waybackurls;

pub use amass::Amass;
pub use assetfinder::Assetfinder;
pub use censys::Censys;
pub use crtsh::Crtsh;
pub use dedupe::Dedupe;
pub use dnsx::Dnsx;
pub use gau::Gau;
pub use httpx::Httpx;
pub use linkfinderevo::LinkFinderEvo;
pub use rdap::Rdap;
pub use subfinder::Subfinder;
pub use subjs::Subjs;
pub use waybackurls::Waybackurls;

use std::sync::Mutex;

use async_trait::async_trait;
use camino::Utf8PathBuf;

use crate::error::SourceError;
use crate::paths::OutputLayout;
use crate::sink::ToolSender;

/// Shared run state handed to every source.
pub struct SourceContext {
    pub target: String,
    pub layout: OutputLayout,
    pub http: reqwest::Client,
    pub active: bool,
    pub workers: usize,
    pub censys_api_id: Option<String>,
    pub censys_api_secret: Option<String>,
    /// The domain list consumed by downstream steps. Starts at
    /// `domains.passive`; the dedupe step repoints it at `domains.dedupe`.
    domains_file: Mutex<Utf8PathBuf>,
}

impl SourceContext {
    #[must_use]
    pub fn new(target: impl Into<String>, layout: OutputLayout, http: reqwest::Client) -> Self {
        let domains_file = layout.join("domains/domains.passive");
        Self {
            target: target.into(),
            layout,
            http,
            active: false,
            workers: 1,
            censys_api_id: None,
            censys_api_secret: None,
            domains_file: Mutex::new(domains_file),
        }
    }

    /// Current domain list path.
    #[must_use]
    pub fn domains_file(&self) -> Utf8PathBuf {
        self.domains_file
            .lock()
            .expect("domains pointer poisoned")
            .clone()
    }

    /// Repoint downstream steps at a new domain list (dedupe).
    pub fn set_domains_file(&self, path: Utf8PathBuf) {
        *self.domains_file.lock().expect("domains pointer poisoned") = path;
    }

    /// Lines of the current domain list; empty when the file is missing.
    #[must_use]
    pub fn domain_list(&self) -> Vec<String> {
        read_lines(&self.domains_file())
    }

    /// Number of domains currently available to downstream steps.
    #[must_use]
    pub fn domain_count(&self) -> usize {
        self.domain_list().len()
    }
}

/// Read non-empty lines of a file, tolerating its absence.
#[must_use]
pub fn read_lines(path: &Utf8PathBuf) -> Vec<String> {
    match std::fs::read_to_string(path.as_std_path()) {
        Ok(content) => content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

/// One discovery source.
#[async_trait]
pub trait Source: Send + Sync {
    /// Tool name, used for sink attribution and metrics.
    fn name(&self) -> &'static str;

    /// Stream findings into the sink. Cancellation arrives by drop: the
    /// orchestrator races this future against the step deadline.
    async fn run(&self, ctx: &SourceContext, out: &ToolSender) -> Result<(), SourceError>;
}
