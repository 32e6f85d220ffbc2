//! Output directory layout for a reconnaissance run.
//!
//! Every run writes under `<outdir>/<sanitized-target>/`. Category files are
//! created lazily by their writers; this module only decides where things go.

use camino::{Utf8Path, Utf8PathBuf};

/// Fallback directory name when the target sanitizes to nothing.
const DEFAULT_RUN_DIR: &str = "passive_rec";

/// Resolved output layout for a single run.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: Utf8PathBuf,
}

impl OutputLayout {
    /// Build the layout rooted at `<outdir>/<sanitized-target>/`.
    #[must_use]
    pub fn new(outdir: &Utf8Path, target: &str) -> Self {
        Self {
            root: outdir.join(sanitize_target(target)),
        }
    }

    /// The run's root directory.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// `artifacts.jsonl` manifest path.
    #[must_use]
    pub fn manifest(&self) -> Utf8PathBuf {
        self.root.join("artifacts.jsonl")
    }

    /// `report.html` path.
    #[must_use]
    pub fn report(&self) -> Utf8PathBuf {
        self.root.join("report.html")
    }

    /// `.checkpoint.json` path.
    #[must_use]
    pub fn checkpoint(&self) -> Utf8PathBuf {
        self.root.join(".checkpoint.json")
    }

    /// Deduplicated domain list written by the dedupe step.
    #[must_use]
    pub fn domains_dedupe(&self) -> Utf8PathBuf {
        self.root.join("domains").join("domains.dedupe")
    }

    /// Resolve a path relative to the run root.
    #[must_use]
    pub fn join(&self, rel: &str) -> Utf8PathBuf {
        self.root.join(rel)
    }
}

/// Sanitize the user-supplied target into a directory name.
///
/// A target carrying a scheme is URL-parsed and reduced to its hostname.
/// Slashes are trimmed, and `.` `/` `\` become `_` so the result is a single
/// path component. An empty result falls back to `passive_rec`.
#[must_use]
pub fn sanitize_target(target: &str) -> String {
    let trimmed = target.trim();

    let host_part = if trimmed.contains("://") {
        match url::Url::parse(trimmed) {
            Ok(u) => u.host_str().map(ToString::to_string).unwrap_or_default(),
            Err(_) => trimmed.to_string(),
        }
    } else {
        trimmed.to_string()
    };

    let stripped = host_part.trim_matches('/');
    let sanitized: String = stripped
        .chars()
        .map(|c| match c {
            '.' | '/' | '\\' => '_',
            other => other,
        })
        .collect();

    if sanitized.is_empty() {
        DEFAULT_RUN_DIR.to_string()
    } else {
        sanitized
    }
}

/// mkdir -p; treat `AlreadyExists` as success (removes TOCTTOU races)
pub fn ensure_dir_all<P: AsRef<std::path::Path>>(p: P) -> std::io::Result<()> {
    match std::fs::create_dir_all(&p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}
