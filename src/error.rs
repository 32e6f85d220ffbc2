//! Error taxonomy for the reconnaissance pipeline.
//!
//! Sources, writers and the store carry their own `thiserror` enums; the CLI
//! composes them through `anyhow` and maps them to exit codes. Library code
//! never calls `std::process::exit`.

use thiserror::Error;

/// Failures from an external source adapter.
///
/// A missing binary is benign (the host simply does not have the tool); every
/// other variant is logged as a warning and the pipeline continues with the
/// remaining steps.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("binary '{name}' not found on PATH")]
    MissingBinary { name: String },

    #[error("process execution failed: {reason}")]
    Process { reason: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("response decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("missing credentials: {what}")]
    MissingCredentials { what: String },

    #[error("step timed out after {seconds}s")]
    Timeout { seconds: u64 },
}

impl SourceError {
    /// Missing binaries are expected on most hosts and never treated as a
    /// pipeline failure.
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(self, Self::MissingBinary { .. })
    }

    /// The binary name for missing-binary errors, used by the shutdown
    /// summary.
    #[must_use]
    pub fn missing_binary(&self) -> Option<&str> {
        match self {
            Self::MissingBinary { name } => Some(name),
            _ => None,
        }
    }
}

/// Failures from a category output writer.
#[derive(Error, Debug)]
pub enum WriterError {
    #[error("writer for {path} failed to open: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("write to {path} failed: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("writer for {path} is closed")]
    Closed { path: String },
}

/// Failures from the artifact store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("manifest serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("manifest rewrite failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration and CLI surface errors. These are the only errors that abort
/// a run before the pipeline starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("target is required (pass --target)")]
    MissingTarget,

    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    #[error("config file {path} is not valid YAML or JSON: {reason}")]
    Parse { path: String, reason: String },

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("unknown tool '{name}' in --tools")]
    UnknownTool { name: String },
}
