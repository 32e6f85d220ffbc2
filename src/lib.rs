//! passiverec — passive reconnaissance of a single target.
//!
//! An orchestrator sequences external discovery tools; every tool streams
//! text lines into a concurrent sink that classifies, scope-filters and
//! deduplicates findings into typed artifacts, persisted as per-category
//! files plus a JSONL manifest.

pub mod artifact;
pub mod atomic_write;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod metrics;
pub mod normalize;
pub mod orchestrator;
pub mod paths;
pub mod progress;
pub mod proxy;
pub mod report;
pub mod scope;
pub mod sink;
pub mod sources;
pub mod store;
pub mod writers;

pub use artifact::{Artifact, ArtifactKind, IdentityKey};
pub use config::Config;
pub use error::{ConfigError, SourceError, StoreError, WriterError};
pub use scope::Scope;
pub use sink::Sink;
pub use store::ArtifactStore;
