//! In-memory artifact store and JSONL manifest.
//!
//! One record per identity key, first-insertion order preserved so the
//! manifest is stable across flushes. Merges accumulate provenance; the
//! manifest is rewritten atomically from the full in-memory state on every
//! flush, so a failed rewrite leaves the previous manifest intact.

use std::collections::HashMap;
use std::sync::Mutex;

use camino::Utf8PathBuf;

use crate::artifact::{now_ts, Artifact, IdentityKey, SCHEMA_VERSION};
use crate::atomic_write::write_file_atomic;
use crate::error::StoreError;

struct StoredRecord {
    artifact: Artifact,
    /// Observed `raw` metadata forms, deduplicated, in observation order.
    /// Serialized as a plain string when there is exactly one.
    raws: Vec<String>,
}

struct StoreInner {
    index: HashMap<IdentityKey, usize>,
    records: Vec<StoredRecord>,
    dirty: bool,
}

/// Identity-keyed artifact index with atomic manifest persistence.
pub struct ArtifactStore {
    manifest_path: Utf8PathBuf,
    inner: Mutex<StoreInner>,
}

impl ArtifactStore {
    #[must_use]
    pub fn new(manifest_path: Utf8PathBuf) -> Self {
        Self {
            manifest_path,
            inner: Mutex::new(StoreInner {
                index: HashMap::new(),
                records: Vec::new(),
                dirty: false,
            }),
        }
    }

    /// Manifest location.
    #[must_use]
    pub fn manifest_path(&self) -> &Utf8PathBuf {
        &self.manifest_path
    }

    /// Normalize, resolve identity, insert or merge. Returns false when the
    /// artifact is rejected (empty value).
    pub fn record(&self, tool: &str, artifact: Artifact) -> bool {
        let Some((normalized, raws)) = normalize_incoming(tool, artifact) else {
            return false;
        };
        let key = normalized.identity();

        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.dirty = true;

        if let Some(&idx) = inner.index.get(&key) {
            merge_into(&mut inner.records[idx], normalized, raws);
        } else {
            let idx = inner.records.len();
            inner.records.push(StoredRecord {
                artifact: normalized,
                raws,
            });
            inner.index.insert(key, idx);
        }
        true
    }

    /// Number of distinct records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("store mutex poisoned").records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialized copy of every record in first-insertion order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<Artifact> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner.records.iter().map(materialize).collect()
    }

    /// Look up a record by identity. Mostly useful to assert merge results.
    #[must_use]
    pub fn get(&self, key: &IdentityKey) -> Option<Artifact> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        inner
            .index
            .get(key)
            .map(|&idx| materialize(&inner.records[idx]))
    }

    /// Rewrite the manifest atomically from the full in-memory state.
    ///
    /// The snapshot is taken under the lock; the file write happens outside
    /// it. A failed write re-marks the store dirty.
    pub fn flush(&self) -> Result<(), StoreError> {
        let lines = {
            let mut inner = self.inner.lock().expect("store mutex poisoned");
            if !inner.dirty && inner.records.is_empty() {
                return Ok(());
            }
            inner.dirty = false;
            inner
                .records
                .iter()
                .map(|r| serde_json::to_string(&materialize(r)))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }

        if let Err(err) = write_file_atomic(&self.manifest_path, &content) {
            self.inner.lock().expect("store mutex poisoned").dirty = true;
            let io = std::io::Error::other(err.to_string());
            return Err(StoreError::Io(io));
        }
        Ok(())
    }
}

/// Apply the record-time normalization rules; `None` rejects the artifact.
fn normalize_incoming(tool: &str, mut artifact: Artifact) -> Option<(Artifact, Vec<String>)> {
    artifact.value = artifact.value.trim().to_string();
    if artifact.value.is_empty() {
        return None;
    }

    // Consolidate kind ∪ extraKinds into a sorted set, primary excluded.
    let mut kinds: Vec<_> = artifact.extra_kinds.clone();
    kinds.retain(|k| *k != artifact.kind);
    kinds.sort();
    kinds.dedup();
    artifact.extra_kinds = kinds;

    let mut raws = Vec::new();
    if let Some(meta) = artifact.metadata.take() {
        let mut cleaned = std::collections::BTreeMap::new();
        for (key, value) in meta {
            let key = key.trim().to_string();
            if key.is_empty() || value.is_null() {
                continue;
            }
            if key == "raw" {
                collect_raws(&value, &mut raws);
                continue;
            }
            cleaned.insert(key, value);
        }
        if !cleaned.is_empty() {
            artifact.metadata = Some(cleaned);
        }
    }

    if artifact.tool.is_empty() {
        artifact.tool = tool.to_string();
    }
    if !artifact.tool.is_empty() {
        artifact.tools.insert(artifact.tool.clone());
    }

    let now = now_ts();
    if artifact.first_seen.is_empty() {
        artifact.first_seen = now.clone();
    }
    artifact.last_seen = now;
    if artifact.schema_version == 0 {
        artifact.schema_version = SCHEMA_VERSION;
    }
    artifact.occurrences = 1;

    Some((artifact, raws))
}

/// Flatten a `raw` metadata value (string or list) into the raw set.
fn collect_raws(value: &serde_json::Value, raws: &mut Vec<String>) {
    match value {
        serde_json::Value::String(s) => {
            if !raws.iter().any(|r| r == s) {
                raws.push(s.clone());
            }
        }
        serde_json::Value::Array(items) => {
            for item in items {
                collect_raws(item, raws);
            }
        }
        other => {
            let rendered = other.to_string();
            if !raws.iter().any(|r| *r == rendered) {
                raws.push(rendered);
            }
        }
    }
}

/// Merge an incoming observation into an existing record.
fn merge_into(existing: &mut StoredRecord, incoming: Artifact, incoming_raws: Vec<String>) {
    let artifact = &mut existing.artifact;

    // Kinds: union, primary preserved.
    for kind in std::iter::once(incoming.kind).chain(incoming.extra_kinds) {
        if kind != artifact.kind && !artifact.extra_kinds.contains(&kind) {
            artifact.extra_kinds.push(kind);
        }
    }
    artifact.extra_kinds.sort();

    // Metadata: first write wins per key.
    if let Some(meta) = incoming.metadata {
        let target = artifact.metadata.get_or_insert_with(Default::default);
        for (key, value) in meta {
            target.entry(key).or_insert(value);
        }
    }
    for raw in incoming_raws {
        if !existing.raws.contains(&raw) {
            existing.raws.push(raw);
        }
    }

    if artifact.tool.is_empty() {
        artifact.tool = incoming.tool;
    }
    artifact.tools.extend(incoming.tools);

    if incoming.first_seen < artifact.first_seen {
        artifact.first_seen = incoming.first_seen;
    }
    if incoming.last_seen > artifact.last_seen {
        artifact.last_seen = incoming.last_seen;
    }
    artifact.occurrences += 1;
}

/// Clone the stored artifact with `raw` metadata rendered per cardinality.
fn materialize(record: &StoredRecord) -> Artifact {
    let mut artifact = record.artifact.clone();
    if !record.raws.is_empty() {
        let value = if record.raws.len() == 1 {
            serde_json::Value::String(record.raws[0].clone())
        } else {
            serde_json::Value::Array(
                record
                    .raws
                    .iter()
                    .map(|r| serde_json::Value::String(r.clone()))
                    .collect(),
            )
        };
        artifact
            .metadata
            .get_or_insert_with(Default::default)
            .insert("raw".to_string(), value);
    }
    artifact
}
