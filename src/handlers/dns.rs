//! DNS lines: embedded JSON records from resolvers and the arrow-relation
//! sniffer for graph-shaped tool output.

use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, ArtifactKind};
use crate::writers::WriterKey;

use super::{HandlerContext, LineHandler};

/// Embedded DNS record: `{host, type, value, raw, ptr[]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsRecord {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub host: String,
    #[serde(rename = "type", skip_serializing_if = "String::is_empty")]
    pub record_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub raw: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ptr: Vec<String>,
}

impl DnsRecord {
    #[must_use]
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

fn record_dns(ctx: &HandlerContext, tool: &str, record: &DnsRecord, active: bool) {
    let mut artifact = Artifact::new(ArtifactKind::Dns, record.canonical_json()).active(active);
    if !record.host.is_empty() {
        artifact = artifact.meta("host", record.host.clone());
    }
    if !record.record_type.is_empty() {
        artifact = artifact.meta("type", record.record_type.clone());
    }
    if !record.value.is_empty() {
        artifact = artifact.meta("value", record.value.clone());
    }
    if !record.ptr.is_empty() {
        artifact = artifact.meta("ptr", serde_json::json!(record.ptr.clone()));
    }
    if !record.raw.is_empty() {
        artifact = artifact.meta("raw", record.raw.clone());
    }
    ctx.record(tool, artifact);
}

/// `dns:`-prefixed payloads carrying a JSON record.
pub struct DnsHandler;

impl LineHandler for DnsHandler {
    fn name(&self) -> &'static str {
        "dns"
    }

    fn prefix(&self) -> Option<&'static str> {
        Some("dns")
    }

    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
        let Ok(record) = serde_json::from_str::<DnsRecord>(payload.trim()) else {
            // Malformed payloads are absorbed.
            return true;
        };

        if active {
            if let Some(writer) = ctx.writer(WriterKey::Dns, true) {
                writer.write_raw(payload);
            }
        }
        record_dns(ctx, tool, &record, active);
        true
    }
}

/// Fallback sniffer for `X --> R --> Y` relation lines.
///
/// Only the strict three-part shape is claimed; anything else containing
/// `-->` falls through to the meta sniffer.
pub struct RelationSniffer;

impl LineHandler for RelationSniffer {
    fn name(&self) -> &'static str {
        "relation"
    }

    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
        let parts: Vec<&str> = payload.split("-->").map(str::trim).collect();
        if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
            return false;
        }

        let (left, left_kind) = split_node(parts[0]);
        let relation = normalize_relation(parts[1]);
        let (right, right_kind) = split_node(parts[2]);
        if left.is_empty() || relation.is_empty() || right.is_empty() {
            return false;
        }

        let record = DnsRecord {
            host: left.to_string(),
            record_type: relation,
            value: right.to_string(),
            ..Default::default()
        };

        let mut artifact = Artifact::new(ArtifactKind::Dns, record.canonical_json())
            .active(active)
            .meta("host", left.to_string())
            .meta("type", record.record_type.clone())
            .meta("value", right.to_string());
        if let Some(kind) = left_kind {
            artifact = artifact.meta("hostKind", kind);
        }
        if let Some(kind) = right_kind {
            artifact = artifact.meta("valueKind", kind);
        }
        ctx.record(tool, artifact);
        true
    }
}

/// Split `value (kind)` into its parts.
fn split_node(node: &str) -> (&str, Option<String>) {
    if let Some(open) = node.rfind(" (") {
        if let Some(stripped) = node[open + 2..].strip_suffix(')') {
            return (node[..open].trim(), Some(stripped.trim().to_string()));
        }
    }
    (node, None)
}

/// Uppercase DNS record type with `_record`/` record` suffixes removed.
fn normalize_relation(relation: &str) -> String {
    let (value, _) = split_node(relation);
    let upper = value.trim().to_ascii_uppercase();
    upper
        .strip_suffix("_RECORD")
        .or_else(|| upper.strip_suffix(" RECORD"))
        .unwrap_or(&upper)
        .trim()
        .to_string()
}
