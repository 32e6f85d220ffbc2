//! Meta-family handlers: free-text pipeline messages, RDAP registry output
//! and structured gf pattern findings.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use crate::artifact::{Artifact, ArtifactKind};
use crate::writers::WriterKey;

use super::{HandlerContext, LineHandler};

/// Producers whose names may lead a meta line.
const KNOWN_TOOLS: &[&str] = &[
    "amass",
    "subfinder",
    "assetfinder",
    "rdap",
    "crtsh",
    "censys",
    "dedupe",
    "waybackurls",
    "gau",
    "httpx",
    "subjs",
    "linkfinderevo",
    "dnsx",
    "gf",
];

static ANSI_ESCAPES: Lazy<Regex> =
    Lazy::new(|| Regex::new("\x1b\\[[0-9;?]*[ -/]*[@-~]").expect("static regex"));

/// Remove terminal escape sequences, keeping bracket structure intact.
#[must_use]
pub fn strip_ansi(text: &str) -> String {
    ANSI_ESCAPES.replace_all(text, "").into_owned()
}

/// Best-effort producer inference from the leading word of a message.
fn infer_tool(text: &str) -> Option<&'static str> {
    let first = text.split_whitespace().next()?;
    let token = first
        .trim_start_matches('[')
        .trim_end_matches([':', ']'])
        .to_ascii_lowercase();
    KNOWN_TOOLS.iter().copied().find(|t| *t == token)
}

fn record_meta(ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
    let clean = strip_ansi(payload);
    let clean = clean.trim();
    if clean.is_empty() {
        return true;
    }

    if let Some(writer) = ctx.writer(WriterKey::Meta, active) {
        writer.write_raw(clean);
    }

    let mut artifact = Artifact::new(ArtifactKind::Meta, clean)
        .active(active)
        .meta("raw", payload.trim());
    if let Some(inferred) = infer_tool(clean) {
        artifact = artifact.tool(inferred);
    }
    ctx.record(tool, artifact);
    true
}

/// `meta:`-prefixed pipeline messages.
pub struct MetaHandler;

impl LineHandler for MetaHandler {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn prefix(&self) -> Option<&'static str> {
        Some("meta")
    }

    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
        record_meta(ctx, tool, payload, active)
    }
}

/// Fallback sniffer for meta-looking lines: leftover arrow output and
/// parenthesized tool chatter.
pub struct MetaSniffer;

impl LineHandler for MetaSniffer {
    fn name(&self) -> &'static str {
        "meta"
    }

    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
        if !payload.contains("-->") && !payload.contains(" (") {
            return false;
        }
        record_meta(ctx, tool, payload, active)
    }
}

/// `rdap:` registry lines; honored only in passive mode.
pub struct RdapHandler;

impl LineHandler for RdapHandler {
    fn name(&self) -> &'static str {
        "rdap"
    }

    fn prefix(&self) -> Option<&'static str> {
        Some("rdap")
    }

    fn handle(&self, ctx: &HandlerContext, _tool: &str, payload: &str, active: bool) -> bool {
        if active {
            return true;
        }
        let trimmed = payload.trim();
        if trimmed.is_empty() {
            return true;
        }

        if let Some(writer) = ctx.writer(WriterKey::Rdap, false) {
            writer.write_raw(trimmed);
        }

        let tool = infer_tool(trimmed).unwrap_or("rdap");
        ctx.record(tool, Artifact::new(ArtifactKind::Rdap, trimmed));
        true
    }
}

/// Embedded gf finding: `{resource, line, evidence, context, rules[]}`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GfFinding {
    resource: String,
    line: u64,
    evidence: String,
    context: String,
    rules: Vec<String>,
}

/// `gffinding:` structured pattern matches.
pub struct GfFindingHandler;

impl LineHandler for GfFindingHandler {
    fn name(&self) -> &'static str {
        "gffinding"
    }

    fn prefix(&self) -> Option<&'static str> {
        Some("gffinding")
    }

    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
        let Ok(finding) = serde_json::from_str::<GfFinding>(payload.trim()) else {
            return true;
        };
        let evidence = finding.evidence.trim();
        if evidence.is_empty() {
            return true;
        }

        let mut value = String::new();
        if !finding.resource.trim().is_empty() {
            value.push_str(finding.resource.trim());
            if finding.line > 0 {
                value.push_str(&format!(":#{}", finding.line));
            }
            value.push_str(" -> ");
        }
        value.push_str(evidence);

        let mut rules: Vec<String> = finding
            .rules
            .iter()
            .map(|r| r.trim().to_ascii_lowercase())
            .filter(|r| !r.is_empty())
            .collect();
        rules.sort();
        rules.dedup();

        let mut artifact = Artifact::new(ArtifactKind::GfFinding, value)
            .active(active)
            .meta("evidence", evidence);
        if !rules.is_empty() {
            artifact = artifact.meta("rules", serde_json::json!(rules));
        }
        if !finding.resource.trim().is_empty() {
            artifact = artifact.meta("resource", finding.resource.trim());
        }
        if finding.line > 0 {
            artifact = artifact.meta("line", finding.line);
        }
        if !finding.context.trim().is_empty() {
            artifact = artifact.meta("context", finding.context.trim());
        }
        ctx.record(tool, artifact);
        true
    }
}
