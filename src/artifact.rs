//! The pipeline's unit of record.
//!
//! An artifact is a typed finding with a canonical value and merged
//! provenance. Identity is the `(category, canonical value, active)` triple:
//! all route-family kinds collapse into one `route` category so a JS file and
//! the plain route observation of the same URL merge into one record.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::normalize_route;

/// Current manifest schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Closed set of artifact kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArtifactKind {
    #[serde(rename = "domain")]
    Domain,
    #[serde(rename = "route")]
    Route,
    #[serde(rename = "js")]
    Js,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "image")]
    Image,
    #[serde(rename = "maps")]
    Maps,
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "api")]
    Api,
    #[serde(rename = "wasm")]
    Wasm,
    #[serde(rename = "svg")]
    Svg,
    #[serde(rename = "crawl")]
    Crawl,
    #[serde(rename = "meta-route")]
    MetaRoute,
    #[serde(rename = "cert")]
    Cert,
    #[serde(rename = "dns")]
    Dns,
    #[serde(rename = "rdap")]
    Rdap,
    #[serde(rename = "meta")]
    Meta,
    #[serde(rename = "gfFinding")]
    GfFinding,
}

impl ArtifactKind {
    /// The manifest spelling of the kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Route => "route",
            Self::Js => "js",
            Self::Html => "html",
            Self::Image => "image",
            Self::Maps => "maps",
            Self::Json => "json",
            Self::Api => "api",
            Self::Wasm => "wasm",
            Self::Svg => "svg",
            Self::Crawl => "crawl",
            Self::MetaRoute => "meta-route",
            Self::Cert => "cert",
            Self::Dns => "dns",
            Self::Rdap => "rdap",
            Self::Meta => "meta",
            Self::GfFinding => "gfFinding",
        }
    }

    /// All route-family kinds share one identity category.
    #[must_use]
    pub fn is_route_family(self) -> bool {
        matches!(
            self,
            Self::Route
                | Self::Js
                | Self::Html
                | Self::Image
                | Self::Maps
                | Self::Json
                | Self::Api
                | Self::Wasm
                | Self::Svg
                | Self::Crawl
                | Self::MetaRoute
        )
    }

    /// Identity category: route-family kinds collapse into `route`.
    #[must_use]
    pub fn category(self) -> &'static str {
        if self.is_route_family() {
            "route"
        } else {
            self.as_str()
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed finding. One line of the JSONL manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_kinds: Vec<ArtifactKind>,
    pub value: String,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, serde_json::Value>>,
    /// First observed producer.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tool: String,
    /// All producers, emitted sorted.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub tools: BTreeSet<String>,
    #[serde(default)]
    pub occurrences: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub first_seen: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub last_seen: String,
    #[serde(default)]
    pub schema_version: u32,
}

impl Artifact {
    /// A fresh artifact; timestamps, tool attribution and schema version are
    /// filled in by the store on `record`.
    #[must_use]
    pub fn new(kind: ArtifactKind, value: impl Into<String>) -> Self {
        Self {
            kind,
            extra_kinds: Vec::new(),
            value: value.into(),
            active: false,
            metadata: None,
            tool: String::new(),
            tools: BTreeSet::new(),
            occurrences: 0,
            first_seen: String::new(),
            last_seen: String::new(),
            schema_version: 0,
        }
    }

    #[must_use]
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    #[must_use]
    pub fn extra_kind(mut self, kind: ArtifactKind) -> Self {
        self.extra_kinds.push(kind);
        self
    }

    /// Attach one metadata entry. Null values are dropped by the store.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn tool(mut self, tool: impl Into<String>) -> Self {
        self.tool = tool.into();
        self
    }

    /// The identity key this artifact resolves to.
    #[must_use]
    pub fn identity(&self) -> IdentityKey {
        IdentityKey::new(self.kind, &self.value, self.active)
    }
}

/// The `(category, canonical value, active)` triple keying the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub category: &'static str,
    pub value: String,
    pub active: bool,
}

impl IdentityKey {
    #[must_use]
    pub fn new(kind: ArtifactKind, value: &str, active: bool) -> Self {
        let category = kind.category();
        let canonical = if kind.is_route_family() {
            normalize_route(value).unwrap_or_else(|| value.trim().to_string())
        } else {
            value.trim().to_string()
        };
        Self {
            category,
            value: canonical,
            active,
        }
    }
}

/// RFC-3339 UTC timestamp with second precision.
#[must_use]
pub fn now_ts() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_family_collapses_to_route_category() {
        assert_eq!(ArtifactKind::Js.category(), "route");
        assert_eq!(ArtifactKind::MetaRoute.category(), "route");
        assert_eq!(ArtifactKind::Route.category(), "route");
        assert_eq!(ArtifactKind::Domain.category(), "domain");
        assert_eq!(ArtifactKind::Cert.category(), "cert");
    }

    #[test]
    fn identity_normalizes_route_values() {
        let a = IdentityKey::new(ArtifactKind::Route, "HTTPS://App.Example.com:443/Path", false);
        let b = IdentityKey::new(ArtifactKind::Js, "https://app.example.com/Path", false);
        assert_eq!(a, b);
    }

    #[test]
    fn identity_distinguishes_active_flag() {
        let passive = IdentityKey::new(ArtifactKind::Domain, "example.com", false);
        let active = IdentityKey::new(ArtifactKind::Domain, "example.com", true);
        assert_ne!(passive, active);
    }

    #[test]
    fn kind_serializes_to_manifest_spelling() {
        let json = serde_json::to_string(&ArtifactKind::MetaRoute).unwrap();
        assert_eq!(json, "\"meta-route\"");
        let json = serde_json::to_string(&ArtifactKind::GfFinding).unwrap();
        assert_eq!(json, "\"gfFinding\"");
    }

    #[test]
    fn artifact_serializes_camel_case() {
        let mut artifact = Artifact::new(ArtifactKind::Domain, "example.com").tool("subfinder");
        artifact.first_seen = "2026-01-01T00:00:00Z".into();
        artifact.last_seen = "2026-01-01T00:00:00Z".into();
        artifact.occurrences = 1;
        artifact.schema_version = SCHEMA_VERSION;
        artifact.tools.insert("subfinder".into());

        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["kind"], "domain");
        assert_eq!(json["firstSeen"], "2026-01-01T00:00:00Z");
        assert_eq!(json["schemaVersion"], 1);
        assert!(json.get("extraKinds").is_none());
    }

    #[test]
    fn manifest_round_trip() {
        let line = r#"{"kind":"route","extraKinds":["js"],"value":"https://a.example.com/app.js","active":true,"tool":"subjs","tools":["httpx","subjs"],"occurrences":2,"firstSeen":"2026-01-01T00:00:00Z","lastSeen":"2026-01-02T00:00:00Z","schemaVersion":1}"#;
        let artifact: Artifact = serde_json::from_str(line).unwrap();
        assert_eq!(artifact.kind, ArtifactKind::Route);
        assert_eq!(artifact.extra_kinds, vec![ArtifactKind::Js]);
        assert_eq!(artifact.tools.len(), 2);
    }
}
