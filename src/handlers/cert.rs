//! Certificate lines: parse, scope-filter the name set, promote names to
//! domains, and record the certificate itself under a fingerprint-based key.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::artifact::{Artifact, ArtifactKind};
use crate::normalize::normalize_domain;
use crate::writers::WriterKey;

use super::domain::record_domain;
use super::{HandlerContext, LineHandler};

/// Canonical certificate serialization shared by every certificate source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CertificateRecord {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub common_name: String,
    /// Order preserved from the producing source.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub dns_names: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subject: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub issuer: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub not_before: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub not_after: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub serial_number: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fingerprint_sha256: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fingerprint_sha1: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fingerprint_md5: String,
}

impl CertificateRecord {
    /// Parse a `cert:` payload. Records without any identity (no common name
    /// and no DNS names) are rejected.
    #[must_use]
    pub fn parse(payload: &str) -> Option<Self> {
        let record: Self = serde_json::from_str(payload.trim()).ok()?;
        if record.common_name.is_empty() && record.dns_names.is_empty() {
            return None;
        }
        Some(record)
    }

    /// The canonical JSON form written to the certs file and stored as the
    /// artifact value.
    #[must_use]
    pub fn canonical_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Stable deduplication key: the SHA-256 fingerprint when the source
    /// provided one, otherwise a SHA-256 over the canonical JSON form.
    #[must_use]
    pub fn key(&self) -> String {
        let fp = self.fingerprint_sha256.trim();
        if !fp.is_empty() {
            return fp.replace(':', "").to_ascii_lowercase();
        }
        let digest = Sha256::digest(self.canonical_json().as_bytes());
        hex::encode(digest)
    }
}

fn handle_certificate(
    ctx: &HandlerContext,
    tool: &str,
    record: CertificateRecord,
    active: bool,
) -> bool {
    let mut record = record;

    // Scope-filter the name set, order preserved, common name first.
    let mut names: Vec<String> = Vec::new();
    for raw in std::iter::once(record.common_name.as_str())
        .chain(record.dns_names.iter().map(String::as_str))
    {
        let Some(name) = normalize_domain(raw) else {
            continue;
        };
        if ctx.scope().allows_domain(&name) && !names.contains(&name) {
            names.push(name);
        }
    }

    // Every surviving name becomes a domain artifact: passively always,
    // actively as well when the run probes the target.
    for name in &names {
        if ctx.active_mode() {
            record_domain(ctx, tool, name, true);
        } else {
            record_domain(ctx, tool, name, false);
        }
    }

    record.dns_names.retain(|raw| {
        normalize_domain(raw).is_some_and(|name| ctx.scope().allows_domain(&name))
    });

    let key = record.key();
    let serialized = record.canonical_json();

    if ctx.mark_seen("cert", &key, active) {
        if let Some(writer) = ctx.writer(WriterKey::Certs, active) {
            writer.write_raw(&serialized);
        }
    }

    let names_json: Vec<serde_json::Value> = names
        .iter()
        .map(|n| serde_json::Value::String(n.clone()))
        .collect();
    let artifact = Artifact::new(ArtifactKind::Cert, serialized)
        .active(active)
        .meta("names", serde_json::Value::Array(names_json))
        .meta("key", key);
    ctx.record(tool, artifact);
    true
}

/// `cert:`-prefixed payloads.
pub struct CertHandler;

impl LineHandler for CertHandler {
    fn name(&self) -> &'static str {
        "cert"
    }

    fn prefix(&self) -> Option<&'static str> {
        Some("cert")
    }

    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
        match CertificateRecord::parse(payload) {
            Some(record) => handle_certificate(ctx, tool, record, active),
            // Malformed payloads are absorbed.
            None => true,
        }
    }
}

/// Fallback sniffer for bare certificate JSON lines.
pub struct CertSniffer;

impl LineHandler for CertSniffer {
    fn name(&self) -> &'static str {
        "cert"
    }

    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
        if !payload.trim_start().starts_with('{') {
            return false;
        }
        match CertificateRecord::parse(payload) {
            Some(record) => handle_certificate(ctx, tool, record, active),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::IdentityKey;
    use crate::handlers::testutil::{context, read_category};
    use tempfile::TempDir;

    fn payload() -> String {
        serde_json::json!({
            "source": "crtsh",
            "commonName": "a.example.com",
            "dnsNames": ["a.example.com", "b.example.com", "out-of-scope.net"],
            "issuer": "CN=R3,O=Let's Encrypt",
            "notBefore": "2026-01-01T00:00:00Z",
            "notAfter": "2026-04-01T00:00:00Z",
            "serialNumber": "03a1",
            "fingerprintSha256": "AA:BB:CC"
        })
        .to_string()
    }

    #[test]
    fn cert_names_expand_to_domains() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "example.com", false);

        assert!(CertHandler.handle(&ctx, "crtsh", &payload(), false));

        let mut domains = read_category(&dir, "example.com", "domains/domains.passive");
        domains.sort();
        assert_eq!(domains, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn cert_file_carries_filtered_name_list() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "example.com", false);

        CertHandler.handle(&ctx, "crtsh", &payload(), false);

        let lines = read_category(&dir, "example.com", "certs/certs.passive");
        assert_eq!(lines.len(), 1);
        let written = CertificateRecord::parse(&lines[0]).unwrap();
        assert_eq!(written.dns_names, vec!["a.example.com", "b.example.com"]);
    }

    #[test]
    fn cert_artifact_metadata_holds_names_and_key() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "example.com", false);

        CertHandler.handle(&ctx, "crtsh", &payload(), false);

        let snapshot = ctx.store_for_tests().snapshot();
        let cert = snapshot
            .iter()
            .find(|a| a.kind == ArtifactKind::Cert)
            .unwrap();
        let meta = cert.metadata.clone().unwrap();
        assert_eq!(
            meta["names"],
            serde_json::json!(["a.example.com", "b.example.com"])
        );
        assert_eq!(meta["key"], "aabbcc");
    }

    #[test]
    fn fingerprint_fallback_hashes_canonical_form() {
        let record = CertificateRecord {
            common_name: "a.example.com".into(),
            issuer: "CN=R3".into(),
            serial_number: "03a1".into(),
            ..Default::default()
        };
        let key = record.key();
        assert_eq!(key.len(), 64);
        assert_eq!(key, record.key());
    }

    #[test]
    fn duplicate_certs_dedupe_by_key() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "example.com", false);

        CertHandler.handle(&ctx, "crtsh", &payload(), false);
        CertHandler.handle(&ctx, "censys", &payload(), false);

        let lines = read_category(&dir, "example.com", "certs/certs.passive");
        assert_eq!(lines.len(), 1);
    }

    #[test]
    fn active_mode_promotes_names_actively() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "example.com", true);

        CertHandler.handle(&ctx, "crtsh", &payload(), false);

        let key = IdentityKey::new(ArtifactKind::Domain, "b.example.com", true);
        assert!(ctx.store_for_tests().get(&key).is_some());
        let passive = IdentityKey::new(ArtifactKind::Domain, "b.example.com", false);
        assert!(ctx.store_for_tests().get(&passive).is_some());
    }

    #[test]
    fn sniffer_claims_bare_cert_json() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "example.com", false);

        assert!(CertSniffer.handle(&ctx, "censys", &payload(), false));
        assert!(!CertSniffer.handle(&ctx, "censys", "not json", false));
        assert!(!CertSniffer.handle(&ctx, "censys", "{\"unrelated\": true}", false));
    }

    #[test]
    fn malformed_cert_prefix_payload_is_absorbed() {
        let dir = TempDir::new().unwrap();
        let ctx = context(&dir, "example.com", false);

        assert!(CertHandler.handle(&ctx, "crtsh", "%%%", false));
        assert!(ctx.store_for_tests().is_empty());
    }
}
