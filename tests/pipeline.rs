//! End-to-end sink scenarios: lines in, category files and manifest out.

use std::collections::HashSet;
use std::sync::Arc;

use camino::Utf8Path;
use tempfile::TempDir;

use passiverec::artifact::{Artifact, ArtifactKind, IdentityKey};
use passiverec::paths::OutputLayout;
use passiverec::scope::Scope;
use passiverec::sink::Sink;

const TARGET: &str = "example.com";

fn layout(dir: &TempDir) -> OutputLayout {
    OutputLayout::new(Utf8Path::from_path(dir.path()).unwrap(), TARGET)
}

fn spawn_sink(dir: &TempDir, workers: usize, active: bool) -> Sink {
    Sink::spawn(workers, Scope::new(TARGET), layout(dir), active)
}

fn read_lines(dir: &TempDir, rel: &str) -> Vec<String> {
    match std::fs::read_to_string(layout(dir).join(rel).as_std_path()) {
        Ok(content) => content.lines().map(ToString::to_string).collect(),
        Err(_) => Vec::new(),
    }
}

fn read_set(dir: &TempDir, rel: &str) -> HashSet<String> {
    read_lines(dir, rel).into_iter().collect()
}

fn read_manifest(dir: &TempDir) -> Vec<Artifact> {
    match std::fs::read_to_string(layout(dir).manifest().as_std_path()) {
        Ok(content) => content
            .lines()
            .map(|l| serde_json::from_str(l).expect("manifest line parses"))
            .collect(),
        Err(_) => Vec::new(),
    }
}

#[tokio::test]
async fn s1_passive_scope_filtering() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 2, false);

    let sender = sink.tool_sender("subfinder");
    for line in [
        "example.com",
        "https://app.example.com/login",
        "intruder.com",
        "meta: run started",
    ] {
        sender.send(line).await;
    }
    sink.flush().await.unwrap();

    assert_eq!(
        read_set(&dir, "domains/domains.passive"),
        HashSet::from(["example.com".to_string(), "app.example.com".to_string()])
    );
    assert_eq!(
        read_lines(&dir, "routes/routes.passive"),
        vec!["https://app.example.com/login"]
    );
    assert_eq!(read_lines(&dir, "meta.passive"), vec!["run started"]);

    // The out-of-scope value appears nowhere.
    for artifact in read_manifest(&dir) {
        assert!(!artifact.value.contains("intruder.com"));
    }

    sink.close().await.unwrap();
}

#[tokio::test]
async fn s2_url_canonicalization() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 2, false);

    let sender = sink.tool_sender("wayback");
    sender.send("HTTPS://App.Example.com:443/Path").await;
    sender.send("https://app.example.com/Path").await;
    sink.flush().await.unwrap();

    assert_eq!(
        read_lines(&dir, "routes/routes.passive"),
        vec!["https://app.example.com/Path"]
    );

    let key = IdentityKey::new(ArtifactKind::Route, "https://app.example.com/Path", false);
    let artifact = sink.store().get(&key).unwrap();
    assert_eq!(artifact.occurrences, 2);

    sink.close().await.unwrap();
}

#[tokio::test]
async fn s3_active_route_with_404() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 2, true);

    sink.tool_sender("httpx")
        .send("active: https://x.example.com/login [404]")
        .await;
    sink.flush().await.unwrap();

    assert_eq!(
        read_lines(&dir, "routes/routes.passive"),
        vec!["https://x.example.com/login"]
    );
    assert!(read_lines(&dir, "routes/routes.active").is_empty());

    let key = IdentityKey::new(ArtifactKind::Route, "https://x.example.com/login", true);
    let artifact = sink.store().get(&key).unwrap();
    assert!(artifact.active);
    assert_eq!(artifact.metadata.unwrap()["status"], 404);

    // No category writers touched.
    assert!(read_lines(&dir, "routes/js/js.active").is_empty());
    assert!(read_lines(&dir, "routes/api/api.active").is_empty());

    sink.close().await.unwrap();
}

#[tokio::test]
async fn s4_certificate_expansion() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 2, false);

    let payload = serde_json::json!({
        "source": "crtsh",
        "commonName": "a.example.com",
        "dnsNames": ["a.example.com", "b.example.com", "out-of-scope.net"],
        "issuer": "CN=R3",
        "serialNumber": "01",
        "fingerprintSha256": "ab:cd"
    });
    sink.tool_sender("crtsh").send(&format!("cert:{payload}")).await;
    sink.flush().await.unwrap();

    assert_eq!(
        read_set(&dir, "domains/domains.passive"),
        HashSet::from(["a.example.com".to_string(), "b.example.com".to_string()])
    );

    let certs = read_lines(&dir, "certs/certs.passive");
    assert_eq!(certs.len(), 1);
    assert!(certs[0].contains("a.example.com"));
    assert!(!certs[0].contains("out-of-scope.net"));

    let cert_artifact = read_manifest(&dir)
        .into_iter()
        .find(|a| a.kind == ArtifactKind::Cert)
        .unwrap();
    assert_eq!(
        cert_artifact.metadata.unwrap()["names"],
        serde_json::json!(["a.example.com", "b.example.com"])
    );

    sink.close().await.unwrap();
}

#[tokio::test]
async fn s5_route_categorization() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 2, false);

    sink.tool_sender("wayback")
        .send("https://app.example.com/static/swagger.json")
        .await;
    sink.flush().await.unwrap();

    let url = "https://app.example.com/static/swagger.json";
    assert_eq!(read_lines(&dir, "routes/routes.passive"), vec![url]);
    assert_eq!(read_lines(&dir, "routes/api/api.passive"), vec![url]);

    let key = IdentityKey::new(ArtifactKind::Api, url, false);
    let artifact = sink.store().get(&key).unwrap();
    assert_eq!(artifact.kind, ArtifactKind::Api);
    assert!(artifact.extra_kinds.contains(&ArtifactKind::Route));

    sink.close().await.unwrap();
}

#[tokio::test]
async fn s6_concurrent_dedupe() {
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(spawn_sink(&dir, 4, false));

    let mut tasks = Vec::new();
    for tool in ["alpha", "beta", "gamma"] {
        let sender = sink.tool_sender(tool);
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                sender.send("example.com").await;
                sender.send("https://www.example.com/login").await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    sink.flush().await.unwrap();

    assert_eq!(read_lines(&dir, "domains/domains.passive").len(), 1);
    assert_eq!(read_lines(&dir, "routes/routes.passive").len(), 1);

    let manifest = read_manifest(&dir);
    assert_eq!(manifest.len(), 2);
    for artifact in &manifest {
        for tool in ["alpha", "beta", "gamma"] {
            assert!(artifact.tools.contains(tool), "{} missing {tool}", artifact.value);
        }
    }

    Arc::try_unwrap(sink).ok().unwrap().close().await.unwrap();
}

#[tokio::test]
async fn invariant_set_uniqueness_in_outputs() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 3, false);

    let sender = sink.tool_sender("mixed");
    for _ in 0..5 {
        sender.send("a.example.com").await;
        sender.send("A.EXAMPLE.COM").await;
        sender.send("https://a.example.com/app.js.map").await;
        sender.send("meta: repeated message").await;
    }
    sink.flush().await.unwrap();

    for rel in [
        "domains/domains.passive",
        "routes/routes.passive",
        "routes/maps/maps.passive",
        "meta.passive",
    ] {
        let lines = read_lines(&dir, rel);
        let distinct: HashSet<&String> = lines.iter().collect();
        assert_eq!(lines.len(), distinct.len(), "duplicates in {rel}");
        assert!(!lines.is_empty(), "{rel} unexpectedly empty");
    }

    sink.close().await.unwrap();
}

#[tokio::test]
async fn invariant_scope_containment() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 3, false);

    let scope = Scope::new(TARGET);
    let sender = sink.tool_sender("mixed");
    for line in [
        "a.example.com",
        "evil.net",
        "https://b.example.com/x",
        "https://evil.net/x",
        "//cdn.example.com/app.js",
        "*.example.com",
        "sub.sub.example.com",
    ] {
        sender.send(line).await;
    }
    sink.flush().await.unwrap();

    for artifact in read_manifest(&dir) {
        match artifact.kind {
            ArtifactKind::Domain => assert!(
                scope.allows_domain(&artifact.value),
                "out-of-scope domain {}",
                artifact.value
            ),
            k if k.is_route_family() => assert!(
                scope.allows_route(&artifact.value),
                "out-of-scope route {}",
                artifact.value
            ),
            _ => {}
        }
    }
    for line in read_lines(&dir, "domains/domains.passive") {
        assert!(scope.allows_domain(&line));
    }
    for line in read_lines(&dir, "routes/routes.passive") {
        assert!(scope.allows_route(&line));
    }

    sink.close().await.unwrap();
}

#[tokio::test]
async fn invariant_active_implies_passive() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 3, true);

    let sender = sink.tool_sender("httpx");
    sender.send("active: fresh.example.com").await;
    sender.send("active: https://fresh.example.com/panel [200]").await;
    sink.flush().await.unwrap();

    let manifest = read_manifest(&dir);
    for artifact in manifest.iter().filter(|a| a.active) {
        let passive = IdentityKey::new(artifact.kind, &artifact.value, false);
        assert!(
            sink.store().get(&passive).is_some(),
            "no passive record for {}",
            artifact.value
        );
    }
    assert!(read_set(&dir, "domains/domains.passive").contains("fresh.example.com"));
    assert!(read_set(&dir, "routes/routes.passive").contains("https://fresh.example.com/panel"));

    sink.close().await.unwrap();
}

#[tokio::test]
async fn invariant_route_identity_normalization() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 2, false);

    let sender = sink.tool_sender("wayback");
    for line in [
        "https://a.example.com/p",
        "HTTPS://a.example.com/p",
        "https://A.EXAMPLE.COM:443/p",
        "https://a.example.com/p#",
    ] {
        sender.send(line).await;
    }
    sink.flush().await.unwrap();

    let manifest = read_manifest(&dir);
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].occurrences, 4);

    sink.close().await.unwrap();
}

#[tokio::test]
async fn invariant_merge_idempotence() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 2, false);

    for tool in ["a", "b", "a", "a", "b"] {
        sink.tool_sender(tool).send("meta: same message").await;
    }
    sink.flush().await.unwrap();

    let manifest = read_manifest(&dir);
    assert_eq!(manifest.len(), 1);
    let artifact = &manifest[0];
    assert_eq!(artifact.occurrences, 5);
    assert_eq!(artifact.tools.len(), 2);
    // Identical raws collapse to one entry, serialized as a plain string.
    assert_eq!(artifact.metadata.as_ref().unwrap()["raw"], "same message");

    sink.close().await.unwrap();
}

#[tokio::test]
async fn invariant_flush_barrier() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 4, false);

    let sender = sink.tool_sender("wayback");
    for i in 0..200 {
        sender.send(&format!("https://app.example.com/page/{i}")).await;
    }
    sink.flush().await.unwrap();
    let after_first = read_manifest(&dir).len();
    assert_eq!(after_first, 200);

    for i in 200..250 {
        sender.send(&format!("https://app.example.com/page/{i}")).await;
    }
    sink.flush().await.unwrap();
    assert_eq!(read_manifest(&dir).len(), 250);

    sink.close().await.unwrap();
}

#[tokio::test]
async fn relation_lines_become_dns_artifacts() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 2, false);

    sink.tool_sender("amass")
        .send("a.example.com (FQDN) --> a_record --> 93.184.216.34 (IPAddress)")
        .await;
    sink.flush().await.unwrap();

    let manifest = read_manifest(&dir);
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].kind, ArtifactKind::Dns);
    let meta = manifest[0].metadata.clone().unwrap();
    assert_eq!(meta["type"], "A");

    sink.close().await.unwrap();
}

#[tokio::test]
async fn gffinding_lines_carry_rules() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 2, false);

    let payload = serde_json::json!({
        "resource": "https://a.example.com/app.js",
        "line": 7,
        "evidence": "secret=hunter2",
        "rules": ["secrets"]
    });
    sink.tool_sender("gf").send(&format!("gffinding:{payload}")).await;
    sink.flush().await.unwrap();

    let manifest = read_manifest(&dir);
    assert_eq!(manifest.len(), 1);
    assert_eq!(manifest[0].kind, ArtifactKind::GfFinding);
    assert_eq!(manifest[0].value, "https://a.example.com/app.js:#7 -> secret=hunter2");

    sink.close().await.unwrap();
}

#[tokio::test]
async fn manifest_schema_fields_are_present() {
    let dir = TempDir::new().unwrap();
    let sink = spawn_sink(&dir, 2, false);

    sink.tool_sender("subfinder").send("a.example.com").await;
    sink.flush().await.unwrap();

    let content = std::fs::read_to_string(layout(&dir).manifest().as_std_path()).unwrap();
    let value: serde_json::Value = serde_json::from_str(content.lines().next().unwrap()).unwrap();
    assert_eq!(value["kind"], "domain");
    assert_eq!(value["schemaVersion"], 1);
    assert!(value["occurrences"].as_u64().unwrap() >= 1);
    assert!(!value["lastSeen"].as_str().unwrap().is_empty());
    assert!(value["tools"].as_array().is_some());

    sink.close().await.unwrap();
}
