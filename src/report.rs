//! HTML report rendered from the flushed manifest.
//!
//! Pure string templating over the artifact snapshot: per-kind counts, a
//! per-tool contribution table, and one section per kind listing values with
//! provenance. Listings are capped so a large crawl cannot produce a
//! gigabyte of HTML.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use camino::Utf8Path;

use crate::artifact::{now_ts, Artifact};
use crate::atomic_write::write_file_atomic;

/// Rows rendered per kind section.
const MAX_ROWS_PER_KIND: usize = 500;

/// Read the JSONL manifest back into artifacts, skipping unparseable lines.
pub fn read_manifest(path: &Utf8Path) -> Result<Vec<Artifact>> {
    let content = std::fs::read_to_string(path.as_std_path())
        .with_context(|| format!("failed to read manifest {path}"))?;
    Ok(content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect())
}

/// Render and write `report.html`.
pub fn write_report(target: &str, manifest: &Utf8Path, output: &Utf8Path) -> Result<()> {
    let artifacts = read_manifest(manifest)?;
    let html = render(target, &artifacts);
    write_file_atomic(output, &html)
}

fn render(target: &str, artifacts: &[Artifact]) -> String {
    let mut by_kind: BTreeMap<&str, Vec<&Artifact>> = BTreeMap::new();
    let mut by_tool: BTreeMap<&str, usize> = BTreeMap::new();
    for artifact in artifacts {
        by_kind.entry(artifact.kind.as_str()).or_default().push(artifact);
        for tool in &artifact.tools {
            *by_tool.entry(tool.as_str()).or_default() += 1;
        }
    }

    let mut out = String::with_capacity(16 * 1024);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!("<title>passiverec — {}</title>\n", escape(target)));
    out.push_str(
        "<style>\
         body{font-family:monospace;margin:2em;background:#111;color:#ddd}\
         h1,h2{color:#8fbc8f}\
         table{border-collapse:collapse;margin:1em 0}\
         td,th{border:1px solid #444;padding:4px 10px;text-align:left}\
         th{background:#222}\
         .muted{color:#888}\
         </style>\n</head>\n<body>\n",
    );
    out.push_str(&format!(
        "<h1>passiverec report: {}</h1>\n<p class=\"muted\">generated {} — {} artifacts</p>\n",
        escape(target),
        now_ts(),
        artifacts.len()
    ));

    out.push_str("<h2>Summary</h2>\n<table><tr><th>kind</th><th>count</th></tr>\n");
    for (kind, list) in &by_kind {
        out.push_str(&format!("<tr><td>{}</td><td>{}</td></tr>\n", escape(kind), list.len()));
    }
    out.push_str("</table>\n");

    out.push_str("<h2>Tools</h2>\n<table><tr><th>tool</th><th>artifacts</th></tr>\n");
    for (tool, count) in &by_tool {
        out.push_str(&format!("<tr><td>{}</td><td>{count}</td></tr>\n", escape(tool)));
    }
    out.push_str("</table>\n");

    for (kind, list) in &by_kind {
        out.push_str(&format!("<h2>{} ({})</h2>\n", escape(kind), list.len()));
        out.push_str(
            "<table><tr><th>value</th><th>active</th><th>tools</th>\
             <th>first seen</th><th>last seen</th></tr>\n",
        );
        for artifact in list.iter().take(MAX_ROWS_PER_KIND) {
            let tools: Vec<&str> = artifact.tools.iter().map(String::as_str).collect();
            out.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
                escape(&artifact.value),
                if artifact.active { "yes" } else { "no" },
                escape(&tools.join(", ")),
                escape(&artifact.first_seen),
                escape(&artifact.last_seen),
            ));
        }
        if list.len() > MAX_ROWS_PER_KIND {
            out.push_str(&format!(
                "<tr><td colspan=\"5\" class=\"muted\">… {} more</td></tr>\n",
                list.len() - MAX_ROWS_PER_KIND
            ));
        }
        out.push_str("</table>\n");
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactKind;
    use crate::store::ArtifactStore;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn manifest_with(dir: &TempDir, values: &[(&str, ArtifactKind)]) -> Utf8PathBuf {
        let path = Utf8Path::from_path(dir.path()).unwrap().join("artifacts.jsonl");
        let store = ArtifactStore::new(path.clone());
        for (value, kind) in values {
            store.record("test", Artifact::new(*kind, *value));
        }
        store.flush().unwrap();
        path
    }

    #[test]
    fn report_contains_summary_and_values() {
        let dir = TempDir::new().unwrap();
        let manifest = manifest_with(
            &dir,
            &[
                ("a.example.com", ArtifactKind::Domain),
                ("https://a.example.com/login", ArtifactKind::Route),
            ],
        );
        let output = Utf8Path::from_path(dir.path()).unwrap().join("report.html");

        write_report("example.com", &manifest, &output).unwrap();
        let html = std::fs::read_to_string(output.as_std_path()).unwrap();

        assert!(html.contains("passiverec report: example.com"));
        assert!(html.contains("a.example.com"));
        assert!(html.contains("<td>domain</td><td>1</td>"));
        assert!(html.contains("<td>route</td><td>1</td>"));
    }

    #[test]
    fn html_is_escaped() {
        let dir = TempDir::new().unwrap();
        let manifest = manifest_with(&dir, &[("<script>alert(1)</script>", ArtifactKind::Meta)]);
        let output = Utf8Path::from_path(dir.path()).unwrap().join("report.html");

        write_report("example.com", &manifest, &output).unwrap();
        let html = std::fs::read_to_string(output.as_std_path()).unwrap();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn missing_manifest_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = Utf8Path::from_path(dir.path()).unwrap().join("absent.jsonl");
        let output = Utf8Path::from_path(dir.path()).unwrap().join("report.html");
        assert!(write_report("example.com", &missing, &output).is_err());
    }
}
