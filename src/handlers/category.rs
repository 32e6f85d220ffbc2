//! Route category detection.
//!
//! Given a canonical route, derive path, base name, extension and query, and
//! assign zero or more categories. A route may carry several categories; the
//! first one becomes the artifact's primary kind.

use crate::artifact::ArtifactKind;

const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "ico", "tif", "tiff", "jfif", "avif",
    "apng", "heic", "heif",
];

const API_NAME_HINTS: &[&str] = &[
    "swagger",
    "openapi",
    "api-doc",
    "api_docs",
    "apispec",
    "api-spec",
    "api_spec",
    "api-definition",
    "api_definition",
];

const SENSITIVE_EXTENSIONS: &[&str] = &[
    "bak", "old", "swp", "sql", "db", "sqlite", "env", "ini", "cfg", "config", "conf", "log",
];

const ARCHIVE_EXTENSIONS: &[&str] = &["zip", "tar", "gz", "tgz", "rar", "7z", "bz2", "xz"];

const ARCHIVE_HINTS: &[&str] = &["backup", "config", "secret", "database", "db"];

const SENSITIVE_NAME_HINTS: &[&str] = &[
    "backup",
    "secret",
    "token",
    "password",
    "passwd",
    "credential",
    "creds",
    "config",
    "database",
    "db",
    "id_rsa",
    ".env",
    ".git",
    ".svn",
    "ssh",
    "private",
];

const SENSITIVE_QUERY_HINTS: &[&str] = &[
    "token=",
    "secret=",
    "password=",
    "passwd=",
    "key=",
    "apikey=",
    "api_key=",
    "access_token=",
    "auth=",
    "credential",
];

/// Categories assigned to a route, in priority order.
#[must_use]
pub fn detect_categories(route: &str) -> Vec<ArtifactKind> {
    let (path, query) = split_path_query(route);
    let path = path.to_ascii_lowercase();
    let query = query.to_ascii_lowercase();
    let full = route.to_ascii_lowercase();

    let base = path.rsplit('/').next().unwrap_or("").to_string();
    let ext = extension(&base);

    let mut kinds = Vec::new();
    let push = |kind: ArtifactKind, kinds: &mut Vec<ArtifactKind>| {
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    };

    match ext.as_str() {
        "map" => push(ArtifactKind::Maps, &mut kinds),
        "wasm" => push(ArtifactKind::Wasm, &mut kinds),
        "svg" => push(ArtifactKind::Svg, &mut kinds),
        "jsonld" => push(ArtifactKind::Json, &mut kinds),
        "json" | "yaml" | "yml" => {
            if is_api_spec(&path, &base, &full) {
                push(ArtifactKind::Api, &mut kinds);
            } else if ext == "json" {
                push(ArtifactKind::Json, &mut kinds);
            }
        }
        _ => {}
    }

    if is_crawl_control(&path, &base, &ext) {
        push(ArtifactKind::Crawl, &mut kinds);
    }
    if is_sensitive(&base, &ext, &query) {
        push(ArtifactKind::MetaRoute, &mut kinds);
    }
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        push(ArtifactKind::Image, &mut kinds);
    }

    kinds
}

/// Slice the route into (path, query); works for absolute URLs and bare
/// path tokens alike.
fn split_path_query(route: &str) -> (&str, &str) {
    let without_fragment = route.split('#').next().unwrap_or(route);
    let (head, query) = match without_fragment.split_once('?') {
        Some((h, q)) => (h, q),
        None => (without_fragment, ""),
    };
    let path = match head.find("://") {
        Some(idx) => {
            let after = &head[idx + 3..];
            match after.find('/') {
                Some(slash) => &after[slash..],
                None => "",
            }
        }
        None => head,
    };
    (path, query)
}

fn extension(base: &str) -> String {
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => ext.to_string(),
        _ => String::new(),
    }
}

fn is_api_spec(path: &str, base: &str, full: &str) -> bool {
    if API_NAME_HINTS.iter().any(|h| path.contains(h) || base.contains(h)) {
        return true;
    }
    let stem = base.split('.').next().unwrap_or("");
    stem == "api" && (full.contains("openapi") || full.contains("swagger"))
}

fn is_crawl_control(path: &str, base: &str, ext: &str) -> bool {
    if ext == "xml" && path.contains("sitemap") {
        return true;
    }
    if base == "robots.txt" || base == "sitemap.xml.gz" {
        return true;
    }
    ext.is_empty() && path.ends_with("/robots")
}

fn is_sensitive(base: &str, ext: &str, query: &str) -> bool {
    if SENSITIVE_EXTENSIONS.contains(&ext) {
        return true;
    }
    if ARCHIVE_EXTENSIONS.contains(&ext) && ARCHIVE_HINTS.iter().any(|h| base.contains(h)) {
        return true;
    }
    if SENSITIVE_NAME_HINTS.iter().any(|h| base.contains(h)) {
        return true;
    }
    SENSITIVE_QUERY_HINTS.iter().any(|h| query.contains(h))
}
