//! Route-family handlers: the plain route sniffer with category detection,
//! and the shared implementation behind every categorized-route prefix
//! (`js:`, `html:`, `image:`, `maps:`, `json:`, `api:`, `wasm:`, `svg:`,
//! `crawl:`, `meta-route:`).

use crate::artifact::{Artifact, ArtifactKind};
use crate::normalize::{normalize_route, parse_bracket_status, route_token};
use crate::writers::WriterKey;

use super::category::detect_categories;
use super::{HandlerContext, LineHandler};

/// A parsed route line: the canonical (or raw path) base plus trailing
/// bracket metadata.
struct RouteLine {
    base: String,
    /// True when a canonical absolute URL was extracted.
    has_base: bool,
    status: Option<i32>,
}

fn parse_route_line(payload: &str) -> Option<RouteLine> {
    let token = route_token(payload);
    if token.is_empty() {
        return None;
    }
    let rest = &payload.trim()[token.len()..];
    let status = parse_bracket_status(rest);

    // Scheme-colon alone is not enough: bare `word:` tokens parse as URLs
    // but are tool chatter, not routes.
    if token.contains("://") {
        let base = normalize_route(token)?;
        return Some(RouteLine {
            base,
            has_base: true,
            status,
        });
    }
    if token.starts_with(['/', '?', '#', '.']) {
        return Some(RouteLine {
            base: token.to_string(),
            has_base: false,
            status,
        });
    }
    None
}

/// Map a detected category to its writer.
fn writer_key_for(kind: ArtifactKind) -> Option<WriterKey> {
    match kind {
        ArtifactKind::Js => Some(WriterKey::RoutesJs),
        ArtifactKind::Html => Some(WriterKey::RoutesHtml),
        ArtifactKind::Image => Some(WriterKey::RoutesImages),
        ArtifactKind::Maps => Some(WriterKey::RoutesMaps),
        ArtifactKind::Json => Some(WriterKey::RoutesJson),
        ArtifactKind::Api => Some(WriterKey::RoutesApi),
        ArtifactKind::Wasm => Some(WriterKey::RoutesWasm),
        ArtifactKind::Svg => Some(WriterKey::RoutesSvg),
        ArtifactKind::Crawl => Some(WriterKey::RoutesCrawl),
        ArtifactKind::MetaRoute => Some(WriterKey::RoutesMeta),
        _ => None,
    }
}

/// Shared route-family processing.
///
/// `detect` enables category detection: on for the plain route handler and
/// the js/html/image prefixes, off for the categorized prefixes that fully
/// name their kind.
#[allow(clippy::too_many_arguments)]
fn process_route(
    ctx: &HandlerContext,
    tool: &str,
    payload: &str,
    active: bool,
    namespace: &str,
    writer_key: WriterKey,
    kind: ArtifactKind,
    raw_only: bool,
    detect: bool,
) -> bool {
    let Some(line) = parse_route_line(payload) else {
        return false;
    };
    if !ctx.scope().allows_route(&line.base) {
        return true;
    }

    // Active implies passive: first active sighting of a value never seen
    // passively mirrors it into the passive file and index.
    if active && ctx.mark_seen(namespace, &line.base, false) {
        if let Some(writer) = ctx.writer(writer_key, false) {
            if raw_only {
                writer.write_raw(&line.base);
            } else {
                writer.write_url(&line.base);
            }
        }
        let mut mirror = Artifact::new(kind, &line.base);
        if line.has_base && kind != ArtifactKind::Route {
            mirror = mirror.extra_kind(ArtifactKind::Route);
        }
        ctx.record(tool, mirror);
    }

    // Hard probe failures stay in the index (with their status) but never
    // reach category files.
    if active {
        if let Some(status) = line.status {
            if status <= 0 || status >= 400 {
                let mut artifact = Artifact::new(kind, &line.base)
                    .active(true)
                    .meta("status", status);
                if line.has_base && kind != ArtifactKind::Route {
                    artifact = artifact.extra_kind(ArtifactKind::Route);
                }
                ctx.record(tool, artifact);
                return true;
            }
        }
    }

    if ctx.mark_seen(namespace, &line.base, active) {
        if let Some(writer) = ctx.writer(writer_key, active) {
            if raw_only {
                writer.write_raw(&line.base);
            } else {
                writer.write_url(&line.base);
            }
        }
    }

    let categories = if detect {
        detect_categories(&line.base)
    } else {
        Vec::new()
    };
    for category in &categories {
        let Some(key) = writer_key_for(*category) else {
            continue;
        };
        if ctx.mark_seen(category.as_str(), &line.base, active) {
            if let Some(writer) = ctx.writer(key, active) {
                if *category == ArtifactKind::MetaRoute {
                    writer.write_raw(&line.base);
                } else {
                    writer.write_url(&line.base);
                }
            }
        }
    }

    // The plain route handler takes its primary kind from detection; a
    // prefixed handler keeps its own kind and detection is additive.
    let primary = if kind == ArtifactKind::Route {
        categories.first().copied().unwrap_or(kind)
    } else {
        kind
    };
    let mut artifact = Artifact::new(primary, &line.base).active(active);
    for category in &categories {
        if *category != primary {
            artifact = artifact.extra_kind(*category);
        }
    }
    if line.has_base && primary != ArtifactKind::Route {
        artifact = artifact.extra_kind(ArtifactKind::Route);
    }
    if let Some(status) = line.status {
        artifact = artifact.meta("status", status);
    }
    ctx.record(tool, artifact);
    true
}

/// Fallback sniffer for bare route lines; runs category detection.
pub struct RouteHandler;

impl LineHandler for RouteHandler {
    fn name(&self) -> &'static str {
        "route"
    }

    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
        process_route(
            ctx,
            tool,
            payload,
            active,
            "route",
            WriterKey::Routes,
            ArtifactKind::Route,
            false,
            true,
        )
    }
}

/// One prefixed category handler (`js:`, `maps:`, ...).
///
/// `js`/`html`/`image` behave like the route handler and run category
/// detection (their own kind stays primary); the remaining categorized
/// prefixes are the plain shared implementation without detection.
pub struct CategoryRouteHandler {
    prefix: &'static str,
    kind: ArtifactKind,
    writer_key: WriterKey,
    raw_only: bool,
    detect: bool,
}

impl LineHandler for CategoryRouteHandler {
    fn name(&self) -> &'static str {
        self.prefix
    }

    fn prefix(&self) -> Option<&'static str> {
        Some(self.prefix)
    }

    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
        // Unparseable payloads are absorbed, not retried by sniffers.
        process_route(
            ctx,
            tool,
            payload,
            active,
            self.prefix,
            self.writer_key,
            self.kind,
            self.raw_only,
            self.detect,
        );
        true
    }
}

/// All prefixed route-family handlers.
#[must_use]
pub fn category_handlers() -> Vec<Box<dyn LineHandler>> {
    let table: &[(&'static str, ArtifactKind, WriterKey, bool, bool)] = &[
        ("js", ArtifactKind::Js, WriterKey::RoutesJs, false, true),
        ("html", ArtifactKind::Html, WriterKey::RoutesHtml, false, true),
        ("image", ArtifactKind::Image, WriterKey::RoutesImages, false, true),
        ("maps", ArtifactKind::Maps, WriterKey::RoutesMaps, false, false),
        ("json", ArtifactKind::Json, WriterKey::RoutesJson, false, false),
        ("api", ArtifactKind::Api, WriterKey::RoutesApi, false, false),
        ("wasm", ArtifactKind::Wasm, WriterKey::RoutesWasm, false, false),
        ("svg", ArtifactKind::Svg, WriterKey::RoutesSvg, false, false),
        ("crawl", ArtifactKind::Crawl, WriterKey::RoutesCrawl, false, false),
        ("meta-route", ArtifactKind::MetaRoute, WriterKey::RoutesMeta, true, false),
    ];

    table
        .iter()
        .map(|&(prefix, kind, writer_key, raw_only, detect)| {
            Box::new(CategoryRouteHandler {
                prefix,
                kind,
                writer_key,
                raw_only,
                detect,
            }) as Box<dyn LineHandler>
        })
        .collect()
}
