//! Domain classification: the last fallback sniffer and the promotion helper
//! shared with the certificate handler.

use crate::artifact::{Artifact, ArtifactKind};
use crate::normalize::normalize_domain;
use crate::writers::WriterKey;

use super::{HandlerContext, LineHandler};

/// Fallback sniffer for bare domain lines. Also the shared entry point for
/// every place that promotes a hostname into a domain artifact.
pub struct DomainHandler;

impl LineHandler for DomainHandler {
    fn name(&self) -> &'static str {
        "domain"
    }

    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool {
        let Some(domain) = normalize_domain(payload) else {
            return false;
        };
        record_domain(ctx, tool, &domain, active);
        true
    }
}

/// Write and record a normalized, in-scope domain.
///
/// Active observations of a value never seen passively are mirrored into the
/// passive file and index first (active implies passive). Out-of-scope
/// values are dropped without touching writer or store.
pub fn record_domain(ctx: &HandlerContext, tool: &str, domain: &str, active: bool) {
    if !ctx.scope().allows_domain(domain) {
        return;
    }

    if active {
        if ctx.mark_seen("domain", domain, false) {
            if let Some(writer) = ctx.writer(WriterKey::Domains, false) {
                writer.write_domain(domain);
            }
            ctx.record(tool, Artifact::new(ArtifactKind::Domain, domain));
        }
    } else {
        ctx.mark_seen("domain", domain, false);
    }

    if let Some(writer) = ctx.writer(WriterKey::Domains, active) {
        writer.write_domain(domain);
    }
    ctx.record(tool, Artifact::new(ArtifactKind::Domain, domain).active(active));
}
