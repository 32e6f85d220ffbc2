//! Line classification: prefix-dispatched handlers plus ordered fallback
//! sniffers.
//!
//! Every line entering the sink is offered to at most one prefix handler
//! (selected by the token before the first `:`); lines nobody claims walk the
//! fallback chain in declared order: relation → meta → route → cert →
//! domain. A handler returns `true` when it consumed the line — including
//! malformed payloads, which are absorbed without producing artifacts.

mod category;
mod cert;
mod dns;
mod domain;
mod meta;
mod route;

pub use category::detect_categories;
pub use cert::CertificateRecord;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::artifact::Artifact;
use crate::scope::Scope;
use crate::store::ArtifactStore;
use crate::writers::{OutputWriter, WriterKey, WriterSet};

/// Narrow capability surface handed to handlers. Handlers never see the sink
/// or each other; everything they can do goes through this context.
pub struct HandlerContext {
    scope: Arc<Scope>,
    writers: Arc<WriterSet>,
    store: Arc<ArtifactStore>,
    /// Namespaced first-seen marks shared by every handler.
    seen: Mutex<HashSet<String>>,
    active_mode: bool,
}

impl HandlerContext {
    #[must_use]
    pub fn new(
        scope: Arc<Scope>,
        writers: Arc<WriterSet>,
        store: Arc<ArtifactStore>,
        active_mode: bool,
    ) -> Self {
        Self {
            scope,
            writers,
            store,
            seen: Mutex::new(HashSet::new()),
            active_mode,
        }
    }

    /// True when the run probes the target (`-active`).
    #[must_use]
    pub fn active_mode(&self) -> bool {
        self.active_mode
    }

    #[must_use]
    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    /// Category writer for a key/mode pair; `None` when that pair has no
    /// file.
    #[must_use]
    pub fn writer(&self, key: WriterKey, active: bool) -> Option<Arc<OutputWriter>> {
        self.writers.writer(key, active)
    }

    /// Record an artifact attributed to `tool`.
    pub fn record(&self, tool: &str, artifact: Artifact) -> bool {
        self.store.record(tool, artifact)
    }

    /// Direct store access for assertions.
    #[cfg(test)]
    pub(crate) fn store_for_tests(&self) -> &ArtifactStore {
        &self.store
    }

    /// Mark `(namespace, value)` as seen; the key is `active:`-prefixed in
    /// active mode. Returns true on first sighting.
    pub fn mark_seen(&self, namespace: &str, value: &str, active: bool) -> bool {
        let key = if active {
            format!("active:{namespace}:{value}")
        } else {
            format!("{namespace}:{value}")
        };
        self.seen.lock().expect("seen mutex poisoned").insert(key)
    }
}

/// One line classifier.
pub trait LineHandler: Send + Sync {
    /// Stable name for metrics attribution.
    fn name(&self) -> &'static str;

    /// The `<prefix>:` this handler claims, or `None` for fallback sniffers.
    fn prefix(&self) -> Option<&'static str> {
        None
    }

    /// Classify `payload` (prefix already stripped for prefixed handlers).
    /// Returns true when the line is consumed.
    fn handle(&self, ctx: &HandlerContext, tool: &str, payload: &str, active: bool) -> bool;
}

/// Prefix-dispatched handler table plus ordered fallbacks.
pub struct HandlerRegistry {
    prefixed: HashMap<&'static str, Box<dyn LineHandler>>,
    fallbacks: Vec<Box<dyn LineHandler>>,
}

impl HandlerRegistry {
    /// The standard registry: all prefix handlers plus the fallback chain.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self {
            prefixed: HashMap::new(),
            fallbacks: Vec::new(),
        };

        registry.register(Box::new(dns::DnsHandler));
        registry.register(Box::new(meta::MetaHandler));
        registry.register(Box::new(cert::CertHandler));
        registry.register(Box::new(meta::RdapHandler));
        registry.register(Box::new(meta::GfFindingHandler));
        for handler in route::category_handlers() {
            registry.register(handler);
        }

        registry.register_fallback(Box::new(dns::RelationSniffer));
        registry.register_fallback(Box::new(meta::MetaSniffer));
        registry.register_fallback(Box::new(route::RouteHandler));
        registry.register_fallback(Box::new(cert::CertSniffer));
        registry.register_fallback(Box::new(domain::DomainHandler));

        registry
    }

    /// Register a prefixed handler. Panics on duplicate prefixes; the
    /// registry is assembled once at startup.
    pub fn register(&mut self, handler: Box<dyn LineHandler>) {
        let prefix = handler
            .prefix()
            .expect("register requires a prefixed handler");
        assert!(
            self.prefixed.insert(prefix, handler).is_none(),
            "duplicate handler prefix {prefix}"
        );
    }

    /// Append a fallback sniffer; fallbacks run in registration order.
    pub fn register_fallback(&mut self, handler: Box<dyn LineHandler>) {
        self.fallbacks.push(handler);
    }

    /// Dispatch one line. Returns the name of the consuming handler, or
    /// `None` when nobody claimed it.
    pub fn dispatch(
        &self,
        ctx: &HandlerContext,
        tool: &str,
        line: &str,
        active: bool,
    ) -> Option<&'static str> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        if let Some((token, payload)) = line.split_once(':') {
            if let Some(handler) = self.prefixed.get(token.trim()) {
                if handler.handle(ctx, tool, payload.trim(), active) {
                    return Some(handler.name());
                }
            }
        }

        for handler in &self.fallbacks {
            if handler.handle(ctx, tool, line, active) {
                return Some(handler.name());
            }
        }
        None
    }
}
