//! Per-category output files.
//!
//! Each category owns a passive and (usually) an active writer. Writers are
//! created lazily on the first accepted write so unused categories never
//! leave empty files behind. Every writer keeps an in-file dedupe set,
//! flushes after each accepted line, and retains the first I/O error it saw;
//! `close` surfaces that error.

use std::collections::{HashMap, HashSet};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::sync::{Arc, Mutex};

use camino::Utf8PathBuf;

use crate::error::WriterError;
use crate::normalize::{normalize_domain, normalize_route, route_token};
use crate::paths::{ensure_dir_all, OutputLayout};

/// The category writer keys. Each maps to a `<category>.{passive,active}`
/// pair in the run directory, except `Rdap` (passive only) and `Dns`
/// (active only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriterKey {
    Domains,
    Routes,
    RoutesJs,
    RoutesHtml,
    RoutesImages,
    Rdap,
    RoutesMaps,
    RoutesJson,
    RoutesApi,
    RoutesWasm,
    RoutesSvg,
    RoutesCrawl,
    RoutesMeta,
    Certs,
    Meta,
    Dns,
}

impl WriterKey {
    /// Relative file path inside the run directory, or `None` when the key
    /// has no file for the given mode.
    #[must_use]
    pub fn rel_path(self, active: bool) -> Option<String> {
        let suffix = if active { "active" } else { "passive" };
        let rel = match self {
            Self::Domains => format!("domains/domains.{suffix}"),
            Self::Routes => format!("routes/routes.{suffix}"),
            Self::RoutesJs => format!("routes/js/js.{suffix}"),
            Self::RoutesHtml => format!("routes/html/html.{suffix}"),
            Self::RoutesImages => format!("routes/images/images.{suffix}"),
            Self::Rdap => {
                if active {
                    return None;
                }
                "rdap/rdap.passive".to_string()
            }
            Self::RoutesMaps => format!("routes/maps/maps.{suffix}"),
            Self::RoutesJson => format!("routes/json/json.{suffix}"),
            Self::RoutesApi => format!("routes/api/api.{suffix}"),
            Self::RoutesWasm => format!("routes/wasm/wasm.{suffix}"),
            Self::RoutesSvg => format!("routes/svg/svg.{suffix}"),
            Self::RoutesCrawl => format!("routes/crawl/crawl.{suffix}"),
            Self::RoutesMeta => format!("routes/meta/meta.{suffix}"),
            Self::Certs => format!("certs/certs.{suffix}"),
            Self::Meta => format!("meta.{suffix}"),
            Self::Dns => {
                if !active {
                    return None;
                }
                "dns/dns.active".to_string()
            }
        };
        Some(rel)
    }
}

struct WriterInner {
    file: Option<BufWriter<std::fs::File>>,
    seen: HashSet<String>,
    closed: bool,
    first_error: Option<WriterError>,
}

/// A single append-only category file.
pub struct OutputWriter {
    path: Utf8PathBuf,
    inner: Mutex<WriterInner>,
}

impl OutputWriter {
    #[must_use]
    pub fn new(path: Utf8PathBuf) -> Self {
        Self {
            path,
            inner: Mutex::new(WriterInner {
                file: None,
                seen: HashSet::new(),
                closed: false,
                first_error: None,
            }),
        }
    }

    /// Target file path.
    #[must_use]
    pub fn path(&self) -> &Utf8PathBuf {
        &self.path
    }

    /// Write a domain after canonicalization. Returns true when the line was
    /// accepted (in scope of this writer's dedupe set and flushed).
    pub fn write_domain(&self, value: &str) -> bool {
        match normalize_domain(value) {
            Some(domain) => self.write_line(&domain),
            None => false,
        }
    }

    /// Write a URL after canonicalization; non-URL tokens (path-only routes)
    /// are written trimmed.
    pub fn write_url(&self, value: &str) -> bool {
        let token = route_token(value);
        if token.is_empty() {
            return false;
        }
        match normalize_route(token) {
            Some(url) => self.write_line(&url),
            None => self.write_line(token),
        }
    }

    /// Write a raw line, trimmed only.
    pub fn write_raw(&self, value: &str) -> bool {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.write_line(trimmed)
    }

    fn write_line(&self, line: &str) -> bool {
        let mut inner = self.inner.lock().expect("writer mutex poisoned");
        if inner.closed || !inner.seen.insert(line.to_string()) {
            return false;
        }

        if inner.file.is_none() {
            match self.open_file() {
                Ok(file) => inner.file = Some(BufWriter::new(file)),
                Err(err) => {
                    inner.seen.remove(line);
                    if inner.first_error.is_none() {
                        inner.first_error = Some(err);
                    }
                    return false;
                }
            }
        }

        let file = inner.file.as_mut().expect("file opened above");
        let result = writeln!(file, "{line}").and_then(|()| file.flush());
        if let Err(source) = result {
            tracing::warn!(path = %self.path, error = %source, "write failed");
            if inner.first_error.is_none() {
                inner.first_error = Some(WriterError::Write {
                    path: self.path.to_string(),
                    source,
                });
            }
            return false;
        }
        true
    }

    fn open_file(&self) -> Result<std::fs::File, WriterError> {
        if let Some(parent) = self.path.parent() {
            ensure_dir_all(parent).map_err(|source| WriterError::Open {
                path: self.path.to_string(),
                source,
            })?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_std_path())
            .map_err(|source| WriterError::Open {
                path: self.path.to_string(),
                source,
            })
    }

    /// Flush and close; returns the first error observed over the writer's
    /// lifetime, if any.
    pub fn close(&self) -> Option<WriterError> {
        let mut inner = self.inner.lock().expect("writer mutex poisoned");
        inner.closed = true;
        if let Some(file) = inner.file.as_mut() {
            if let Err(source) = file.flush() {
                if inner.first_error.is_none() {
                    inner.first_error = Some(WriterError::Write {
                        path: self.path.to_string(),
                        source,
                    });
                }
            }
        }
        inner.first_error.take()
    }
}

/// The full set of category writers for one run, keyed by (category, mode).
pub struct WriterSet {
    layout: OutputLayout,
    writers: Mutex<HashMap<(WriterKey, bool), Arc<OutputWriter>>>,
}

impl WriterSet {
    #[must_use]
    pub fn new(layout: OutputLayout) -> Self {
        Self {
            layout,
            writers: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch (or create) the writer for a key/mode pair. `None` when the key
    /// has no file for that mode (rdap active, dns passive).
    pub fn writer(&self, key: WriterKey, active: bool) -> Option<Arc<OutputWriter>> {
        let rel = key.rel_path(active)?;
        let mut writers = self.writers.lock().expect("writer set mutex poisoned");
        let writer = writers
            .entry((key, active))
            .or_insert_with(|| Arc::new(OutputWriter::new(self.layout.join(&rel))));
        Some(Arc::clone(writer))
    }

    /// Close every writer; the first error observed wins.
    pub fn close_all(&self) -> Result<(), WriterError> {
        let writers = self.writers.lock().expect("writer set mutex poisoned");
        let mut first = None;
        for writer in writers.values() {
            if let Some(err) = writer.close() {
                first.get_or_insert(err);
            }
        }
        match first {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
