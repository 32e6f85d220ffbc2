//! The concurrent sink: a bounded line channel drained by a worker pool.
//!
//! Producers obtain a [`ToolSender`] that wraps every line with a sentinel
//! carrying the producing tool's name; workers strip the sentinel, honor a
//! leading `active:` flag, and dispatch through the handler registry. The
//! channel bound is the pipeline's only back-pressure mechanism: producers
//! that outrun the workers block on send.
//!
//! `flush` implements a drain barrier: it waits until every accepted line
//! has left the channel *and* finished its handler, then rewrites the
//! manifest. `close` drains the same way, joins the workers, and closes the
//! store and writers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::handlers::{HandlerContext, HandlerRegistry};
use crate::metrics::{HandlerMetrics, HandlerStat};
use crate::paths::OutputLayout;
use crate::scope::Scope;
use crate::store::ArtifactStore;
use crate::writers::WriterSet;

/// Start-of-line marker for the tool sentinel.
const TOOL_MARK: char = '\u{1}';
/// Separator between the tool name and the line body.
const TOOL_SEP: char = '\u{2}';
/// Shutdown pill: close() enqueues one per worker behind all accepted
/// lines; each worker exits on its first sighting.
const CLOSE_MARK: &str = "\u{3}";

/// Tool attribution for lines sent without a sentinel.
const DEFAULT_TOOL: &str = "pipeline";

/// Lines accepted into the channel but not yet through a handler.
struct Pending {
    count: AtomicUsize,
    drained: Notify,
}

impl Pending {
    fn inc(&self) {
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    fn dec(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.drained.notify_waiters();
        }
    }

    async fn wait_zero(&self) {
        loop {
            // `notify_waiters` stores no permit, so the waiter must be
            // registered before the count check or the final wakeup can
            // slip into the gap and leave flush parked forever.
            let notified = self.drained.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.count.load(Ordering::Acquire) == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Per-producer sending handle; wraps every line with the tool sentinel.
/// Dropping the handle releases the producer's hold on the channel.
#[derive(Clone)]
pub struct ToolSender {
    tool: String,
    tx: mpsc::Sender<String>,
    pending: Arc<Pending>,
}

impl ToolSender {
    /// Queue one line, blocking when the channel is full.
    pub async fn send(&self, line: &str) {
        self.pending.inc();
        let wrapped = wrap_with_tool(&self.tool, line);
        if self.tx.send(wrapped).await.is_err() {
            // Channel closed underneath us; the line was never accepted.
            self.pending.dec();
        }
    }

    /// The producer this handle attributes lines to.
    #[must_use]
    pub fn tool(&self) -> &str {
        &self.tool
    }
}

/// Prepend the tool sentinel to a line.
#[must_use]
fn wrap_with_tool(tool: &str, line: &str) -> String {
    format!("{TOOL_MARK}{tool}{TOOL_SEP}{line}")
}

/// Split a sentinel-wrapped line back into (tool, body).
fn unwrap_tool(line: &str) -> (Option<&str>, &str) {
    if let Some(rest) = line.strip_prefix(TOOL_MARK) {
        if let Some((tool, body)) = rest.split_once(TOOL_SEP) {
            return (Some(tool), body);
        }
    }
    (None, line)
}

/// The concurrent classification sink.
pub struct Sink {
    tx: Option<mpsc::Sender<String>>,
    workers: Vec<JoinHandle<()>>,
    pending: Arc<Pending>,
    store: Arc<ArtifactStore>,
    writers: Arc<WriterSet>,
    metrics: Arc<HandlerMetrics>,
}

impl Sink {
    /// Spawn `workers` drain tasks over a channel sized
    /// `max(workers × 256, 1024)`.
    #[must_use]
    pub fn spawn(workers: usize, scope: Scope, layout: OutputLayout, active_mode: bool) -> Self {
        let workers = workers.max(1);
        let capacity = (workers * 256).max(1024);
        let (tx, rx) = mpsc::channel::<String>(capacity);

        let store = Arc::new(ArtifactStore::new(layout.manifest()));
        let writer_set = Arc::new(WriterSet::new(layout));
        let ctx = Arc::new(HandlerContext::new(
            Arc::new(scope),
            Arc::clone(&writer_set),
            Arc::clone(&store),
            active_mode,
        ));
        let registry = Arc::new(HandlerRegistry::standard());
        let metrics = Arc::new(HandlerMetrics::new());
        let pending = Arc::new(Pending {
            count: AtomicUsize::new(0),
            drained: Notify::new(),
        });

        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = Arc::clone(&rx);
            let ctx = Arc::clone(&ctx);
            let registry = Arc::clone(&registry);
            let metrics = Arc::clone(&metrics);
            let pending = Arc::clone(&pending);

            handles.push(tokio::spawn(async move {
                loop {
                    let line = { rx.lock().await.recv().await };
                    let Some(line) = line else {
                        break;
                    };
                    if line == CLOSE_MARK {
                        break;
                    }
                    process_line(&ctx, &registry, &metrics, &line);
                    pending.dec();
                }
            }));
        }

        Self {
            tx: Some(tx),
            workers: handles,
            pending,
            store,
            writers: writer_set,
            metrics,
        }
    }

    /// A sending handle attributing lines to `tool`.
    #[must_use]
    pub fn tool_sender(&self, tool: &str) -> ToolSender {
        ToolSender {
            tool: tool.to_string(),
            tx: self.tx.clone().expect("sink already closed"),
            pending: Arc::clone(&self.pending),
        }
    }

    /// Shared handle onto the artifact store.
    #[must_use]
    pub fn store(&self) -> Arc<ArtifactStore> {
        Arc::clone(&self.store)
    }

    /// Drain barrier: wait until the channel is empty and no worker is
    /// inside a handler, then rewrite the manifest.
    pub async fn flush(&self) -> Result<()> {
        self.pending.wait_zero().await;
        self.store.flush().context("manifest flush failed")?;
        Ok(())
    }

    /// Handler latency snapshot, slowest first.
    #[must_use]
    pub fn metrics_snapshot(&self) -> Vec<HandlerStat> {
        self.metrics.snapshot()
    }

    /// Close the channel, join the workers, flush the store and close every
    /// writer. Returns the first writer error observed during the run.
    ///
    /// Outstanding [`ToolSender`] clones do not block shutdown: one pill per
    /// worker is queued behind every already-accepted line, so the queue is
    /// fully drained before the workers exit.
    pub async fn close(mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            for _ in 0..self.workers.len() {
                let _ = tx.send(CLOSE_MARK.to_string()).await;
            }
        }
        for handle in self.workers.drain(..) {
            let _ = handle.await;
        }
        self.store.flush().context("final manifest flush failed")?;
        self.writers
            .close_all()
            .context("closing category writers failed")?;
        Ok(())
    }
}

fn process_line(
    ctx: &HandlerContext,
    registry: &HandlerRegistry,
    metrics: &HandlerMetrics,
    raw: &str,
) {
    let (tool, body) = unwrap_tool(raw);
    let tool = tool.filter(|t| !t.is_empty()).unwrap_or(DEFAULT_TOOL);

    let body = body.trim();
    let (body, active) = match body.strip_prefix("active:") {
        Some(rest) => (rest.trim(), true),
        None => (body, false),
    };
    if body.is_empty() {
        return;
    }

    let started = Instant::now();
    let handled = registry.dispatch(ctx, tool, body, active);
    let elapsed = started.elapsed();
    metrics.observe(handled.unwrap_or("unmatched"), elapsed);

    if handled.is_none() {
        tracing::trace!(tool, line = body, "line not claimed by any handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArtifactKind, IdentityKey};
    use camino::Utf8Path;
    use tempfile::TempDir;

    fn sink(dir: &TempDir, workers: usize, active: bool) -> Sink {
        let layout = OutputLayout::new(Utf8Path::from_path(dir.path()).unwrap(), "example.com");
        Sink::spawn(workers, Scope::new("example.com"), layout, active)
    }

    fn read(dir: &TempDir, rel: &str) -> Vec<String> {
        let layout = OutputLayout::new(Utf8Path::from_path(dir.path()).unwrap(), "example.com");
        match std::fs::read_to_string(layout.join(rel)) {
            Ok(content) => content.lines().map(ToString::to_string).collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn sentinel_carries_tool_attribution() {
        let dir = TempDir::new().unwrap();
        let s = sink(&dir, 2, false);

        s.tool_sender("subfinder").send("a.example.com").await;
        s.tool_sender("amass").send("a.example.com").await;
        s.flush().await.unwrap();

        let key = IdentityKey::new(ArtifactKind::Domain, "a.example.com", false);
        let artifact = s.store().get(&key).unwrap();
        assert_eq!(artifact.occurrences, 2);
        assert!(artifact.tools.contains("subfinder"));
        assert!(artifact.tools.contains("amass"));

        s.close().await.unwrap();
    }

    #[tokio::test]
    async fn active_prefix_flips_the_flag() {
        let dir = TempDir::new().unwrap();
        let s = sink(&dir, 2, true);

        s.tool_sender("httpx")
            .send("active: https://x.example.com/home [200]")
            .await;
        s.flush().await.unwrap();

        let key = IdentityKey::new(ArtifactKind::Route, "https://x.example.com/home", true);
        assert!(s.store().get(&key).is_some());
        assert_eq!(read(&dir, "routes/routes.active"), vec!["https://x.example.com/home"]);

        s.close().await.unwrap();
    }

    #[tokio::test]
    async fn flush_observes_everything_sent_before_it() {
        let dir = TempDir::new().unwrap();
        let s = sink(&dir, 4, false);

        let sender = s.tool_sender("wayback");
        for i in 0..500 {
            sender.send(&format!("https://app.example.com/p{i}")).await;
        }
        s.flush().await.unwrap();

        let manifest = std::fs::read_to_string(s.store().manifest_path()).unwrap();
        assert_eq!(manifest.lines().count(), 500);

        s.close().await.unwrap();
    }

    #[tokio::test]
    async fn concurrent_producers_deduplicate() {
        let dir = TempDir::new().unwrap();
        let s = Arc::new(sink(&dir, 4, false));

        let mut tasks = Vec::new();
        for tool in ["alpha", "beta", "gamma"] {
            let sender = s.tool_sender(tool);
            tasks.push(tokio::spawn(async move {
                for _ in 0..20 {
                    sender.send("example.com").await;
                    sender.send("https://www.example.com/login").await;
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        s.flush().await.unwrap();
        assert_eq!(read(&dir, "domains/domains.passive"), vec!["example.com"]);
        assert_eq!(
            read(&dir, "routes/routes.passive"),
            vec!["https://www.example.com/login"]
        );

        let snapshot = s.store().snapshot();
        assert_eq!(snapshot.len(), 2);
        for artifact in snapshot {
            assert_eq!(artifact.tools.len(), 3);
        }

        Arc::try_unwrap(s).ok().unwrap().close().await.unwrap();
    }

    #[tokio::test]
    async fn metrics_attribute_to_handlers() {
        let dir = TempDir::new().unwrap();
        let s = sink(&dir, 1, false);

        s.tool_sender("t").send("meta: hello").await;
        s.tool_sender("t").send("a.example.com").await;
        s.flush().await.unwrap();

        let names: Vec<String> = s.metrics_snapshot().into_iter().map(|r| r.name).collect();
        assert!(names.contains(&"meta".to_string()));
        assert!(names.contains(&"domain".to_string()));

        s.close().await.unwrap();
    }
}
