//! Step sequencing: runs the declarative tool pipeline with grouped
//! concurrency, per-step deadlines, preconditions and checkpointing.
//!
//! Contiguous steps sharing a group run concurrently; everything else runs
//! in declared order. A missing binary is benign; any other failure is
//! logged and the pipeline continues with the remaining steps.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::future::join_all;

use crate::checkpoint::CheckpointKeeper;
use crate::progress::ProgressSink;
use crate::sink::Sink;
use crate::sources::{
    Amass, Assetfinder, Censys, Crtsh, Dedupe, Gau, Httpx, LinkFinderEvo, Rdap, Source,
    SourceContext, Subfinder, Subjs, Waybackurls,
};

/// Hard bounds on any single step's deadline.
const MIN_STEP_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_STEP_TIMEOUT: Duration = Duration::from_secs(1200);

type TimeoutFn = Box<dyn Fn(&SourceContext) -> Duration + Send + Sync>;
type Precondition = Box<dyn Fn(&SourceContext) -> bool + Send + Sync>;

/// One unit of the pipeline: a source plus its execution policy.
pub struct ToolStep {
    name: &'static str,
    group: Option<&'static str>,
    source: Arc<dyn Source>,
    requires_active: bool,
    skip_message: Option<&'static str>,
    precondition: Option<Precondition>,
    precondition_message: Option<&'static str>,
    timeout_extension: Option<TimeoutFn>,
}

impl ToolStep {
    #[must_use]
    pub fn new(name: &'static str, source: Arc<dyn Source>) -> Self {
        Self {
            name,
            group: None,
            source,
            requires_active: false,
            skip_message: None,
            precondition: None,
            precondition_message: None,
            timeout_extension: None,
        }
    }

    #[must_use]
    pub fn group(mut self, group: &'static str) -> Self {
        self.group = Some(group);
        self
    }

    #[must_use]
    pub fn requires_active(mut self, skip_message: &'static str) -> Self {
        self.requires_active = true;
        self.skip_message = Some(skip_message);
        self
    }

    #[must_use]
    pub fn precondition(
        mut self,
        message: &'static str,
        check: impl Fn(&SourceContext) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.precondition = Some(Box::new(check));
        self.precondition_message = Some(message);
        self
    }

    #[must_use]
    pub fn timeout_extension(
        mut self,
        extension: impl Fn(&SourceContext) -> Duration + Send + Sync + 'static,
    ) -> Self {
        self.timeout_extension = Some(Box::new(extension));
        self
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// How a step ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Completed,
    /// Not requested by the user; skipped silently.
    NotRequested,
    /// Requested but gated off (inactive mode, failed precondition,
    /// checkpoint hit).
    Skipped,
    MissingBinary,
    Failed,
    TimedOut,
}

/// Per-step outcome for the run summary.
#[derive(Debug, Clone)]
pub struct StepReport {
    pub name: &'static str,
    pub status: StepStatus,
    pub elapsed: Duration,
}

/// The pipeline driver.
pub struct Orchestrator {
    steps: Vec<ToolStep>,
    requested: HashSet<String>,
    /// Steps forced on because a downstream step needs them (dedupe when
    /// archive sources are requested). Not part of the user-visible order.
    auto_enabled: HashSet<String>,
    base_timeout: Duration,
    progress: Arc<dyn ProgressSink>,
    checkpoint: Option<Arc<CheckpointKeeper>>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        steps: Vec<ToolStep>,
        requested: impl IntoIterator<Item = String>,
        timeout_secs: u64,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let requested: HashSet<String> = requested.into_iter().collect();

        // waybackurls/gau need a deduplicated domain list; enable dedupe for
        // them even when the user did not ask for it.
        let mut auto_enabled = HashSet::new();
        if (requested.contains("waybackurls") || requested.contains("gau"))
            && !requested.contains("dedupe")
        {
            auto_enabled.insert("dedupe".to_string());
        }

        Self {
            steps,
            requested,
            auto_enabled,
            base_timeout: clamp_timeout(Duration::from_secs(timeout_secs)),
            progress,
            checkpoint: None,
        }
    }

    #[must_use]
    pub fn with_checkpoint(mut self, keeper: Arc<CheckpointKeeper>) -> Self {
        self.checkpoint = Some(keeper);
        self
    }

    /// Execute the pipeline. Individual step failures never abort the run.
    pub async fn run(&self, ctx: Arc<SourceContext>, sink: &Sink) -> Vec<StepReport> {
        let mut reports = Vec::with_capacity(self.steps.len());
        let mut missing: Vec<&'static str> = Vec::new();

        let mut idx = 0;
        while idx < self.steps.len() {
            let group = self.steps[idx].group;
            let end = match group {
                Some(g) => {
                    let mut end = idx + 1;
                    while end < self.steps.len() && self.steps[end].group == Some(g) {
                        end += 1;
                    }
                    end
                }
                None => idx + 1,
            };

            let batch = &self.steps[idx..end];
            if batch.len() == 1 {
                let report = self.run_step(&batch[0], &ctx, sink).await;
                track_missing(&report, batch[0].name, &mut missing);
                reports.push(report);
            } else {
                let batch_reports =
                    join_all(batch.iter().map(|step| self.run_step(step, &ctx, sink))).await;
                for (step, report) in batch.iter().zip(batch_reports) {
                    track_missing(&report, step.name, &mut missing);
                    reports.push(report);
                }
            }
            idx = end;
        }

        if !missing.is_empty() {
            missing.sort_unstable();
            missing.dedup();
            let sender = sink.tool_sender("pipeline");
            sender
                .send(&format!("meta: Herramientas faltantes: {}", missing.join(", ")))
                .await;
        }

        reports
    }

    async fn run_step(
        &self,
        step: &ToolStep,
        ctx: &Arc<SourceContext>,
        sink: &Sink,
    ) -> StepReport {
        let name = step.name;

        let requested =
            self.requested.contains(name) || self.auto_enabled.contains(name);
        if !requested {
            return StepReport {
                name,
                status: StepStatus::NotRequested,
                elapsed: Duration::ZERO,
            };
        }

        if step.requires_active && !ctx.active {
            let message = step.skip_message.unwrap_or("requires active mode");
            self.progress.step_skipped(name, message);
            sink.tool_sender("pipeline")
                .send(&format!("meta: {name}: {message}"))
                .await;
            return StepReport {
                name,
                status: StepStatus::Skipped,
                elapsed: Duration::ZERO,
            };
        }

        if let Some(check) = &step.precondition {
            if !check(ctx) {
                let message = step.precondition_message.unwrap_or("precondition failed");
                self.progress.step_skipped(name, message);
                sink.tool_sender("pipeline")
                    .send(&format!("meta: {name}: {message}"))
                    .await;
                return StepReport {
                    name,
                    status: StepStatus::Skipped,
                    elapsed: Duration::ZERO,
                };
            }
        }

        if let Some(keeper) = &self.checkpoint {
            if keeper.is_completed(name) {
                self.progress.step_skipped(name, "already completed");
                sink.tool_sender("pipeline")
                    .send(&format!("meta: {name}: restored from checkpoint"))
                    .await;
                return StepReport {
                    name,
                    status: StepStatus::Skipped,
                    elapsed: Duration::ZERO,
                };
            }
        }

        // The base deadline is clamped; extensions are capped by each step's
        // own function and stack on top.
        let mut deadline = self.base_timeout;
        if let Some(extension) = &step.timeout_extension {
            deadline += extension(ctx);
        }

        self.progress.step_started(name);
        let sender = sink.tool_sender(name);
        let started = Instant::now();
        let outcome = tokio::time::timeout(deadline, step.source.run(ctx, &sender)).await;
        let elapsed = started.elapsed();

        let status = match outcome {
            Ok(Ok(())) => {
                if let Some(keeper) = &self.checkpoint {
                    if let Err(err) = keeper.mark_completed(name) {
                        tracing::warn!(step = name, error = %err, "checkpoint write failed");
                    }
                }
                StepStatus::Completed
            }
            Ok(Err(err)) if err.is_benign() => {
                tracing::debug!(step = name, "binary not installed");
                StepStatus::MissingBinary
            }
            Ok(Err(err)) => {
                tracing::warn!(step = name, error = %err, "step failed");
                StepStatus::Failed
            }
            Err(_) => {
                tracing::warn!(step = name, timeout = ?deadline, "step timed out");
                StepStatus::TimedOut
            }
        };

        self.progress.step_finished(
            name,
            match status {
                StepStatus::Completed => "done",
                StepStatus::MissingBinary => "not installed",
                StepStatus::Failed => "failed",
                StepStatus::TimedOut => "timed out",
                _ => "skipped",
            },
        );

        StepReport {
            name,
            status,
            elapsed,
        }
    }
}

fn track_missing(report: &StepReport, name: &'static str, missing: &mut Vec<&'static str>) {
    if report.status == StepStatus::MissingBinary {
        missing.push(name);
    }
}

fn clamp_timeout(timeout: Duration) -> Duration {
    timeout.clamp(MIN_STEP_TIMEOUT, MAX_STEP_TIMEOUT)
}

/// The canonical default pipeline.
#[must_use]
pub fn default_steps() -> Vec<ToolStep> {
    vec![
        ToolStep::new("amass", Arc::new(Amass)).group("subdomain-sources"),
        ToolStep::new("subfinder", Arc::new(Subfinder)).group("subdomain-sources"),
        ToolStep::new("assetfinder", Arc::new(Assetfinder)).group("subdomain-sources"),
        ToolStep::new("rdap", Arc::new(Rdap)).group("subdomain-sources"),
        ToolStep::new("crtsh", Arc::new(Crtsh)).group("cert-sources"),
        ToolStep::new("censys", Arc::new(Censys)).group("cert-sources"),
        ToolStep::new("dedupe", Arc::new(Dedupe)),
        ToolStep::new("waybackurls", Arc::new(Waybackurls))
            .group("archive-sources")
            .precondition("no domains collected", |ctx| ctx.domain_count() > 0)
            .timeout_extension(|ctx| {
                Duration::from_secs(((ctx.domain_count() as u64) / 20).min(900))
            }),
        ToolStep::new("gau", Arc::new(Gau))
            .group("archive-sources")
            .precondition("no domains collected", |ctx| ctx.domain_count() > 0)
            .timeout_extension(|ctx| {
                Duration::from_secs(((ctx.domain_count() as u64) / 15).min(900))
            }),
        ToolStep::new("httpx", Arc::new(Httpx))
            .requires_active("requires -active")
            .timeout_extension(|ctx| {
                let workers = ctx.workers.max(1) as u64;
                Duration::from_secs(((ctx.domain_count() as u64) / (workers * 2)).min(600))
            }),
        ToolStep::new("subjs", Arc::new(Subjs)).requires_active("requires -active"),
        ToolStep::new("linkfinderevo", Arc::new(LinkFinderEvo)).requires_active("requires -active"),
    ]
}
