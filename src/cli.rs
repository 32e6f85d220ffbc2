//! CLI surface and run driver.
//!
//! `run()` owns the whole lifecycle: parse flags, resolve configuration,
//! build the sink and orchestrator, execute the pipeline, flush, report.
//! Individual tool failures never change the exit code; only unusable
//! configuration (2) or failure to set up the output directory (1) do.

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;

use crate::checkpoint::CheckpointKeeper;
use crate::config::{CliOverrides, Config};
use crate::orchestrator::{default_steps, Orchestrator, StepStatus};
use crate::paths::{ensure_dir_all, OutputLayout};
use crate::progress::{BarProgress, LogProgress, ProgressSink};
use crate::proxy::{apply_proxy_env, build_http_client};
use crate::report::write_report;
use crate::scope::Scope;
use crate::sink::Sink;
use crate::sources::SourceContext;

/// Exit codes surfaced by `main`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    /// Unrecoverable setup failure (output directory, writers).
    Setup = 1,
    /// Unusable configuration or CLI arguments.
    Config = 2,
}

impl ExitCode {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// Passive reconnaissance of a single target: external discovery tools are
/// orchestrated and their output is normalized into per-category files plus
/// a JSONL artifact manifest.
#[derive(Parser, Debug)]
#[command(name = "passiverec", version)]
#[command(about = "Passive (and optionally lightly-active) reconnaissance pipeline")]
pub struct Cli {
    /// Target domain or IP; defines the scope.
    #[arg(long)]
    pub target: Option<String>,

    /// Base output directory.
    #[arg(long)]
    pub outdir: Option<String>,

    /// Sink worker count.
    #[arg(long)]
    pub workers: Option<usize>,

    /// Enable lightly-active probing (httpx, subjs, dnsx, linkfinderevo).
    #[arg(long)]
    pub active: bool,

    /// Comma-separated tool selection.
    #[arg(long)]
    pub tools: Option<String>,

    /// Per-step timeout in seconds (clamped to 30..1200).
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Verbosity, repeatable: -v info, -vv debug, -vvv trace.
    #[arg(short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Render report.html from the manifest after the run.
    #[arg(long)]
    pub report: bool,

    /// Resume from .checkpoint.json, skipping completed steps.
    #[arg(long)]
    pub resume: bool,

    /// Proxy URL exported to tools and used by HTTP sources.
    #[arg(long)]
    pub proxy: Option<String>,

    /// Censys API id (falls back to CENSYS_API_ID).
    #[arg(long = "censys-api-id")]
    pub censys_api_id: Option<String>,

    /// Censys API secret (falls back to CENSYS_API_SECRET).
    #[arg(long = "censys-api-secret")]
    pub censys_api_secret: Option<String>,

    /// YAML or JSON config file with keys identical to the flags.
    #[arg(long)]
    pub config: Option<Utf8PathBuf>,
}

impl Cli {
    fn into_overrides(self) -> CliOverrides {
        CliOverrides {
            target: self.target,
            outdir: self.outdir,
            workers: self.workers,
            active: self.active,
            tools: self.tools,
            timeout: self.timeout,
            verbosity: (self.verbose > 0).then_some(self.verbose),
            report: self.report,
            resume: self.resume,
            proxy: self.proxy,
            censys_api_id: self.censys_api_id,
            censys_api_secret: self.censys_api_secret,
            config_path: self.config,
        }
    }
}

/// Entry point used by `main`.
pub fn run() -> Result<(), ExitCode> {
    let cli = Cli::parse();

    let config = match Config::resolve(cli.into_overrides()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("passiverec: {err}");
            return Err(ExitCode::Config);
        }
    };

    crate::logging::init(config.verbosity);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| {
            eprintln!("passiverec: failed to start runtime: {err}");
            ExitCode::Setup
        })?;

    runtime.block_on(run_pipeline(&config)).map_err(|err| {
        eprintln!("passiverec: {err:#}");
        ExitCode::Setup
    })
}

async fn run_pipeline(config: &Config) -> Result<()> {
    let layout = OutputLayout::new(&config.outdir, &config.target);
    ensure_dir_all(layout.root())
        .with_context(|| format!("cannot create output directory {}", layout.root()))?;

    if let Some(proxy) = &config.proxy {
        apply_proxy_env(proxy);
    }
    let http = build_http_client(config.proxy.as_deref())?;

    let scope = Scope::new(&config.target);
    tracing::info!(
        target = %config.target,
        scope = %scope.host(),
        active = config.active,
        workers = config.workers,
        "starting run"
    );

    let sink = Sink::spawn(config.workers, scope, layout.clone(), config.active);

    let mut ctx = SourceContext::new(&config.target, layout.clone(), http);
    ctx.active = config.active;
    ctx.workers = config.workers;
    ctx.censys_api_id = config.censys_api_id.clone();
    ctx.censys_api_secret = config.censys_api_secret.clone();
    let ctx = Arc::new(ctx);

    let progress: Arc<dyn ProgressSink> =
        if std::io::stderr().is_terminal() && config.verbosity <= 1 {
            Arc::new(BarProgress::new())
        } else {
            Arc::new(LogProgress)
        };

    let mut orchestrator = Orchestrator::new(
        default_steps(),
        config.tools.iter().cloned(),
        config.timeout_secs,
        progress,
    );
    if config.resume {
        let keeper = Arc::new(CheckpointKeeper::open(
            layout.checkpoint(),
            &config.target,
            config.active,
        ));
        orchestrator = orchestrator.with_checkpoint(keeper);
    }

    let reports = orchestrator.run(Arc::clone(&ctx), &sink).await;

    sink.flush().await.context("final flush failed")?;

    for stat in sink.metrics_snapshot() {
        tracing::debug!(
            handler = %stat.name,
            count = stat.count,
            mean_us = stat.mean().as_micros() as u64,
            max_us = stat.max.as_micros() as u64,
            "handler latency"
        );
    }

    let store = sink.store();
    let artifact_count = store.len();
    sink.close().await.context("sink close failed")?;

    if config.report {
        write_report(&config.target, &layout.manifest(), &layout.report())
            .context("report generation failed")?;
        tracing::info!(path = %layout.report(), "report written");
    }

    let completed = reports
        .iter()
        .filter(|r| r.status == StepStatus::Completed)
        .count();
    let missing: Vec<&str> = reports
        .iter()
        .filter(|r| r.status == StepStatus::MissingBinary)
        .map(|r| r.name)
        .collect();
    tracing::info!(
        artifacts = artifact_count,
        steps_completed = completed,
        missing_tools = ?missing,
        outdir = %layout.root(),
        "run finished"
    );
    Ok(())
}
