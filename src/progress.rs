//! Progress reporting for pipeline steps.
//!
//! Constructed once by the CLI and passed down; there is no global progress
//! state. The indicatif implementation renders one spinner per running step;
//! the logging implementation is used when stderr is not a terminal or the
//! run is verbose.

use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Observer for step lifecycle events.
pub trait ProgressSink: Send + Sync {
    fn step_started(&self, name: &str);
    fn step_finished(&self, name: &str, outcome: &str);
    fn step_skipped(&self, name: &str, reason: &str);
}

/// Tracing-backed progress for non-interactive runs.
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn step_started(&self, name: &str) {
        tracing::info!(step = name, "started");
    }

    fn step_finished(&self, name: &str, outcome: &str) {
        tracing::info!(step = name, outcome, "finished");
    }

    fn step_skipped(&self, name: &str, reason: &str) {
        tracing::info!(step = name, reason, "skipped");
    }
}

/// Spinner-per-step progress for interactive runs.
pub struct BarProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<String, ProgressBar>>,
}

impl BarProgress {
    #[must_use]
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner} {prefix:>14} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }
}

impl Default for BarProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressSink for BarProgress {
    fn step_started(&self, name: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::style());
        bar.set_prefix(name.to_string());
        bar.set_message("running");
        bar.enable_steady_tick(std::time::Duration::from_millis(120));
        self.bars
            .lock()
            .expect("progress mutex poisoned")
            .insert(name.to_string(), bar);
    }

    fn step_finished(&self, name: &str, outcome: &str) {
        if let Some(bar) = self.bars.lock().expect("progress mutex poisoned").remove(name) {
            bar.finish_with_message(outcome.to_string());
        }
    }

    fn step_skipped(&self, name: &str, reason: &str) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::style());
        bar.set_prefix(name.to_string());
        bar.finish_with_message(format!("skipped: {reason}"));
    }
}
