//! Step-granular checkpointing.
//!
//! `.checkpoint.json` in the run directory records which steps completed for
//! a given (target, active) pair. On resume, completed steps are skipped;
//! the file is rewritten atomically after every completed step so a crashed
//! run never loses more than the in-flight step.

use std::sync::Mutex;

use anyhow::Result;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::artifact::now_ts;
use crate::atomic_write::write_file_atomic;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Checkpoint {
    pub target: String,
    pub active: bool,
    pub completed: Vec<String>,
    pub updated_at: String,
}

impl Checkpoint {
    #[must_use]
    pub fn matches(&self, target: &str, active: bool) -> bool {
        self.target == target && self.active == active
    }
}

/// Owns the checkpoint file for one run.
pub struct CheckpointKeeper {
    path: Utf8PathBuf,
    state: Mutex<Checkpoint>,
}

impl CheckpointKeeper {
    /// Load an existing checkpoint when it matches this run, otherwise start
    /// fresh.
    #[must_use]
    pub fn open(path: Utf8PathBuf, target: &str, active: bool) -> Self {
        let loaded = std::fs::read_to_string(path.as_std_path())
            .ok()
            .and_then(|content| serde_json::from_str::<Checkpoint>(&content).ok())
            .filter(|cp| cp.matches(target, active));

        let state = loaded.unwrap_or_else(|| Checkpoint {
            target: target.to_string(),
            active,
            ..Default::default()
        });

        Self {
            path,
            state: Mutex::new(state),
        }
    }

    #[must_use]
    pub fn is_completed(&self, step: &str) -> bool {
        self.state
            .lock()
            .expect("checkpoint mutex poisoned")
            .completed
            .iter()
            .any(|s| s == step)
    }

    /// Record a completed step and persist.
    pub fn mark_completed(&self, step: &str) -> Result<()> {
        let snapshot = {
            let mut state = self.state.lock().expect("checkpoint mutex poisoned");
            if !state.completed.iter().any(|s| s == step) {
                state.completed.push(step.to_string());
            }
            state.updated_at = now_ts();
            state.clone()
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        write_file_atomic(&self.path, &content)
    }
}
