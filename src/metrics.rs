//! Per-handler latency accounting.
//!
//! Every handler invocation contributes its elapsed duration; snapshots are
//! sorted by descending mean so the slowest classifier surfaces first in the
//! run summary.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Default, Clone, Copy)]
struct Stat {
    count: u64,
    total: Duration,
    max: Duration,
}

/// Handler latency histogram.
#[derive(Debug, Default)]
pub struct HandlerMetrics {
    stats: Mutex<HashMap<String, Stat>>,
}

/// One row of a metrics snapshot.
#[derive(Debug, Clone)]
pub struct HandlerStat {
    pub name: String,
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl HandlerStat {
    #[must_use]
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total / u32::try_from(self.count).unwrap_or(u32::MAX)
        }
    }
}

impl HandlerMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one handler invocation.
    pub fn observe(&self, name: &str, elapsed: Duration) {
        let mut stats = self.stats.lock().expect("metrics mutex poisoned");
        let stat = stats.entry(name.to_string()).or_default();
        stat.count += 1;
        stat.total += elapsed;
        if elapsed > stat.max {
            stat.max = elapsed;
        }
    }

    /// Current state, sorted by descending mean duration.
    #[must_use]
    pub fn snapshot(&self) -> Vec<HandlerStat> {
        let stats = self.stats.lock().expect("metrics mutex poisoned");
        let mut rows: Vec<HandlerStat> = stats
            .iter()
            .map(|(name, stat)| HandlerStat {
                name: name.clone(),
                count: stat.count,
                total: stat.total,
                max: stat.max,
            })
            .collect();
        rows.sort_by(|a, b| b.mean().cmp(&a.mean()).then_with(|| a.name.cmp(&b.name)));
        rows
    }
}
