//! Requests-per-second tracking across snapshots.
//!
//! The engine keeps the last observed cumulative request count per worker
//! and the capture instant of the previous snapshot. The first snapshot only
//! establishes the baseline and always reports an aggregate rate of 0.

use ahash::AHashMap as HashMap;
use std::time::Instant;
use tracing::debug;

use crate::snapshot::Snapshot;

/// Rate of a single worker between two snapshots. May be negative when the
/// worker was respawned and its counter restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerRate {
    pub id: u64,
    pub rps: i64,
}

/// Result of feeding one snapshot into the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateReport {
    /// Empty on the first snapshot.
    pub per_worker: Vec<WorkerRate>,
    /// Sum of per-worker rates, never below zero.
    pub total: u64,
}

/// Last-seen counters, keyed by worker id. Entries are never removed.
#[derive(Debug, Default)]
struct RateState {
    last_counts: HashMap<u64, u64>,
    last_capture: Option<Instant>,
}

/// Stateful rate calculator. Owned by a single sampling loop.
#[derive(Debug, Default)]
pub struct RateEngine {
    state: RateState,
}

impl RateEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once a baseline snapshot has been recorded.
    pub fn is_tracking(&self) -> bool {
        self.state.last_capture.is_some()
    }

    /// Number of worker ids seen so far.
    pub fn tracked_workers(&self) -> usize {
        self.state.last_counts.len()
    }

    /// Computes rates against the stored baseline, then makes `snapshot` the
    /// new baseline.
    pub fn update(&mut self, snapshot: &Snapshot) -> RateReport {
        let now = snapshot.captured_instant;

        let report = match self.state.last_capture {
            None => {
                debug!("First snapshot, establishing rate baseline");
                RateReport::default()
            }
            Some(previous) => {
                let elapsed = now.saturating_duration_since(previous).as_secs_f64();
                self.compute(snapshot, elapsed)
            }
        };

        for worker in &snapshot.workers {
            self.state.last_counts.insert(worker.id, worker.requests);
        }
        self.state.last_capture = Some(now);

        report
    }

    fn compute(&mut self, snapshot: &Snapshot, elapsed: f64) -> RateReport {
        if elapsed <= 0.0 {
            debug!("No time elapsed since previous snapshot, reporting zero rate");
            return RateReport::default();
        }

        let per_worker: Vec<WorkerRate> = snapshot
            .workers
            .iter()
            .map(|worker| {
                let last = *self.state.last_counts.entry(worker.id).or_insert(0);
                let delta = worker.requests as f64 - last as f64;
                WorkerRate {
                    id: worker.id,
                    rps: (delta / elapsed).round() as i64,
                }
            })
            .collect();

        let sum = per_worker
            .iter()
            .fold(0i64, |acc, w| acc.saturating_add(w.rps));
        let total = sum.max(0) as u64;

        debug!(
            "Computed rates over {:.3}s: aggregate={} (raw {})",
            elapsed, total, sum
        );

        RateReport { per_worker, total }
    }
}
