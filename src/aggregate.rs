//! Reduction of a snapshot's worker list into one summary per round.

use serde::Serialize;

use crate::error::AgentError;
use crate::snapshot::{Snapshot, WorkerStatus};

/// Divisor turning the reported average response time (microseconds) into
/// milliseconds.
pub const RESPONSE_TIME_SCALE: u64 = 1000;

/// Static labels attached to every summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Labels {
    pub node: String,
    pub role: String,
}

/// Flattened result of one sampling round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricSummary {
    pub version: String,
    pub node: String,
    pub role: String,
    pub requests: u64,
    pub rps: u64,
    /// Mean response time in milliseconds.
    pub avg_rt_ms: u64,
    pub listen_queue: u64,
    pub tx: u64,
    pub busy: u64,
    pub idle: u64,
    pub avg_rss: u64,
    pub avg_vsz: u64,
    pub workers: u64,
    /// Capture time in nanoseconds since the Unix epoch.
    pub timestamp_ns: i64,
}

/// Builds the round summary. Fails with `EmptyWorkerSet` when there is
/// nothing to average over.
pub fn aggregate(
    snapshot: &Snapshot,
    labels: &Labels,
    rps: u64,
) -> Result<MetricSummary, AgentError> {
    let count = snapshot.workers.len() as u64;
    if count == 0 {
        return Err(AgentError::EmptyWorkerSet);
    }

    let mut requests = 0u64;
    let mut tx = 0u64;
    let mut avg_rt_sum = 0u64;
    let mut rss_sum = 0u64;
    let mut vsz_sum = 0u64;
    let mut busy = 0u64;

    for worker in &snapshot.workers {
        requests = requests.saturating_add(worker.requests);
        tx = tx.saturating_add(worker.tx);
        avg_rt_sum = avg_rt_sum.saturating_add(worker.avg_rt);
        rss_sum = rss_sum.saturating_add(worker.rss);
        vsz_sum = vsz_sum.saturating_add(worker.vsz);
        if worker.status == WorkerStatus::Busy {
            busy += 1;
        }
    }

    Ok(MetricSummary {
        version: snapshot.version.clone().unwrap_or_default(),
        node: labels.node.clone(),
        role: labels.role.clone(),
        requests,
        rps,
        avg_rt_ms: avg_rt_sum / count / RESPONSE_TIME_SCALE,
        listen_queue: snapshot.listen_queue,
        tx,
        busy,
        idle: count - busy,
        avg_rss: rss_sum / count,
        avg_vsz: vsz_sum / count,
        workers: count,
        timestamp_ns: snapshot.captured_at.timestamp_nanos_opt().unwrap_or(0),
    })
}
