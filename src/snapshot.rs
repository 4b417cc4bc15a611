//! Stats snapshot model and parser.
//!
//! A snapshot is one JSON document returned by the stats server. Only the
//! fields the agent reports on are decoded; everything else is ignored.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AgentError;

/// Worker status as reported by the stats server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Busy,
    Idle,
    /// Any other protocol state (`cheap`, `pause`, `sig`, ...).
    Other(String),
}

impl From<String> for WorkerStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "busy" => WorkerStatus::Busy,
            "idle" => WorkerStatus::Idle,
            _ => WorkerStatus::Other(raw),
        }
    }
}

/// Counters of a single worker at capture time.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerRecord {
    pub id: u64,
    /// Cumulative requests served since the worker was spawned.
    pub requests: u64,
    /// Average response time in microseconds.
    pub avg_rt: u64,
    pub rss: u64,
    pub vsz: u64,
    /// Cumulative bytes transmitted.
    pub tx: u64,
    #[serde(deserialize_with = "deserialize_status")]
    pub status: WorkerStatus,
}

fn deserialize_status<'de, D>(deserializer: D) -> Result<WorkerStatus, D::Error>
where
    D: serde::Deserializer<'de>,
{
    String::deserialize(deserializer).map(WorkerStatus::from)
}

/// One decoded stats document plus the moment it was captured.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub version: Option<String>,
    pub listen_queue: u64,
    pub workers: Vec<WorkerRecord>,
    /// Wall-clock capture time.
    pub captured_at: DateTime<Utc>,
    /// Monotonic capture time, used for rate math.
    pub captured_instant: Instant,
}

/// Decodes a raw stats payload.
///
/// Undecodable text yields `SkipRound`; a well-formed object without a
/// `workers` key yields `ProtocolError`.
pub fn parse_snapshot(raw: &str, captured_instant: Instant) -> Result<Snapshot, AgentError> {
    let doc: Value = serde_json::from_str(raw)
        .map_err(|e| AgentError::SkipRound(format!("undecodable stats payload: {}", e)))?;

    let obj = doc
        .as_object()
        .ok_or_else(|| AgentError::SkipRound("stats payload is not a JSON object".into()))?;

    let workers = obj.get("workers").ok_or_else(|| {
        AgentError::ProtocolError("stats payload has no 'workers' field".into())
    })?;

    let workers: Vec<WorkerRecord> = Vec::<WorkerRecord>::deserialize(workers)
        .map_err(|e| AgentError::SkipRound(format!("malformed worker list: {}", e)))?;

    let version = obj
        .get("version")
        .and_then(Value::as_str)
        .map(str::to_string);

    let listen_queue = obj
        .get("listen_queue")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    Ok(Snapshot {
        version,
        listen_queue,
        workers,
        captured_at: Utc::now(),
        captured_instant,
    })
}
