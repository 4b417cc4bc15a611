//! uWSGI Stats Agent Library
//!
//! Polls a uWSGI-style stats server, derives request rates from successive
//! snapshots and emits one templated metric line per round to stdout or a
//! UDP collector (InfluxDB line protocol by default).
//!
//! # Features
//!
//! - **Any stats transport**: TCP `host:port`, Unix socket paths and
//!   abstract Unix sockets (`@name`)
//! - **Rate tracking**: per-worker and aggregate requests per second, with
//!   first-round suppression and clamping after worker respawns
//! - **Closed template vocabulary**: unknown placeholders are rejected
//! - **Fail-fast or forever**: choose whether fatal round errors stop the loop
//!
//! # Usage
//!
//! ```rust,no_run
//! use uwsgi_stats_agent::{AgentConfig, RunMode, Scheduler};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() -> Result<(), uwsgi_stats_agent::AgentError> {
//! let config = AgentConfig {
//!     endpoint: "127.0.0.1:1717".into(),
//!     mode: RunMode::Forever,
//!     ..AgentConfig::default()
//! };
//!
//! let scheduler = Scheduler::new(&config).await?;
//! let outcome = scheduler.run(CancellationToken::new()).await?;
//! println!("stopped: {:?}", outcome);
//! # Ok(())
//! # }
//! ```

pub mod agent_config;
pub mod aggregate;
pub mod emit;
pub mod endpoint;
pub mod error;
pub mod fetcher;
pub mod format;
pub mod rate;
pub mod scheduler;
pub mod snapshot;

// Re-export main types for convenience
pub use agent_config::{AgentConfig, RunMode};
pub use aggregate::{aggregate, Labels, MetricSummary};
pub use emit::Emitter;
pub use endpoint::EndpointAddress;
pub use error::AgentError;
pub use fetcher::fetch;
pub use format::{Template, DEFAULT_TEMPLATE};
pub use rate::{RateEngine, RateReport, WorkerRate};
pub use scheduler::{RoundOutcome, RoundStats, RunOutcome, Scheduler};
pub use snapshot::{parse_snapshot, Snapshot, WorkerRecord, WorkerStatus};
