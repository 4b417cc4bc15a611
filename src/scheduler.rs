//! The sampling loop.
//!
//! One round is: fetch → parse → aggregate → rate → render → emit. Rounds
//! run strictly one after another with a fixed sleep in between, until the
//! caller cancels, the output pipe closes, or (in fail-fast mode) a fatal
//! error occurs.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn, Level};

use crate::agent_config::{AgentConfig, RunMode};
use crate::aggregate::{aggregate, Labels};
use crate::emit::Emitter;
use crate::endpoint::EndpointAddress;
use crate::error::AgentError;
use crate::fetcher::fetch;
use crate::format::Template;
use crate::rate::RateEngine;
use crate::snapshot::parse_snapshot;

/// Why [`Scheduler::run`] returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The cancellation token fired.
    Cancelled,
    /// The stdout consumer went away.
    OutputClosed,
}

/// Result of a single round that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// The rendered line that was emitted.
    Emitted(String),
    /// The round produced no output; carries the reason.
    Skipped(String),
}

/// Round counters, mostly for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundStats {
    pub emitted: u64,
    pub skipped: u64,
    pub failed: u64,
}

pub struct Scheduler {
    endpoint: EndpointAddress,
    template: Template,
    labels: Labels,
    interval: Duration,
    timeout: Option<Duration>,
    mode: RunMode,
    emitter: Emitter,
    rates: RateEngine,
    stats: RoundStats,
}

impl Scheduler {
    /// Builds a scheduler with the sink selected by `config.udp`.
    pub async fn new(config: &AgentConfig) -> Result<Self, AgentError> {
        let emitter = match config.udp.as_deref() {
            Some(dest) => Emitter::udp(dest).await?,
            None => Emitter::stdout(),
        };
        Self::with_emitter(config, emitter)
    }

    pub fn with_emitter(config: &AgentConfig, emitter: Emitter) -> Result<Self, AgentError> {
        config.validate()?;
        Ok(Self {
            endpoint: config.endpoint_address()?,
            template: config.output_template(),
            labels: config.labels(),
            interval: config.interval(),
            timeout: config.timeout(),
            mode: config.mode,
            emitter,
            rates: RateEngine::new(),
            stats: RoundStats::default(),
        })
    }

    pub fn endpoint(&self) -> &EndpointAddress {
        &self.endpoint
    }

    pub fn stats(&self) -> RoundStats {
        self.stats
    }

    /// Runs rounds until cancelled, the output closes, or a fatal error
    /// occurs in fail-fast mode.
    #[instrument(skip_all, fields(endpoint = %self.endpoint, mode = ?self.mode))]
    pub async fn run(mut self, cancel: CancellationToken) -> Result<RunOutcome, AgentError> {
        info!(
            "Polling every {}s, emitting to {}",
            self.interval.as_secs(),
            self.sink_name()
        );

        loop {
            let fetched = tokio::select! {
                _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
                fetched = fetch(&self.endpoint, self.timeout) => fetched,
            };
            if cancel.is_cancelled() {
                return Ok(RunOutcome::Cancelled);
            }

            let result = match fetched {
                Ok(raw) => self.finish_round(&raw, Instant::now()).await,
                Err(e) => Err(e),
            };

            match result {
                Ok(RoundOutcome::Emitted(_)) => {}
                Ok(RoundOutcome::Skipped(reason)) => {
                    if skip_level(self.mode) == Level::WARN {
                        warn!("Round skipped: {}", reason);
                    } else {
                        debug!("Round skipped: {}", reason);
                    }
                }
                Err(AgentError::OutputClosed) => {
                    info!("Output closed by consumer, stopping");
                    return Ok(RunOutcome::OutputClosed);
                }
                Err(e) => {
                    self.stats.failed += 1;
                    match self.mode {
                        RunMode::FailFast => return Err(e),
                        RunMode::Forever => error!("Round failed: {}", e),
                    }
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return Ok(RunOutcome::Cancelled),
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Performs one complete round, failures included. Does not sleep.
    pub async fn round(&mut self) -> Result<RoundOutcome, AgentError> {
        let raw = fetch(&self.endpoint, self.timeout).await?;
        self.finish_round(&raw, Instant::now()).await
    }

    async fn finish_round(
        &mut self,
        raw: &str,
        captured: Instant,
    ) -> Result<RoundOutcome, AgentError> {
        let outcome = self.process(raw, captured)?;
        match &outcome {
            RoundOutcome::Emitted(line) => {
                self.emitter.emit(line).await?;
                self.stats.emitted += 1;
            }
            RoundOutcome::Skipped(_) => self.stats.skipped += 1,
        }
        Ok(outcome)
    }

    /// Turns a raw payload into a rendered line, updating rate state.
    /// Recoverable conditions become `Skipped`.
    pub fn process(&mut self, raw: &str, captured: Instant) -> Result<RoundOutcome, AgentError> {
        match self.render_round(raw, captured) {
            Ok(line) => Ok(RoundOutcome::Emitted(line)),
            Err(e) if e.is_recoverable() => Ok(RoundOutcome::Skipped(e.to_string())),
            Err(e) => Err(e),
        }
    }

    fn render_round(&mut self, raw: &str, captured: Instant) -> Result<String, AgentError> {
        let snapshot = parse_snapshot(raw, captured)?;
        let mut summary = aggregate(&snapshot, &self.labels, 0)?;
        if !self.rates.is_tracking() {
            info!("First snapshot from {}, rps starts at 0", self.endpoint);
        }
        summary.rps = self.rates.update(&snapshot).total;
        debug!(
            "Round summary: workers={} req={} rps={} busy={} idle={} (tracking {} worker ids)",
            summary.workers,
            summary.requests,
            summary.rps,
            summary.busy,
            summary.idle,
            self.rates.tracked_workers()
        );
        self.template.render(&summary)
    }

    fn sink_name(&self) -> String {
        match &self.emitter {
            Emitter::Stdout(_) => "stdout".to_string(),
            Emitter::Udp { dest, .. } => format!("udp://{}", dest),
        }
    }
}

/// Level for skipped-round messages.
fn skip_level(mode: RunMode) -> Level {
    match mode {
        RunMode::FailFast => Level::DEBUG,
        RunMode::Forever => Level::WARN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const ROUND_ONE: &str = r#"{"version":"2.0","listen_queue":0,"workers":[{"id":1,"requests":100,"avg_rt":500,"rss":1000,"vsz":2000,"tx":50,"status":"idle"}]}"#;
    const ROUND_TWO: &str = r#"{"version":"2.0","listen_queue":0,"workers":[{"id":1,"requests":150,"avg_rt":500,"rss":1000,"vsz":2000,"tx":80,"status":"busy"}]}"#;

    fn scheduler(template: &str) -> Scheduler {
        let config = AgentConfig {
            endpoint: "127.0.0.1:1717".into(),
            template: template.into(),
            ..AgentConfig::default()
        };
        Scheduler::with_emitter(&config, Emitter::stdout()).unwrap()
    }

    #[test]
    fn test_two_rounds_match_expected_lines() {
        let mut sched = scheduler("req={req}i,rps={rps}i,busy={busy}i,idle={idle}i");
        let t0 = Instant::now();

        let first = sched.process(ROUND_ONE, t0).unwrap();
        assert_eq!(
            first,
            RoundOutcome::Emitted("req=100i,rps=0i,busy=0i,idle=1i\n".into())
        );

        let second = sched
            .process(ROUND_TWO, t0 + Duration::from_secs(1))
            .unwrap();
        assert_eq!(
            second,
            RoundOutcome::Emitted("req=150i,rps=50i,busy=1i,idle=0i\n".into())
        );
    }

    #[test]
    fn test_malformed_payload_is_skipped() {
        let mut sched = scheduler("{req}");
        let outcome = sched.process("{\"workers\":[{\"id\"", Instant::now()).unwrap();
        assert!(matches!(outcome, RoundOutcome::Skipped(_)));
    }

    #[test]
    fn test_empty_worker_list_is_skipped_and_keeps_baseline_unset() {
        let mut sched = scheduler("{rps}");
        let t0 = Instant::now();
        let outcome = sched.process(r#"{"workers":[]}"#, t0).unwrap();
        assert!(matches!(outcome, RoundOutcome::Skipped(_)));

        // The next valid round is still the first one the rate engine sees.
        let outcome = sched
            .process(ROUND_TWO, t0 + Duration::from_secs(1))
            .unwrap();
        assert_eq!(outcome, RoundOutcome::Emitted("0\n".into()));
    }

    #[test]
    fn test_missing_workers_is_fatal() {
        let mut sched = scheduler("{req}");
        let err = sched
            .process(r#"{"version":"2.0"}"#, Instant::now())
            .unwrap_err();
        assert!(matches!(err, AgentError::ProtocolError(_)));
    }

    #[test]
    fn test_unknown_placeholder_fails_round() {
        let mut sched = scheduler("{bogus}");
        let err = sched.process(ROUND_ONE, Instant::now()).unwrap_err();
        assert!(matches!(err, AgentError::UnknownPlaceholder(_)));
    }

    #[test]
    fn test_skips_are_warnings_in_forever_mode() {
        assert_eq!(skip_level(RunMode::Forever), Level::WARN);
        assert_eq!(skip_level(RunMode::FailFast), Level::DEBUG);
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = AgentConfig {
            endpoint: "@".into(),
            ..AgentConfig::default()
        };
        assert!(matches!(
            Scheduler::with_emitter(&config, Emitter::stdout()),
            Err(AgentError::InvalidAddress(_))
        ));
    }
}
