//! Error taxonomy for the sampling loop.
//!
//! Every failure a round can produce is one variant of [`AgentError`]. The
//! scheduler uses [`AgentError::is_recoverable`] to decide whether a failure
//! is absorbed inside the round or escalated according to the run mode.

use std::io;

/// Errors produced by the agent core.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// The endpoint string matches none of the recognized address shapes.
    #[error("invalid stats address '{0}'")]
    InvalidAddress(String),

    /// The stats endpoint could not be reached or the transport failed mid-read.
    #[error("connection to {endpoint} failed: {source}")]
    ConnectionError {
        endpoint: String,
        #[source]
        source: io::Error,
    },

    /// The payload could not be decoded; this round produces no output.
    #[error("skipping round: {0}")]
    SkipRound(String),

    /// The endpoint answered with JSON that lacks the expected schema.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The snapshot contained no workers, so averages are undefined.
    #[error("snapshot contains no workers")]
    EmptyWorkerSet,

    /// The output template references a name outside the placeholder vocabulary.
    #[error("unknown placeholder '{{{0}}}' in template")]
    UnknownPlaceholder(String),

    /// The stdout consumer closed its end of the pipe.
    #[error("output stream closed")]
    OutputClosed,

    /// The resolved configuration is unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl AgentError {
    /// Returns true for conditions that only cost the current round.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AgentError::SkipRound(_) | AgentError::EmptyWorkerSet)
    }

    /// Builds a `ConnectionError` for the given endpoint.
    pub fn connection(endpoint: impl ToString, source: io::Error) -> Self {
        AgentError::ConnectionError {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_classification() {
        assert!(AgentError::SkipRound("truncated".into()).is_recoverable());
        assert!(AgentError::EmptyWorkerSet.is_recoverable());
        assert!(!AgentError::ProtocolError("no workers".into()).is_recoverable());
        assert!(!AgentError::UnknownPlaceholder("bogus".into()).is_recoverable());
        assert!(!AgentError::OutputClosed.is_recoverable());
        assert!(!AgentError::connection(
            "127.0.0.1:1717",
            io::Error::from(io::ErrorKind::ConnectionRefused)
        )
        .is_recoverable());
    }

    #[test]
    fn test_unknown_placeholder_message() {
        let err = AgentError::UnknownPlaceholder("bogus".into());
        assert_eq!(err.to_string(), "unknown placeholder '{bogus}' in template");
    }
}
