//! Resolved configuration consumed by the sampling loop.
//!
//! The binary merges CLI flags, environment variables and config files into
//! this struct. The core never looks anywhere else for settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::aggregate::Labels;
use crate::endpoint::EndpointAddress;
use crate::error::AgentError;
use crate::format::{Template, DEFAULT_TEMPLATE};

pub const DEFAULT_INTERVAL_SECS: u64 = 5;
pub const DEFAULT_ROLE: &str = "uwsgi";
pub const DEFAULT_NODE: &str = "localhost";

/// How the scheduler reacts to fatal round errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Connection, protocol and template errors end the loop.
    #[default]
    FailFast,
    /// Every error is logged and the loop keeps polling.
    Forever,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Stats endpoint, e.g. `127.0.0.1:1717`, `/run/uwsgi/stats.sock`, `@stats`.
    pub endpoint: String,
    pub interval_secs: u64,
    pub template: String,
    pub node: String,
    pub role: String,
    /// UDP destination; stdout when unset.
    pub udp: Option<String>,
    pub mode: RunMode,
    /// Bound on connect plus read of one snapshot.
    pub timeout_secs: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            interval_secs: DEFAULT_INTERVAL_SECS,
            template: DEFAULT_TEMPLATE.to_string(),
            node: DEFAULT_NODE.to_string(),
            role: DEFAULT_ROLE.to_string(),
            udp: None,
            mode: RunMode::FailFast,
            timeout_secs: None,
        }
    }
}

impl AgentConfig {
    /// Checks the values the core cannot work without.
    pub fn validate(&self) -> Result<(), AgentError> {
        self.endpoint_address()?;
        if self.interval_secs == 0 {
            return Err(AgentError::InvalidConfig(
                "interval must be greater than 0 seconds".into(),
            ));
        }
        if self.timeout_secs == Some(0) {
            return Err(AgentError::InvalidConfig(
                "timeout must be greater than 0 seconds".into(),
            ));
        }
        Ok(())
    }

    pub fn endpoint_address(&self) -> Result<EndpointAddress, AgentError> {
        EndpointAddress::parse(&self.endpoint)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    pub fn labels(&self) -> Labels {
        Labels {
            node: self.node.clone(),
            role: self.role.clone(),
        }
    }

    pub fn output_template(&self) -> Template {
        Template::new(self.template.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> AgentConfig {
        AgentConfig {
            endpoint: endpoint.into(),
            ..AgentConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.interval(), Duration::from_secs(5));
        assert_eq!(cfg.mode, RunMode::FailFast);
        assert_eq!(cfg.template, DEFAULT_TEMPLATE);
        assert!(cfg.udp.is_none());
        assert!(cfg.timeout().is_none());
    }

    #[test]
    fn test_validate_ok() {
        assert!(config("127.0.0.1:1717").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        assert!(matches!(
            config("").validate(),
            Err(AgentError::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let cfg = AgentConfig {
            interval_secs: 0,
            ..config("127.0.0.1:1717")
        };
        assert!(matches!(cfg.validate(), Err(AgentError::InvalidConfig(_))));
    }

    #[test]
    fn test_run_mode_serde_names() {
        let yaml = serde_yaml::to_string(&RunMode::Forever).unwrap();
        assert_eq!(yaml.trim(), "forever");
        let mode: RunMode = serde_yaml::from_str("fail_fast").unwrap();
        assert_eq!(mode, RunMode::FailFast);
    }
}
