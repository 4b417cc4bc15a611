//! Configuration management for uwsgi-stats-agent.
//!
//! This module handles loading, merging, and validating configuration from files
//! and CLI arguments. It supports YAML, JSON, and TOML formats. Precedence is
//! CLI flag > environment variable > config file > default.

use crate::cli::{Args, ConfigFormat};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uwsgi_stats_agent::agent_config::{DEFAULT_INTERVAL_SECS, DEFAULT_NODE, DEFAULT_ROLE};
use uwsgi_stats_agent::{AgentConfig, RunMode, DEFAULT_TEMPLATE};

/// File-level configuration. Every field is optional so partial files merge
/// cleanly with CLI arguments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Stats server address
    #[serde(alias = "stats-address")]
    pub stats: Option<String>,
    #[serde(alias = "interval-secs")]
    pub interval: Option<u64>,
    pub template: Option<String>,
    pub node: Option<String>,
    pub role: Option<String>,
    pub udp: Option<String>,
    pub forever: Option<bool>,
    #[serde(alias = "timeout-secs")]
    pub timeout: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            stats: None,
            interval: Some(DEFAULT_INTERVAL_SECS),
            template: Some(DEFAULT_TEMPLATE.to_string()),
            node: Some(default_node()),
            role: Some(DEFAULT_ROLE.to_string()),
            udp: None,
            forever: Some(false),
            timeout: None,
        }
    }
}

impl Config {
    /// Converts the merged file/CLI view into the library's resolved config.
    pub fn to_agent_config(&self) -> AgentConfig {
        AgentConfig {
            endpoint: self.stats.clone().unwrap_or_default(),
            interval_secs: self.interval.unwrap_or(DEFAULT_INTERVAL_SECS),
            template: self
                .template
                .clone()
                .unwrap_or_else(|| DEFAULT_TEMPLATE.to_string()),
            node: self.node.clone().unwrap_or_else(default_node),
            role: self.role.clone().unwrap_or_else(|| DEFAULT_ROLE.to_string()),
            udp: self.udp.clone(),
            mode: if self.forever.unwrap_or(false) {
                RunMode::Forever
            } else {
                RunMode::FailFast
            },
            timeout_secs: self.timeout,
        }
    }
}

/// Host name of this machine, used as the default node label.
fn default_node() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| DEFAULT_NODE.to_string())
}

/// Validate effective config (used by --check-config and at startup)
pub fn validate_effective_config(cfg: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if cfg.stats.as_deref().map_or(true, |s| s.trim().is_empty()) {
        return Err("no stats address given (use --stats or UWSGI_STATS)".into());
    }

    if let Some(udp) = cfg.udp.as_deref() {
        if !udp.contains(':') {
            return Err(format!("UDP destination '{}' must be host:port", udp).into());
        }
    }

    cfg.to_agent_config().validate()?;
    Ok(())
}

/// Resolves configuration from CLI args, config file, and defaults.
/// This enforces precedence: CLI (if provided) > config file > default.
pub fn resolve_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = if args.no_config {
        Config::default()
    } else {
        load_config(args.config.as_deref())?
    };

    if let Some(stats) = args.stats.as_ref().or(args.stats_address.as_ref()) {
        config.stats = Some(stats.clone());
    }
    if let Some(interval) = args.interval {
        config.interval = Some(interval);
    }
    if let Some(template) = &args.template {
        config.template = Some(template.clone());
    }
    if let Some(node) = &args.node {
        config.node = Some(node.clone());
    }
    if let Some(role) = &args.role {
        config.role = Some(role.clone());
    }
    if let Some(udp) = &args.udp {
        config.udp = Some(udp.clone());
    }
    if let Some(forever) = args.forever {
        config.forever = Some(forever);
    }
    if let Some(timeout) = args.timeout {
        config.timeout = Some(timeout);
    }

    debug!("Resolved configuration: {:?}", config);
    Ok(config)
}

/// Configuration loading with multiple format support. Missing fields in the
/// file fall back to defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, Box<dyn std::error::Error>> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/uwsgi-stats-agent.yaml",
                "/etc/uwsgi-stats-agent.yml",
                "/etc/uwsgi-stats-agent.json",
                "/etc/uwsgi-stats-agent.toml",
                "./uwsgi-stats-agent.yaml",
                "./uwsgi-stats-agent.yml",
                "./uwsgi-stats-agent.json",
                "./uwsgi-stats-agent.toml",
            ];

            match defaults.iter().find(|p| Path::new(p).exists()) {
                Some(p) => PathBuf::from(p),
                None => return Ok(Config::default()),
            }
        }
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| format!("cannot read config file {}: {}", path.display(), e))?;

    let file: Config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)?,
    };
    info!("Loaded configuration from: {}", path.display());

    Ok(merge_defaults(file))
}

fn merge_defaults(file: Config) -> Config {
    let defaults = Config::default();
    Config {
        stats: file.stats.or(defaults.stats),
        interval: file.interval.or(defaults.interval),
        template: file.template.or(defaults.template),
        node: file.node.or(defaults.node),
        role: file.role.or(defaults.role),
        udp: file.udp.or(defaults.udp),
        forever: file.forever.or(defaults.forever),
        timeout: file.timeout.or(defaults.timeout),
    }
}

/// Renders configuration in the requested format.
pub fn render_config(
    config: &Config,
    format: &ConfigFormat,
) -> Result<String, Box<dyn std::error::Error>> {
    Ok(match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => serde_yaml::to_string(config)?,
    })
}

/// Shows configuration in requested format
pub fn show_config(config: &Config, format: ConfigFormat) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", render_config(config, &format)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["uwsgi-stats-agent", "--no-config"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_defaults_without_stats_are_invalid() {
        let cfg = Config::default();
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_cli_overrides_defaults() {
        let cfg = resolve_config(&args(&[
            "--stats",
            ":1717",
            "--interval",
            "2",
            "--role",
            "api",
            "--forever",
        ]))
        .unwrap();
        assert!(validate_effective_config(&cfg).is_ok());

        let agent = cfg.to_agent_config();
        assert_eq!(agent.endpoint, ":1717");
        assert_eq!(agent.interval_secs, 2);
        assert_eq!(agent.role, "api");
        assert_eq!(agent.mode, RunMode::Forever);
        assert_eq!(agent.template, DEFAULT_TEMPLATE);
    }

    #[test]
    fn test_positional_stats_address_and_flag_precedence() {
        let cfg = resolve_config(&args(&["/run/uwsgi/stats.sock"])).unwrap();
        assert_eq!(cfg.stats.as_deref(), Some("/run/uwsgi/stats.sock"));

        let cfg = resolve_config(&args(&["--stats", ":1717", "/run/uwsgi/stats.sock"])).unwrap();
        assert_eq!(cfg.stats.as_deref(), Some(":1717"));
    }

    #[test]
    fn test_cli_can_disable_forever_from_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "stats: \":1717\"\nforever: true").unwrap();
        let path = file.path().to_str().unwrap();

        let on = Args::try_parse_from(["uwsgi-stats-agent", "-c", path]).unwrap();
        let cfg = resolve_config(&on).unwrap();
        assert_eq!(cfg.to_agent_config().mode, RunMode::Forever);

        let off = Args::try_parse_from(["uwsgi-stats-agent", "-c", path, "--forever=false"]).unwrap();
        let cfg = resolve_config(&off).unwrap();
        assert_eq!(cfg.to_agent_config().mode, RunMode::FailFast);
    }

    #[test]
    fn test_zero_interval_is_invalid() {
        let cfg = resolve_config(&args(&["--stats", ":1717", "--interval", "0"])).unwrap();
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_udp_without_port_is_invalid() {
        let cfg = resolve_config(&args(&["--stats", ":1717", "--udp", "collector"])).unwrap();
        assert!(validate_effective_config(&cfg).is_err());
    }

    #[test]
    fn test_load_yaml_file_merges_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "stats: /run/uwsgi/stats.sock\nrole: worker").unwrap();

        let cfg = load_config(Some(file.path())).unwrap();
        assert_eq!(cfg.stats.as_deref(), Some("/run/uwsgi/stats.sock"));
        assert_eq!(cfg.role.as_deref(), Some("worker"));
        assert_eq!(cfg.interval, Some(DEFAULT_INTERVAL_SECS));
        assert_eq!(cfg.forever, Some(false));
    }

    #[test]
    fn test_load_toml_and_json_files() {
        let mut toml_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(toml_file, "stats = \"@stats\"\ninterval = 30").unwrap();
        let cfg = load_config(Some(toml_file.path())).unwrap();
        assert_eq!(cfg.stats.as_deref(), Some("@stats"));
        assert_eq!(cfg.interval, Some(30));

        let mut json_file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        writeln!(json_file, r#"{{"stats": "10.0.0.1:1717", "forever": true}}"#).unwrap();
        let cfg = load_config(Some(json_file.path())).unwrap();
        assert_eq!(cfg.to_agent_config().mode, RunMode::Forever);
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(dir.path().join("absent.yaml").as_path())).is_err());
    }

    #[test]
    fn test_render_config_formats() {
        let cfg = Config {
            stats: Some(":1717".into()),
            ..Config::default()
        };
        for format in [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml] {
            let out = render_config(&cfg, &format).unwrap();
            assert!(out.contains(":1717"));
        }
    }
}
