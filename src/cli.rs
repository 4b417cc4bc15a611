//! CLI arguments and subcommands for uwsgi-stats-agent.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands. Every agent setting can also be
//! supplied through a `UWSGI_STATS*` environment variable.

use clap::builder::BoolishValueParser;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use uwsgi_stats_agent::format::placeholder_names;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "uwsgi-stats-agent",
    about = "Push uWSGI stats server metrics as templated lines to stdout or UDP",
    long_about = "Push uWSGI stats server metrics as templated lines to stdout or UDP.\n\n\
                  Connects to a uWSGI stats server every interval, computes request totals, \
                  requests per second, average response time, memory and busy/idle worker \
                  counts, and emits one line per round (InfluxDB line protocol by default).",
    version,
    propagate_version = true,
    subcommand_precedence_over_arg = true,
    after_help = placeholder_help()
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Stats server address: host:port, /path/to/socket or @abstract-name
    #[arg(value_name = "STATS", env = "UWSGI_STATS")]
    pub stats_address: Option<String>,

    /// Stats server address; overrides the positional form
    #[arg(short = 's', long)]
    pub stats: Option<String>,

    /// Seconds between samples
    #[arg(short = 'i', long, env = "UWSGI_STATS_INTERVAL")]
    pub interval: Option<u64>,

    /// Output line template
    #[arg(short = 't', long, env = "UWSGI_STATS_TEMPLATE")]
    pub template: Option<String>,

    /// Node label for {node}
    #[arg(long, env = "UWSGI_STATS_NODE")]
    pub node: Option<String>,

    /// Role label for {role}
    #[arg(long, env = "UWSGI_STATS_ROLE")]
    pub role: Option<String>,

    /// Send lines as UDP datagrams to host:port instead of stdout
    #[arg(short = 'u', long, env = "UWSGI_STATS_UDP")]
    pub udp: Option<String>,

    /// Keep polling after connection/protocol errors instead of exiting
    /// (`--forever=false` turns it off again)
    #[arg(
        short = 'f',
        long,
        env = "UWSGI_STATS_FOREVER",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub forever: Option<bool>,

    /// Seconds allowed for connecting to and reading one snapshot
    #[arg(long, env = "UWSGI_STATS_TIMEOUT")]
    pub timeout: Option<u64>,

    /// Log level (logs go to stderr)
    #[arg(long, value_enum, default_value = "warn", env = "UWSGI_STATS_LOG_LEVEL")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,
}

fn placeholder_help() -> String {
    format!("Template placeholders: {}", placeholder_names().join(" "))
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch one snapshot and show what would be emitted
    Check {
        /// Show per-worker details
        #[arg(long)]
        verbose: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },
}
