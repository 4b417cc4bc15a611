//! CLI command implementations for uwsgi-stats-agent.
//!
//! This module provides implementations for all CLI subcommands:
//! - `check`: One-shot fetch and render against the configured stats server
//! - `config`: Configuration file generation

pub mod check;
pub mod config;

// Re-export command functions
pub use check::command_check;
pub use config::command_config;
