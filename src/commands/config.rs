//! Config command implementation.
//!
//! Generates configuration files in various formats.

use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;
use crate::config::{render_config, Config};

/// Generates configuration files.
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config {
        stats: Some("127.0.0.1:1717".to_string()),
        ..Config::default()
    };
    let output = match output {
        Some(path) => path,
        None => PathBuf::from("uwsgi-stats-agent.yaml"),
    };

    let mut content = render_config(&config, &format)?;
    if commented && matches!(format, ConfigFormat::Yaml) {
        content = add_config_comments(content);
    }

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

/// Adds comments to YAML configuration.
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# uWSGI Stats Agent Configuration
# ===============================
#
# Stats Source
# ------------
# stats: "127.0.0.1:1717"      # host:port, /path/to/stats.sock or @abstract-name
# interval: 5                  # Seconds between samples (must be > 0)
# timeout: null                # Seconds allowed for connect + read (null = no limit)
#
# Output
# ------
# template: "..."              # Placeholders: version node role req rps avg lq tx
#                              #               busy idle rss vsz workers ts
# node: "<hostname>"           # Value of {node}
# role: "uwsgi"                # Value of {role}
# udp: null                    # host:port to send datagrams to (null = stdout)
#
# Error Handling
# --------------
# forever: false               # true = log errors and keep polling
"#;

    format!("{comments}\n{yaml}")
}
