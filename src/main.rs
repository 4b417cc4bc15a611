//! uwsgi-stats-agent - version 0.1.0
//!
//! Polls a uWSGI stats server and pushes one metric line per interval.
//! This is the main entry point that resolves configuration, initializes
//! logging, wires signals to cancellation and maps outcomes to exit codes.

mod cli;
mod commands;
mod config;

use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{command_check, command_config};
use config::{resolve_config, show_config, validate_effective_config, Config};
use uwsgi_stats_agent::{RunOutcome, Scheduler};

/// Exit status after the output consumer closed the pipe.
const EXIT_OK: i32 = 0;
/// Exit status for fatal errors.
const EXIT_FAILURE: i32 = 1;
/// Exit status after SIGINT (128 + 2).
const EXIT_INTERRUPTED: i32 = 130;
/// Exit status after SIGTERM (128 + 15).
const EXIT_TERMINATED: i32 = 143;

/// Initializes tracing logging subsystem with configured log level.
/// Logs go to stderr; stdout carries metric lines only.
fn setup_logging(args: &Args) {
    let log_level = match args.log_level {
        LogLevel::Off => return,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warn => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
        LogLevel::Trace => Level::TRACE,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    debug!("Logging initialized with level: {:?}", args.log_level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(EXIT_FAILURE);
    }
    Ok(config)
}

/// Waits for SIGINT or SIGTERM, cancels the sampling loop and returns the
/// exit status matching the signal.
async fn shutdown_signal(cancel: CancellationToken) -> i32 {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let code = tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), stopping...");
            EXIT_INTERRUPTED
        }
        _ = terminate => {
            info!("Received SIGTERM, stopping...");
            EXIT_TERMINATED
        }
    };

    cancel.cancel();
    code
}

/// Runs the sampling loop until it stops and returns the process exit status.
async fn run_agent(config: &Config) -> Result<i32, Box<dyn std::error::Error>> {
    let agent_config = config.to_agent_config();
    let scheduler = Scheduler::new(&agent_config).await?;

    info!(
        "Starting uwsgi-stats-agent against {} ({:?})",
        scheduler.endpoint(),
        agent_config.mode
    );

    let cancel = CancellationToken::new();
    let signal_task = tokio::spawn(shutdown_signal(cancel.clone()));

    let code = match scheduler.run(cancel).await {
        Ok(RunOutcome::Cancelled) => signal_task.await.unwrap_or(EXIT_INTERRUPTED),
        Ok(RunOutcome::OutputClosed) => {
            signal_task.abort();
            EXIT_OK
        }
        Err(e) => {
            signal_task.abort();
            error!("Stopping on fatal error: {}", e);
            eprintln!("❌ {}", e);
            EXIT_FAILURE
        }
    };

    Ok(code)
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    setup_logging(&args);

    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(EXIT_FAILURE);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format.clone());
    }

    if let Some(command) = &args.command {
        return match command {
            Commands::Config {
                output,
                format,
                commented,
            } => command_config(output.clone(), format.clone(), *commented),

            Commands::Check { verbose } => {
                let config = resolve_config(&args)?;
                command_check(*verbose, &config).await
            }
        };
    }

    let config = load_validated_config(&args)?;
    let code = run_agent(&config).await?;

    debug!("uwsgi-stats-agent exiting with status {}", code);
    std::process::exit(code);
}
