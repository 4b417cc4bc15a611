//! Check command implementation.
//!
//! Fetches a single snapshot from the configured stats server, prints what was
//! decoded and the line the first round would emit.

use std::time::Instant;

use uwsgi_stats_agent::{fetch, parse_snapshot, Emitter, RoundOutcome, Scheduler, WorkerStatus};

use crate::config::{validate_effective_config, Config};

/// Validates configuration and connectivity against the stats server.
pub async fn command_check(verbose: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 uWSGI Stats Agent - Endpoint Check");
    println!("=====================================");

    println!("\n⚙️  Checking configuration...");
    if let Err(e) = validate_effective_config(config) {
        println!("   ❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    println!("   ✅ Configuration is valid");

    let agent_config = config.to_agent_config();
    let endpoint = agent_config.endpoint_address()?;

    println!("\n🔌 Fetching snapshot from {}...", endpoint);
    let start = Instant::now();
    let raw = match fetch(&endpoint, agent_config.timeout()).await {
        Ok(raw) => raw,
        Err(e) => {
            println!("   ❌ {}", e);
            std::process::exit(1);
        }
    };
    println!(
        "   ✅ Read {} bytes in {:.2}ms",
        raw.len(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let snapshot = match parse_snapshot(&raw, Instant::now()) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            println!("   ❌ {}", e);
            std::process::exit(1);
        }
    };

    println!("\n📊 Snapshot:");
    println!(
        "   ├─ Version: {}",
        snapshot.version.as_deref().unwrap_or("unknown")
    );
    println!("   ├─ Listen queue: {}", snapshot.listen_queue);
    println!("   └─ Workers: {}", snapshot.workers.len());

    if verbose {
        for worker in &snapshot.workers {
            let status = match &worker.status {
                WorkerStatus::Busy => "busy",
                WorkerStatus::Idle => "idle",
                WorkerStatus::Other(raw) => raw.as_str(),
            };
            println!("   ├─ Worker {} ({})", worker.id, status);
            println!("   │  ├─ Requests: {}", worker.requests);
            println!("   │  ├─ Avg RT: {} us", worker.avg_rt);
            println!("   │  ├─ RSS: {} MB", worker.rss / 1024 / 1024);
            println!("   │  ├─ VSZ: {} MB", worker.vsz / 1024 / 1024);
            println!("   │  └─ TX: {} bytes", worker.tx);
        }
    }

    // Render through a scheduler so the template is exercised exactly as in
    // the sampling loop. Nothing is emitted here.
    let mut scheduler = Scheduler::with_emitter(&agent_config, Emitter::stdout())?;
    println!("\n📝 First round output:");
    println!("   Template: {}", agent_config.output_template().as_str());
    match scheduler.process(&raw, snapshot.captured_instant) {
        Ok(RoundOutcome::Emitted(line)) => print!("   {}", line),
        Ok(RoundOutcome::Skipped(reason)) => println!("   ⚠️  Round would be skipped: {}", reason),
        Err(e) => {
            println!("   ❌ {}", e);
            std::process::exit(1);
        }
    }

    println!("\n✅ Check completed successfully");
    Ok(())
}
