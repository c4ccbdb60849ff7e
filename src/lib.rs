// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod job;
pub mod logging;
pub mod manager;
pub mod server;
pub mod types;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, ConfigSource, FileConfigSource};
use crate::manager::{spawn_signal_bridge, JobManager};
use crate::server::Server;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (fatal on error)
/// - the job manager and its autostart pass
/// - the control socket
/// - the signal bridge
///
/// Returns once every job is stopped and every worker has finished.
pub async fn run(args: CliArgs) -> Result<()> {
    let source = FileConfigSource::new(&args.config);

    if args.dry_run {
        let cfg = source.load()?;
        print_dry_run(&cfg);
        return Ok(());
    }

    let tracker = TaskTracker::new();
    let (manager, handle) = JobManager::init(source, tracker.clone())?;
    info!(pid = std::process::id(), "taskmasterd starting");

    let shutdown = CancellationToken::new();
    let server = Server::bind(&args.socket, handle.clone(), shutdown.clone())
        .with_context(|| format!("failed to bind control socket {}", args.socket))?;
    let server_task = tokio::spawn(server.run());

    let _signals = spawn_signal_bridge(handle)?;

    let result = manager.run().await;

    shutdown.cancel();
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "control socket failed"),
        Err(e) => error!(error = %e, "control socket task panicked"),
    }

    tracker.close();
    tracker.wait().await;
    info!("taskmasterd exiting");

    Ok(result?)
}

/// Simple dry-run output: print every program and its settings.
fn print_dry_run(cfg: &ConfigFile) {
    println!("taskmasterd dry-run");
    println!();

    println!("programs ({}):", cfg.program.len());
    for (name, spec) in cfg.program.iter() {
        println!("  - {name}");
        println!("      command: {}", spec.command);
        println!("      numprocs: {}", spec.numprocs);
        println!("      autostart: {}", spec.autostart);
        println!("      autorestart: {:?}", spec.autorestart);
        println!("      exitcodes: {:?}", spec.exitcodes);
        println!(
            "      startsecs: {}, startretries: {}",
            spec.startsecs, spec.startretries
        );
        println!(
            "      stopsignal: {}, stopwaitsecs: {}",
            spec.stopsignal, spec.stopwaitsecs
        );
        println!("      umask: {}", spec.umask);
        if let Some(ref dir) = spec.directory {
            println!("      directory: {}", dir.display());
        }
        if !spec.environment.is_empty() {
            println!("      environment: {:?}", spec.environment);
        }
        if let Some(ref out) = spec.stdout_logfile {
            println!("      stdout_logfile: {}", out.display());
        }
        if let Some(ref err) = spec.stderr_logfile {
            println!("      stderr_logfile: {}", err.display());
        }
    }

    debug!("dry-run complete (nothing started)");
}
