// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! orq daemon (orqd)
//!
//! Background process that owns the job store and the scheduler loop.
//!
//! Architecture:
//! - Listener Task: spawned task handling socket I/O for the CLI
//! - Scheduler Loop: main task ticking the scheduler on a fixed interval
//! - Runs: one task per dispatched run, bounded by the run pool

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod env;
mod lifecycle;
mod listener;
mod settings;

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use orq_storage::{JobStore, Retention, StoreError, WalStore};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::lifecycle::{Config, LifecycleError, StartupResult};
use crate::listener::{ListenCtx, Listener};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle info flags before any config/lock acquisition
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("orqd {VERSION}");
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("orqd {VERSION}");
                println!("orq daemon - runs scheduled jobs and serves the orq CLI");
                println!();
                println!("USAGE:");
                println!("    orqd");
                println!();
                println!("The daemon is typically started by the `orq` CLI and should not");
                println!("be invoked directly. It listens on a Unix socket for commands");
                println!("from `orq`.");
                println!();
                println!("OPTIONS:");
                println!("    -h, --help       Print help information");
                println!("    -v, --version    Print version information");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: orqd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load()?;

    rotate_log_if_needed(&config.log_path);
    // Written before tracing setup so the CLI can find this attempt's output
    write_startup_marker(&config)?;
    let log_guard = setup_logging(&config)?;

    info!("Starting daemon");

    let StartupResult {
        mut daemon,
        listener: unix_listener,
    } = match lifecycle::startup(&config).await {
        Ok(r) => r,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&config.lock_path)
                .unwrap_or_default()
                .trim()
                .to_string();
            let version = std::fs::read_to_string(&config.version_path)
                .unwrap_or_default()
                .trim()
                .to_string();

            eprintln!("orqd is already running");
            if !pid.is_empty() {
                eprintln!("  pid: {pid}");
            }
            if !version.is_empty() {
                if version == VERSION {
                    eprintln!("  version: {version}");
                } else {
                    eprintln!("  version: {version} (outdated, current: {VERSION})");
                }
            }
            std::process::exit(1);
        }
        Err(e) => {
            // Tracing is non-blocking and may not flush before exit
            write_startup_error(&config, &e);
            error!("Failed to start daemon: {}", e);
            drop(log_guard);
            return Err(e.into());
        }
    };

    // Before the first tick, so recovered runs no longer block their jobs
    let orphans = daemon.runtime.reconcile_orphaned_runs().await;
    if orphans > 0 {
        warn!(orphans, "failed runs left running by a previous daemon");
    }

    let shutdown_notify = Arc::new(Notify::new());

    let listener = Listener::new(
        unix_listener,
        ListenCtx {
            runtime: Arc::clone(&daemon.runtime),
            start_time: daemon.start_time,
            shutdown: Arc::clone(&shutdown_notify),
        },
    );
    tokio::spawn(listener.run());

    spawn_flush_task(Arc::clone(&daemon.store));
    spawn_checkpoint(Arc::clone(&daemon.store), daemon.retention);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(
        "Daemon ready, listening on {}",
        config.socket_path.display()
    );

    // Signal ready for parent process (e.g., systemd, CLI waiting for startup)
    println!("READY");

    // NOTE: created outside the loop; select! re-evaluates its branches on
    // every iteration, so a sleep() there would restart on each request.
    let mut tick = tokio::time::interval(daemon.tick_interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_notify.notified() => {
                info!("Shutdown requested via command");
                break;
            }

            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
                break;
            }

            _ = sigint.recv() => {
                info!("Received SIGINT, shutting down...");
                break;
            }

            _ = tick.tick() => {
                let started = Instant::now();
                let report = daemon.runtime.tick();
                if !report.is_idle() {
                    info!(
                        dispatched = report.dispatched.len(),
                        busy = report.busy,
                        saturated = report.saturated,
                        skipped_paused = report.skipped_paused,
                        skipped_inactive = report.skipped_inactive,
                        errors = report.errors,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "scheduler tick"
                    );
                }
            }
        }
    }

    daemon.shutdown()?;
    info!("Daemon stopped");
    Ok(())
}

/// Flush interval for group commit (~10ms durability window)
const FLUSH_INTERVAL: Duration = Duration::from_millis(10);

/// Spawn a task that periodically group-commits the store's WAL.
fn spawn_flush_task(store: Arc<WalStore>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(FLUSH_INTERVAL);

        loop {
            interval.tick().await;

            if let Err(e) = store.flush_if_needed() {
                error!("Failed to flush WAL: {}", e);
            }
        }
    });
}

/// Checkpoint interval (60 seconds)
const CHECKPOINT_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn a task that periodically prunes history, snapshots the store and
/// truncates the WAL.
fn spawn_checkpoint(store: Arc<WalStore>, retention: Retention) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CHECKPOINT_INTERVAL);
        // The first tick completes immediately; startup needs no checkpoint
        interval.tick().await;

        loop {
            interval.tick().await;

            let store = Arc::clone(&store);
            let saved =
                tokio::task::spawn_blocking(move || prune_and_checkpoint(&store, retention));
            match saved.await {
                Ok(Ok(Some(seq))) => tracing::debug!(seq, "saved checkpoint snapshot"),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => warn!(error = %e, "failed to save checkpoint snapshot"),
                Err(e) => warn!(error = %e, "checkpoint task failed"),
            }
        }
    });
}

fn prune_and_checkpoint(
    store: &WalStore,
    retention: Retention,
) -> Result<Option<u64>, StoreError> {
    let pruned = store.prune(retention)?;
    if !pruned.is_empty() {
        info!(runs = pruned.runs, events = pruned.events, "pruned history");
    }
    store.checkpoint()
}

/// Startup marker prefix written to log before anything else.
/// CLI uses this to find where the current startup attempt begins.
/// Full format: "--- orqd: starting (pid: 12345) ---"
pub const STARTUP_MARKER_PREFIX: &str = "--- orqd: starting (pid: ";

/// Rotate the daemon log once it exceeds this size
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

/// Rotated copies kept (`daemon.log.1` is the newest)
const MAX_ROTATIONS: u32 = 3;

/// Shift `daemon.log` to `daemon.log.1` (and older copies up) when oversized.
///
/// Best effort: rotation failures never prevent startup.
fn rotate_log_if_needed(log_path: &Path) {
    let Ok(meta) = std::fs::metadata(log_path) else {
        return;
    };
    if meta.len() <= MAX_LOG_SIZE {
        return;
    }

    let rotated = |n: u32| {
        let mut name = log_path.as_os_str().to_owned();
        name.push(format!(".{n}"));
        std::path::PathBuf::from(name)
    };

    let _ = std::fs::remove_file(rotated(MAX_ROTATIONS));
    for n in (1..MAX_ROTATIONS).rev() {
        let from = rotated(n);
        if from.exists() {
            let _ = std::fs::rename(&from, rotated(n + 1));
        }
    }
    let _ = std::fs::rename(log_path, rotated(1));
}

/// Append the startup marker to the log file.
fn write_startup_marker(config: &Config) -> Result<(), LifecycleError> {
    use std::io::Write;

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)?;
    writeln!(file, "{}{}) ---", STARTUP_MARKER_PREFIX, std::process::id())?;

    Ok(())
}

/// Write startup error synchronously to log file.
fn write_startup_error(config: &Config, error: &LifecycleError) {
    use std::io::Write;

    let Ok(mut file) = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_path)
    else {
        return;
    };
    let _ = writeln!(file, "ERROR Failed to start daemon: {}", error);
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = config.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        config.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        config
            .log_path
            .file_name()
            .ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
