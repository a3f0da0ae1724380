// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use fs2::FileExt;
use orq_adapters::{TracedProvisioner, VenvProvisioner};
use orq_core::SystemClock;
use orq_engine::{HandlerRegistry, Runtime, RuntimeDeps};
use orq_storage::{JobStore, Retention, StoreError, WalStore};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::env;
use crate::settings::{Settings, SettingsError};

/// Daemon runtime with concrete adapter types (wrapped with tracing)
pub type DaemonRuntime = Runtime<TracedProvisioner<VenvProvisioner>, SystemClock>;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/orq)
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    /// Lock file, also holding the daemon's PID
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    pub wal_path: PathBuf,
    pub snapshot_path: PathBuf,
    /// Optional `orq.toml`
    pub settings_path: PathBuf,
}

impl Config {
    /// Configuration for the user-level daemon.
    pub fn load() -> Result<Self, LifecycleError> {
        Ok(Self::for_state_dir(env::state_dir()?))
    }

    pub fn for_state_dir(state_dir: PathBuf) -> Self {
        Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            version_path: state_dir.join("daemon.version"),
            log_path: state_dir.join("daemon.log"),
            wal_path: state_dir.join("wal").join("store.wal"),
            snapshot_path: state_dir.join("snapshot.zst"),
            settings_path: state_dir.join("orq.toml"),
            state_dir,
        }
    }
}

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Concrete store, for flushes and checkpoints
    pub store: Arc<WalStore>,
    pub runtime: Arc<DaemonRuntime>,
    /// Scheduler period after env overrides
    pub tick_interval: Duration,
    /// History limits applied before each checkpoint
    pub retention: Retention,
    pub start_time: Instant,
}

/// Result of daemon startup: the daemon state plus the socket to serve.
pub struct StartupResult {
    pub daemon: DaemonState,
    pub listener: UnixListener,
}

impl DaemonState {
    /// Shutdown the daemon gracefully.
    ///
    /// Runs still in progress are left `running` in the store; the next
    /// startup fails them as orphans.
    pub fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        let running = self.store.running_runs().len();
        if running > 0 {
            warn!(running, "runs still in progress at shutdown");
        }

        if let Err(e) = self.store.flush() {
            warn!("Failed to flush WAL on shutdown: {}", e);
        }
        match self.store.checkpoint() {
            Ok(Some(seq)) => info!(seq, "saved final shutdown snapshot"),
            Ok(None) => {}
            Err(e) => warn!("Failed to save shutdown snapshot: {}", e),
        }

        for path in [
            &self.config.socket_path,
            &self.config.lock_path,
            &self.config.version_path,
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), "Failed to remove file: {}", e);
                }
            }
        }

        // Lock is released when self.lock_file is dropped
        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Settings(#[from] SettingsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<StartupResult, LifecycleError> {
    match startup_inner(config).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // A failed lock means the files belong to the running daemon
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    // Lock FIRST. Open without truncating so a running daemon's PID survives.
    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    let mut settings = Settings::load(&config.settings_path)?;
    if let Some(max) = env::max_concurrent_runs() {
        settings.max_concurrent_runs = max;
    }
    let tick_interval = env::tick_ms().unwrap_or_else(|| settings.tick_interval());

    if let Some(parent) = config.wal_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let runtime_config = settings.runtime_config(&config.state_dir);
    std::fs::create_dir_all(&runtime_config.workspaces_root)?;
    std::fs::write(&config.version_path, orq_daemon::PROTOCOL_VERSION)?;

    let store = Arc::new(WalStore::open(&config.wal_path, &config.snapshot_path)?);
    info!(
        jobs = store.jobs().len(),
        running = store.running_runs().len(),
        "recovered store"
    );

    let runtime = Arc::new(Runtime::new(
        RuntimeDeps {
            store: Arc::clone(&store) as Arc<dyn JobStore>,
            provisioner: TracedProvisioner::new(VenvProvisioner::new(settings.provision_config())),
            handlers: HandlerRegistry::with_builtins(),
        },
        SystemClock,
        runtime_config,
    ));

    // Bind LAST, only after everything else succeeded
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!(
        tick_ms = tick_interval.as_millis() as u64,
        max_concurrent_runs = settings.max_concurrent_runs,
        "Daemon started"
    );

    Ok(StartupResult {
        daemon: DaemonState {
            config: config.clone(),
            lock_file,
            store,
            runtime,
            tick_interval,
            retention: settings.retention(),
            start_time: Instant::now(),
        },
        listener,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    for path in [&config.socket_path, &config.version_path, &config.lock_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
