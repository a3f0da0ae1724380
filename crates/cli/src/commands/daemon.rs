// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orq daemon` - daemon management commands

use std::process::Command;
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};

use crate::client::{DaemonClient, DaemonStatus};
use crate::client_lifecycle::daemon_stop;
use crate::daemon_process::{daemon_log, find_orqd_binary};
use crate::output::{display_log, last_lines, print_json, OutputFormat};

#[derive(Args)]
pub struct DaemonArgs {
    #[command(subcommand)]
    pub command: DaemonCommand,
}

#[derive(Subcommand)]
pub enum DaemonCommand {
    /// Start the daemon
    Start {
        /// Run in the foreground (useful for debugging)
        #[arg(long)]
        foreground: bool,
    },
    /// Stop the daemon; runs in progress are failed on next startup
    Stop,
    /// Stop and start the daemon
    Restart,
    /// Check daemon status
    Status,
    /// View daemon logs
    Logs {
        /// Number of recent lines to show
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
        /// Show all lines
        #[arg(long, conflicts_with = "limit")]
        no_limit: bool,
        /// Follow log output
        #[arg(long, short)]
        follow: bool,
    },
}

pub async fn daemon(args: DaemonArgs, format: OutputFormat) -> Result<()> {
    match args.command {
        DaemonCommand::Start { foreground } => start(foreground).await,
        DaemonCommand::Stop => stop().await,
        DaemonCommand::Restart => restart().await,
        DaemonCommand::Status => status(format).await,
        DaemonCommand::Logs {
            limit,
            no_limit,
            follow,
        } => logs(limit, no_limit, follow, format).await,
    }
}

async fn start(foreground: bool) -> Result<()> {
    if foreground {
        let status = Command::new(find_orqd_binary()).status()?;
        if !status.success() {
            return Err(anyhow!("Daemon exited with status: {}", status));
        }
        return Ok(());
    }

    if let Ok(client) = DaemonClient::connect() {
        if let Ok(status) = client.status().await {
            println!(
                "Daemon already running (uptime: {})",
                format_uptime(status.uptime_secs)
            );
            return Ok(());
        }
    }

    DaemonClient::connect_or_start()?;
    println!("Daemon started");
    Ok(())
}

async fn stop() -> Result<()> {
    match daemon_stop().await {
        Ok(true) => println!("Daemon stopped"),
        Ok(false) => println!("Daemon not running"),
        Err(e) => return Err(anyhow!("Failed to stop daemon: {}", e)),
    }
    Ok(())
}

async fn restart() -> Result<()> {
    let was_running = daemon_stop()
        .await
        .map_err(|e| anyhow!("Failed to stop daemon: {}", e))?;

    if was_running {
        // Grace period for the OS to release the socket
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    DaemonClient::connect_or_start()?;
    println!("Daemon restarted");
    Ok(())
}

/// Query the running daemon; `None` when nobody is listening.
pub(crate) async fn query_status() -> Result<Option<(DaemonStatus, String)>> {
    let Ok(client) = DaemonClient::connect() else {
        return Ok(None);
    };
    let status = match client.status().await {
        Ok(status) => status,
        Err(e) if e.is_not_running() => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let version = client
        .hello()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    Ok(Some((status, version)))
}

async fn status(format: OutputFormat) -> Result<()> {
    let Some((status, version)) = query_status().await? else {
        match format {
            OutputFormat::Text => println!("Daemon not running"),
            OutputFormat::Json => print_json(&serde_json::json!({ "status": "not_running" }))?,
        }
        return Ok(());
    };

    match format {
        OutputFormat::Text => {
            for line in status_lines(&status, &version) {
                println!("{}", line);
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "status": "running",
            "version": version,
            "uptime_secs": status.uptime_secs,
            "uptime": format_uptime(status.uptime_secs),
            "jobs": status.jobs,
            "runs_active": status.runs_active,
            "slots_free": status.slots_free,
        }))?,
    }
    Ok(())
}

pub fn status_lines(status: &DaemonStatus, version: &str) -> Vec<String> {
    vec![
        "Status: running".to_string(),
        format!("Version: {}", version),
        format!("Uptime: {}", format_uptime(status.uptime_secs)),
        format!("Jobs: {}", status.jobs),
        format!(
            "Runs: {} active, {} slot(s) free",
            status.runs_active, status.slots_free
        ),
    ]
}

async fn logs(limit: usize, no_limit: bool, follow: bool, format: OutputFormat) -> Result<()> {
    let log_path = daemon_log()?;

    if !log_path.exists() {
        match format {
            OutputFormat::Text => println!("No log file found at {}", log_path.display()),
            OutputFormat::Json => print_json(&serde_json::json!({
                "log_path": log_path.to_string_lossy(),
                "lines": [],
            }))?,
        }
        return Ok(());
    }

    let content = std::fs::read_to_string(&log_path)?;
    let content = if no_limit {
        content
    } else {
        last_lines(&content, limit)
    };
    display_log(&log_path, &content, follow, format).await
}

pub fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}h {}m {}s", hours, mins, secs)
    } else if mins > 0 {
        format!("{}m {}s", mins, secs)
    } else {
        format!("{}s", secs)
    }
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
