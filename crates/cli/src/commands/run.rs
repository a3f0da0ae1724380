// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orq run` - run history, logs and cancellation

use std::io::Write;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use orq_core::{format_duration, JobId, Run, RunId};
use orq_daemon::RunSummary;

use crate::client::DaemonClient;
use crate::output::{format_local, format_relative, last_lines, print_json, OutputFormat};
use crate::table::{Column, Table};

#[derive(Args)]
pub struct RunArgs {
    #[command(subcommand)]
    pub command: RunCommand,
}

#[derive(Subcommand)]
pub enum RunCommand {
    /// List runs of a job, newest first, or all running runs
    List {
        /// Job whose runs to list (default: runs in progress)
        job: Option<JobId>,
        /// Maximum number of runs
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
    /// Show a run and its log
    Show {
        id: RunId,
        /// Only the last N log lines
        #[arg(short = 'n', long)]
        tail: Option<usize>,
    },
    /// Print a run's log only
    Logs {
        id: RunId,
        /// Only the last N lines
        #[arg(short = 'n', long)]
        tail: Option<usize>,
    },
    /// Cancel a running run
    Stop { id: RunId },
}

impl RunCommand {
    pub fn is_action(&self) -> bool {
        matches!(self, RunCommand::Stop { .. })
    }
}

pub async fn handle(
    command: RunCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match command {
        RunCommand::List { job, limit } => {
            let runs = match job {
                Some(job_id) => client.list_runs(job_id, limit).await?,
                None => client.running_runs().await?,
            };
            match format {
                OutputFormat::Text => {
                    let table = runs_table(&runs, Utc::now());
                    if !table.is_empty() {
                        table.print();
                    } else if job.is_some() {
                        println!("No runs yet");
                    } else {
                        println!("No runs in progress");
                    }
                }
                OutputFormat::Json => print_json(&runs)?,
            }
            Ok(())
        }
        RunCommand::Show { id, tail } => {
            let run = fetch_run(client, id).await?;
            match format {
                OutputFormat::Text => {
                    let mut out = std::io::stdout().lock();
                    write_run_detail(&mut out, &run, Utc::now())?;
                    writeln!(out)?;
                    drop(out);
                    print_log(&tail_of(&run.log, tail));
                }
                OutputFormat::Json => print_json(&run)?,
            }
            Ok(())
        }
        RunCommand::Logs { id, tail } => {
            let run = fetch_run(client, id).await?;
            let log = tail_of(&run.log, tail);
            match format {
                OutputFormat::Text => print_log(&log),
                OutputFormat::Json => print_json(&serde_json::json!({
                    "run_id": run.id,
                    "lines": log.lines().collect::<Vec<_>>(),
                }))?,
            }
            Ok(())
        }
        RunCommand::Stop { id } => {
            let (run, note) = client.stop_run(id).await?;
            match format {
                OutputFormat::Text => println!("Stopped run {}: {}", run.id, note),
                OutputFormat::Json => print_json(&serde_json::json!({ "run": run, "note": note }))?,
            }
            Ok(())
        }
    }
}

async fn fetch_run(client: &DaemonClient, id: RunId) -> Result<Run> {
    match client.get_run(id).await? {
        Some(run) => Ok(run),
        None => bail!("run not found: {}", id),
    }
}

fn tail_of(log: &str, tail: Option<usize>) -> String {
    match tail {
        Some(n) => last_lines(log, n),
        None => log.to_string(),
    }
}

/// Print a captured log, ending with a newline.
pub fn print_log(log: &str) {
    if log.is_empty() {
        eprintln!("(no output)");
        return;
    }
    print!("{}", log);
    if !log.ends_with('\n') {
        println!();
    }
}

pub fn run_row(run: &RunSummary, now: DateTime<Utc>) -> Vec<String> {
    vec![
        run.id.to_string(),
        run.job_id.to_string(),
        run.status.to_string(),
        run.trigger.to_string(),
        run.actor.clone().unwrap_or_else(|| "-".to_string()),
        format_relative(Some(run.started_at), now),
        format_duration(run.started_at, run.finished_at, now),
        run.exit_code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string()),
    ]
}

pub fn runs_table(runs: &[RunSummary], now: DateTime<Utc>) -> Table {
    let mut table = Table::new(vec![
        Column::right("ID"),
        Column::right("JOB"),
        Column::status("STATUS"),
        Column::left("TRIGGER"),
        Column::muted("ACTOR").with_max(16),
        Column::muted("STARTED"),
        Column::right("DURATION"),
        Column::right("EXIT"),
    ]);
    for run in runs {
        table.row(run_row(run, now));
    }
    table
}

fn write_run_detail(out: &mut impl Write, run: &Run, now: DateTime<Utc>) -> std::io::Result<()> {
    writeln!(out, "Run {} of job {}", run.id, run.job_id)?;
    writeln!(out, "  Status:    {}", run.status)?;
    match &run.actor {
        Some(actor) => writeln!(out, "  Trigger:   {} by {}", run.trigger, actor)?,
        None => writeln!(out, "  Trigger:   {}", run.trigger)?,
    }
    writeln!(out, "  Started:   {}", format_local(Some(run.started_at)))?;
    writeln!(out, "  Finished:  {}", format_local(run.finished_at))?;
    writeln!(
        out,
        "  Duration:  {}",
        format_duration(run.started_at, run.finished_at, now)
    )?;
    if let Some(pid) = run.external_pid {
        writeln!(out, "  PID:       {}", pid)?;
    }
    if let Some(code) = run.exit_code {
        writeln!(out, "  Exit code: {}", code)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
