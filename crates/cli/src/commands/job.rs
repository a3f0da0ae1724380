// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orq job` - job configuration and manual triggers

use std::io::Write;
use std::time::Duration;

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Subcommand};
use orq_core::{Job, JobConfig, JobId, JobKind, Run, RunId, RunStatus, Schedule};

use crate::client::DaemonClient;
use crate::commands::run::{print_log, runs_table};
use crate::exit_error::ExitError;
use crate::output::{format_local, format_relative, print_json, OutputFormat};
use crate::poll::{Poller, Tick};
use crate::table::{Column, Table};

#[derive(Args)]
pub struct JobArgs {
    #[command(subcommand)]
    pub command: JobCommand,
}

/// Schedule flags shared by `add` and `edit`
#[derive(Args, Debug, Clone, Default)]
pub struct ScheduleArgs {
    /// Schedule kind: once, daily, multi-daily or interval
    #[arg(short = 's', long = "schedule")]
    pub kind: Option<String>,

    /// Schedule parameter: HH:MM, a comma separated list of HH:MM, minutes,
    /// or an RFC 3339 timestamp for `once`
    #[arg(long, visible_alias = "every")]
    pub at: Option<String>,
}

#[derive(Subcommand)]
pub enum JobCommand {
    /// Create a job
    Add {
        name: String,
        #[command(flatten)]
        schedule: ScheduleArgs,
        /// Script run inside the job workspace
        #[arg(long, conflicts_with = "handler")]
        entrypoint: Option<String>,
        /// Run a built-in handler instead of a script
        #[arg(long)]
        handler: Option<String>,
        /// Run in a dedicated environment instead of the host interpreter
        #[arg(long)]
        isolated: bool,
        /// Create the job paused
        #[arg(long)]
        paused: bool,
        /// Create the job inactive
        #[arg(long)]
        inactive: bool,
        /// Refuse manual runs
        #[arg(long)]
        no_manual: bool,
    },
    /// Change a job's configuration
    Edit {
        id: JobId,
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        schedule: ScheduleArgs,
        #[arg(long, conflicts_with = "handler")]
        entrypoint: Option<String>,
        #[arg(long)]
        handler: Option<String>,
        /// Use a dedicated environment (true/false)
        #[arg(long)]
        isolated: Option<bool>,
        /// Allow manual runs (true/false)
        #[arg(long)]
        allow_manual: Option<bool>,
    },
    /// List jobs
    List,
    /// Show a job and its recent runs
    Show {
        id: JobId,
        /// Number of recent runs to show
        #[arg(short = 'n', long, default_value = "10")]
        runs: usize,
    },
    /// Suspend a job's schedule
    Pause { id: JobId },
    /// Resume a paused job
    Resume { id: JobId },
    /// Make a job schedulable again
    Activate { id: JobId },
    /// Stop scheduling a job without deleting it
    Deactivate { id: JobId },
    /// Start a run now
    Run {
        id: JobId,
        /// Wait for the run to finish and print its log
        #[arg(long)]
        wait: bool,
        /// Give up waiting after this many seconds
        #[arg(long, requires = "wait")]
        timeout: Option<u64>,
    },
    /// Cancel the job's running run
    Stop { id: JobId },
}

impl JobCommand {
    /// Whether the command changes daemon state
    pub fn is_action(&self) -> bool {
        !matches!(self, JobCommand::List | JobCommand::Show { .. })
    }
}

pub async fn handle(
    command: JobCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match command {
        JobCommand::Add {
            name,
            schedule,
            entrypoint,
            handler,
            isolated,
            paused,
            inactive,
            no_manual,
        } => {
            let config = new_config(
                name,
                &schedule,
                entrypoint,
                handler,
                isolated,
                paused,
                inactive,
                no_manual,
            )?;
            let job = client.upsert_job(None, config).await?;
            print_saved(&job, "Created", format)
        }
        JobCommand::Edit {
            id,
            name,
            schedule,
            entrypoint,
            handler,
            isolated,
            allow_manual,
        } => {
            let Some(job) = client.get_job(id).await? else {
                bail!("job not found: {}", id);
            };
            let edit = JobEdit {
                name,
                schedule,
                entrypoint,
                handler,
                isolated,
                allow_manual,
            };
            let config = edit.apply(job.config())?;
            let job = client.upsert_job(Some(id), config).await?;
            print_saved(&job, "Updated", format)
        }
        JobCommand::List => {
            let mut jobs = client.list_jobs().await?;
            jobs.sort_by_key(|j| j.id);
            match format {
                OutputFormat::Text => {
                    let table = jobs_table(&jobs, Utc::now());
                    if table.is_empty() {
                        println!("No jobs configured");
                    } else {
                        table.print();
                    }
                }
                OutputFormat::Json => print_json(&jobs)?,
            }
            Ok(())
        }
        JobCommand::Show { id, runs } => {
            let Some(job) = client.get_job(id).await? else {
                bail!("job not found: {}", id);
            };
            let recent = client.list_runs(id, runs).await?;
            match format {
                OutputFormat::Text => {
                    let mut out = std::io::stdout().lock();
                    write_job_detail(&mut out, &job, Utc::now())?;
                    if !recent.is_empty() {
                        writeln!(out)?;
                        writeln!(out, "Recent runs:")?;
                        runs_table(&recent, Utc::now()).render(&mut out);
                    }
                }
                OutputFormat::Json => {
                    print_json(&serde_json::json!({ "job": job, "runs": recent }))?
                }
            }
            Ok(())
        }
        JobCommand::Pause { id } => {
            let job = client.set_paused(id, true).await?;
            print_saved(&job, "Paused", format)
        }
        JobCommand::Resume { id } => {
            let job = client.set_paused(id, false).await?;
            print_saved(&job, "Resumed", format)
        }
        JobCommand::Activate { id } => {
            let job = client.set_active(id, true).await?;
            print_saved(&job, "Activated", format)
        }
        JobCommand::Deactivate { id } => {
            let job = client.set_active(id, false).await?;
            print_saved(&job, "Deactivated", format)
        }
        JobCommand::Run { id, wait, timeout } => {
            let run_id = client.run_job(id).await?;
            if !wait {
                match format {
                    OutputFormat::Text => println!("Started run {} of job {}", run_id, id),
                    OutputFormat::Json => {
                        print_json(&serde_json::json!({ "job_id": id, "run_id": run_id }))?
                    }
                }
                return Ok(());
            }
            if format == OutputFormat::Text {
                eprintln!("Started run {} of job {}, waiting...", run_id, id);
            }
            let run = wait_for_run(client, run_id, timeout.map(Duration::from_secs)).await?;
            match format {
                OutputFormat::Text => print_log(&run.log),
                OutputFormat::Json => print_json(&run)?,
            }
            finished_run_result(&run)
        }
        JobCommand::Stop { id } => {
            let (run, note) = client.stop_job(id).await?;
            match format {
                OutputFormat::Text => println!("Stopped run {} of job {}: {}", run.id, id, note),
                OutputFormat::Json => print_json(&serde_json::json!({ "run": run, "note": note }))?,
            }
            Ok(())
        }
    }
}

/// Build the configuration of a new job from `job add` flags.
#[allow(clippy::too_many_arguments)]
fn new_config(
    name: String,
    schedule: &ScheduleArgs,
    entrypoint: Option<String>,
    handler: Option<String>,
    isolated: bool,
    paused: bool,
    inactive: bool,
    no_manual: bool,
) -> Result<JobConfig> {
    let Some(kind) = schedule.kind.as_deref() else {
        bail!("a schedule is required (--schedule once|daily|multi-daily|interval)");
    };
    let parsed = Schedule::parse(kind, schedule.at.as_deref())?;

    let mut builder = JobConfig::builder(name, parsed)
        .isolated(isolated)
        .paused(paused)
        .active(!inactive)
        .allow_manual(!no_manual);
    if let Some(entrypoint) = entrypoint {
        builder = builder.entrypoint(entrypoint);
    }
    if let Some(handler) = handler {
        builder = builder.internal(handler);
    }
    Ok(builder.build())
}

/// Field changes requested by `job edit`
#[derive(Debug, Default)]
struct JobEdit {
    name: Option<String>,
    schedule: ScheduleArgs,
    entrypoint: Option<String>,
    handler: Option<String>,
    isolated: Option<bool>,
    allow_manual: Option<bool>,
}

impl JobEdit {
    /// Apply the edit on top of the job's current configuration.
    ///
    /// A parameter without a kind keeps the current schedule kind.
    fn apply(self, mut config: JobConfig) -> Result<JobConfig> {
        if let Some(name) = self.name {
            config.name = name;
        }
        if self.schedule.kind.is_some() || self.schedule.at.is_some() {
            let kind = self
                .schedule
                .kind
                .unwrap_or_else(|| config.schedule.kind_name().to_string());
            config.schedule = Schedule::parse(&kind, self.schedule.at.as_deref())?;
        }
        if let Some(entrypoint) = self.entrypoint {
            config.entrypoint = entrypoint;
            config.kind = JobKind::External;
        }
        if let Some(handler) = self.handler {
            config.kind = JobKind::Internal { handler };
        }
        if let Some(isolated) = self.isolated {
            config.isolated = isolated;
        }
        if let Some(allow) = self.allow_manual {
            config.allow_manual = allow;
        }
        Ok(config)
    }
}

/// Poll until the run reaches a terminal status.
async fn wait_for_run(
    client: &DaemonClient,
    run_id: RunId,
    timeout: Option<Duration>,
) -> Result<Run> {
    let mut poller = Poller::from_env(timeout);
    loop {
        if let Some(run) = client.get_run(run_id).await? {
            if run.status.is_terminal() {
                return Ok(run);
            }
        }
        match poller.tick().await {
            Tick::Ready => {}
            Tick::Timeout => {
                let message = format!("timed out waiting for run {}", run_id);
                return Err(ExitError::new(2, message).into());
            }
            Tick::Interrupted => return Err(ExitError::new(130, "").into()),
        }
    }
}

/// Exit status of `job run --wait`: failure when the run failed.
fn finished_run_result(run: &Run) -> Result<()> {
    match run.status {
        RunStatus::Failed => {
            let detail = run
                .exit_code
                .map(|code| format!(" (exit code {})", code))
                .unwrap_or_default();
            Err(ExitError::new(1, format!("run {} failed{}", run.id, detail)).into())
        }
        _ => Ok(()),
    }
}

fn print_saved(job: &Job, verb: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{} job {} ({})", verb, job.id, job.name);
            println!(
                "  {}, next due: {}",
                job.schedule.describe(),
                format_relative(job.next_due, Utc::now())
            );
        }
        OutputFormat::Json => print_json(job)?,
    }
    Ok(())
}

/// `active`, `paused` or `inactive`
pub fn job_state(job: &Job) -> &'static str {
    if !job.active {
        "inactive"
    } else if job.paused {
        "paused"
    } else {
        "active"
    }
}

/// What a run of the job executes
pub fn job_target(job: &Job) -> String {
    match &job.kind {
        JobKind::External if job.isolated => format!("{} (isolated)", job.entrypoint),
        JobKind::External => job.entrypoint.clone(),
        JobKind::Internal { handler } => format!("handler:{}", handler),
    }
}

pub fn job_row(job: &Job, now: DateTime<Utc>) -> Vec<String> {
    vec![
        job.id.to_string(),
        job.name.clone(),
        job_state(job).to_string(),
        job.schedule.describe(),
        format_relative(job.next_due, now),
        job_target(job),
    ]
}

pub fn jobs_table(jobs: &[Job], now: DateTime<Utc>) -> Table {
    let mut table = Table::new(vec![
        Column::right("ID"),
        Column::left("NAME").with_max(32),
        Column::status("STATE"),
        Column::left("SCHEDULE"),
        Column::muted("NEXT DUE"),
        Column::left("TARGET"),
    ]);
    for job in jobs {
        table.row(job_row(job, now));
    }
    table
}

fn write_job_detail(out: &mut impl Write, job: &Job, now: DateTime<Utc>) -> std::io::Result<()> {
    writeln!(out, "Job {}: {}", job.id, job.name)?;
    writeln!(out, "  State:     {}", job_state(job))?;
    writeln!(out, "  Schedule:  {}", job.schedule.describe())?;
    match job.next_due {
        Some(_) => writeln!(
            out,
            "  Next due:  {} ({})",
            format_local(job.next_due),
            format_relative(job.next_due, now)
        )?,
        None => writeln!(out, "  Next due:  -")?,
    }
    writeln!(out, "  Target:    {}", job_target(job))?;
    writeln!(
        out,
        "  Manual:    {}",
        if job.allow_manual { "allowed" } else { "disabled" }
    )?;
    writeln!(out, "  Created:   {}", format_local(Some(job.created_at)))?;
    writeln!(out, "  Updated:   {}", format_local(Some(job.updated_at)))?;
    Ok(())
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
