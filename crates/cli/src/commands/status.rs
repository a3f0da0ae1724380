// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orq status` - one-screen overview

use anyhow::Result;
use chrono::{DateTime, Utc};
use orq_core::Job;

use crate::client::DaemonClient;
use crate::color;
use crate::commands::daemon::{format_uptime, query_status};
use crate::commands::job::jobs_table;
use crate::commands::run::runs_table;
use crate::output::{print_json, OutputFormat};

/// Upcoming jobs shown in the overview
const UPCOMING: usize = 5;

pub async fn handle(format: OutputFormat) -> Result<()> {
    let Some((status, version)) = query_status().await? else {
        match format {
            OutputFormat::Text => println!("Daemon not running"),
            OutputFormat::Json => print_json(&serde_json::json!({ "status": "not_running" }))?,
        }
        return Ok(());
    };

    let client = DaemonClient::for_query()?;
    let running = client.running_runs().await?;
    let jobs = client.list_jobs().await?;
    let upcoming = upcoming_jobs(jobs, UPCOMING);
    let now = Utc::now();

    match format {
        OutputFormat::Text => {
            println!(
                "orqd {} up {}, {} job(s), {} slot(s) free",
                version,
                format_uptime(status.uptime_secs),
                status.jobs,
                status.slots_free
            );

            println!();
            println!("{}", color::header("Running"));
            let table = runs_table(&running, now);
            if table.is_empty() {
                println!("  {}", color::muted("nothing running"));
            } else {
                table.print();
            }

            println!();
            println!("{}", color::header("Up next"));
            let table = jobs_table(&upcoming, now);
            if table.is_empty() {
                println!("  {}", color::muted("no scheduled jobs"));
            } else {
                table.print();
            }
        }
        OutputFormat::Json => print_json(&serde_json::json!({
            "status": "running",
            "version": version,
            "uptime_secs": status.uptime_secs,
            "slots_free": status.slots_free,
            "running": running,
            "upcoming": upcoming,
        }))?,
    }
    Ok(())
}

/// The `limit` schedulable jobs due soonest.
pub fn upcoming_jobs(jobs: Vec<Job>, limit: usize) -> Vec<Job> {
    let mut due: Vec<(DateTime<Utc>, Job)> = jobs
        .into_iter()
        .filter(Job::is_schedulable)
        .filter_map(|job| job.next_due.map(|at| (at, job)))
        .collect();
    due.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.id.cmp(&b.1.id)));
    due.into_iter().take(limit).map(|(_, job)| job).collect()
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
