// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orq events` - audit trail

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::Args;
use orq_core::{Event, JobId};

use crate::client::DaemonClient;
use crate::output::{format_relative, print_json, OutputFormat};
use crate::table::{Column, Table};

#[derive(Args)]
pub struct EventsArgs {
    /// Only events of this job
    #[arg(long)]
    pub job: Option<JobId>,

    /// Maximum number of events, newest first
    #[arg(short = 'n', long, default_value = "50")]
    pub limit: usize,
}

pub async fn handle(args: EventsArgs, client: &DaemonClient, format: OutputFormat) -> Result<()> {
    let events = client.list_events(args.job, args.limit).await?;
    match format {
        OutputFormat::Text => {
            let table = events_table(&events, Utc::now());
            if table.is_empty() {
                println!("No events recorded");
            } else {
                table.print();
            }
        }
        OutputFormat::Json => print_json(&events)?,
    }
    Ok(())
}

pub fn event_row(event: &Event, now: DateTime<Utc>) -> Vec<String> {
    let dash = || "-".to_string();
    vec![
        event.id.to_string(),
        format_relative(Some(event.at), now),
        event.kind.to_string(),
        event.job_id.map(|id| id.to_string()).unwrap_or_else(dash),
        event.run_id.map(|id| id.to_string()).unwrap_or_else(dash),
        event.actor.clone().unwrap_or_else(dash),
        event.message.clone(),
    ]
}

pub fn events_table(events: &[Event], now: DateTime<Utc>) -> Table {
    let mut table = Table::new(vec![
        Column::right("ID"),
        Column::muted("AT"),
        Column::left("KIND"),
        Column::right("JOB"),
        Column::right("RUN"),
        Column::muted("ACTOR").with_max(16),
        Column::left("MESSAGE"),
    ]);
    for event in events {
        table.row(event_row(event, now));
    }
    table
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
