// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orq workspace` - job workspace maintenance

use anyhow::Result;
use clap::{Args, Subcommand};
use orq_core::JobId;

use crate::client::{DaemonClient, WorkspaceResetOutcome};
use crate::exit_error::ExitError;
use crate::output::{print_json, OutputFormat};

#[derive(Args)]
pub struct WorkspaceArgs {
    #[command(subcommand)]
    pub command: WorkspaceCommand,
}

#[derive(Subcommand)]
pub enum WorkspaceCommand {
    /// Delete everything in a job's workspace except the scaffold
    Reset {
        job: JobId,
        /// Top-level entry to keep (repeatable)
        #[arg(long = "keep", value_name = "NAME")]
        keep: Vec<String>,
    },
}

pub async fn handle(
    command: WorkspaceCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match command {
        WorkspaceCommand::Reset { job, keep } => {
            let outcome = client.reset_workspace(job, keep).await?;
            match format {
                OutputFormat::Text => println!("{}", describe_reset(job, outcome)),
                OutputFormat::Json => print_json(&serde_json::json!({
                    "job_id": job,
                    "removed": outcome.removed,
                    "failed": outcome.failed,
                }))?,
            }
            if outcome.failed > 0 {
                return Err(ExitError::new(
                    1,
                    format!("{} entries could not be removed", outcome.failed),
                )
                .into());
            }
            Ok(())
        }
    }
}

fn describe_reset(job: JobId, outcome: WorkspaceResetOutcome) -> String {
    match outcome.failed {
        0 => format!("Reset workspace of job {}: {} removed", job, outcome.removed),
        failed => format!(
            "Reset workspace of job {}: {} removed, {} failed",
            job, outcome.removed, failed
        ),
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
