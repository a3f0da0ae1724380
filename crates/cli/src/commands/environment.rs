// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `orq env` - isolated environment maintenance

use anyhow::Result;
use clap::{Args, Subcommand};
use orq_core::JobId;

use crate::client::DaemonClient;
use crate::output::{print_json, OutputFormat};

#[derive(Args)]
pub struct EnvArgs {
    #[command(subcommand)]
    pub command: EnvCommand,
}

#[derive(Subcommand)]
pub enum EnvCommand {
    /// Delete a job's environment; the next isolated run recreates it
    Reset { job: JobId },
}

pub async fn handle(
    command: EnvCommand,
    client: &DaemonClient,
    format: OutputFormat,
) -> Result<()> {
    match command {
        EnvCommand::Reset { job } => {
            let existed = client.reset_environment(job).await?;
            match format {
                OutputFormat::Text if existed => println!("Removed environment of job {}", job),
                OutputFormat::Text => println!("Job {} has no environment", job),
                OutputFormat::Json => {
                    print_json(&serde_json::json!({ "job_id": job, "existed": existed }))?
                }
            }
            Ok(())
        }
    }
}
