// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! orq - operator CLI for the orq job daemon

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod client_lifecycle;
mod color;
mod commands;
mod daemon_process;
mod env;
mod exit_error;
mod output;
mod poll;
mod table;

use output::OutputFormat;

use anyhow::Result;
use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use commands::{daemon, environment, events, job, run, status, workspace};

use crate::client::DaemonClient;

#[derive(Parser)]
#[command(
    name = "orq",
    version,
    about = "orq - scheduled job runner",
    after_help = "The daemon (orqd) is started automatically by commands that change state."
)]
pub(crate) struct Cli {
    /// Output format
    #[arg(
        short = 'o',
        long = "output",
        value_enum,
        default_value_t,
        global = true
    )]
    output: OutputFormat,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Configure, inspect and trigger jobs
    Job(job::JobArgs),
    /// Inspect and cancel runs
    Run(run::RunArgs),
    /// Show the audit trail
    Events(events::EventsArgs),
    /// Manage job workspaces
    Workspace(workspace::WorkspaceArgs),
    /// Manage isolated job environments
    Env(environment::EnvArgs),
    /// Daemon management
    Daemon(daemon::DaemonArgs),
    /// Overview of the daemon, running runs and upcoming jobs
    Status,
}

/// The clap command with the CLI color palette applied.
pub(crate) fn cli_command() -> clap::Command {
    Cli::command().styles(color::styles())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let code = e
            .downcast_ref::<exit_error::ExitError>()
            .map_or(1, |c| c.code);
        let msg = format_error(&e);
        if !msg.is_empty() {
            eprintln!("Error: {}", msg);
        }
        std::process::exit(code);
    }
}

/// Format an anyhow error, deduplicating the chain.
///
/// The "Caused by" chain is skipped when the top-level message already
/// contains every source message (thiserror variants with `{0}` and `#[from]`).
fn format_error(err: &anyhow::Error) -> String {
    let top = err.to_string();

    let chain_redundant = err
        .chain()
        .skip(1)
        .all(|cause| top.contains(&cause.to_string()));

    if chain_redundant {
        return top;
    }

    let mut buf = top;
    for (i, cause) in err.chain().skip(1).enumerate() {
        buf.push_str(&format!("\n\nCaused by:\n    {}: {}", i, cause));
    }
    buf
}

async fn run() -> Result<()> {
    let matches = cli_command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;
    let format = cli.output;

    let Some(command) = cli.command else {
        cli_command().print_help()?;
        println!();
        return Ok(());
    };

    // Action commands auto-start the daemon (one version restart at most);
    // query commands only connect, since a missing daemon has nothing to show.
    match command {
        Commands::Job(args) => {
            let client = if args.command.is_action() {
                DaemonClient::for_action()?
            } else {
                DaemonClient::for_query()?
            };
            job::handle(args.command, &client, format).await?
        }
        Commands::Run(args) => {
            let client = if args.command.is_action() {
                DaemonClient::for_action()?
            } else {
                DaemonClient::for_query()?
            };
            run::handle(args.command, &client, format).await?
        }
        Commands::Events(args) => {
            let client = DaemonClient::for_query()?;
            events::handle(args, &client, format).await?
        }
        Commands::Workspace(args) => {
            let client = DaemonClient::for_action()?;
            workspace::handle(args.command, &client, format).await?
        }
        Commands::Env(args) => {
            let client = DaemonClient::for_action()?;
            environment::handle(args.command, &client, format).await?
        }
        Commands::Daemon(args) => daemon::daemon(args, format).await?,
        Commands::Status => status::handle(format).await?,
    }

    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
