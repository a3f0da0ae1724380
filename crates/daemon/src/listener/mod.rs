// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! The Listener runs in a spawned task, accepting connections and handling
//! each in its own task so a slow client never delays the scheduler tick.

mod mutations;
mod query;

#[cfg(test)]
mod test_support;

use std::sync::Arc;
use std::time::Instant;

use orq_adapters::EnvProvisioner;
use orq_core::Clock;
use orq_daemon::protocol::{self, Request, Response, DEFAULT_TIMEOUT, PROTOCOL_VERSION};
use orq_engine::Runtime;
use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

/// Shared state for request handlers
pub struct ListenCtx<P, C: Clock> {
    pub runtime: Arc<Runtime<P, C>>,
    pub start_time: Instant,
    pub shutdown: Arc<Notify>,
}

/// Listener task for accepting socket connections.
pub struct Listener<P, C: Clock> {
    socket: UnixListener,
    ctx: Arc<ListenCtx<P, C>>,
}

/// Errors from connection handling.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),
}

impl<P, C> Listener<P, C>
where
    P: EnvProvisioner,
    C: Clock,
{
    pub fn new(socket: UnixListener, ctx: ListenCtx<P, C>) -> Self {
        Self {
            socket,
            ctx: Arc::new(ctx),
        }
    }

    /// Run the listener loop, spawning a task for each connection.
    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ConnectionError::Protocol(
                                    protocol::ProtocolError::ConnectionClosed,
                                ) => debug!("Client disconnected"),
                                ConnectionError::Protocol(protocol::ProtocolError::Timeout) => {
                                    warn!("Connection timeout")
                                }
                                _ => error!("Connection error: {}", e),
                            }
                        }
                    });
                }
                Err(e) => {
                    error!("Accept error: {}", e);
                }
            }
        }
    }
}

async fn handle_connection<P, C>(
    stream: UnixStream,
    ctx: &ListenCtx<P, C>,
) -> Result<(), ConnectionError>
where
    P: EnvProvisioner,
    C: Clock,
{
    let (mut reader, mut writer) = stream.into_split();

    let request = protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await?;

    // Queries are frequent polling, everything else is an operator action
    if matches!(request, Request::Query { .. } | Request::Ping | Request::Status) {
        debug!(request = ?request, "received query");
    } else {
        tracing::info!(request = ?request, "received request");
    }

    let response = handle_request(request, ctx).await;

    debug!("Sending response: {:?}", response);
    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT).await?;
    Ok(())
}

/// Handle a single request and return a response.
pub(crate) async fn handle_request<P, C>(request: Request, ctx: &ListenCtx<P, C>) -> Response
where
    P: EnvProvisioner,
    C: Clock,
{
    let runtime = &ctx.runtime;
    match request {
        Request::Ping => Response::Pong,

        Request::Hello { version: _ } => Response::Hello {
            version: PROTOCOL_VERSION.to_string(),
        },

        Request::Status => mutations::handle_status(runtime, ctx.start_time),

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }

        Request::Query { query } => query::handle_query(runtime, query),

        Request::JobUpsert {
            job_id,
            config,
            actor,
        } => mutations::handle_job_upsert(runtime, job_id, config, actor),

        Request::JobSetPaused {
            job_id,
            paused,
            actor,
        } => mutations::handle_saved(runtime.set_paused(job_id, paused, actor)),

        Request::JobSetActive {
            job_id,
            active,
            actor,
        } => mutations::handle_saved(runtime.set_active(job_id, active, actor)),

        Request::JobRun { job_id, actor } => mutations::handle_job_run(runtime, job_id, actor),

        Request::RunStop { run_id, actor } => {
            mutations::handle_stopped(runtime.stop_run(run_id, actor).await)
        }

        Request::JobStop { job_id, actor } => {
            mutations::handle_stopped(runtime.stop_job(job_id, actor).await)
        }

        Request::WorkspaceReset {
            job_id,
            keep,
            actor,
        } => match runtime.reset_workspace(job_id, &keep, actor) {
            Ok(report) => Response::WorkspaceReset {
                removed: report.removed,
                failed: report.failed,
            },
            Err(e) => mutations::rejected(e),
        },

        Request::EnvironmentReset { job_id, actor } => {
            match runtime.reset_environment(job_id, actor).await {
                Ok(existed) => Response::EnvironmentReset { existed },
                Err(e) => mutations::rejected(e),
            }
        }
    }
}

#[cfg(test)]
#[path = "../listener_tests.rs"]
mod tests;
