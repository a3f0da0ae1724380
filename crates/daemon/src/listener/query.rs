// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Read-only query handlers.

use orq_adapters::EnvProvisioner;
use orq_core::Clock;
use orq_daemon::protocol::{Query, Response, RunSummary};
use orq_engine::Runtime;

use super::mutations::rejected;

/// Handle query requests (read-only state access).
pub(super) fn handle_query<P, C>(runtime: &Runtime<P, C>, query: Query) -> Response
where
    P: EnvProvisioner,
    C: Clock,
{
    match query {
        Query::ListJobs => {
            let mut jobs = runtime.jobs();
            jobs.sort_by_key(|job| job.id);
            Response::Jobs { jobs }
        }

        Query::GetJob { job_id } => Response::Job {
            job: runtime.job(job_id).ok().map(Box::new),
        },

        Query::ListRuns { job_id, limit } => match runtime.runs(job_id, limit) {
            Ok(runs) => Response::Runs {
                runs: runs.iter().map(RunSummary::from).collect(),
            },
            Err(e) => rejected(e),
        },

        Query::GetRun { run_id } => Response::Run {
            run: runtime.run(run_id).ok().map(Box::new),
        },

        Query::ListEvents { job_id, limit } => Response::Events {
            events: runtime.events(job_id, limit),
        },

        Query::RunningRuns => {
            let mut runs: Vec<RunSummary> =
                runtime.running_runs().iter().map(RunSummary::from).collect();
            runs.sort_by_key(|run| run.id);
            Response::Runs { runs }
        }
    }
}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
