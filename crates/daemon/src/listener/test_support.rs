// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener fixtures: a runtime over an in-memory store and fake adapters

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use orq_adapters::FakeProvisioner;
use orq_core::test_support::{daily, external_config, ts};
use orq_core::{FakeClock, Job, RunId, ScheduleZone};
use orq_daemon::protocol::Response;
use orq_engine::{HandlerRegistry, Runtime, RuntimeConfig, RuntimeDeps};
use orq_storage::{JobStore, WalStore};
use tokio::sync::Notify;

use super::ListenCtx;

pub(crate) type TestCtx = ListenCtx<FakeProvisioner, FakeClock>;

pub(crate) fn test_ctx(dir: &Path) -> TestCtx {
    let store: Arc<dyn JobStore> = Arc::new(WalStore::in_memory());
    let mut config = RuntimeConfig::new(dir.join("workspaces"));
    config.zone = ScheduleZone::Utc;
    let runtime = Runtime::new(
        RuntimeDeps {
            store,
            provisioner: FakeProvisioner::new("sh"),
            handlers: HandlerRegistry::with_builtins(),
        },
        FakeClock::at(ts("2026-03-10T08:00:00Z")),
        config,
    );
    ListenCtx {
        runtime: Arc::new(runtime),
        start_time: Instant::now(),
        shutdown: Arc::new(Notify::new()),
    }
}

/// Create an external job whose entrypoint is a `sh` script.
pub(crate) fn add_script_job(ctx: &TestCtx, name: &str, script: &str) -> Job {
    let job = ctx
        .runtime
        .upsert_job(None, external_config(name, "main.py", daily("09:00")), None)
        .unwrap();
    let workspace = ctx.runtime.workspaces().path_for(job.id);
    std::fs::write(workspace.join("main.py"), script).unwrap();
    job
}

pub(crate) fn error_message(response: Response) -> String {
    match response {
        Response::Error { message } => message,
        other => panic!("expected error, got {other:?}"),
    }
}

pub(crate) async fn wait_until(
    ctx: &TestCtx,
    run_id: RunId,
    done: impl Fn(&orq_core::Run) -> bool,
) {
    for _ in 0..500 {
        if ctx.runtime.run(run_id).is_ok_and(|run| done(&run)) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run {run_id} never reached the expected state");
}
