// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests

use orq_core::{FakeClock, Job, JobConfig, ScheduleZone};
use orq_storage::{JobStore, WalStore};
use std::fs;
use std::path::Path;
use std::sync::Arc;

pub(crate) fn store() -> Arc<dyn JobStore> {
    Arc::new(WalStore::in_memory())
}

pub(crate) fn clock() -> FakeClock {
    FakeClock::at(orq_core::test_support::ts("2026-03-10T08:00:00Z"))
}

pub(crate) fn add_job(store: &Arc<dyn JobStore>, config: JobConfig, clock: &FakeClock) -> Job {
    let now = orq_core::Clock::now(clock);
    store
        .create_job(&|id| ScheduleZone::Utc.new_job(id, config.clone(), now))
        .unwrap()
}

/// Write an executable-by-`sh` script into a workspace.
pub(crate) fn write_script(dir: &Path, name: &str, body: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(name), body).unwrap();
}

/// Log sink that keeps everything in memory
#[derive(Debug, Default)]
pub(crate) struct MemorySink {
    pub lines: Vec<String>,
    pub pids: Vec<u32>,
}

impl crate::ledger::LogSink for MemorySink {
    fn line(&mut self, text: &str) {
        self.lines.push(text.to_string());
    }

    fn pid(&mut self, pid: u32) {
        self.pids.push(pid);
    }
}

/// Internal handler that blocks until released, keeping its run `running`.
#[derive(Clone, Default)]
pub(crate) struct Gate {
    release: Arc<tokio::sync::Notify>,
}

impl Gate {
    pub fn open(&self) {
        self.release.notify_waiters();
        self.release.notify_one();
    }
}

#[async_trait::async_trait]
impl crate::handlers::InternalHandler for Gate {
    async fn run(&self, ctx: &mut crate::handlers::HandlerContext<'_>) -> Result<(), String> {
        ctx.log("waiting at gate");
        self.release.notified().await;
        Ok(())
    }
}

pub(crate) const GATE: &str = "gate";

pub(crate) fn gated_registry(gate: &Gate) -> crate::handlers::HandlerRegistry {
    let mut registry = crate::handlers::HandlerRegistry::with_builtins();
    registry.register(GATE, gate.clone());
    registry
}

pub(crate) fn executor(
    store: &Arc<dyn JobStore>,
    root: &Path,
    provisioner: &orq_adapters::FakeProvisioner,
    handlers: crate::handlers::HandlerRegistry,
    clock: &FakeClock,
) -> crate::dispatch::Executor<orq_adapters::FakeProvisioner, FakeClock> {
    crate::dispatch::Executor::new(
        Arc::clone(store),
        crate::workspace::WorkspaceManager::new(root, vec!["inputs".into(), "outputs".into()]),
        provisioner.clone(),
        handlers,
        crate::ledger::LedgerConfig::default(),
        clock.clone(),
    )
}

/// Poll until the run leaves `running`.
pub(crate) async fn wait_finished(
    store: &Arc<dyn JobStore>,
    run_id: orq_core::RunId,
) -> orq_core::Run {
    for _ in 0..1000 {
        if let Some(run) = store.run(run_id) {
            if !run.is_running() {
                return run;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("run {run_id} did not finish");
}
