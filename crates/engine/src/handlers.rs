// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process handlers for internal jobs

use crate::ledger::LogSink;
use async_trait::async_trait;
use orq_core::{Job, RunId};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Name of the built-in handler that lists a workspace's contents
pub const WORKSPACE_INVENTORY: &str = "workspace-inventory";

/// What a handler can see and do during a run
pub struct HandlerContext<'a> {
    pub job: &'a Job,
    pub run_id: RunId,
    pub workspace: &'a Path,
    sink: &'a mut dyn LogSink,
}

impl<'a> HandlerContext<'a> {
    pub fn new(
        job: &'a Job,
        run_id: RunId,
        workspace: &'a Path,
        sink: &'a mut dyn LogSink,
    ) -> Self {
        Self {
            job,
            run_id,
            workspace,
            sink,
        }
    }

    /// Append a line to the run log.
    pub fn log(&mut self, text: &str) {
        self.sink.line(text);
    }
}

/// Work executed in-process for jobs of kind `internal`.
///
/// An `Err` fails the run; its message is written to the run log.
#[async_trait]
pub trait InternalHandler: Send + Sync + 'static {
    async fn run(&self, ctx: &mut HandlerContext<'_>) -> Result<(), String>;
}

/// Handlers by name, built once at startup
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn InternalHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the handlers shipped with orq
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(WORKSPACE_INVENTORY, WorkspaceInventory);
        registry
    }

    /// Register `handler` under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, handler: impl InternalHandler) {
        self.handlers.insert(name.into(), Arc::new(handler));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn InternalHandler>> {
        self.handlers.get(name).cloned()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.names())
            .finish()
    }
}

/// Logs each top-level entry of the workspace with its size.
struct WorkspaceInventory;

#[async_trait]
impl InternalHandler for WorkspaceInventory {
    async fn run(&self, ctx: &mut HandlerContext<'_>) -> Result<(), String> {
        let mut entries = tokio::fs::read_dir(ctx.workspace)
            .await
            .map_err(|e| format!("cannot read {}: {}", ctx.workspace.display(), e))?;

        let mut listing = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| e.to_string())? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let line = match entry.metadata().await {
                Ok(meta) if meta.is_dir() => format!("{}/", name),
                Ok(meta) => format!("{} ({} bytes)", name, meta.len()),
                Err(e) => format!("{} (unreadable: {})", name, e),
            };
            listing.push(line);
        }
        listing.sort();

        ctx.log(&format!("{} entries in {}", listing.len(), ctx.workspace.display()));
        for line in &listing {
            ctx.log(line);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "handlers_tests.rs"]
mod tests;
