// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace interpreter environments

mod venv;

pub use venv::{venv_interpreter, VenvProvisioner, STAMP_FILE};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeProvisioner, ProvisionCall};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from environment provisioning
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("environment creation failed: {0}")]
    CreateFailed(String),
    #[error("dependency installation failed: {0}")]
    InstallFailed(String),
    #[error("environment I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where provisioning looks and what it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionConfig {
    /// Interpreter used directly by shared jobs and to create environments
    pub host_interpreter: PathBuf,
    /// Environment directory, relative to the workspace
    pub env_dir: String,
    /// Dependency manifest, relative to the workspace
    pub manifest: String,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            host_interpreter: PathBuf::from("python3"),
            env_dir: ".venv".to_string(),
            manifest: "requirements.txt".to_string(),
        }
    }
}

/// A runnable interpreter for a workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub interpreter: PathBuf,
    /// True if the environment was created by this call
    pub provisioned: bool,
    /// Commands run and their output, for the run log
    pub transcript: Vec<String>,
}

/// Adapter that prepares interpreters for job workspaces
#[async_trait]
pub trait EnvProvisioner: Clone + Send + Sync + 'static {
    /// Interpreter for a job in `workspace`.
    ///
    /// Shared jobs get the host interpreter. Isolated jobs get a dedicated
    /// environment, created on first use and reused afterwards.
    async fn resolve(&self, workspace: &Path, isolated: bool) -> Result<Resolution, ProvisionError>;

    /// Delete the workspace's environment. Returns false if there was none.
    async fn reset(&self, workspace: &Path) -> Result<bool, ProvisionError>;
}
