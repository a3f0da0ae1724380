// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake provisioner for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{EnvProvisioner, ProvisionError, Resolution};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Recorded provisioner call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionCall {
    Resolve { workspace: PathBuf, isolated: bool },
    Reset { workspace: PathBuf },
}

struct FakeProvisionerState {
    calls: Vec<ProvisionCall>,
    interpreter: PathBuf,
    fail_with: Option<String>,
    environments: Vec<PathBuf>,
    resolve_delay: Option<Duration>,
}

/// Fake provisioner: hands out a fixed interpreter without touching disk.
#[derive(Clone)]
pub struct FakeProvisioner {
    inner: Arc<Mutex<FakeProvisionerState>>,
}

impl Default for FakeProvisioner {
    fn default() -> Self {
        Self::new("sh")
    }
}

impl FakeProvisioner {
    pub fn new(interpreter: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeProvisionerState {
                calls: Vec::new(),
                interpreter: interpreter.into(),
                fail_with: None,
                environments: Vec::new(),
                resolve_delay: None,
            })),
        }
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<ProvisionCall> {
        self.inner.lock().calls.clone()
    }

    /// Make isolated resolves fail with an installer error
    pub fn fail_install(&self, message: impl Into<String>) {
        self.inner.lock().fail_with = Some(message.into());
    }

    /// Make every resolve take `delay` before answering
    pub fn delay_resolve(&self, delay: Duration) {
        self.inner.lock().resolve_delay = Some(delay);
    }

    /// Whether an isolated environment is currently "provisioned" for `workspace`
    pub fn has_environment(&self, workspace: &Path) -> bool {
        self.inner.lock().environments.iter().any(|w| w == workspace)
    }
}

#[async_trait]
impl EnvProvisioner for FakeProvisioner {
    async fn resolve(
        &self,
        workspace: &Path,
        isolated: bool,
    ) -> Result<Resolution, ProvisionError> {
        let delay = self.inner.lock().resolve_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut inner = self.inner.lock();
        inner.calls.push(ProvisionCall::Resolve {
            workspace: workspace.to_path_buf(),
            isolated,
        });

        if !isolated {
            return Ok(Resolution {
                interpreter: inner.interpreter.clone(),
                provisioned: false,
                transcript: vec!["using shared interpreter".to_string()],
            });
        }
        if let Some(message) = inner.fail_with.clone() {
            return Err(ProvisionError::InstallFailed(message));
        }

        let provisioned = !inner.environments.iter().any(|w| w == workspace);
        if provisioned {
            inner.environments.push(workspace.to_path_buf());
        }
        Ok(Resolution {
            interpreter: inner.interpreter.clone(),
            provisioned,
            transcript: vec![if provisioned {
                "environment created".to_string()
            } else {
                "environment ready".to_string()
            }],
        })
    }

    async fn reset(&self, workspace: &Path) -> Result<bool, ProvisionError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ProvisionCall::Reset {
            workspace: workspace.to_path_buf(),
        });
        let before = inner.environments.len();
        inner.environments.retain(|w| w != workspace);
        Ok(inner.environments.len() != before)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
