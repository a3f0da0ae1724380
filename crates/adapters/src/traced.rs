// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::provision::{EnvProvisioner, ProvisionError, Resolution};
use async_trait::async_trait;
use std::path::Path;
use tracing::Instrument;

/// Wrapper that adds tracing to any EnvProvisioner
#[derive(Clone)]
pub struct TracedProvisioner<P> {
    inner: P,
}

impl<P> TracedProvisioner<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<P: EnvProvisioner> EnvProvisioner for TracedProvisioner<P> {
    async fn resolve(
        &self,
        workspace: &Path,
        isolated: bool,
    ) -> Result<Resolution, ProvisionError> {
        async {
            tracing::debug!("starting");
            let start = std::time::Instant::now();
            let result = self.inner.resolve(workspace, isolated).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(r) if r.provisioned => tracing::info!(
                    interpreter = %r.interpreter.display(),
                    elapsed_ms,
                    "environment provisioned"
                ),
                Ok(r) => {
                    tracing::debug!(interpreter = %r.interpreter.display(), "environment reused")
                }
                Err(e) => tracing::error!(elapsed_ms, error = %e, "provisioning failed"),
            }
            result
        }
        .instrument(tracing::info_span!(
            "provision.resolve",
            workspace = %workspace.display(),
            isolated
        ))
        .await
    }

    async fn reset(&self, workspace: &Path) -> Result<bool, ProvisionError> {
        let result = self.inner.reset(workspace).await;
        tracing::info_span!("provision.reset", workspace = %workspace.display()).in_scope(|| {
            match &result {
                Ok(true) => tracing::info!("environment removed"),
                Ok(false) => tracing::info!("no environment to remove"),
                Err(e) => tracing::warn!(error = %e, "reset failed"),
            }
        });
        result
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
