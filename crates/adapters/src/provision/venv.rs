// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Virtual environment provisioner

use super::{EnvProvisioner, ProvisionConfig, ProvisionError, Resolution};
use crate::subprocess::{combined_output, run_with_timeout};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Written into the environment after every step succeeded
pub const STAMP_FILE: &str = ".orq-provisioned";

/// Interpreter path inside an environment directory
pub fn venv_interpreter(env_dir: &Path) -> PathBuf {
    if cfg!(windows) {
        env_dir.join("Scripts").join("python.exe")
    } else {
        env_dir.join("bin").join("python")
    }
}

/// Provisions `<workspace>/<env_dir>` with `-m venv` and `pip`.
#[derive(Clone)]
pub struct VenvProvisioner {
    config: ProvisionConfig,
}

impl VenvProvisioner {
    pub fn new(config: ProvisionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    async fn create(
        &self,
        workspace: &Path,
        transcript: &mut Vec<String>,
    ) -> Result<PathBuf, ProvisionError> {
        let env_dir = workspace.join(&self.config.env_dir);

        if env_dir.exists() {
            transcript.push(format!("removing incomplete environment {}", env_dir.display()));
            tokio::fs::remove_dir_all(&env_dir).await?;
        }

        let host = &self.config.host_interpreter;
        transcript.push(format!("$ {} -m venv {}", host.display(), env_dir.display()));
        let mut cmd = Command::new(host);
        cmd.arg("-m").arg("venv").arg(&env_dir).current_dir(workspace);
        let output = run_with_timeout(cmd, crate::env::venv_timeout(), "venv creation")
            .await
            .map_err(ProvisionError::CreateFailed)?;
        let text = combined_output(&output);
        if !text.is_empty() {
            transcript.push(text.clone());
        }
        if !output.status.success() {
            discard(&env_dir).await;
            return Err(ProvisionError::CreateFailed(exit_message(&output, &text)));
        }

        let interpreter = venv_interpreter(&env_dir);
        if !interpreter.exists() {
            discard(&env_dir).await;
            return Err(ProvisionError::CreateFailed(format!(
                "interpreter missing after creation: {}",
                interpreter.display()
            )));
        }

        let manifest = workspace.join(&self.config.manifest);
        if manifest.is_file() {
            let steps: [&[&str]; 2] = [
                &["-m", "pip", "install", "--upgrade", "pip"],
                &["-m", "pip", "install", "-r", self.config.manifest.as_str()],
            ];
            for args in steps {
                if let Err(e) = self.pip(&interpreter, workspace, args, transcript).await {
                    discard(&env_dir).await;
                    return Err(e);
                }
            }
        } else {
            transcript.push(format!("no {} found, skipping installation", self.config.manifest));
        }

        tokio::fs::write(env_dir.join(STAMP_FILE), b"").await?;
        Ok(interpreter)
    }

    async fn pip(
        &self,
        interpreter: &Path,
        workspace: &Path,
        args: &[&str],
        transcript: &mut Vec<String>,
    ) -> Result<(), ProvisionError> {
        transcript.push(format!("$ {} {}", interpreter.display(), args.join(" ")));
        let mut cmd = Command::new(interpreter);
        cmd.args(args).current_dir(workspace);
        let output = run_with_timeout(cmd, crate::env::install_timeout(), "pip install")
            .await
            .map_err(ProvisionError::InstallFailed)?;
        let text = combined_output(&output);
        if !text.is_empty() {
            transcript.push(text.clone());
        }
        if output.status.success() {
            Ok(())
        } else {
            Err(ProvisionError::InstallFailed(exit_message(&output, &text)))
        }
    }
}

#[async_trait]
impl EnvProvisioner for VenvProvisioner {
    async fn resolve(
        &self,
        workspace: &Path,
        isolated: bool,
    ) -> Result<Resolution, ProvisionError> {
        if !isolated {
            let interpreter = self.config.host_interpreter.clone();
            return Ok(Resolution {
                transcript: vec![format!("using shared interpreter {}", interpreter.display())],
                interpreter,
                provisioned: false,
            });
        }

        let env_dir = workspace.join(&self.config.env_dir);
        let interpreter = venv_interpreter(&env_dir);
        if interpreter.exists() && env_dir.join(STAMP_FILE).exists() {
            return Ok(Resolution {
                transcript: vec![format!("environment ready: {}", interpreter.display())],
                interpreter,
                provisioned: false,
            });
        }

        let mut transcript = Vec::new();
        let interpreter = self.create(workspace, &mut transcript).await?;
        transcript.push(format!("environment created: {}", interpreter.display()));
        Ok(Resolution {
            interpreter,
            provisioned: true,
            transcript,
        })
    }

    async fn reset(&self, workspace: &Path) -> Result<bool, ProvisionError> {
        let env_dir = workspace.join(&self.config.env_dir);
        if !env_dir.exists() {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(&env_dir).await?;
        Ok(true)
    }
}

/// Best-effort removal of a half-built environment
async fn discard(env_dir: &Path) {
    if let Err(e) = tokio::fs::remove_dir_all(env_dir).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(
                path = %env_dir.display(),
                error = %e,
                "failed to remove incomplete environment"
            );
        }
    }
}

fn exit_message(output: &std::process::Output, text: &str) -> String {
    let code = match output.status.code() {
        Some(code) => format!("exit code {code}"),
        None => "killed by signal".to_string(),
    };
    if text.is_empty() {
        code
    } else {
        format!("{code}: {text}")
    }
}

#[cfg(test)]
#[path = "venv_tests.rs"]
mod tests;
