// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon settings file (`orq.toml` in the state directory).
//!
//! Every field is optional; a missing file means all defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use orq_adapters::ProvisionConfig;
use orq_core::ScheduleZone;
use orq_engine::{LedgerConfig, RuntimeConfig};
use orq_storage::Retention;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub tick_interval_secs: u64,
    pub max_concurrent_runs: usize,
    pub log_flush_interval_ms: u64,
    pub max_log_chars: usize,
    /// Defaults to `<state_dir>/workspaces`
    pub workspaces_root: Option<PathBuf>,
    pub host_interpreter: PathBuf,
    pub env_dir: String,
    pub manifest: String,
    pub workspace_subdirs: Vec<String>,
    /// Zone for `HH:MM` schedule times
    pub zone: ScheduleZone,
    /// Finished runs kept per job; 0 keeps all
    pub retain_runs_per_job: usize,
    /// Events kept; 0 keeps all
    pub retain_events: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let provision = ProvisionConfig::default();
        let ledger = LedgerConfig::default();
        let retention = Retention::default();
        Self {
            tick_interval_secs: 60,
            max_concurrent_runs: 8,
            log_flush_interval_ms: ledger.flush_interval.as_millis() as u64,
            max_log_chars: ledger.max_log_chars,
            workspaces_root: None,
            host_interpreter: provision.host_interpreter,
            env_dir: provision.env_dir,
            manifest: provision.manifest,
            workspace_subdirs: vec!["inputs".to_string(), "outputs".to_string()],
            zone: ScheduleZone::default(),
            retain_runs_per_job: retention.runs_per_job,
            retain_events: retention.events,
        }
    }
}

impl Settings {
    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(SettingsError::Read {
                    path: path.to_owned(),
                    source,
                })
            }
        };
        let settings: Settings = toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: path.to_owned(),
            source,
        })?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.tick_interval_secs == 0 {
            return Err(SettingsError::Invalid(
                "tick_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_runs == 0 {
            return Err(SettingsError::Invalid(
                "max_concurrent_runs must be at least 1".to_string(),
            ));
        }
        if self.env_dir.trim().is_empty() {
            return Err(SettingsError::Invalid("env_dir must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }

    pub fn workspaces_root(&self, state_dir: &Path) -> PathBuf {
        self.workspaces_root
            .clone()
            .unwrap_or_else(|| state_dir.join("workspaces"))
    }

    pub fn runtime_config(&self, state_dir: &Path) -> RuntimeConfig {
        RuntimeConfig {
            workspaces_root: self.workspaces_root(state_dir),
            workspace_subdirs: self.workspace_subdirs.clone(),
            max_concurrent_runs: self.max_concurrent_runs,
            ledger: LedgerConfig {
                flush_interval: Duration::from_millis(self.log_flush_interval_ms),
                max_log_chars: self.max_log_chars,
            },
            zone: self.zone,
        }
    }

    pub fn retention(&self) -> Retention {
        Retention {
            runs_per_job: self.retain_runs_per_job,
            events: self.retain_events,
        }
    }

    pub fn provision_config(&self) -> ProvisionConfig {
        ProvisionConfig {
            host_interpreter: self.host_interpreter.clone(),
            env_dir: self.env_dir.clone(),
            manifest: self.manifest.clone(),
        }
    }
}

#[cfg(test)]
#[path = "settings_tests.rs"]
mod tests;
