// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job workspace folders

use orq_core::JobId;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Marker written into a freshly created workspace
pub const README_FILE: &str = "README.txt";

const README_TEXT: &str = "\
Dedicated folder for this job.
Place here:
- requirements.txt (optional)
- the entrypoint script configured for the job
- any other files the job needs
";

/// Errors from workspace operations
#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("failed to prepare workspace {path}: {source}")]
    Prepare { path: PathBuf, source: io::Error },
    #[error("failed to read workspace {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
}

/// Counts from a workspace reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    pub removed: usize,
    pub failed: usize,
}

/// Owns the on-disk layout `<root>/job_<id>/`.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
    subdirs: Vec<String>,
}

impl WorkspaceManager {
    pub fn new(root: impl Into<PathBuf>, subdirs: Vec<String>) -> Self {
        Self {
            root: root.into(),
            subdirs,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Workspace path of a job, whether or not it exists yet
    pub fn path_for(&self, job_id: JobId) -> PathBuf {
        self.root.join(format!("job_{}", job_id))
    }

    /// Create the workspace and its subfolders if missing. Never deletes.
    pub fn ensure(&self, job_id: JobId) -> Result<PathBuf, WorkspaceError> {
        let path = self.path_for(job_id);
        let prepare = |source| WorkspaceError::Prepare {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&path).map_err(prepare)?;
        for subdir in &self.subdirs {
            fs::create_dir_all(path.join(subdir)).map_err(prepare)?;
        }
        let readme = path.join(README_FILE);
        if !readme.exists() {
            fs::write(&readme, README_TEXT).map_err(prepare)?;
        }
        Ok(path)
    }

    /// Delete every top-level entry of the workspace except those named in `keep`.
    ///
    /// Individual removal failures are counted, not propagated. The caller
    /// must make sure no run of the job is in progress.
    pub fn reset(&self, job_id: JobId, keep: &[String]) -> Result<ResetReport, WorkspaceError> {
        let path = self.path_for(job_id);
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(ResetReport::default()),
            Err(source) => return Err(WorkspaceError::Read { path, source }),
        };

        let mut report = ResetReport::default();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(job_id = %job_id, error = %e, "unreadable workspace entry");
                    report.failed += 1;
                    continue;
                }
            };
            let name = entry.file_name();
            if keep.iter().any(|k| name.to_str() == Some(k.as_str())) {
                continue;
            }

            let target = entry.path();
            let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let result = if is_dir {
                fs::remove_dir_all(&target)
            } else {
                fs::remove_file(&target)
            };
            match result {
                Ok(()) => report.removed += 1,
                Err(e) => {
                    tracing::warn!(
                        path = %target.display(),
                        error = %e,
                        "failed to remove workspace entry"
                    );
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
