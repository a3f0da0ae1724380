// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

/// A stand-in interpreter: records its argv, fakes `-m venv` by copying
/// itself into `<dir>/bin/python`, and fakes `-m pip`.
struct FakePython {
    dir: TempDir,
}

impl FakePython {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("calls.log");
        let fail_install = dir.path().join("fail-install");
        let fail_venv = dir.path().join("fail-venv");
        let script = format!(
            r#"#!/bin/sh
echo "$*" >> "{log}"
if [ "$1" = "-m" ] && [ "$2" = "venv" ]; then
  if [ -f "{fail_venv}" ]; then
    echo "Error: ensurepip is not available" >&2
    exit 1
  fi
  mkdir -p "$3/bin"
  cp "$0" "$3/bin/python"
  chmod +x "$3/bin/python"
  exit 0
fi
if [ "$1" = "-m" ] && [ "$2" = "pip" ]; then
  if [ "$4" = "-r" ] && [ -f "{fail_install}" ]; then
    echo "ERROR: No matching distribution found for nonexistent-pkg" >&2
    exit 1
  fi
  echo "Successfully installed"
fi
exit 0
"#,
            log = log.display(),
            fail_install = fail_install.display(),
            fail_venv = fail_venv.display(),
        );
        let path = dir.path().join("python3");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        Self { dir }
    }

    fn path(&self) -> PathBuf {
        self.dir.path().join("python3")
    }

    fn calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.dir.path().join("calls.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    fn fail(&self, what: &str, on: bool) {
        let flag = self.dir.path().join(format!("fail-{what}"));
        if on {
            std::fs::write(flag, "").unwrap();
        } else {
            std::fs::remove_file(flag).unwrap();
        }
    }
}

fn provisioner(python: &FakePython) -> VenvProvisioner {
    VenvProvisioner::new(ProvisionConfig {
        host_interpreter: python.path(),
        ..ProvisionConfig::default()
    })
}

#[tokio::test]
async fn shared_job_uses_host_interpreter() {
    let python = FakePython::new();
    let workspace = TempDir::new().unwrap();

    let resolution = provisioner(&python).resolve(workspace.path(), false).await.unwrap();

    assert_eq!(resolution.interpreter, python.path());
    assert!(!resolution.provisioned);
    assert!(!workspace.path().join(".venv").exists());
    assert!(python.calls().is_empty());
}

#[tokio::test]
async fn isolated_job_creates_environment_once() {
    let python = FakePython::new();
    let workspace = TempDir::new().unwrap();
    let provisioner = provisioner(&python);

    let first = provisioner.resolve(workspace.path(), true).await.unwrap();
    let env_dir = workspace.path().join(".venv");
    assert!(first.provisioned);
    assert_eq!(first.interpreter, venv_interpreter(&env_dir));
    assert!(env_dir.join(STAMP_FILE).exists());
    assert!(first.transcript.iter().any(|l| l.contains("skipping installation")));

    let second = provisioner.resolve(workspace.path(), true).await.unwrap();
    assert!(!second.provisioned);
    assert_eq!(second.interpreter, first.interpreter);

    let calls = python.calls();
    assert_eq!(calls.len(), 1, "calls: {calls:?}");
    assert!(calls[0].starts_with("-m venv"));
}

#[tokio::test]
async fn manifest_triggers_pip_upgrade_then_install() {
    let python = FakePython::new();
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("requirements.txt"), "requests\n").unwrap();

    let resolution = provisioner(&python).resolve(workspace.path(), true).await.unwrap();

    let calls = python.calls();
    assert_eq!(calls.len(), 3, "calls: {calls:?}");
    assert_eq!(calls[1], "-m pip install --upgrade pip");
    assert_eq!(calls[2], "-m pip install -r requirements.txt");
    assert!(resolution.transcript.iter().any(|l| l.contains("Successfully installed")));
}

#[tokio::test]
async fn install_failure_removes_half_built_environment() {
    let python = FakePython::new();
    let workspace = TempDir::new().unwrap();
    std::fs::write(workspace.path().join("requirements.txt"), "nonexistent-pkg\n").unwrap();
    python.fail("install", true);
    let provisioner = provisioner(&python);

    let err = provisioner.resolve(workspace.path(), true).await.unwrap_err();
    assert!(matches!(err, ProvisionError::InstallFailed(_)));
    assert!(err.to_string().contains("No matching distribution"));
    assert!(!workspace.path().join(".venv").exists());

    python.fail("install", false);
    let resolution = provisioner.resolve(workspace.path(), true).await.unwrap();
    assert!(resolution.provisioned);
}

#[tokio::test]
async fn venv_failure_is_create_error() {
    let python = FakePython::new();
    let workspace = TempDir::new().unwrap();
    python.fail("venv", true);

    let err = provisioner(&python).resolve(workspace.path(), true).await.unwrap_err();
    assert!(matches!(err, ProvisionError::CreateFailed(_)));
    assert!(!workspace.path().join(".venv").exists());
}

#[tokio::test]
async fn environment_without_stamp_is_recreated() {
    let python = FakePython::new();
    let workspace = TempDir::new().unwrap();
    let env_dir = workspace.path().join(".venv");
    std::fs::create_dir_all(env_dir.join("bin")).unwrap();
    std::fs::write(venv_interpreter(&env_dir), "").unwrap();
    std::fs::write(env_dir.join("leftover"), "").unwrap();

    let resolution = provisioner(&python).resolve(workspace.path(), true).await.unwrap();

    assert!(resolution.provisioned);
    assert!(!env_dir.join("leftover").exists());
    assert!(resolution.transcript[0].starts_with("removing incomplete environment"));
}

#[tokio::test]
async fn reset_removes_environment() {
    let python = FakePython::new();
    let workspace = TempDir::new().unwrap();
    let provisioner = provisioner(&python);
    provisioner.resolve(workspace.path(), true).await.unwrap();

    assert!(provisioner.reset(workspace.path()).await.unwrap());
    assert!(!workspace.path().join(".venv").exists());
    assert!(!provisioner.reset(workspace.path()).await.unwrap());
}
