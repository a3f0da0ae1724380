// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::TempDir;

fn manager(root: &TempDir) -> WorkspaceManager {
    WorkspaceManager::new(root.path(), vec!["inputs".into(), "outputs".into()])
}

#[test]
fn ensure_creates_layout() {
    let root = TempDir::new().unwrap();
    let path = manager(&root).ensure(JobId::new(5)).unwrap();

    assert_eq!(path, root.path().join("job_5"));
    assert!(path.join("inputs").is_dir());
    assert!(path.join("outputs").is_dir());
    assert!(path.join(README_FILE).is_file());
}

#[test]
fn ensure_is_idempotent_and_keeps_content() {
    let root = TempDir::new().unwrap();
    let manager = manager(&root);
    let path = manager.ensure(JobId::new(1)).unwrap();
    fs::write(path.join(README_FILE), "custom").unwrap();
    fs::write(path.join("main.py"), "print('hi')").unwrap();

    manager.ensure(JobId::new(1)).unwrap();

    assert_eq!(fs::read_to_string(path.join(README_FILE)).unwrap(), "custom");
    assert!(path.join("main.py").exists());
}

#[test]
fn reset_removes_all_but_kept_entries() {
    let root = TempDir::new().unwrap();
    let manager = manager(&root);
    let path = manager.ensure(JobId::new(2)).unwrap();
    fs::write(path.join("main.py"), "").unwrap();
    fs::write(path.join("outputs/report.csv"), "a,b").unwrap();

    let report = manager.reset(JobId::new(2), &["main.py".to_string()]).unwrap();

    // README.txt, inputs/, outputs/
    assert_eq!(report, ResetReport { removed: 3, failed: 0 });
    assert!(path.join("main.py").exists());
    assert!(!path.join("outputs").exists());
}

#[test]
fn reset_of_missing_workspace_is_empty() {
    let root = TempDir::new().unwrap();
    let report = manager(&root).reset(JobId::new(9), &[]).unwrap();
    assert_eq!(report, ResetReport::default());
}
