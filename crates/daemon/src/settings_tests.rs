// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

fn write(dir: &tempfile::TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("orq.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn missing_file_gives_defaults() {
    let dir = tempfile::tempdir().unwrap();

    let settings = Settings::load(&dir.path().join("orq.toml")).unwrap();

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.tick_interval(), Duration::from_secs(60));
    assert_eq!(settings.max_concurrent_runs, 8);
    assert_eq!(settings.max_log_chars, 100_000);
    assert_eq!(settings.host_interpreter, PathBuf::from("python3"));
    assert_eq!(settings.retention(), Retention::default());
}

#[test]
fn retention_limits_are_configurable() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, "retain_runs_per_job = 20\nretain_events = 0\n");

    let settings = Settings::load(&path).unwrap();

    assert_eq!(
        settings.retention(),
        Retention {
            runs_per_job: 20,
            events: 0,
        }
    );
}

#[test]
fn partial_file_keeps_other_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        &dir,
        r#"
tick_interval_secs = 5
zone = "utc"
workspace_subdirs = ["data"]
"#,
    );

    let settings = Settings::load(&path).unwrap();

    assert_eq!(settings.tick_interval_secs, 5);
    assert_eq!(settings.zone, ScheduleZone::Utc);
    assert_eq!(settings.workspace_subdirs, vec!["data".to_string()]);
    assert_eq!(settings.manifest, "requirements.txt");
}

#[test]
fn runtime_config_defaults_workspaces_under_state_dir() {
    let settings = Settings {
        log_flush_interval_ms: 250,
        ..Settings::default()
    };

    let config = settings.runtime_config(Path::new("/var/lib/orq"));

    assert_eq!(config.workspaces_root, PathBuf::from("/var/lib/orq/workspaces"));
    assert_eq!(config.ledger.flush_interval, Duration::from_millis(250));
    assert_eq!(config.max_concurrent_runs, 8);
}

#[test]
fn explicit_workspaces_root_wins() {
    let settings = Settings {
        workspaces_root: Some(PathBuf::from("/srv/jobs")),
        ..Settings::default()
    };

    assert_eq!(
        settings.workspaces_root(Path::new("/var/lib/orq")),
        PathBuf::from("/srv/jobs")
    );
}

#[parameterized(
    zero_tick = { "tick_interval_secs = 0" },
    zero_pool = { "max_concurrent_runs = 0" },
    empty_env_dir = { "env_dir = \"\"" },
)]
fn rejects_invalid_values(content: &str) {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, content);

    let err = Settings::load(&path).unwrap_err();

    assert!(matches!(err, SettingsError::Invalid(_)), "{err}");
}

#[parameterized(
    unknown_key = { "tick = 5" },
    wrong_type = { "max_concurrent_runs = \"many\"" },
    bad_zone = { "zone = \"mars\"" },
)]
fn rejects_malformed_files(content: &str) {
    let dir = tempfile::tempdir().unwrap();
    let path = write(&dir, content);

    let err = Settings::load(&path).unwrap_err();

    assert!(matches!(err, SettingsError::Parse { .. }), "{err}");
}
