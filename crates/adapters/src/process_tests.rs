// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;

fn sh(script: &str, cwd: &Path) -> ProcessSpec {
    ProcessSpec::new("sh", cwd).arg("-c").arg(script)
}

async fn drain(process: &mut SpawnedProcess) -> Vec<OutputLine> {
    let mut lines = Vec::new();
    while let Some(line) = process.next_line().await {
        lines.push(line);
    }
    lines
}

#[tokio::test]
async fn streams_both_pipes_and_reports_exit_code() {
    let dir = tempdir().unwrap();
    let spec = sh("echo out; echo err >&2; exit 3", dir.path());
    let mut process = spawn_streaming(&spec, 8).unwrap();
    assert!(process.pid().is_some());

    let lines = drain(&mut process).await;
    let status = process.wait().await.unwrap();

    assert_eq!(status.code(), Some(3));
    assert!(lines.contains(&OutputLine {
        stream: OutputStream::Stdout,
        text: "out".into(),
    }));
    assert!(lines.contains(&OutputLine {
        stream: OutputStream::Stderr,
        text: "err".into(),
    }));
}

#[tokio::test]
async fn preserves_order_within_a_stream() {
    let dir = tempdir().unwrap();
    let spec = sh("for i in 1 2 3 4 5; do echo $i; done", dir.path());
    let mut process = spawn_streaming(&spec, 1).unwrap();
    let lines: Vec<String> = drain(&mut process).await.into_iter().map(|l| l.text).collect();
    process.wait().await.unwrap();
    assert_eq!(lines, vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn invalid_utf8_is_replaced() {
    let dir = tempdir().unwrap();
    let mut process = spawn_streaming(&sh("printf 'a\\377b\\n'", dir.path()), 8).unwrap();
    let lines = drain(&mut process).await;
    process.wait().await.unwrap();
    assert_eq!(lines[0].text, "a\u{FFFD}b");
}

#[tokio::test]
async fn final_line_without_newline_is_kept() {
    let dir = tempdir().unwrap();
    let mut process = spawn_streaming(&sh("printf 'tail'", dir.path()), 8).unwrap();
    let lines = drain(&mut process).await;
    process.wait().await.unwrap();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].text, "tail");
}

#[tokio::test]
async fn long_output_without_newline_is_split() {
    let dir = tempdir().unwrap();
    let script = format!("head -c {} /dev/zero | tr '\\0' a", MAX_LINE_BYTES * 3 + 10);
    let mut process = spawn_streaming(&sh(&script, dir.path()), 4).unwrap();
    let lines = drain(&mut process).await;
    process.wait().await.unwrap();

    let lengths: Vec<usize> = lines.iter().map(|l| l.text.len()).collect();
    assert_eq!(lengths, vec![MAX_LINE_BYTES, MAX_LINE_BYTES, MAX_LINE_BYTES, 10]);
    assert!(lines.iter().all(|l| l.text.bytes().all(|b| b == b'a')));
}

#[tokio::test]
async fn long_line_keeps_following_lines_intact() {
    let dir = tempdir().unwrap();
    let script = format!("head -c {} /dev/zero | tr '\\0' b; echo; echo next", MAX_LINE_BYTES + 1);
    let mut process = spawn_streaming(&sh(&script, dir.path()), 4).unwrap();
    let lines = drain(&mut process).await;
    process.wait().await.unwrap();

    let lengths: Vec<usize> = lines.iter().map(|l| l.text.len()).collect();
    assert_eq!(lengths, vec![MAX_LINE_BYTES, 1, 4]);
    assert_eq!(lines[2].text, "next");
}

#[tokio::test]
async fn terminate_stops_the_child() {
    let dir = tempdir().unwrap();
    let mut process = spawn_streaming(&sh("echo up; exec sleep 30", dir.path()), 8).unwrap();
    assert_eq!(process.next_line().await.unwrap().text, "up");

    process.terminate(std::time::Duration::from_secs(3)).await;
    let status = process.wait().await.unwrap();

    assert_eq!(status.code(), None);
}

#[tokio::test]
async fn runs_in_cwd_with_env() {
    let dir = tempdir().unwrap();
    let spec = sh("echo \"$ORQ_TEST_VALUE\"; pwd", dir.path()).env("ORQ_TEST_VALUE", "42");
    let mut process = spawn_streaming(&spec, 8).unwrap();
    let lines = drain(&mut process).await;
    process.wait().await.unwrap();

    assert_eq!(lines[0].text, "42");
    let cwd = std::fs::canonicalize(dir.path()).unwrap();
    assert_eq!(std::fs::canonicalize(&lines[1].text).unwrap(), cwd);
}

#[tokio::test]
async fn missing_program_is_spawn_error() {
    let dir = tempdir().unwrap();
    let spec = ProcessSpec::new("/nonexistent/interpreter", dir.path());
    let err = spawn_streaming(&spec, 8).err().unwrap();
    assert!(matches!(err, ProcessError::Spawn { .. }));
    assert!(err.to_string().contains("/nonexistent/interpreter"));
}

#[test]
fn command_line_joins_program_and_args() {
    let spec = ProcessSpec::new("/usr/bin/python3", Path::new("/tmp")).arg("main.py");
    assert_eq!(spec.command_line(), "/usr/bin/python3 main.py");
}
