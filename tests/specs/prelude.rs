//! Test helpers for behavioral specifications.
//!
//! Provides high-level DSL for testing orq CLI behavior.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

// Aggressive timeouts for fast tests.
//
// IMPORTANT:
//   Do NOT change these.
//   File a performance bug instead.
const ORQ_TIMEOUT_CONNECT_MS: &str = "2000";
const ORQ_TIMEOUT_EXIT_MS: &str = "500";
const ORQ_TIMEOUT_IPC_MS: &str = "500";
const ORQ_CONNECT_POLL_MS: &str = "5";
const ORQ_WAIT_POLL_MS: &str = "20";

// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 2000;

/// Returns the path to a binary, checking llvm-cov target directory first.
/// Falls back to resolving relative to the test binary itself when
/// CARGO_MANIFEST_DIR is stale.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>, so its
    // grandparent is target/debug/ where orq and orqd are built.
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

fn orq_binary() -> PathBuf {
    binary_path("orq")
}

pub fn orqd_binary() -> PathBuf {
    binary_path("orqd")
}

/// Create a CLI builder for orq commands
pub fn cli() -> CliBuilder {
    CliBuilder::new()
}

/// High-level CLI builder for fluent test assertions
pub struct CliBuilder {
    args: Vec<String>,
    dir: Option<PathBuf>,
    envs: Vec<(String, String)>,
}

impl CliBuilder {
    fn new() -> Self {
        Self {
            args: Vec::new(),
            dir: None,
            envs: vec![
                (
                    "ORQ_DAEMON_BINARY".into(),
                    orqd_binary().to_string_lossy().into(),
                ),
                ("ORQ_TIMEOUT_CONNECT_MS".into(), ORQ_TIMEOUT_CONNECT_MS.into()),
                ("ORQ_TIMEOUT_EXIT_MS".into(), ORQ_TIMEOUT_EXIT_MS.into()),
                ("ORQ_TIMEOUT_IPC_MS".into(), ORQ_TIMEOUT_IPC_MS.into()),
                ("ORQ_CONNECT_POLL_MS".into(), ORQ_CONNECT_POLL_MS.into()),
                ("ORQ_WAIT_POLL_MS".into(), ORQ_WAIT_POLL_MS.into()),
                ("NO_COLOR".into(), "1".into()),
            ],
        }
    }

    /// Add CLI arguments
    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Set working directory
    pub fn pwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.dir = Some(path.into());
        self
    }

    /// Set environment variable
    pub fn env(mut self, key: &str, value: impl AsRef<Path>) -> Self {
        self.envs.push((
            key.to_string(),
            value.as_ref().to_string_lossy().to_string(),
        ));
        self
    }

    /// Build the command without running it
    pub fn command(self) -> Command {
        let mut cmd = Command::new(orq_binary());
        cmd.args(&self.args);

        if let Some(dir) = self.dir {
            cmd.current_dir(dir);
        }

        // A parent actor would leak into audit assertions
        cmd.env_remove("ORQ_ACTOR");
        cmd.env_remove("COLOR");

        for (key, value) in self.envs {
            cmd.env(key, value);
        }

        cmd
    }

    /// Run and return the raw output, whatever the exit code
    pub fn output(self) -> RunAssert {
        let output = self.command().output().expect("command should run");
        RunAssert { output }
    }

    /// Run and expect success (exit code 0)
    pub fn passes(self) -> RunAssert {
        let run = self.output();
        assert!(
            run.output.status.success(),
            "expected command to pass, got exit code {:?}\nstdout: {}\nstderr: {}",
            run.output.status.code(),
            run.stdout(),
            run.stderr()
        );
        run
    }

    /// Run and expect failure (non-zero exit code)
    pub fn fails(self) -> RunAssert {
        let run = self.output();
        assert!(
            !run.output.status.success(),
            "expected command to fail, but it passed\nstdout: {}\nstderr: {}",
            run.stdout(),
            run.stderr()
        );
        run
    }
}

/// Result of a CLI run for chaining assertions
pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn code(&self) -> Option<i32> {
        self.output.status.code()
    }

    /// Assert the exit code
    pub fn exits_with(self, code: i32) -> Self {
        assert_eq!(
            self.code(),
            Some(code),
            "unexpected exit code\nstdout: {}\nstderr: {}",
            self.stdout(),
            self.stderr()
        );
        self
    }

    /// Assert stdout equals expected exactly (with diff on failure).
    /// **Prefer this for format specs** - catches format regressions.
    pub fn stdout_eq(self, expected: &str) -> Self {
        let stdout = self.stdout();
        similar_asserts::assert_eq!(stdout, expected);
        self
    }

    /// Assert stdout contains substring.
    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            stdout.contains(expected),
            "stdout does not contain '{}'\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    /// Assert stdout does not contain substring.
    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            !stdout.contains(unexpected),
            "stdout should not contain '{}'\nstdout: {}",
            unexpected,
            stdout
        );
        self
    }

    /// Assert stderr contains substring.
    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            stderr.contains(expected),
            "stderr does not contain '{}'\nstderr: {}",
            expected,
            stderr
        );
        self
    }

    /// Parse stdout as JSON
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.output.stdout)
            .unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {}", self.stdout()))
    }
}

// =============================================================================
// Polling
// =============================================================================

/// Poll a condition until it returns true or timeout is reached.
pub fn wait_for<F>(timeout_ms: u64, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = std::time::Duration::from_millis(timeout_ms);
    let poll_interval = std::time::Duration::from_millis(SPEC_POLL_INTERVAL_MS);

    while start.elapsed() < timeout {
        if condition() {
            return true;
        }
        std::thread::sleep(poll_interval);
    }
    false
}

// =============================================================================
// State
// =============================================================================

/// Isolated daemon state directory; the daemon is stopped on drop.
pub struct State {
    dir: tempfile::TempDir,
}

impl State {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    /// State directory whose daemon runs entrypoints with `/bin/sh`
    pub fn with_shell_interpreter() -> Self {
        let state = Self::empty();
        state.file("orq.toml", "host_interpreter = \"/bin/sh\"\n");
        state
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file below the state directory (parents created automatically)
    pub fn file(&self, path: impl AsRef<Path>, content: &str) {
        let full_path = self.path().join(path.as_ref());
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(full_path, content).unwrap();
    }

    /// Workspace directory of a job
    pub fn workspace(&self, job_id: u64) -> PathBuf {
        self.path().join("workspaces").join(format!("job_{}", job_id))
    }

    /// Run orq against this state directory
    pub fn orq(&self) -> CliBuilder {
        cli().pwd(self.path()).env("ORQ_STATE_DIR", self.path())
    }

    /// Create a job and return its id
    pub fn add_job(&self, args: &[&str]) -> u64 {
        let mut full = vec!["-o", "json", "job", "add"];
        full.extend_from_slice(args);
        let job = self.orq().args(&full).passes().json();
        job["id"].as_u64().expect("job id in output")
    }

    /// Daemon log contents (for debugging test failures)
    pub fn daemon_log(&self) -> String {
        std::fs::read_to_string(self.path().join("daemon.log"))
            .unwrap_or_else(|_| "(no daemon log)".to_string())
    }
}

impl Drop for State {
    fn drop(&mut self) {
        let mut cmd = self.orq().args(&["daemon", "stop"]).command();
        cmd.stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null());
        let _ = cmd.status();
    }
}
