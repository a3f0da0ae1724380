// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: subprocesses, signals and interpreter
//! environments

mod env;
pub mod process;
pub mod provision;
pub mod signal;
pub mod subprocess;
pub mod traced;

pub use process::{
    spawn_streaming, OutputLine, OutputStream, ProcessError, ProcessSpec, SpawnedProcess,
    LINE_CHANNEL_CAPACITY, MAX_LINE_BYTES,
};
pub use provision::{
    venv_interpreter, EnvProvisioner, ProvisionConfig, ProvisionError, Resolution, VenvProvisioner,
};
pub use signal::Signalled;
pub use traced::TracedProvisioner;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use provision::{FakeProvisioner, ProvisionCall};
