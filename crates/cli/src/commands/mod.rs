// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

pub mod daemon;
pub mod environment;
pub mod events;
pub mod job;
pub mod run;
pub mod status;
pub mod workspace;
