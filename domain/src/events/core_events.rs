// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Domain events emitted by the tick loop for presentation/GUI consumers
//! (`spec.md` §5, §6). These are notifications, not commands: nothing in
//! the scheduling core depends on anyone observing them.

use serde::{Deserialize, Serialize};

use crate::entities::app::ProjectHandle;
use crate::entities::result::{ResultHandle, ResultState};

/// A user-facing notice, mirroring the original client's notices list
/// (`spec.md` §6 Glossary-adjacent: surfaced by the presentation layer).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub project: Option<ProjectHandle>,
    pub title: String,
    pub description: String,
    pub created_at: f64,
}

/// Emitted whenever `ClientState::mark_result_state` successfully applies a
/// transition (`spec.md` §4.5).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateChanged {
    pub result: ResultHandle,
    pub from: ResultState,
    pub to: ResultState,
    pub at: f64,
}

/// Emitted whenever the scheduler recomputes which results should be
/// running (`spec.md` §4.5), so a GUI can refresh its task list without
/// polling every tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleChanged {
    pub started: Vec<ResultHandle>,
    pub preempted: Vec<ResultHandle>,
    pub at: f64,
}

/// Emitted when a scheduler RPC reply announces a newer client version is
/// available (`spec.md` §4.6, carried over from the original's
/// notices/version-check behavior).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVersionAvailable {
    pub version: String,
    pub download_url: String,
}
