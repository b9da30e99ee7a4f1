// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `Result` entity and its state machine (`spec.md` §3, §4.5).

use serde::{Deserialize, Serialize};

use crate::entities::app::ProjectHandle;
use crate::entities::app_version::AppVersionHandle;
use crate::entities::workunit::WorkunitHandle;
use crate::error::CoreError;
use crate::value_objects::{Handle, InstanceMask};

pub struct ResultMarker;
pub type ResultHandle = Handle<ResultMarker>;

/// Past this many crashes, a result is no longer retried and goes `Failed`
/// at the next crash instead of `Suspended` (`spec.md` §4.5, §7 "exceed
/// threshold -> FAILED"). Mirrors `FILE_XFER_FAILURE_LIMIT`'s escalate-on-
/// the-4th-failure shape.
pub const MAX_RESULT_ERROR_COUNT: u32 = 3;

/// `spec.md` §4.5: "NEW -> DOWNLOADING -> READY -> RUNNING <-> SUSPENDED ->
/// DONE -> REPORTED -> DELETABLE. Terminal failures go FAILED." Plus the
/// abort-mode state from §5 ("mark every runnable result ABORTING").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResultState {
    New,
    Downloading,
    Ready,
    Running,
    Suspended,
    Done,
    Reported,
    Deletable,
    Failed,
    Aborting,
}

impl ResultState {
    /// Validates one state-machine edge, returning the destination state on
    /// success. Every edge `spec.md` §4.5/§5/§7 names is handled explicitly;
    /// anything else is rejected rather than silently allowed.
    pub fn try_transition(self, to: ResultState) -> std::result::Result<ResultState, CoreError> {
        use ResultState::*;
        let allowed = match (self, to) {
            (New, Downloading) => true,
            (Downloading, Ready) => true,
            (Ready, Running) => true,
            (Running, Suspended) => true,
            (Suspended, Running) => true,
            (Running, Done) => true,
            (Done, Reported) => true,
            (Reported, Deletable) => true,
            // Terminal failure can be reached from any non-terminal state.
            (New | Downloading | Ready | Running | Suspended, Failed) => true,
            // Abort mode can mark any runnable (not yet done) result.
            (New | Downloading | Ready | Running | Suspended, Aborting) => true,
            (Aborting, Reported) => true,
            _ => false,
        };
        if allowed {
            Ok(to)
        } else {
            Err(CoreError::InvalidStateTransition(format!("{:?} -> {:?}", self, to)))
        }
    }

    /// Whether a result in this state currently occupies resource
    /// instances (`spec.md` §3 invariant: "no result is simultaneously in
    /// the running set and also suspended/aborted/reported").
    pub fn is_running(&self) -> bool {
        matches!(self, ResultState::Running)
    }

    pub fn is_runnable(&self) -> bool {
        matches!(self, ResultState::Ready | ResultState::Running | ResultState::Suspended)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ResultState::Failed | ResultState::Deletable)
    }
}

impl Result {
    /// Whether another crash should be treated as permanent rather than
    /// retried (`spec.md` §4.5, §7).
    pub fn error_limit_exceeded(&self) -> bool {
        self.error_count > MAX_RESULT_ERROR_COUNT
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Result {
    pub project: ProjectHandle,
    pub workunit: WorkunitHandle,
    pub app_version: AppVersionHandle,
    pub name: String,
    pub state: ResultState,

    /// Seconds since the epoch (or simulation clock) by which this result
    /// must be reported.
    pub report_deadline: f64,
    pub received_time: f64,
    pub completion_time: Option<f64>,

    pub elapsed_secs: f64,
    pub cpu_secs: f64,

    /// Set only while `state == Running`; the concrete instances this
    /// result currently occupies on its resource type.
    pub instances_used: InstanceMask,
    /// Count of instances used (for non-GPU/fractional-usage resources
    /// this may exceed `instances_used.count()`, e.g. `avg_ncpus < 1`).
    pub n_instances_used: f64,

    pub error_count: u32,
    /// `dont_throttle` results (whose app version opts out) are never
    /// preempted by the scheduler's high-priority pass (`spec.md` §4.5).
    pub dont_throttle: bool,
}

impl Result {
    pub fn new(
        project: ProjectHandle,
        workunit: WorkunitHandle,
        app_version: AppVersionHandle,
        name: impl Into<String>,
        report_deadline: f64,
    ) -> Self {
        Self {
            project,
            workunit,
            app_version,
            name: name.into(),
            state: ResultState::New,
            report_deadline,
            received_time: 0.0,
            completion_time: None,
            elapsed_secs: 0.0,
            cpu_secs: 0.0,
            instances_used: InstanceMask::EMPTY,
            n_instances_used: 0.0,
            error_count: 0,
            dont_throttle: false,
        }
    }

    pub fn set_state(&mut self, to: ResultState) -> std::result::Result<(), CoreError> {
        self.state = self.state.try_transition(to)?;
        if !matches!(self.state, ResultState::Running) {
            self.instances_used = InstanceMask::EMPTY;
        }
        Ok(())
    }
}
