// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # REC Accountant
//!
//! Maintains recent estimated credit per project (`spec.md` §4.3). Decay
//! and accumulation are kept as two explicit, separately-callable passes
//! so the tick loop can enforce the ordering guarantee in `spec.md` §5:
//! "REC decay for all projects happens before any component reads REC in
//! the same tick."

use core_domain::entities::app::ProjectHandle;
use core_domain::{ClientState, CoreError};

/// REC decay half-life, fixed at 10 days (`spec.md` §4.3 resolved Open
/// Question, `SPEC_FULL.md` §9.1).
pub const REC_HALF_LIFE_SECS: f64 = 10.0 * 86400.0;

/// Applies exponential decay to every project's REC in one pass
/// (`spec.md` §4.3 item 1, §8 property 3: "decay is strictly
/// non-increasing"). Must run before any other component of the tick
/// reads REC.
pub fn decay_all(state: &mut ClientState, now: f64) {
    let handles: Vec<ProjectHandle> = state.projects().map(|(h, _)| h).collect();
    for handle in handles {
        let Ok(project) = state.project_mut(handle) else { continue };
        let dt = (now - project.rec.rec_time).max(0.0);
        if dt > 0.0 {
            project.rec.rec *= (-dt / REC_HALF_LIFE_SECS).exp();
        }
        project.rec.rec_time = now;
    }
}

/// Attributes `elapsed_secs` of execution on `resource_rsc_type` at
/// `relative_speed` to `project`'s REC (`spec.md` §4.3 item 2:
/// accumulation is `Δ × (n_instances_used × relative_speed)`).
pub fn accumulate(
    state: &mut ClientState,
    project: ProjectHandle,
    n_instances_used: f64,
    relative_speed: f64,
    elapsed_secs: f64,
) -> std::result::Result<(), CoreError> {
    if elapsed_secs < 0.0 {
        return Err(CoreError::invariant("negative elapsed time cannot accumulate REC"));
    }
    let credit = elapsed_secs * n_instances_used.max(0.0) * relative_speed.max(0.0);
    state.project_mut(project)?.rec.rec += credit;
    Ok(())
}
