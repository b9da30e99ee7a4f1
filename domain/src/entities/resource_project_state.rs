// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Per-(project, resource) work-fetch state, ported from
//! `RSC_PROJECT_WORK_FETCH` in `original_source/client/work_fetch.h`
//! (`spec.md` §3 `ResourceProjectState` row).

use serde::{Deserialize, Serialize};

use crate::value_objects::{BackoffState, InstanceMask};

/// Why a (project, resource) pair is currently ineligible for a work
/// request. A closed enum, never a bare integer
/// (`CANT_FETCH_WORK_*`/`DONT_FETCH_*` in `original_source/client/
/// work_fetch.h`; `spec.md` §9 Design Notes: "closed tagged variants with
/// exhaustive handling; never integer compare").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DontFetchReason {
    None,
    NonCpuIntensive,
    SuspendedViaGui,
    MasterUrlFetchPending,
    MinRpcTime,
    DontRequestMoreWork,
    DownloadStalled,
    ResultSuspended,
    TooManyUploads,
    NotHighestPriority,
    TooManyRunnable,
    NoResourcesUsable,
    PrefsDisallow,
    ConfigDisallow,
    NoApps,
    ZeroShare,
    BufferFull,
    BackedOff,
    DeferScheduled,
    NoNonExcludedInstances,
}

impl DontFetchReason {
    pub fn is_ok_to_fetch(&self) -> bool {
        matches!(self, DontFetchReason::None)
    }
}

impl Default for DontFetchReason {
    fn default() -> Self {
        DontFetchReason::None
    }
}

/// Work-fetch bookkeeping for one (project, resource type) pair.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceProjectState {
    /// Persistent (`spec.md` §3): survives a save/load round trip.
    pub backoff: BackoffState,

    /// Instances this project's jobs may run on for this resource
    /// (`spec.md` §3 invariant: chosen instances must be a subset of this).
    pub non_excluded_instances: InstanceMask,

    /// Runnable job count for this (project, resource) pair, refreshed each
    /// RR-Sim pass.
    pub n_runnable_jobs: u32,

    /// Set when a fetched job of this resource type called
    /// `temporary_exit()` (`spec.md` §4.7: `OK -> DEFERRED`).
    pub has_deferred_job: bool,

    /// Zero (`None`) iff OK to ask this project for this resource
    /// (`spec.md` §4.6).
    pub reason: DontFetchReason,

    /// Instance-seconds of queued/running work estimated for this pair,
    /// used by the work-fetch planner's request sizing.
    pub queue_est: f64,
}

impl ResourceProjectState {
    pub fn is_eligible(&self, now: f64) -> bool {
        self.reason.is_ok_to_fetch() && !self.backoff.is_backed_off(now) && !self.has_deferred_job
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eligible_only_when_reason_none_and_not_backed_off_and_not_deferred() {
        let mut s = ResourceProjectState::default();
        assert!(s.is_eligible(0.0));

        s.backoff.on_failure(0.0);
        assert!(!s.is_eligible(0.0));

        s.backoff.on_success();
        s.has_deferred_job = true;
        assert!(!s.is_eligible(0.0));

        s.has_deferred_job = false;
        s.reason = DontFetchReason::SuspendedViaGui;
        assert!(!s.is_eligible(0.0));
    }
}
