// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Work-Fetch Planner
//!
//! Decides, once per tick, whether to send at most one scheduler RPC and
//! to which project (`spec.md` §4.6). Computes each (project, resource)
//! pair's `DontFetchReason`, picks the highest-priority eligible project
//! per resource short on work, and sizes the request from the RR-Sim
//! shortfall and the configured work buffer.

use core_domain::entities::app::ProjectHandle;
use core_domain::entities::resource_project_state::DontFetchReason;
use core_domain::preferences::{GlobalPrefs, SchedulingGate};
use core_domain::services::project_rpc::{WorkReply, WorkRequest, WorkRequestItem};
use core_domain::value_objects::{project_priority, Priority};
use core_domain::{ClientState, CoreError};

use super::rr_simulator::SimOutcome;
use super::scheduler::occupied_mask;

/// One planned scheduler RPC for this tick (`spec.md` §4.6: "the planner
/// issues at most one scheduler RPC per tick"). `items` may be empty for
/// a pure piggyback ack with no additional work requested.
#[derive(Debug, Clone)]
pub struct PlannedRpc {
    pub project: ProjectHandle,
    pub items: Vec<WorkRequestItem>,
    pub piggybacked: bool,
}

/// Recomputes `DontFetchReason` for every (project, resource) pair,
/// storing the result back onto each project's `ResourceProjectState`
/// (`spec.md` §4.6). Must run before [`plan`] so project eligibility
/// reflects this tick's state.
pub fn refresh_dont_fetch_reasons(
    state: &mut ClientState,
    gate: SchedulingGate,
    prefs: &GlobalPrefs,
    now: f64,
) -> std::result::Result<(), CoreError> {
    let n_resources = state.resources.len();
    let project_handles: Vec<ProjectHandle> = state.projects().map(|(h, _)| h).collect();

    for project in project_handles {
        for rsc_type in 0..n_resources {
            let reason = compute_dont_fetch_reason(state, project, rsc_type, gate, prefs, now)?;
            if let Some(rps) = state.project_mut(project)?.resource_state_mut(rsc_type) {
                rps.reason = reason;
            }
        }
    }
    Ok(())
}

fn compute_dont_fetch_reason(
    state: &ClientState,
    project: ProjectHandle,
    rsc_type: usize,
    gate: SchedulingGate,
    prefs: &GlobalPrefs,
    now: f64,
) -> std::result::Result<DontFetchReason, CoreError> {
    let p = state.project(project)?;

    if p.suspended {
        return Ok(DontFetchReason::SuspendedViaGui);
    }
    if p.dont_request_more_work {
        return Ok(DontFetchReason::DontRequestMoreWork);
    }
    if p.master_url_fetch_pending {
        return Ok(DontFetchReason::MasterUrlFetchPending);
    }
    if now < p.min_rpc_time {
        return Ok(DontFetchReason::MinRpcTime);
    }
    if p.download_stalled {
        return Ok(DontFetchReason::DownloadStalled);
    }
    if p.too_many_uploads {
        return Ok(DontFetchReason::TooManyUploads);
    }

    let allowed = if rsc_type == 0 { gate.cpu_scheduling_allowed(prefs, now) } else { gate.gpu_scheduling_allowed() };
    if !allowed {
        return Ok(DontFetchReason::PrefsDisallow);
    }

    let resource = state.resources.get(rsc_type);
    let Some(resource) = resource else { return Ok(DontFetchReason::NoResourcesUsable) };
    if resource.n_instances == 0 {
        return Ok(DontFetchReason::NoResourcesUsable);
    }

    let Some(rps) = p.resource_state(rsc_type) else { return Ok(DontFetchReason::NoResourcesUsable) };
    if rps.non_excluded_instances.is_empty() {
        return Ok(DontFetchReason::NoNonExcludedInstances);
    }
    if rps.backoff.is_backed_off(now) {
        return Ok(DontFetchReason::BackedOff);
    }
    if rps.has_deferred_job {
        return Ok(DontFetchReason::DeferScheduled);
    }
    if p.resource_share <= 0.0 {
        return Ok(DontFetchReason::ZeroShare);
    }

    Ok(DontFetchReason::None)
}

/// Builds at most one [`PlannedRpc`] for this tick: among projects with
/// `DontFetchReason::None` on some resource short of work (per `sim`'s
/// shortfall and the configured work buffer), picks the one with the
/// highest priority (lowest REC-per-share), ties broken by `master_url`
/// (`spec.md` §4.3, §4.6).
pub fn plan(state: &ClientState, sim: &SimOutcome, prefs: &GlobalPrefs, now: f64) -> std::result::Result<Option<PlannedRpc>, CoreError> {
    let buffer_secs = (prefs.work_buf_min_days + prefs.work_buf_additional_days) * 86400.0;

    let mut best: Option<(ProjectHandle, Priority)> = None;
    let mut best_items: Vec<WorkRequestItem> = Vec::new();

    for (project_handle, project) in state.projects() {
        let mut items = Vec::new();
        for (rsc_type, rps) in project.resources.iter().enumerate() {
            if !rps.reason.is_ok_to_fetch() {
                continue;
            }
            let shortfall = sim.shortfall_secs.get(rsc_type).copied().unwrap_or(0.0);
            let requested = shortfall.min(buffer_secs);
            if requested > 0.0 {
                let idle = rps.non_excluded_instances.difference(&occupied_mask(state, rsc_type)).count();
                items.push(WorkRequestItem { rsc_type, requested_instance_seconds: requested, req_instances: idle });
            }
        }
        if items.is_empty() {
            continue;
        }

        let priority = project_priority(project.rec.rec, project.resource_share);
        let better = match &best {
            None => true,
            Some((current_handle, current_priority)) => {
                priority > *current_priority
                    || (priority == *current_priority && project.master_url < state.project(*current_handle)?.master_url)
            }
        };
        if better {
            best = Some((project_handle, priority));
            best_items = items;
        }
    }

    Ok(best.map(|(project, _)| PlannedRpc { project, items: best_items, piggybacked: false }))
}

/// Converts a [`PlannedRpc`] into the wire-level [`WorkRequest`] for the
/// `ProjectRpc` collaborator.
pub fn to_work_request(state: &ClientState, rpc: &PlannedRpc) -> std::result::Result<WorkRequest, CoreError> {
    let project = state.project(rpc.project)?;
    Ok(WorkRequest { master_url: project.master_url.clone(), items: rpc.items.clone(), piggybacked: rpc.piggybacked })
}

/// Absorbs a `WorkReply` into `ClientState`: applies the min-RPC-time and
/// resource-share updates, clears or escalates the scheduler-RPC backoff,
/// and reports whether the project asked to stop being contacted
/// (`spec.md` §4.6).
pub fn absorb_reply(state: &mut ClientState, project: ProjectHandle, reply: &WorkReply, now: f64) -> std::result::Result<(), CoreError> {
    let p = state.project_mut(project)?;
    p.scheduler_rpc_backoff.on_success();
    if let Some(min_rpc_time) = reply.min_rpc_time {
        p.min_rpc_time = now + min_rpc_time.max(0.0);
    }
    if let Some(share) = reply.new_resource_share {
        p.resource_share = share.max(0.0);
    }
    if reply.no_more_work {
        p.dont_request_more_work = true;
    }
    Ok(())
}

/// Records a failed scheduler RPC: doubles the project's scheduler-RPC
/// back-off (`spec.md` §7 "Scheduler RPC error", §8 S4).
pub fn record_rpc_failure(state: &mut ClientState, project: ProjectHandle, now: f64) -> std::result::Result<(), CoreError> {
    state.project_mut(project)?.scheduler_rpc_backoff.on_failure(now);
    Ok(())
}
