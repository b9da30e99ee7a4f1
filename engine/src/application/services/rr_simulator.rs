// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Round-Robin Simulator
//!
//! A deterministic, side-effect-free forward replay of "what would execute
//! if all runnable results ran in fair-share order" (`spec.md` §4.4). It
//! never mutates `ClientState`; callers pass in a snapshot of the runnable
//! set and read the prediction back out.
//!
//! Projects are sorted once by REC priority (`spec.md` §4.3: lowest
//! REC-per-share first) and then walked round-robin, turn by turn; each
//! turn hands the project's next-by-deadline unfinished result to the
//! least-busy instance of its resource (`BusyTimeEstimator`). This is a
//! direct replay of `spec.md` §4.4's algorithm, not a closed-form
//! approximation: REC actually drives the walk order, so a project that
//! is currently ahead on credit is pushed later in every round.

use std::collections::{HashMap, HashSet};

use core_domain::entities::app::ProjectHandle;
use core_domain::entities::result::ResultHandle;
use core_domain::value_objects::project_priority;

/// One runnable result as seen by the simulator: already-resolved
/// duration and deadline, decoupled from `ClientState` so the simulator
/// stays pure (`spec.md` §4.4: "operates on a copy").
#[derive(Debug, Clone)]
pub struct SimResult {
    pub handle: ResultHandle,
    pub project: ProjectHandle,
    pub rsc_type: usize,
    pub remaining_secs: f64,
    pub report_deadline: f64,
    /// Instances this one result occupies while running, so a multi-GPU
    /// job's time is charged against that many of the resource's
    /// instances at once (`spec.md` §4.4 "to consecutive instances if
    /// `nused > 1`").
    pub n_instances_used: u32,
}

/// One project's standing for the simulation: its REC and resource share,
/// the two inputs `spec.md` §4.3's project-priority formula takes.
#[derive(Debug, Clone, Copy)]
pub struct SimProject {
    pub project: ProjectHandle,
    pub rec: f64,
    pub resource_share: f64,
}

/// Tracks, per resource instance, the simulated time until which that
/// instance is occupied. This is the `BUSY_TIME_ESTIMATOR` `spec.md` §4.4
/// names: each assignment goes to the currently least-busy instance (and
/// to `nused - 1` further instances when a job uses more than one), and
/// the estimator's "overall busy time" is the minimum across instances —
/// the point before which every instance is guaranteed occupied.
#[derive(Debug, Clone)]
pub struct BusyTimeEstimator {
    busy_until: Vec<f64>,
}

impl BusyTimeEstimator {
    pub fn new(n_instances: u32, start: f64) -> Self {
        Self { busy_until: vec![start; n_instances.max(1) as usize] }
    }

    /// Charges `duration` starting now against the least-busy instance,
    /// and against `n_instances_used - 1` further instances (consecutive
    /// from there, wrapping) when the job spans more than one. Returns the
    /// finish time of the (first, least-busy) instance used.
    pub fn add_duration(&mut self, duration: f64, n_instances_used: u32) -> f64 {
        let len = self.busy_until.len();
        let span = n_instances_used.max(1).min(len as u32) as usize;
        let start_idx = self.least_busy_index();
        let start_time = self.busy_until[start_idx];
        let finish = start_time + duration;
        for offset in 0..span {
            let idx = (start_idx + offset) % len;
            self.busy_until[idx] = self.busy_until[idx].max(start_time) + duration;
        }
        finish
    }

    fn least_busy_index(&self) -> usize {
        self.busy_until
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(i, _)| i)
            .unwrap_or(0)
    }

    /// The minimum busy-until across instances: before this point every
    /// instance is occupied (`spec.md` §4.4 "overall busy time is the
    /// minimum across instances").
    pub fn overall_busy_until(&self) -> f64 {
        self.busy_until.iter().cloned().fold(f64::INFINITY, f64::min)
    }

    pub fn per_instance_busy_until(&self) -> &[f64] {
        &self.busy_until
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimOutcome {
    pub finish_times: HashMap<ResultHandle, f64>,
    /// Results whose predicted finish time exceeds their deadline
    /// (`spec.md` §3 invariant, §4.4, §8 S2), sorted by deadline
    /// ascending as the scheduler's high-priority pass requires.
    pub missed: Vec<ResultHandle>,
    /// Idle instance-seconds over the horizon, per `rsc_type`
    /// (`spec.md` §4.4 "shortfall").
    pub shortfall_secs: Vec<f64>,
    /// The latest simulated time, per `rsc_type`, at which every instance
    /// of that resource is still predicted busy (`spec.md` §4.4
    /// "saturated_time"). Never exceeds `now + horizon_secs`.
    pub saturated_time: Vec<f64>,
}

/// Runs the simulation for every resource independently.
///
/// `n_instances` is indexed by `rsc_type` (same indexing as
/// `ResourceRegistry`). `now` and `horizon_secs` bound the look-ahead
/// window `W` (`spec.md` §4.4: "sum of `work_buf_min_days` and
/// `work_buf_additional_days`").
pub fn simulate(n_instances: &[u32], projects: &[SimProject], results: &[SimResult], now: f64, horizon_secs: f64) -> SimOutcome {
    let horizon_end = now + horizon_secs;
    let mut outcome = SimOutcome {
        shortfall_secs: vec![0.0; n_instances.len()],
        saturated_time: vec![now; n_instances.len()],
        ..Default::default()
    };

    // Sort projects once by REC priority (`spec.md` §4.3): lowest
    // REC-per-share runs first in every round.
    let mut project_order: Vec<ProjectHandle> = projects.iter().map(|p| p.project).collect();
    let priority: HashMap<ProjectHandle, _> = projects.iter().map(|p| (p.project, project_priority(p.rec, p.resource_share))).collect();
    project_order.sort_by(|a, b| priority[b].cmp(&priority[a]));

    for (rsc_type, &capacity) in n_instances.iter().enumerate() {
        let mut per_project: HashMap<ProjectHandle, Vec<&SimResult>> = HashMap::new();
        for r in results.iter().filter(|r| r.rsc_type == rsc_type) {
            per_project.entry(r.project).or_default().push(r);
        }
        if per_project.is_empty() {
            outcome.shortfall_secs[rsc_type] = capacity as f64 * horizon_secs;
            outcome.saturated_time[rsc_type] = now;
            continue;
        }
        for queue in per_project.values_mut() {
            queue.sort_by(|a, b| a.report_deadline.total_cmp(&b.report_deadline));
            queue.reverse(); // pop_front-by-pop: front of the walk is last in the Vec
        }

        let active: Vec<ProjectHandle> = project_order.iter().copied().filter(|p| per_project.contains_key(p)).collect();
        let mut exhausted: HashSet<ProjectHandle> = HashSet::new();
        let mut estimator = BusyTimeEstimator::new(capacity, now);
        let mut turn = 0usize;

        // Round-robin walk: one result handed off per project per turn,
        // in REC priority order, until either every project's queue for
        // this resource is empty or every instance is saturated through
        // the horizon (`spec.md` §4.4).
        while exhausted.len() < active.len() && estimator.overall_busy_until() < horizon_end {
            let project = active[turn % active.len()];
            turn += 1;
            if exhausted.contains(&project) {
                continue;
            }
            let queue = per_project.get_mut(&project).expect("active project always has a queue");
            let Some(result) = queue.pop() else {
                exhausted.insert(project);
                continue;
            };
            let finish = estimator.add_duration(result.remaining_secs, result.n_instances_used);
            outcome.finish_times.insert(result.handle, finish);
            if finish > result.report_deadline {
                outcome.missed.push(result.handle);
            }
            if queue.is_empty() {
                exhausted.insert(project);
            }
        }

        outcome.saturated_time[rsc_type] = estimator.overall_busy_until().clamp(now, horizon_end);
        outcome.shortfall_secs[rsc_type] = estimator.per_instance_busy_until().iter().map(|&busy| (horizon_end - busy).max(0.0)).sum();
    }

    outcome.missed.sort_by(|a, b| {
        let da = outcome.finish_times.get(a).copied().unwrap_or(f64::INFINITY);
        let db = outcome.finish_times.get(b).copied().unwrap_or(f64::INFINITY);
        da.total_cmp(&db)
    });
    outcome
}
