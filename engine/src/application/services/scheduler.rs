// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CPU+GPU Scheduler
//!
//! Decides which runnable results become running tasks this tick
//! (`spec.md` §4.5). Operates in two passes: a high-priority pass for
//! RR-Sim's deadline-miss predictions, then a normal round-robin-by-REC
//! pass to fill remaining capacity.

use std::collections::HashMap;

use core_domain::entities::app::ProjectHandle;
use core_domain::entities::app_version::{is_non_cpu_intensive, AppHandle};
use core_domain::entities::result::{ResultHandle, ResultState};
use core_domain::preferences::{GlobalPrefs, SchedulingGate};
use core_domain::value_objects::{InstanceMask, Priority};
use core_domain::{ClientState, CoreError};

use super::rr_simulator::SimOutcome;

/// The outcome of one scheduling pass, applied to `ClientState` by the
/// caller and reported as a `ScheduleChanged` event (`spec.md` §6).
#[derive(Debug, Default)]
pub struct ScheduleDecision {
    pub started: Vec<ResultHandle>,
    pub preempted: Vec<ResultHandle>,
}

struct Candidate {
    handle: ResultHandle,
    rsc_type: usize,
    instances_needed: u32,
    app: AppHandle,
    dont_throttle: bool,
}

/// Runs both scheduling passes and applies the resulting transitions
/// directly to `state`. `runnable` lists every `Ready`/`Suspended` result
/// eligible to run this tick (already filtered by project
/// suspension/eligibility by the caller); `priorities` gives each
/// project's current REC priority (`spec.md` §4.3).
pub fn schedule(
    state: &mut ClientState,
    sim: &SimOutcome,
    runnable: &[ResultHandle],
    priorities: &HashMap<ProjectHandle, Priority>,
    gate: SchedulingGate,
    prefs: &GlobalPrefs,
    now: f64,
) -> std::result::Result<ScheduleDecision, CoreError> {
    let mut decision = ScheduleDecision::default();

    // -- High-priority pass: RR-Sim deadline misses, earliest deadline first.
    for &handle in &sim.missed {
        if !runnable.contains(&handle) {
            continue;
        }
        let result = state.result(handle)?.clone();
        if result.state == ResultState::Running {
            continue;
        }
        let version = state.app_version(result.app_version)?.clone();
        if !resource_scheduling_allowed(version.rsc_type, gate, prefs, now) {
            continue;
        }
        let app = state.app(version.app)?;
        let instances_needed = required_instances(&version, app);

        if try_start(state, handle, version.rsc_type, instances_needed, version.dont_throttle)? {
            decision.started.push(handle);
            continue;
        }
        if let Some(victim) = find_preemptible(state, version.rsc_type, instances_needed)? {
            state.mark_result_state(victim, ResultState::Suspended)?;
            decision.preempted.push(victim);
            if try_start(state, handle, version.rsc_type, instances_needed, version.dont_throttle)? {
                decision.started.push(handle);
            }
        }
    }

    // -- Normal pass: round-robin by REC priority, respecting per-app caps.
    let mut projects_in_priority_order: Vec<ProjectHandle> = priorities.keys().copied().collect();
    projects_in_priority_order.sort_by(|a, b| {
        let pa = priorities.get(a).copied().unwrap_or(Priority::new(f64::NEG_INFINITY));
        let pb = priorities.get(b).copied().unwrap_or(Priority::new(f64::NEG_INFINITY));
        // Ties broken by master_url lexicographically (`spec.md` §4.3).
        pb.cmp(&pa).then_with(|| {
            let ma = state.project(*a).map(|p| &p.master_url);
            let mb = state.project(*b).map(|p| &p.master_url);
            ma.ok().cmp(&mb.ok())
        })
    });

    let mut running_per_app: HashMap<AppHandle, u32> = HashMap::new();
    for (_, result) in state.running_results() {
        let version = state.app_version(result.app_version)?;
        *running_per_app.entry(version.app).or_insert(0) += 1;
    }

    loop {
        let mut progressed = false;
        for &project in &projects_in_priority_order {
            let Some(candidate) = next_runnable_for_project(state, project, runnable, &decision.started)? else { continue };
            if !resource_scheduling_allowed(candidate.rsc_type, gate, prefs, now) {
                continue;
            }
            let app = state.app(candidate.app)?;
            if let Some(cap) = app.max_concurrent {
                if *running_per_app.get(&candidate.app).unwrap_or(&0) >= cap {
                    continue;
                }
            }
            if try_start(state, candidate.handle, candidate.rsc_type, candidate.instances_needed, candidate.dont_throttle)? {
                decision.started.push(candidate.handle);
                *running_per_app.entry(candidate.app).or_insert(0) += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    Ok(decision)
}

fn resource_scheduling_allowed(rsc_type: usize, gate: SchedulingGate, prefs: &GlobalPrefs, now: f64) -> bool {
    if rsc_type == 0 {
        gate.cpu_scheduling_allowed(prefs, now)
    } else {
        gate.gpu_scheduling_allowed()
    }
}

/// Instances of `version.rsc_type` a running copy of this task occupies.
/// Non-CPU-intensive apps (`spec.md` §4.5 "non_cpu_intensive apps do not
/// count against CPU instance capacity") run without reserving a CPU
/// instance at all; GPU usage is unaffected since the flag only exempts
/// CPU accounting.
fn required_instances(version: &core_domain::entities::app_version::AppVersion, app: &core_domain::entities::app::App) -> u32 {
    if version.rsc_type == 0 && is_non_cpu_intensive(app) {
        return 0;
    }
    version.gpu_usage.map(|g| g.usage.ceil().max(1.0) as u32).unwrap_or_else(|| version.avg_ncpus.ceil().max(1.0) as u32)
}

/// Attempts to move `handle` into `Running`, occupying the first `n`
/// available non-excluded instances of `rsc_type`. Returns `false` (no
/// state change) if insufficient free instances exist.
fn try_start(
    state: &mut ClientState,
    handle: ResultHandle,
    rsc_type: usize,
    instances_needed: u32,
    dont_throttle: bool,
) -> std::result::Result<bool, CoreError> {
    let project = state.result(handle)?.project;

    let used_mask = occupied_mask(state, rsc_type);
    let non_excluded = state.project(project)?.resource_state(rsc_type).map(|r| r.non_excluded_instances).unwrap_or(InstanceMask::EMPTY);
    let available = non_excluded.difference(&used_mask);
    let Some(picked) = available.pick(instances_needed, &InstanceMask::EMPTY) else { return Ok(false) };

    state.mark_result_state(handle, ResultState::Running)?;
    let result = state.result_mut(handle)?;
    result.instances_used = picked;
    result.n_instances_used = instances_needed as f64;
    result.dont_throttle = dont_throttle;
    Ok(true)
}

/// Union of instance masks held by every currently running result on
/// `rsc_type`. Shared with the work-fetch planner so a project's
/// `req_instances` reflects the same occupancy view the scheduler uses
/// (`spec.md` §4.6 item 3).
pub(crate) fn occupied_mask(state: &ClientState, rsc_type: usize) -> InstanceMask {
    let mut mask = InstanceMask::EMPTY;
    for (_, result) in state.running_results() {
        if let Ok(version) = state.app_version(result.app_version) {
            if version.rsc_type == rsc_type {
                mask = mask.union(&result.instances_used);
            }
        }
    }
    mask
}

/// Finds a running result on `rsc_type` eligible to be preempted: not
/// `dont_throttle`, and freeing it would yield enough instances
/// (`spec.md` §4.5 "pre-emption is permitted... if its app version does
/// not set `dont_throttle`").
fn find_preemptible(state: &ClientState, rsc_type: usize, instances_needed: u32) -> std::result::Result<Option<ResultHandle>, CoreError> {
    for (handle, result) in state.running_results() {
        let version = state.app_version(result.app_version)?;
        if version.rsc_type == rsc_type && !version.dont_throttle && result.instances_used.count() >= instances_needed {
            return Ok(Some(handle));
        }
    }
    Ok(None)
}

fn next_runnable_for_project(
    state: &ClientState,
    project: ProjectHandle,
    runnable: &[ResultHandle],
    already_started: &[ResultHandle],
) -> std::result::Result<Option<Candidate>, CoreError> {
    for &handle in runnable {
        if already_started.contains(&handle) {
            continue;
        }
        let result = state.result(handle)?;
        if result.project != project || result.state == ResultState::Running {
            continue;
        }
        let version = state.app_version(result.app_version)?;
        let app = state.app(version.app)?;
        return Ok(Some(Candidate {
            handle,
            rsc_type: version.rsc_type,
            instances_needed: required_instances(version, app),
            app: version.app,
            dont_throttle: version.dont_throttle,
        }));
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_domain::entities::app::App;
    use core_domain::entities::app_version::AppVersion;
    use core_domain::entities::project::Project;
    use core_domain::entities::resource::{Resource, ResourceRegistry};
    use core_domain::entities::result::Result as JobResult;
    use core_domain::entities::workunit::Workunit;

    fn gate() -> SchedulingGate {
        SchedulingGate { cpu_allowed: true, network_allowed: true, on_batteries: false, user_active: false }
    }

    fn setup(n_cpus: u32) -> (ClientState, ProjectHandle) {
        let mut s = ClientState::new(ResourceRegistry::new(Resource::cpu(n_cpus)));
        let p = s.attach_project(Project::new("https://a/", "A")).unwrap();
        s.project_mut(p).unwrap().resource_state_mut(0).unwrap().non_excluded_instances = InstanceMask::all(n_cpus);
        (s, p)
    }

    fn add_runnable_result(s: &mut ClientState, project: ProjectHandle, app: AppHandle, version: core_domain::entities::app_version::AppVersionHandle, name: &str) -> ResultHandle {
        let wu = s.add_workunit(Workunit::new(project, name, 1.0e9));
        let _ = app;
        let mut r = JobResult::new(project, wu, version, name, 100_000.0);
        r.set_state(ResultState::Downloading).unwrap();
        r.set_state(ResultState::Ready).unwrap();
        s.add_result(r)
    }

    #[test]
    fn high_priority_pass_runs_deadline_missed_results() {
        let (mut s, p) = setup(4);
        let app = s.add_app(App::new(p, "app"));
        let version = s.upsert_app_version(AppVersion::new(p, app, 1, "x86_64", "default"));
        let r = add_runnable_result(&mut s, p, app, version, "r0");

        let sim = SimOutcome { missed: vec![r], ..Default::default() };
        let mut priorities = HashMap::new();
        priorities.insert(p, Priority::new(0.0));

        let decision = schedule(&mut s, &sim, &[r], &priorities, gate(), &GlobalPrefs::default(), 0.0).unwrap();
        assert_eq!(decision.started, vec![r]);
        assert_eq!(s.result(r).unwrap().state, ResultState::Running);
    }

    #[test]
    fn max_concurrent_caps_simultaneous_running_tasks() {
        let (mut s, p) = setup(4);
        let app = s.add_app(App::new(p, "app"));
        s.app_mut(app).unwrap().max_concurrent = Some(2);
        let version = s.upsert_app_version(AppVersion::new(p, app, 1, "x86_64", "default"));
        let handles: Vec<ResultHandle> = (0..4).map(|i| add_runnable_result(&mut s, p, app, version, &format!("r{i}"))).collect();

        let sim = SimOutcome::default();
        let mut priorities = HashMap::new();
        priorities.insert(p, Priority::new(0.0));
        let decision = schedule(&mut s, &sim, &handles, &priorities, gate(), &GlobalPrefs::default(), 0.0).unwrap();
        assert_eq!(decision.started.len(), 2, "max_concurrent=2 must cap the running set even with 4 free CPU instances");
    }

    #[test]
    fn non_cpu_intensive_app_does_not_consume_a_cpu_instance() {
        let (mut s, p) = setup(1);
        let mut app = App::new(p, "screensaver");
        app.non_cpu_intensive = true;
        let app = s.add_app(app);
        let version = s.upsert_app_version(AppVersion::new(p, app, 0, "x86_64", "default"));
        let r0 = add_runnable_result(&mut s, p, app, version, "r0");
        let r1 = add_runnable_result(&mut s, p, app, version, "r1");

        let sim = SimOutcome::default();
        let mut priorities = HashMap::new();
        priorities.insert(p, Priority::new(0.0));
        let decision = schedule(&mut s, &sim, &[r0, r1], &priorities, gate(), &GlobalPrefs::default(), 0.0).unwrap();
        assert_eq!(decision.started.len(), 2, "non_cpu_intensive tasks must not be capped by the single CPU instance");
        assert!(s.result(r0).unwrap().instances_used.is_empty());
    }

    #[test]
    fn gpu_scheduling_proceeds_even_while_on_batteries() {
        let (mut s, p) = setup(1);
        let app = s.add_app(App::new(p, "gpu-app"));
        let mut version = AppVersion::new(p, app, 1, "x86_64", "cuda");
        version.rsc_type = 1;
        version.gpu_usage = Some(core_domain::entities::app_version::GpuUsage { rsc_type: 1, usage: 1.0 });
        let version = s.upsert_app_version(version);
        s.project_mut(p).unwrap().resources[1].non_excluded_instances = InstanceMask::all(1);
        let r = add_runnable_result(&mut s, p, app, version, "r0");

        let gate = SchedulingGate { cpu_allowed: true, network_allowed: true, on_batteries: true, user_active: false };
        let prefs = GlobalPrefs { run_on_batteries: false, ..GlobalPrefs::default() };
        let sim = SimOutcome::default();
        let mut priorities = HashMap::new();
        priorities.insert(p, Priority::new(0.0));

        let decision = schedule(&mut s, &sim, &[r], &priorities, gate, &prefs, 0.0).unwrap();
        assert_eq!(decision.started, vec![r]);
    }
}
