// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tick Driver
//!
//! Composes the scheduling core's passes into the single per-tick
//! workflow `spec.md` §2 and §5 describe: REC decay before anything else
//! reads REC, then the RR-Sim forecast, then the two scheduling passes,
//! then at most one work-fetch RPC. Collaborator calls (`Executor`,
//! `ProjectRpc`) are awaited directly rather than fire-and-forgot, since
//! the cooperative loop's ordering guarantee depends on each pass seeing
//! the previous pass's effects (`spec.md` §5).

use std::collections::HashMap;

use core_domain::entities::app::ProjectHandle;
use core_domain::entities::result::{ResultHandle, ResultState};
use core_domain::events::{Notice, ScheduleChanged, StateChanged};
use core_domain::preferences::{GlobalPrefs, SchedulingGate};
use core_domain::services::executor::{Executor, TaskEvent};
use core_domain::services::project_rpc::ProjectRpc;
use core_domain::value_objects::project_priority;
use core_domain::{ClientState, CoreError};

use super::services::{
    absorb_reply, decay_rec, plan_work_fetch, record_rpc_failure, refresh_dont_fetch_reasons, schedule, simulate_rr, to_work_request,
    PlannedRpc, ScheduleDecision, SimOutcome, SimProject, SimResult,
};

/// Everything observable about one tick, handed to the presentation layer
/// for logging/GUI notification (`spec.md` §6).
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub state_changes: Vec<StateChanged>,
    pub schedule: ScheduleDecision,
    pub schedule_changed: Option<ScheduleChanged>,
    pub planned_rpc: Option<PlannedRpc>,
    pub notices: Vec<Notice>,
}

/// Runs exactly one tick against `state`, mutating it in place.
///
/// `horizon_secs` is the RR-Sim look-ahead window, normally
/// `(work_buf_min_days + work_buf_additional_days) * 86400` (`spec.md`
/// §4.4).
pub async fn run_tick(
    state: &mut ClientState,
    executor: &dyn Executor,
    project_rpc: &dyn ProjectRpc,
    prefs: &GlobalPrefs,
    gate: SchedulingGate,
    network_just_restored: bool,
    now: f64,
    horizon_secs: f64,
) -> std::result::Result<TickOutcome, CoreError> {
    let mut outcome = TickOutcome::default();

    // 1. REC decay runs before anything else reads REC (`spec.md` §5).
    decay_rec(state, now);

    // A network-up event temporarily clears every back-off clock without
    // resetting the doubled interval (`spec.md` §4.7, §8 S4).
    if network_just_restored {
        state.clear_temporary_backoffs();
    }

    // 2. Absorb executor lifecycle events, driving Result transitions and
    //    REC accumulation for completed/checkpointed work.
    for event in executor.poll_events().await? {
        apply_task_event(state, event, now, &mut outcome)?;
    }

    // 3. Garbage-collect files no longer referenced (`spec.md` §4.2). Pure
    //    bookkeeping; the caller's infrastructure layer does the actual
    //    unlink once told which handles were reclaimed.
    state.gc_files(now);

    // 4. Forecast fair-share outcomes over the runnable set.
    let runnable = runnable_results(state);
    let sim = simulate(state, &runnable, now, horizon_secs)?;

    // 5. Schedule: high-priority pass on RR-Sim misses, then fill by REC.
    let priorities = project_priorities(state);
    let decision = schedule(state, &sim, &runnable, &priorities, gate, prefs, now)?;
    for &handle in &decision.started {
        let result = state.result(handle)?;
        executor.start(handle, result.instances_used).await?;
    }
    for &handle in &decision.preempted {
        executor.suspend(handle).await?;
    }
    if !decision.started.is_empty() || !decision.preempted.is_empty() {
        outcome.schedule_changed = Some(ScheduleChanged { started: decision.started.clone(), preempted: decision.preempted.clone(), at: now });
    }
    outcome.schedule = decision;

    // 6. Work-fetch: at most one scheduler RPC this tick (`spec.md` §4.6).
    refresh_dont_fetch_reasons(state, gate, prefs, now)?;
    if let Some(planned) = plan_work_fetch(state, &sim, prefs, now)? {
        let request = to_work_request(state, &planned)?;
        match project_rpc.send_work_request(planned.project, request).await {
            Ok(reply) => absorb_reply(state, planned.project, &reply, now)?,
            Err(_) => record_rpc_failure(state, planned.project, now)?,
        }
        outcome.planned_rpc = Some(planned);
    }

    Ok(outcome)
}

fn apply_task_event(state: &mut ClientState, event: TaskEvent, now: f64, outcome: &mut TickOutcome) -> std::result::Result<(), CoreError> {
    match event {
        TaskEvent::Completed { result, cpu_secs, elapsed_secs } => {
            let (project, n_instances_used, rsc_type) = {
                let r = state.result(result)?;
                let rsc_type = state.app_version(r.app_version)?.rsc_type;
                (r.project, r.n_instances_used.max(1.0), rsc_type)
            };
            let relative_speed = state.resources.get(rsc_type).map(|res| res.relative_speed).unwrap_or(1.0);
            super::services::accumulate_rec(state, project, n_instances_used, relative_speed, elapsed_secs)?;
            let r = state.result_mut(result)?;
            r.cpu_secs += cpu_secs;
            r.elapsed_secs += elapsed_secs;
            r.completion_time = Some(now);
            record_transition(state, result, ResultState::Done, now, outcome)?;
            clear_deferred(state, project, rsc_type)?;
        }
        TaskEvent::Crashed { result, error } => {
            let exceeded = {
                let r = state.result_mut(result)?;
                r.error_count += 1;
                r.error_limit_exceeded()
            };
            let project = state.result(result)?.project;
            let rsc_type = state.app_version(state.result(result)?.app_version)?.rsc_type;
            outcome.notices.push(Notice { project: None, title: "task crashed".into(), description: error, created_at: now });
            if exceeded {
                record_transition(state, result, ResultState::Failed, now, outcome)?;
            } else if state.result(result)?.state != ResultState::Suspended {
                // Below the crash threshold: retry rather than fail outright
                // (`spec.md` §4.5, §7). The scheduler may re-run it next tick.
                record_transition(state, result, ResultState::Suspended, now, outcome)?;
                clear_deferred(state, project, rsc_type)?;
            }
        }
        TaskEvent::TemporaryExit { result, retry_after_secs } => {
            let project = state.result(result)?.project;
            let rsc_type = {
                let r = state.result(result)?;
                state.app_version(r.app_version)?.rsc_type
            };
            if let Some(rps) = state.project_mut(project)?.resource_state_mut(rsc_type) {
                rps.has_deferred_job = true;
                rps.backoff.backoff_time = now + retry_after_secs.max(0.0);
            }
            record_transition(state, result, ResultState::Suspended, now, outcome)?;
        }
        TaskEvent::Checkpointed { result, cpu_secs } => {
            state.result_mut(result)?.cpu_secs = cpu_secs;
        }
    }
    Ok(())
}

/// Clears `has_deferred_job` once the job that set it completes, crashes
/// (and is retried), or is aborted — the resource is no longer waiting on
/// it (`spec.md` §4.7 "DEFERRED -> OK when the deferring job completes or
/// is aborted").
fn clear_deferred(state: &mut ClientState, project: ProjectHandle, rsc_type: usize) -> std::result::Result<(), CoreError> {
    if let Some(rps) = state.project_mut(project)?.resource_state_mut(rsc_type) {
        rps.has_deferred_job = false;
    }
    Ok(())
}

fn record_transition(
    state: &mut ClientState,
    handle: ResultHandle,
    to: ResultState,
    now: f64,
    outcome: &mut TickOutcome,
) -> std::result::Result<(), CoreError> {
    let from = state.result(handle)?.state;
    state.mark_result_state(handle, to)?;
    outcome.state_changes.push(StateChanged { result: handle, from, to, at: now });
    Ok(())
}

fn runnable_results(state: &ClientState) -> Vec<ResultHandle> {
    state.results().filter(|(_, r)| r.state.is_runnable()).map(|(h, _)| h).collect()
}

fn project_priorities(state: &ClientState) -> HashMap<ProjectHandle, core_domain::value_objects::Priority> {
    state.projects().map(|(h, p)| (h, project_priority(p.rec.rec, p.resource_share))).collect()
}

fn simulate(state: &ClientState, runnable: &[ResultHandle], now: f64, horizon_secs: f64) -> std::result::Result<SimOutcome, CoreError> {
    let n_instances: Vec<u32> = state.resources.iter().map(|r| r.n_instances).collect();
    let projects: Vec<SimProject> =
        state.projects().map(|(h, p)| SimProject { project: h, rec: p.rec.rec, resource_share: p.resource_share }).collect();

    let mut results = Vec::with_capacity(runnable.len());
    for &handle in runnable {
        let result = state.result(handle)?;
        let version = state.app_version(result.app_version)?;
        let workunit = state.workunit(result.workunit)?;
        let remaining_flops = (workunit.flops_estimate - result.cpu_secs * version.flops).max(0.0);
        let remaining_secs = if version.flops > 0.0 { remaining_flops / version.flops } else { 0.0 };
        let n_instances_used = version.gpu_usage.map(|g| g.usage.ceil().max(1.0) as u32).unwrap_or_else(|| version.avg_ncpus.ceil().max(1.0) as u32);
        results.push(SimResult {
            handle,
            project: result.project,
            rsc_type: version.rsc_type,
            remaining_secs,
            report_deadline: result.report_deadline,
            n_instances_used,
        });
    }

    Ok(simulate_rr(&n_instances, &projects, &results, now, horizon_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_domain::entities::app::App;
    use core_domain::entities::app_version::AppVersion;
    use core_domain::entities::project::Project;
    use core_domain::entities::resource::{Resource, ResourceRegistry};
    use core_domain::entities::result::Result as JobResult;
    use core_domain::entities::workunit::Workunit;
    use core_domain::services::project_rpc::{WorkReply, WorkRequest};
    use core_domain::value_objects::InstanceMask;
    use std::sync::Mutex;

    struct NullExecutor {
        events: Mutex<Vec<TaskEvent>>,
    }

    #[async_trait]
    impl Executor for NullExecutor {
        async fn start(&self, _result: ResultHandle, _instances: InstanceMask) -> std::result::Result<(), CoreError> {
            Ok(())
        }
        async fn suspend(&self, _result: ResultHandle) -> std::result::Result<(), CoreError> {
            Ok(())
        }
        async fn resume(&self, _result: ResultHandle) -> std::result::Result<(), CoreError> {
            Ok(())
        }
        async fn abort(&self, _result: ResultHandle) -> std::result::Result<(), CoreError> {
            Ok(())
        }
        async fn poll_events(&self) -> std::result::Result<Vec<TaskEvent>, CoreError> {
            Ok(std::mem::take(&mut self.events.lock().unwrap()))
        }
    }

    struct NullRpc;

    #[async_trait]
    impl ProjectRpc for NullRpc {
        async fn send_work_request(&self, _project: ProjectHandle, _request: WorkRequest) -> std::result::Result<WorkReply, CoreError> {
            Ok(WorkReply::default())
        }
    }

    fn setup() -> (ClientState, ResultHandle) {
        let mut s = ClientState::new(ResourceRegistry::new(Resource::cpu(2)));
        let p = s.attach_project(Project::new("https://a/", "A")).unwrap();
        s.project_mut(p).unwrap().resource_state_mut(0).unwrap().non_excluded_instances = InstanceMask::all(2);
        let app = s.add_app(App::new(p, "app"));
        let version = s.upsert_app_version(AppVersion::new(p, app, 1, "x86_64", "default"));
        let wu = s.add_workunit(Workunit::new(p, "wu_0", 100.0));
        let mut r = JobResult::new(p, wu, version, "r0", 1_000_000.0);
        r.set_state(ResultState::Downloading).unwrap();
        r.set_state(ResultState::Ready).unwrap();
        let handle = s.add_result(r);
        (s, handle)
    }

    #[tokio::test]
    async fn a_ready_result_gets_scheduled_in_one_tick() {
        let (mut s, r) = setup();
        let executor = NullExecutor { events: Mutex::new(Vec::new()) };
        let rpc = NullRpc;

        let outcome = run_tick(&mut s, &executor, &rpc, &GlobalPrefs::default(), SchedulingGate { cpu_allowed: true, network_allowed: true, on_batteries: false, user_active: false }, false, 0.0, 864_000.0)
            .await
            .unwrap();

        assert!(outcome.schedule.started.contains(&r));
        assert_eq!(s.result(r).unwrap().state, ResultState::Running);
    }

    #[tokio::test]
    async fn crash_below_threshold_retries_instead_of_failing() {
        let (mut s, r) = setup();
        s.result_mut(r).unwrap().set_state(ResultState::Running).unwrap();
        let project = s.result(r).unwrap().project;
        s.project_mut(project).unwrap().resource_state_mut(0).unwrap().has_deferred_job = true;
        let executor = NullExecutor { events: Mutex::new(vec![TaskEvent::Crashed { result: r, error: "boom".into() }]) };
        let rpc = NullRpc;

        run_tick(&mut s, &executor, &rpc, &GlobalPrefs::default(), SchedulingGate { cpu_allowed: true, network_allowed: true, on_batteries: false, user_active: false }, false, 0.0, 864_000.0)
            .await
            .unwrap();

        assert_ne!(s.result(r).unwrap().state, ResultState::Failed, "a crash under the limit should retry, not fail outright");
        assert_eq!(s.result(r).unwrap().error_count, 1);
        assert!(!s.project(project).unwrap().resources[0].has_deferred_job, "retrying should clear the DEFERRED flag it was holding");
    }

    #[tokio::test]
    async fn crash_past_threshold_marks_failed() {
        let (mut s, r) = setup();
        s.result_mut(r).unwrap().set_state(ResultState::Running).unwrap();
        s.result_mut(r).unwrap().error_count = core_domain::entities::result::MAX_RESULT_ERROR_COUNT;
        let executor = NullExecutor { events: Mutex::new(vec![TaskEvent::Crashed { result: r, error: "boom".into() }]) };
        let rpc = NullRpc;

        run_tick(&mut s, &executor, &rpc, &GlobalPrefs::default(), SchedulingGate { cpu_allowed: true, network_allowed: true, on_batteries: false, user_active: false }, false, 0.0, 864_000.0)
            .await
            .unwrap();

        assert_eq!(s.result(r).unwrap().state, ResultState::Failed);
    }

    #[tokio::test]
    async fn completed_task_event_accumulates_rec_and_marks_done() {
        let (mut s, r) = setup();
        s.result_mut(r).unwrap().set_state(ResultState::Running).unwrap();
        let project = s.result(r).unwrap().project;
        let executor = NullExecutor { events: Mutex::new(vec![TaskEvent::Completed { result: r, cpu_secs: 50.0, elapsed_secs: 50.0 }]) };
        let rpc = NullRpc;

        run_tick(&mut s, &executor, &rpc, &GlobalPrefs::default(), SchedulingGate { cpu_allowed: true, network_allowed: true, on_batteries: false, user_active: false }, false, 100.0, 864_000.0)
            .await
            .unwrap();

        assert_eq!(s.result(r).unwrap().state, ResultState::Done);
        assert!(s.project(project).unwrap().rec.rec > 0.0);
    }
}
