// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # BOINC-Style Scheduling Core — Entry Point
//!
//! Wires `bootstrap` (CLI parsing, platform abstraction, signal handling,
//! graceful shutdown) to `infrastructure` (config, metrics, state store,
//! collaborator adapters) and drives `application::run_tick` in a loop
//! until a shutdown signal arrives (`spec.md` §5, §6, §9 Design Notes).
//!
//! Running with no subcommand starts the daemon. Running with `status`,
//! `attach`, or `detach` loads the state file, applies the command, saves
//! it back, and exits (`spec.md` §9 Design Notes).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use core_bootstrap::exit_code::ExitCode;
use core_bootstrap::platform::create_platform;
use core_bootstrap::shutdown::ShutdownCoordinator;
use core_bootstrap::signals::{create_signal_handler, SystemSignals};
use core_domain::entities::resource::{build_resource, correlate_vendor, Resource, ResourceRegistry, DEFAULT_CPU_GFLOPS_PER_CORE};
use core_domain::entities::result::ResultState;
use core_domain::preferences::{CcConfig, GlobalPrefs, SchedulingGate};
use core_domain::services::executor::Executor;
use core_domain::services::resource_probe::ResourceProbe;
use core_domain::services::state_store::StateStore;
use core_domain::value_objects::ResourceKind;
use core_domain::ClientState;

use core_engine::infrastructure::adapters::{OfflineExecutor, OfflineProjectRpc, ProcessResourceProbe};
use core_engine::infrastructure::config::ConfigService;
use core_engine::infrastructure::metrics::CoreMetrics;
use core_engine::infrastructure::runtime::{run_tick_loop, TickLoopConfig};
use core_engine::infrastructure::state_store::TaggedRecordStore;
use core_engine::presentation::cli::{attach_project, detach_project, render_status, AdminCommand, EngineCli};

fn now_secs() -> f64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).unwrap_or_default().as_secs_f64()
}

#[tokio::main]
async fn main() {
    let cli = EngineCli::parse();
    init_tracing(cli.run.verbose);

    let exit = run(cli).await;
    std::process::exit(exit.as_i32());
}

async fn run(cli: EngineCli) -> ExitCode {
    let run_args = cli.run.clone();
    let platform = create_platform();
    let cpu_count = platform.cpu_count() as u32;

    let cc_config_path = run_args.cc_config.clone().unwrap_or_else(|| run_args.data_dir.join("cc_config.xml"));
    let global_prefs_path = run_args.global_prefs.clone().unwrap_or_else(|| run_args.data_dir.join("global_prefs.xml"));
    let (cc_config, cc_notice) = ConfigService::load_cc_config(&cc_config_path);
    let (global_prefs, prefs_notice) = ConfigService::load_global_prefs(&global_prefs_path);
    for notice in [cc_notice, prefs_notice].into_iter().flatten() {
        tracing::warn!(title = %notice.title, description = %notice.description, "configuration notice");
    }

    let store = TaggedRecordStore::new(run_args.data_dir.join("client_state.dat"));
    let mut state = match store.load().await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to load client state");
            return ExitCode::DataError;
        }
    };
    if state.resources.is_empty() {
        state.resources = ResourceRegistry::new(Resource::cpu(cpu_count));
    }

    if let Some(command) = cli.command {
        return run_admin_command(command, &mut state, &store, &cc_config).await;
    }

    run_daemon(run_args.max_tick_interval_secs, run_args.abort_jobs_on_exit, global_prefs, cc_config, state, store).await
}

async fn run_admin_command(command: AdminCommand, state: &mut ClientState, store: &TaggedRecordStore, cc_config: &CcConfig) -> ExitCode {
    let result = match command {
        AdminCommand::Status => {
            println!("{}", render_status(state));
            Ok(())
        }
        AdminCommand::Attach { master_url, project_name } => attach_project(state, &master_url, &project_name, &cc_config.gpu_exclude_instances),
        AdminCommand::Detach { master_url } => detach_project(state, &master_url),
    };
    if let Err(e) = result {
        tracing::error!(error = %e, "admin command failed");
        return ExitCode::DataError;
    }
    if let Err(e) = store.save(state).await {
        tracing::error!(error = %e, "failed to persist client state");
        return ExitCode::IoError;
    }
    ExitCode::Success
}

async fn run_daemon(max_tick_interval_secs: u64, abort_jobs_on_exit: bool, global_prefs: GlobalPrefs, cc_config: CcConfig, mut state: ClientState, store: TaggedRecordStore) -> ExitCode {
    let probe_exe = std::env::var_os("BOINC_PROBE_EXE").map(PathBuf::from).unwrap_or_else(|| PathBuf::from("boinc_probe_helper"));
    let probe = ProcessResourceProbe::new(probe_exe, state.resources.cpu().n_instances);
    let cpu_peak_flops = state.resources.cpu().n_instances as f64 * DEFAULT_CPU_GFLOPS_PER_CORE * 1e9;
    let mut detected_any = false;
    for kind in [ResourceKind::Nvidia, ResourceKind::Amd, ResourceKind::Intel] {
        let Ok(mut descriptors) = probe.probe(kind).await else { continue };
        if descriptors.is_empty() {
            continue;
        }
        let rsc_type = state.resources.len();
        for d in &mut descriptors {
            if cc_config.gpu_exclude_instances.contains(&(rsc_type, d.instance_index)) {
                d.user_excluded = true;
            }
        }
        let correlated = correlate_vendor(&descriptors);
        if let Some(resource) = build_resource(rsc_type, kind, &correlated, cpu_peak_flops) {
            tracing::info!(?kind, rsc_type, n_instances = resource.n_instances, relative_speed = resource.relative_speed, "registered coprocessor resource");
            state.resources.add(resource);
            detected_any = true;
        }
    }
    if detected_any {
        // Projects attached before this probe ran only know about CPU; widen
        // their masks now that the newly detected resource types exist.
        state.refresh_resource_instances(&cc_config.gpu_exclude_instances);
    }

    let executor = OfflineExecutor::new();
    let project_rpc = OfflineProjectRpc;
    let metrics = match CoreMetrics::new() {
        Ok(m) => m,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize metrics");
            return ExitCode::Software;
        }
    };

    let coordinator = Arc::new(ShutdownCoordinator::default());
    let signal_handler = create_signal_handler();
    let shutdown_for_signals = coordinator.clone();
    let signal_task = tokio::spawn(async move {
        signal_handler.wait_for_signal(Box::new(move || shutdown_for_signals.initiate_shutdown())).await;
    });

    let token = coordinator.token();
    let config = TickLoopConfig {
        horizon_secs: (global_prefs.work_buf_min_days + global_prefs.work_buf_additional_days) * 86_400.0,
        tick_interval: Duration::from_secs(max_tick_interval_secs.clamp(1, 60)),
        ..TickLoopConfig::default()
    };
    let gate = SchedulingGate { cpu_allowed: true, network_allowed: true, on_batteries: false, user_active: false };

    let mut final_state = match run_tick_loop(state, &executor, &project_rpc, &store, &metrics, &global_prefs, || gate, now_secs, token, config).await {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "tick loop terminated with an error");
            return ExitCode::Software;
        }
    };

    if abort_jobs_on_exit {
        abort_all_runnable(&mut final_state, &executor).await;
    }

    let exit_code = if let Err(e) = store.save(&final_state).await {
        tracing::error!(error = %e, "failed to persist client state on shutdown");
        ExitCode::IoError
    } else {
        ExitCode::Success
    };

    coordinator.complete_shutdown();
    signal_task.abort();
    exit_code
}

/// `spec.md` §5's abort-on-exit strategy: mark every non-terminal result
/// `Aborting` rather than suspending tasks and draining checkpoints.
async fn abort_all_runnable(state: &mut ClientState, executor: &dyn Executor) {
    let handles: Vec<_> = state.results().filter(|(_, r)| !r.state.is_terminal() && r.state != ResultState::Aborting).map(|(h, _)| h).collect();
    for handle in handles {
        let _ = executor.abort(handle).await;
        let project_and_rsc_type = state.result(handle).ok().and_then(|r| state.app_version(r.app_version).ok().map(|v| (r.project, v.rsc_type)));
        if let Some((project, rsc_type)) = project_and_rsc_type {
            if let Ok(project) = state.project_mut(project) {
                if let Some(rps) = project.resource_state_mut(rsc_type) {
                    rps.has_deferred_job = false;
                }
            }
        }
        let _ = state.mark_result_state(handle, ResultState::Aborting);
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose { EnvFilter::new("debug") } else { EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")) };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
