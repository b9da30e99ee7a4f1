// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tick Loop Driver
//!
//! The cooperative, single-threaded polling loop `spec.md` §5 describes:
//! one `run_tick` per iteration, a single explicit suspension point
//! between iterations, and a graceful-shutdown check at the top of each
//! one. Nothing here runs concurrently with a tick; the loop only decides
//! *when* the next one starts.

use std::time::Duration;

use core_bootstrap::shutdown::CancellationToken;
use core_domain::preferences::{GlobalPrefs, SchedulingGate};
use core_domain::services::executor::Executor;
use core_domain::services::project_rpc::ProjectRpc;
use core_domain::services::state_store::StateStore;
use core_domain::{ClientState, CoreError};
use tracing::{info, info_span, warn, Instrument};

use crate::application::run_tick;
use crate::infrastructure::metrics::CoreMetrics;

/// Tunables for [`run_tick_loop`], all independent of any one tick's
/// outcome (`spec.md` §5, §6).
#[derive(Debug, Clone, Copy)]
pub struct TickLoopConfig {
    /// RR-Sim look-ahead window, normally
    /// `(work_buf_min_days + work_buf_additional_days) * 86400`.
    pub horizon_secs: f64,
    /// Sleep between ticks when nothing else governs the cadence.
    pub tick_interval: Duration,
    /// The state file is flushed at least this often even when a tick
    /// changes nothing, so a killed process never loses more than one
    /// interval's worth of REC/scheduling state.
    pub save_interval: Duration,
}

impl Default for TickLoopConfig {
    fn default() -> Self {
        Self { horizon_secs: 0.6 * 86_400.0, tick_interval: Duration::from_secs(5), save_interval: Duration::from_secs(60) }
    }
}

/// Runs ticks until `shutdown` is cancelled, returning the final state so
/// the caller can do one last save under its own error handling.
///
/// `now_fn` is injected rather than calling `SystemTime::now()` directly
/// so tests can drive the loop with a synthetic clock.
#[allow(clippy::too_many_arguments)]
pub async fn run_tick_loop(
    mut state: ClientState,
    executor: &dyn Executor,
    project_rpc: &dyn ProjectRpc,
    store: &dyn StateStore,
    metrics: &CoreMetrics,
    prefs: &GlobalPrefs,
    gate_fn: impl Fn() -> SchedulingGate,
    now_fn: impl Fn() -> f64,
    shutdown: CancellationToken,
    config: TickLoopConfig,
) -> Result<ClientState, CoreError> {
    let mut last_save = now_fn();
    let mut was_network_allowed = true;

    loop {
        if shutdown.is_cancelled() {
            break;
        }

        let now = now_fn();
        let gate = gate_fn();
        let network_just_restored = gate.network_allowed && !was_network_allowed;
        was_network_allowed = gate.network_allowed;

        let outcome = run_tick(&mut state, executor, project_rpc, prefs, gate, network_just_restored, now, config.horizon_secs)
            .instrument(info_span!("tick", now))
            .await?;

        metrics.record_tick();
        if outcome.planned_rpc.is_some() {
            metrics.record_rpc_sent();
        }
        metrics.set_projects_backed_off(count_backed_off(&state, now));
        for (handle, project) in state.projects() {
            let _ = handle;
            metrics.set_project_rec(project.master_url.as_str(), project.rec.rec);
        }

        for notice in &outcome.notices {
            warn!(title = %notice.title, description = %notice.description, "tick notice");
        }

        let should_save = outcome.schedule_changed.is_some() || !outcome.state_changes.is_empty() || now - last_save >= config.save_interval.as_secs_f64();
        if should_save {
            if let Err(e) = store.save(&state).await {
                warn!(error = %e, "failed to persist client state after tick");
            } else {
                last_save = now;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(config.tick_interval) => {}
            _ = shutdown.cancelled() => {
                info!("shutdown requested, exiting tick loop");
                break;
            }
        }
    }

    Ok(state)
}

fn count_backed_off(state: &ClientState, now: f64) -> i64 {
    state.projects().filter(|(_, p)| p.scheduler_rpc_backoff.is_backed_off(now)).count() as i64
}
