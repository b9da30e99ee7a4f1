// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Preferences & Configuration Value Objects
//!
//! `GlobalPrefs`, `CcConfig`, and `NvcConfig` (`spec.md` §6) plus the
//! `SchedulingGate` that folds all three into the single yes/no decision
//! the scheduler consults each tick (`spec.md` §9 Design Notes).

use serde::{Deserialize, Serialize};

use crate::value_objects::TimeSpan;

/// User-facing scheduling preferences (`spec.md` §6 "global_prefs").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalPrefs {
    /// Three independent disk-quota caps, combined by minimum
    /// (`spec.md` §6).
    pub disk_max_used_gb: f64,
    pub disk_max_used_pct: f64,
    pub disk_min_free_gb: f64,

    /// Throttle fraction in `[0, 100]`; `100` means unthrottled.
    pub cpu_usage_limit: f64,

    pub ram_max_used_busy_frac: f64,
    pub ram_max_used_idle_frac: f64,

    pub run_on_batteries: bool,
    pub idle_time_to_run_secs: f64,
    pub network_wifi_only: bool,

    pub work_buf_min_days: f64,
    pub work_buf_additional_days: f64,

    /// Per-weekday CPU scheduling windows, index 0 = Sunday
    /// (`spec.md` §6).
    pub cpu_times: [TimeSpan; 7],
    pub net_times: [TimeSpan; 7],
}

impl Default for GlobalPrefs {
    fn default() -> Self {
        Self {
            disk_max_used_gb: 0.0,
            disk_max_used_pct: 90.0,
            disk_min_free_gb: 1.0,
            cpu_usage_limit: 100.0,
            ram_max_used_busy_frac: 0.5,
            ram_max_used_idle_frac: 0.9,
            run_on_batteries: true,
            idle_time_to_run_secs: 0.0,
            network_wifi_only: false,
            work_buf_min_days: 0.1,
            work_buf_additional_days: 0.5,
            cpu_times: [TimeSpan::ALWAYS; 7],
            net_times: [TimeSpan::ALWAYS; 7],
        }
    }
}

impl GlobalPrefs {
    /// Combines the three disk caps by taking the most restrictive bound
    /// (`spec.md` §6: "combined by minimum").
    pub fn effective_disk_limit_gb(&self, total_disk_gb: f64, disk_usage_pct_cap: f64) -> f64 {
        let pct_cap = total_disk_gb * (disk_usage_pct_cap.min(self.disk_max_used_pct) / 100.0);
        let min_free_cap = (total_disk_gb - self.disk_min_free_gb).max(0.0);
        let mut limit = pct_cap.min(min_free_cap);
        if self.disk_max_used_gb > 0.0 {
            limit = limit.min(self.disk_max_used_gb);
        }
        limit
    }

    /// Whether the current local hour falls inside this weekday's CPU
    /// window (`spec.md` §6 `TIME_SPAN` semantics).
    pub fn cpu_allowed_at(&self, weekday: usize, local_hour: f64) -> bool {
        self.cpu_times.get(weekday).map(|span| span.allows(local_hour)).unwrap_or(true)
    }

    pub fn net_allowed_at(&self, weekday: usize, local_hour: f64) -> bool {
        self.net_times.get(weekday).map(|span| span.allows(local_hour)).unwrap_or(true)
    }

    /// Whether `cpu_usage_limit`'s duty cycle is "on" at `now`. CPU time is
    /// split into fixed `CPU_DUTY_CYCLE_PERIOD_SECS` windows, the first
    /// `cpu_usage_limit`% of each window running (`spec.md` §4.5, §6).
    pub fn cpu_duty_cycle_allows(&self, now: f64) -> bool {
        if self.cpu_usage_limit >= 100.0 {
            return true;
        }
        if self.cpu_usage_limit <= 0.0 {
            return false;
        }
        let phase = now.rem_euclid(CPU_DUTY_CYCLE_PERIOD_SECS);
        phase < CPU_DUTY_CYCLE_PERIOD_SECS * (self.cpu_usage_limit / 100.0)
    }
}

/// Local client configuration (`spec.md` §6 "cc_config").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CcConfig {
    /// Per-vendor GPU instance indices the user has excluded, keyed by
    /// resource type (`spec.md` §4.1).
    pub gpu_exclude_instances: Vec<(usize, u32)>,
    pub max_file_xfers: u32,
    pub max_file_xfers_per_project: u32,
    pub dont_check_file_sizes: bool,
    pub abort_jobs_on_exit: bool,
    pub allow_multiple_clients: bool,
    pub report_results_immediately: bool,
    pub log_flags_verbose: bool,
}

impl Default for CcConfig {
    fn default() -> Self {
        Self {
            gpu_exclude_instances: Vec::new(),
            max_file_xfers: 8,
            max_file_xfers_per_project: 2,
            dont_check_file_sizes: false,
            abort_jobs_on_exit: false,
            allow_multiple_clients: false,
            report_results_immediately: false,
            log_flags_verbose: false,
        }
    }
}

/// Version-check configuration (`spec.md` §6 "nvc_config"): four optional
/// strings, probed every 14 days.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NvcConfig {
    pub client_download_url: Option<String>,
    pub client_new_version_name: Option<String>,
    pub client_version_check_url: Option<String>,
    pub network_test_url: Option<String>,
}

pub const NVC_CHECK_INTERVAL_SECS: f64 = 14.0 * 86400.0;

/// Duty-cycle window `cpu_usage_limit` throttling is measured against
/// (`spec.md` §4.5, §6 "cpu_usage_limit (throttle fraction)"). The original
/// client calls this the CPU scheduling period; 60s is its conventional
/// default and is recorded as a resolved Open Question in `DESIGN.md`.
pub const CPU_DUTY_CYCLE_PERIOD_SECS: f64 = 60.0;

/// Bundles every user-preference gating check the scheduler consults once
/// per tick, so scheduling logic stays free of OS-specific or
/// config-shaped branching (`spec.md` §9 Design Notes "SchedulingGate").
#[derive(Debug, Clone, Copy)]
pub struct SchedulingGate {
    pub cpu_allowed: bool,
    pub network_allowed: bool,
    pub on_batteries: bool,
    pub user_active: bool,
}

impl SchedulingGate {
    /// Whether CPU-instance scheduling may proceed this tick. Battery
    /// gating applies only here, never to GPU (`spec.md` §9 resolved Open
    /// Question 2). Also applies the `cpu_usage_limit` duty cycle, which
    /// GPU scheduling is likewise exempt from.
    pub fn cpu_scheduling_allowed(&self, prefs: &GlobalPrefs, now: f64) -> bool {
        if !self.cpu_allowed {
            return false;
        }
        if self.on_batteries && !prefs.run_on_batteries {
            return false;
        }
        if self.user_active && prefs.idle_time_to_run_secs > 0.0 {
            return false;
        }
        if !prefs.cpu_duty_cycle_allows(now) {
            return false;
        }
        true
    }

    /// GPU scheduling is never gated by battery state
    /// (`spec.md` §9 resolved Open Question 2).
    pub fn gpu_scheduling_allowed(&self) -> bool {
        self.cpu_allowed
    }
}
