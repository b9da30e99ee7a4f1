// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `AppVersion` entity, ported from `APP_VERSION`/`GPU_USAGE` in
//! `original_source/client/client_types.h` (`spec.md` §3).

use serde::{Deserialize, Serialize};

use crate::entities::app::{App, ProjectHandle};
use crate::entities::file_info::FileHandle;
use crate::value_objects::Handle;

pub struct AppMarker;
pub type AppHandle = Handle<AppMarker>;

pub struct AppVersionMarker;
pub type AppVersionHandle = Handle<AppVersionMarker>;

/// GPU resource usage declared by an app version: at most one GPU type
/// (`original_source/client/client_types.h`: "can only use 1 GPU type").
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpuUsage {
    pub rsc_type: usize,
    pub usage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppVersion {
    pub project: ProjectHandle,
    pub app: AppHandle,
    pub version_num: i32,
    pub platform: String,
    pub plan_class: String,

    /// Resource type this version is built for: 0 (CPU) unless `gpu_usage`
    /// is set.
    pub rsc_type: usize,
    pub avg_ncpus: f64,
    pub gpu_usage: Option<GpuUsage>,

    /// Estimated peak FLOPS this version can sustain, used to convert
    /// workunit FLOPS estimates into wall-clock durations.
    pub flops: f64,

    /// If set, this app version's running tasks are never preempted by
    /// the scheduler's high-priority pass (`spec.md` §4.5: "if its app
    /// version does not set `dont_throttle`" — inverted here as an
    /// explicit opt-out flag).
    pub dont_throttle: bool,

    pub file_refs: Vec<FileHandle>,
}

impl AppVersion {
    pub fn new(project: ProjectHandle, app: AppHandle, version_num: i32, platform: impl Into<String>, plan_class: impl Into<String>) -> Self {
        Self {
            project,
            app,
            version_num,
            platform: platform.into(),
            plan_class: plan_class.into(),
            rsc_type: 0,
            avg_ncpus: 1.0,
            gpu_usage: None,
            flops: 1.0e9,
            dont_throttle: false,
            file_refs: Vec::new(),
        }
    }

    pub fn uses_gpu(&self) -> bool {
        self.gpu_usage.is_some()
    }
}

/// Convenience accessor: whether `app` is non-CPU-intensive, used when
/// filtering candidate results during scheduling.
pub fn is_non_cpu_intensive(app: &App) -> bool {
    app.non_cpu_intensive
}
