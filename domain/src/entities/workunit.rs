// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `Workunit` entity (`spec.md` §3).

use serde::{Deserialize, Serialize};

use crate::entities::app::ProjectHandle;
use crate::entities::file_info::FileHandle;
use crate::value_objects::Handle;

pub struct WorkunitMarker;
pub type WorkunitHandle = Handle<WorkunitMarker>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workunit {
    pub project: ProjectHandle,
    pub name: String,
    pub cmdline: String,
    pub input_files: Vec<FileHandle>,
    pub flops_estimate: f64,
    pub flops_bound: f64,
    pub mem_bound_bytes: u64,
    pub disk_bound_bytes: u64,
}

impl Workunit {
    pub fn new(project: ProjectHandle, name: impl Into<String>, flops_estimate: f64) -> Self {
        Self {
            project,
            name: name.into(),
            cmdline: String::new(),
            input_files: Vec::new(),
            flops_estimate,
            flops_bound: flops_estimate * 10.0,
            mem_bound_bytes: 0,
            disk_bound_bytes: 0,
        }
    }
}
