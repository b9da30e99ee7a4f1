// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `App` entity, ported from `APP` in
//! `original_source/client/client_types.h` (`spec.md` §3).

use serde::{Deserialize, Serialize};

use crate::value_objects::Handle;

pub struct ProjectMarker;
pub type ProjectHandle = Handle<ProjectMarker>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct App {
    pub project: ProjectHandle,
    pub name: String,

    /// Tasks of this app don't count toward CPU instance capacity
    /// (`spec.md` Glossary "Non-CPU-intensive app").
    pub non_cpu_intensive: bool,

    /// Report results as soon as they complete rather than batching.
    pub report_results_immediately: bool,

    /// Hard cap on concurrently running tasks of this app; `None` means
    /// unlimited (`spec.md` §4.5).
    pub max_concurrent: Option<u32>,
}

impl App {
    pub fn new(project: ProjectHandle, name: impl Into<String>) -> Self {
        Self {
            project,
            name: name.into(),
            non_cpu_intensive: false,
            report_results_immediately: false,
            max_concurrent: None,
        }
    }
}
