// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Entities: mutable objects with identity, each keyed by a `Handle<T>`
//! inside the `ClientState` aggregate (`spec.md` §3, §9 Design Notes).

pub mod app;
pub mod app_version;
pub mod file_info;
pub mod project;
pub mod resource;
pub mod resource_project_state;
pub mod result;
pub mod workunit;

pub use app::{App, ProjectHandle};
pub use app_version::{AppHandle, AppVersion, AppVersionHandle, GpuUsage};
pub use file_info::{FileHandle, FileInfo, FileStatus, FileXferBackoff, TransferDirection, FILE_XFER_FAILURE_LIMIT};
pub use project::{Project, RecState};
pub use resource::{
    build_resource, correlate_vendor, dedupe_by_pci_identity, merge_duplicate_descriptions, InstanceDisposition,
    Resource, ResourceDescriptor, ResourceRegistry,
};
pub use resource_project_state::{DontFetchReason, ResourceProjectState};
pub use result::{Result, ResultHandle, ResultState};
pub use workunit::{Workunit, WorkunitHandle};
