// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Processing-resource vendor kinds (`spec.md` §3: "CPU as resource 0; then
//! up to seven coprocessor types").

use serde::{Deserialize, Serialize};

/// CPU plus the coprocessor vendor slots the registry can enumerate.
/// `original_source/client/client_types.h` caps instances-per-job at 8;
/// this core caps resource *types* the same way.
pub const MAX_RSC_TYPES: usize = 8;

/// `COPROC_INSTANCE_BITMAP` in `original_source/client/work_fetch.h` is a
/// 64-bit bitmap; `InstanceMask` mirrors that limit.
pub const MAX_COPROC_INSTANCES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Cpu,
    Nvidia,
    Amd,
    Intel,
    Other,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Cpu => "CPU",
            ResourceKind::Nvidia => "NVIDIA",
            ResourceKind::Amd => "AMD/ATI",
            ResourceKind::Intel => "intel_gpu",
            ResourceKind::Other => "other",
        }
    }

    pub fn is_gpu(&self) -> bool {
        !matches!(self, ResourceKind::Cpu)
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
