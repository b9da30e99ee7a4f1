// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resource Probe Port
//!
//! Domain-facing interface to hardware enumeration (`spec.md` §6
//! "ResourceProbe", §4.1). Vendor SDK probing is isolated to its own
//! subprocess in the engine's adapter, because "a crash during probing...
//! must not bring down the host client process" (`spec.md` §4.1); the
//! domain only sees the resulting descriptor list.

use async_trait::async_trait;

use crate::entities::resource::ResourceDescriptor;
use crate::error::CoreError;
use crate::value_objects::ResourceKind;

/// Collaborator port for hardware enumeration. One call per vendor kind;
/// correlation into a `Resource` is pure domain logic
/// (`crate::entities::resource::correlate_vendor`/`build_resource`) so it
/// never needs this trait.
#[async_trait]
pub trait ResourceProbe: Send + Sync {
    async fn probe(&self, kind: ResourceKind) -> std::result::Result<Vec<ResourceDescriptor>, CoreError>;

    /// Number of logical CPUs available to this client, used as the
    /// capacity for `Resource` 0.
    async fn cpu_count(&self) -> std::result::Result<u32, CoreError>;
}
