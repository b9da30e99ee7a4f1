// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Adapters
//!
//! Concrete implementations of the domain's collaborator ports
//! (`core_domain::services`), following the Hexagonal Architecture pattern:
//! the domain and application layers depend only on the trait, never on
//! these types directly.
//!
//! - [`process_resource_probe`]: `ResourceProbe` via a subprocess per
//!   vendor, so a crashing vendor SDK cannot bring down the client.
//! - [`offline_collaborators`]: minimal in-process `ProjectRpc`/`Executor`
//!   stand-ins used for wiring the binary and integration tests without a
//!   network or real job processes.

pub mod offline_collaborators;
pub mod process_resource_probe;

pub use offline_collaborators::{OfflineExecutor, OfflineProjectRpc};
pub use process_resource_probe::ProcessResourceProbe;
