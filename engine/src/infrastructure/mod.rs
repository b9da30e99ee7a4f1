// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Infrastructure Layer
//!
//! Concrete adapters for the collaborator ports `domain::services` defines,
//! plus the ambient concerns (configuration, metrics, the tick-loop
//! runtime) that don't belong in the pure application layer.

pub mod adapters;
pub mod config;
pub mod metrics;
pub mod runtime;
pub mod state_store;
