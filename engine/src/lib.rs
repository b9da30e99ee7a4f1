// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Core Engine
//!
//! The application and infrastructure layers for the BOINC-style
//! scheduling core: the per-tick workflow (`application`), the
//! collaborator adapters and ambient concerns that drive it
//! (`infrastructure`), and the admin-facing surface (`presentation`).
//! `src/main.rs` is a thin binary that wires these together with
//! `core_bootstrap`; `tests/` exercises them directly as a library, the
//! way `cargo test` runs any other crate's integration suite.

pub mod application;
pub mod infrastructure;
pub mod presentation;
