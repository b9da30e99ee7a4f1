// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Presentation Layer
//!
//! The admin-facing surface (`spec.md` §6, §9 Design Notes): `status`,
//! `attach`, and `detach` commands, operating directly on the persisted
//! `ClientState` since there is no running-daemon RPC transport in scope
//! (`spec.md` §1 Non-goals).

pub mod cli;
