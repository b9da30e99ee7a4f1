// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # State Store Port
//!
//! Domain-facing interface to persisting and reloading `ClientState`
//! across restarts (`spec.md` §6 "StateStore", §9 Design Notes: "the saved
//! form is the set of entities plus their string/integer identifiers; on
//! load, a resolution pass... converts identifiers back into `Handle`s").

use async_trait::async_trait;

use crate::aggregates::ClientState;
use crate::error::CoreError;

/// Collaborator port for durable state. Implementations choose the
/// on-disk format (`spec.md` §6 names XML, matching the original client
/// state file; the engine's adapter is free to choose a Rust-idiomatic
/// serialization instead, per `spec.md` §9's "ambient concerns" allowance).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Loads the client state. Callers must call
    /// `ClientState::resolve_references` on the result before using it.
    async fn load(&self) -> std::result::Result<ClientState, CoreError>;

    async fn save(&self, state: &ClientState) -> std::result::Result<(), CoreError>;
}
