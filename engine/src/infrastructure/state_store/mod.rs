// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # State Store
//!
//! The `StateStore` adapter that persists `ClientState` across restarts
//! (`spec.md` §6, §9 Design Notes).

pub mod tagged_record_store;

pub use tagged_record_store::TaggedRecordStore;
