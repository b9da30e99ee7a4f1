// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Scheduling Core Services
//!
//! The four pure application services the tick loop drives each pass
//! (`spec.md` §2, §4): REC accounting, the round-robin fair-share
//! simulator, the CPU+GPU scheduler, and the work-fetch planner. Every
//! service here operates on `ClientState` and returns plain data or
//! `CoreError` — no I/O, no async.

pub mod rec_accountant;
pub mod rr_simulator;
pub mod scheduler;
pub mod work_fetch;

pub use rec_accountant::{accumulate as accumulate_rec, decay_all as decay_rec, REC_HALF_LIFE_SECS};
pub use rr_simulator::{simulate as simulate_rr, SimOutcome, SimProject, SimResult};
pub use scheduler::{schedule, ScheduleDecision};
pub use work_fetch::{absorb_reply, plan as plan_work_fetch, record_rpc_failure, refresh_dont_fetch_reasons, to_work_request, PlannedRpc};
