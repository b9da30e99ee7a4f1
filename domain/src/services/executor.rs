// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Executor Port
//!
//! Domain-facing interface to starting, suspending, resuming, and aborting
//! job processes (`spec.md` §6 "Executor"). The scheduler decides *which*
//! results to run; the engine's process adapter decides *how* to spawn and
//! supervise the OS process for one (`spec.md` §4.5).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::result::ResultHandle;
use crate::error::CoreError;
use crate::value_objects::InstanceMask;

/// A lifecycle event the executor reports back asynchronously, consumed by
/// the tick loop to drive `Result` state transitions (`spec.md` §4.5, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskEvent {
    Completed { result: ResultHandle, cpu_secs: f64, elapsed_secs: f64 },
    Crashed { result: ResultHandle, error: String },
    /// The job called `temporary_exit()` and should be treated as deferred
    /// rather than failed (`spec.md` §4.7: "`OK -> DEFERRED`").
    TemporaryExit { result: ResultHandle, retry_after_secs: f64 },
    Checkpointed { result: ResultHandle, cpu_secs: f64 },
}

/// Collaborator port for running jobs. Implementations own the actual OS
/// process lifecycle; the domain only ever talks about `ResultHandle`s and
/// the instances a job is allowed to use.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn start(&self, result: ResultHandle, instances: InstanceMask) -> std::result::Result<(), CoreError>;
    async fn suspend(&self, result: ResultHandle) -> std::result::Result<(), CoreError>;
    async fn resume(&self, result: ResultHandle) -> std::result::Result<(), CoreError>;
    async fn abort(&self, result: ResultHandle) -> std::result::Result<(), CoreError>;

    /// Drains lifecycle events accumulated since the last call, never
    /// blocking (`spec.md` §5: "a single-threaded event loop... polls for
    /// completion").
    async fn poll_events(&self) -> std::result::Result<Vec<TaskEvent>, CoreError>;
}
