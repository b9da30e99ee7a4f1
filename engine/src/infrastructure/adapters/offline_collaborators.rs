// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Offline Collaborator Stand-Ins
//!
//! The actual HTTP/XML scheduler-RPC transport and OS job-process launch
//! are out of scope for this core (`spec.md` §1 Non-goals). These two
//! adapters let the binary and integration tests exercise the full tick
//! loop without either: `OfflineProjectRpc` answers every work request
//! with an empty grant, and `OfflineExecutor` tracks which results are
//! "running" in memory without spawning anything.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::info;

use core_domain::entities::app::ProjectHandle;
use core_domain::entities::result::ResultHandle;
use core_domain::error::CoreError;
use core_domain::services::executor::{Executor, TaskEvent};
use core_domain::services::project_rpc::{ProjectRpc, WorkReply, WorkRequest};
use core_domain::value_objects::InstanceMask;

/// Answers every scheduler RPC with an empty grant and no back-off hint.
/// Useful for running the tick loop against a populated `ClientState` (for
/// example one restored from the state file) without a network.
#[derive(Debug, Default)]
pub struct OfflineProjectRpc;

#[async_trait]
impl ProjectRpc for OfflineProjectRpc {
    async fn send_work_request(&self, project: ProjectHandle, request: WorkRequest) -> std::result::Result<WorkReply, CoreError> {
        info!(?project, items = request.items.len(), piggybacked = request.piggybacked, "offline project RPC: no work granted");
        Ok(WorkReply::default())
    }
}

/// Tracks which results are nominally running without launching an OS
/// process for any of them. `poll_events` only ever reports events queued
/// via [`OfflineExecutor::enqueue`] (used by tests to simulate completion);
/// in the running binary it is a no-op source, matching the offline
/// adapter's purpose of exercising scheduling and work-fetch, not job
/// execution.
#[derive(Debug, Default)]
pub struct OfflineExecutor {
    running: Mutex<HashSet<ResultHandle>>,
    events: Mutex<Vec<TaskEvent>>,
}

impl OfflineExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a lifecycle event for the next `poll_events` call.
    pub fn enqueue(&self, event: TaskEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[async_trait]
impl Executor for OfflineExecutor {
    async fn start(&self, result: ResultHandle, instances: InstanceMask) -> std::result::Result<(), CoreError> {
        info!(?result, instances = instances.count(), "offline executor: start (no process launched)");
        self.running.lock().unwrap().insert(result);
        Ok(())
    }

    async fn suspend(&self, result: ResultHandle) -> std::result::Result<(), CoreError> {
        info!(?result, "offline executor: suspend");
        self.running.lock().unwrap().remove(&result);
        Ok(())
    }

    async fn resume(&self, result: ResultHandle) -> std::result::Result<(), CoreError> {
        info!(?result, "offline executor: resume");
        self.running.lock().unwrap().insert(result);
        Ok(())
    }

    async fn abort(&self, result: ResultHandle) -> std::result::Result<(), CoreError> {
        info!(?result, "offline executor: abort");
        self.running.lock().unwrap().remove(&result);
        Ok(())
    }

    async fn poll_events(&self) -> std::result::Result<Vec<TaskEvent>, CoreError> {
        Ok(std::mem::take(&mut self.events.lock().unwrap()))
    }
}
