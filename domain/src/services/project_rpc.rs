// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Project RPC Port
//!
//! Domain-facing interface to the scheduler RPC protocol (`spec.md` §6
//! "ProjectRpc"). The domain never performs network I/O itself; the engine
//! crate supplies an adapter that actually talks HTTP to a project server.
//! Keeping this a narrow async trait on the domain side means the core
//! scheduling/work-fetch algorithms can be exercised against an in-memory
//! fake without any sockets (`spec.md` §8 Testable Properties).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::entities::app::ProjectHandle;
use crate::error::CoreError;
use crate::value_objects::MasterUrl;

/// One outbound work request for a single resource type, sized by the
/// work-fetch planner (`spec.md` §4.4, §4.6 item 3). `req_instances` lets
/// a project with idle GPU slots but little outstanding demand ask for
/// exactly the missing instance count rather than only a duration
/// (`spec.md` §8 scenario S3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkRequestItem {
    pub rsc_type: usize,
    pub requested_instance_seconds: f64,
    pub req_instances: u32,
}

/// The scheduler RPC request body assembled for one project
/// (`spec.md` §4.4, §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkRequest {
    pub master_url: MasterUrl,
    pub items: Vec<WorkRequestItem>,
    /// True when this request is piggybacked onto an already-scheduled
    /// report rather than sent purely to fetch work (`spec.md` §4.6,
    /// scenario S5).
    pub piggybacked: bool,
}

/// One workunit/result pair granted by the project server in reply to a
/// `WorkRequest` (`spec.md` §4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrantedJob {
    pub workunit_name: String,
    pub result_name: String,
    pub rsc_type: usize,
    pub flops_estimate: f64,
    pub report_deadline: f64,
}

/// The scheduler RPC reply (`spec.md` §4.6): granted jobs plus the
/// project-side state the client must absorb (ack'd result names, updated
/// resource shares, the minimum time before the next RPC).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkReply {
    pub granted: Vec<GrantedJob>,
    pub acked_result_names: Vec<String>,
    pub min_rpc_time: Option<f64>,
    pub new_resource_share: Option<f64>,
    /// Set when the project server tells the client to back off entirely
    /// for this project (`spec.md` §4.6 "project requests no more work").
    pub no_more_work: bool,
}

/// Collaborator port for scheduler RPC exchanges. One in-flight RPC per
/// project at a time is an invariant the caller (the work-fetch planner)
/// must enforce, not this trait (`spec.md` §8 property 6).
#[async_trait]
pub trait ProjectRpc: Send + Sync {
    async fn send_work_request(&self, project: ProjectHandle, request: WorkRequest) -> std::result::Result<WorkReply, CoreError>;
}
