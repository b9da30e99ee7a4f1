// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Error System
//!
//! A single, categorized error type for the client scheduling core. Every
//! component (registry, graph, REC accountant, RR-Sim, scheduler, work-fetch
//! planner) reports failures through `CoreError` rather than ad-hoc error
//! types, so collaborators and callers can match on a closed set of
//! categories (`spec.md` §7).

use thiserror::Error;

/// Errors that can occur within the scheduling/work-fetch domain.
#[derive(Error, Debug, Clone)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("transient I/O error: {0}")]
    TransientIo(String),

    #[error("permanent file error: {0}")]
    PermanentFileError(String),

    #[error("scheduler RPC error: {0}")]
    SchedulerRpc(String),

    #[error("executor error: {0}")]
    Executor(String),

    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn unknown_entity(msg: impl Into<String>) -> Self {
        Self::UnknownEntity(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Transient I/O, timeouts, and resource exhaustion are recoverable via
    /// back-off and retry (`spec.md` §7); everything else requires either a
    /// human or a permanent state change to clear.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            CoreError::TransientIo(_) | CoreError::Timeout(_) | CoreError::ResourceExhausted(_)
        )
    }

    /// Coarse category, used for log fields and metrics labels.
    pub fn category(&self) -> &'static str {
        match self {
            CoreError::InvalidConfiguration(_) => "configuration",
            CoreError::InvariantViolation(_) => "invariant",
            CoreError::UnknownEntity(_) => "entity",
            CoreError::InvalidStateTransition(_) => "state",
            CoreError::TransientIo(_) => "io",
            CoreError::PermanentFileError(_) => "file",
            CoreError::SchedulerRpc(_) => "rpc",
            CoreError::Executor(_) => "executor",
            CoreError::ResourceExhausted(_) => "resource",
            CoreError::Serialization(_) => "serialization",
            CoreError::Timeout(_) => "timeout",
            CoreError::Cancelled(_) => "cancellation",
            CoreError::Internal(_) => "internal",
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        CoreError::TransientIo(err.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}
