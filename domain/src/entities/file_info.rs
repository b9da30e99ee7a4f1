// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `File` entity, ported from `FILE_INFO`/`FILE_XFER_BACKOFF` in
//! `original_source/client/client_types.h` (`spec.md` §3, Glossary "Sticky
//! file").

use serde::{Deserialize, Serialize};

use crate::entities::app::ProjectHandle;
use crate::value_objects::{BackoffState, Handle};

pub struct FileMarker;
pub type FileHandle = Handle<FileMarker>;

/// `FILE_XFER_FAILURE_LIMIT` in `original_source/client/client_types.h`:
/// past this many consecutive per-file failures in one direction, the
/// per-file back-off is replaced by the project-wide per-direction
/// back-off (`spec.md` §4.5, §7, §8 property 7).
pub const FILE_XFER_FAILURE_LIMIT: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferDirection {
    Download,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileStatus {
    Present,
    Transferring(TransferDirection),
    Error,
    /// Set by `ClientState::gc_files`. The arena slot stays put so every
    /// other `FileHandle` remains valid; a deleted file is simply never
    /// eligible for GC again and carries no urls.
    Deleted,
}

/// Per-file, per-direction transient-failure tracking
/// (`FILE_XFER_BACKOFF`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct FileXferBackoff {
    pub consecutive_failures: u32,
    pub backoff: BackoffState,
}

impl FileXferBackoff {
    /// Whether this file (not yet escalated to a project-wide back-off) may
    /// be retried now.
    pub fn ok_to_transfer(&self, now: f64) -> bool {
        self.consecutive_failures < FILE_XFER_FAILURE_LIMIT && !self.backoff.is_backed_off(now)
    }

    /// Returns true once the failure count has crossed the limit, meaning
    /// the *project-wide* back-off for this direction should now be used
    /// instead of this per-file one (`spec.md` §4.5, §7).
    pub fn record_failure(&mut self, now: f64) -> bool {
        self.consecutive_failures += 1;
        self.backoff.on_failure(now);
        self.consecutive_failures > FILE_XFER_FAILURE_LIMIT
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.backoff.on_success();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub project: ProjectHandle,
    pub name: String,
    pub size: u64,
    pub md5: String,
    pub sticky: bool,
    pub signature_required: bool,
    pub urls: Vec<String>,
    pub status: FileStatus,
    pub refcount: u32,
    /// Expiry time past which a sticky file becomes eligible for deletion
    /// even with zero refcount (`spec.md` Glossary).
    pub sticky_expiry: Option<f64>,
    pub download_backoff: FileXferBackoff,
    pub upload_backoff: FileXferBackoff,
}

impl FileInfo {
    pub fn new(project: ProjectHandle, name: impl Into<String>, size: u64, md5: impl Into<String>) -> Self {
        Self {
            project,
            name: name.into(),
            size,
            md5: md5.into(),
            sticky: false,
            signature_required: false,
            urls: Vec::new(),
            status: FileStatus::Present,
            refcount: 0,
            sticky_expiry: None,
            download_backoff: FileXferBackoff::default(),
            upload_backoff: FileXferBackoff::default(),
        }
    }

    /// Eligible for `gc_files()` deletion: zero refcount, not mid-transfer,
    /// and (not sticky, or sticky past its expiry) — `spec.md` §4.2.
    pub fn is_gc_eligible(&self, now: f64) -> bool {
        if self.refcount != 0 {
            return false;
        }
        if matches!(self.status, FileStatus::Transferring(_) | FileStatus::Deleted) {
            return false;
        }
        if self.sticky {
            return self.sticky_expiry.map(|expiry| now >= expiry).unwrap_or(false);
        }
        true
    }

    /// Tombstones this slot after GC: clears the download URLs and flags it
    /// `Deleted` so it is never picked up by a later `gc_files` pass.
    pub fn mark_deleted(&mut self) {
        self.status = FileStatus::Deleted;
        self.urls.clear();
    }
}
