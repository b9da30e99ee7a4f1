// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Process-Isolated Resource Probe
//!
//! Implements `ResourceProbe` (`spec.md` §6) by spawning one short-lived
//! subprocess per vendor kind rather than linking vendor SDKs into the
//! client process. A probe that crashes, hangs past its timeout, or prints
//! anything other than a JSON `ResourceDescriptor` array is treated as "no
//! devices of that vendor" (`spec.md` §4.1, §9 Design Notes: "a crash
//! during probing of one vendor's devices must not bring down the host
//! client process").

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::warn;

use core_domain::entities::resource::ResourceDescriptor;
use core_domain::error::CoreError;
use core_domain::services::resource_probe::ResourceProbe;
use core_domain::value_objects::ResourceKind;

/// Maximum time a single vendor probe subprocess is given before it is
/// killed and treated as a failed probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Spawns `{probe_exe} probe <vendor>` and parses one JSON array of
/// `ResourceDescriptor` from stdout. `probe_exe` is expected to be a small,
/// separately-maintained helper binary that links the vendor SDKs (CUDA,
/// OpenCL, ...); this adapter never links them itself.
pub struct ProcessResourceProbe {
    probe_exe: PathBuf,
    cpu_count: u32,
}

impl ProcessResourceProbe {
    pub fn new(probe_exe: PathBuf, cpu_count: u32) -> Self {
        Self { probe_exe, cpu_count }
    }

    fn vendor_arg(kind: ResourceKind) -> Option<&'static str> {
        match kind {
            ResourceKind::Cpu => None,
            ResourceKind::Nvidia => Some("nvidia"),
            ResourceKind::Amd => Some("amd"),
            ResourceKind::Intel => Some("intel"),
            ResourceKind::Other => Some("other"),
        }
    }
}

#[async_trait]
impl ResourceProbe for ProcessResourceProbe {
    async fn probe(&self, kind: ResourceKind) -> std::result::Result<Vec<ResourceDescriptor>, CoreError> {
        let Some(vendor) = Self::vendor_arg(kind) else {
            return Ok(Vec::new());
        };

        let child = Command::new(&self.probe_exe)
            .arg("probe")
            .arg(vendor)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();

        let child = match child {
            Ok(c) => c,
            Err(e) => {
                warn!(vendor, error = %e, "failed to spawn resource probe subprocess, treating as no devices");
                return Ok(Vec::new());
            }
        };

        let output = match timeout(PROBE_TIMEOUT, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                warn!(vendor, error = %e, "resource probe subprocess failed to run to completion");
                return Ok(Vec::new());
            }
            Err(_) => {
                warn!(vendor, "resource probe subprocess timed out, treating as no devices");
                return Ok(Vec::new());
            }
        };

        if !output.status.success() {
            warn!(vendor, status = ?output.status, "resource probe subprocess exited non-zero, treating as no devices");
            return Ok(Vec::new());
        }

        match serde_json::from_slice::<Vec<ResourceDescriptor>>(&output.stdout) {
            Ok(descriptors) => Ok(descriptors),
            Err(e) => {
                warn!(vendor, error = %e, "resource probe subprocess produced unparseable output, treating as no devices");
                Ok(Vec::new())
            }
        }
    }

    async fn cpu_count(&self) -> std::result::Result<u32, CoreError> {
        Ok(self.cpu_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn a_nonexistent_probe_executable_yields_no_devices_rather_than_an_error() {
        let probe = ProcessResourceProbe::new(PathBuf::from("/nonexistent/boinc_probe_helper"), 4);
        let result = probe.probe(ResourceKind::Nvidia).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn cpu_probe_never_spawns_a_subprocess() {
        let probe = ProcessResourceProbe::new(PathBuf::from("/nonexistent/boinc_probe_helper"), 8);
        assert_eq!(probe.cpu_count().await.unwrap(), 8);
        assert!(probe.probe(ResourceKind::Cpu).await.unwrap().is_empty());
    }
}
