// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Resource Registry
//!
//! Enumerates processing resources: CPU as resource 0, then up to seven
//! coprocessor vendor types (`spec.md` §3, §4.1). The registry itself is a
//! plain data structure; the correlation algorithm that turns a list of
//! per-vendor `ResourceDescriptor`s (from the `ResourceProbe` collaborator,
//! `spec.md` §6) into a single `Resource` is a pure function here so it can
//! be unit-tested without spawning the isolated probe subprocess
//! (`engine::infrastructure::adapters::process_resource_probe`).

use serde::{Deserialize, Serialize};

use crate::value_objects::{InstanceMask, ResourceKind, MAX_RSC_TYPES};

/// A single enumerated processing resource (`spec.md` §3 `Resource` row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub rsc_type: usize,
    pub kind: ResourceKind,
    pub n_instances: u32,
    pub relative_speed: f64,
    pub has_exclusions: bool,
    /// Bitmap of instances that actually exist and are `USED` (not
    /// `IGNORED`/`UNUSED`) after correlation.
    pub instance_mask: InstanceMask,
}

impl Resource {
    pub fn cpu(n_instances: u32) -> Self {
        Self {
            rsc_type: 0,
            kind: ResourceKind::Cpu,
            n_instances,
            relative_speed: 1.0,
            has_exclusions: false,
            instance_mask: InstanceMask::all(n_instances),
        }
    }
}

/// Instance disposition produced by vendor correlation (`spec.md` §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceDisposition {
    /// Counts against `n_instances`; equivalent to the representative.
    Used,
    /// User/config excluded this instance.
    Ignored,
    /// Present but not equivalent enough to the representative to use.
    Unused,
}

/// Raw per-instance facts reported by a vendor probe, prior to correlation.
/// Mirrors the fields `spec.md` §4.1 names as the comparator's priority
/// order: major/minor compute capability, driver/runtime version, RAM,
/// peak FLOPS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub kind: ResourceKind,
    pub instance_index: u32,
    pub compute_capability_major: u32,
    pub compute_capability_minor: u32,
    pub driver_version: u32,
    pub ram_bytes: u64,
    pub peak_flops: f64,
    pub pci_domain: u32,
    pub pci_bus: u32,
    pub pci_device: u32,
    /// Set by config (`cc_config` GPU ignore-list), *before* correlation.
    pub user_excluded: bool,
}

impl ResourceDescriptor {
    /// Strict comparator used to pick the representative instance: compares
    /// every field in the priority order `spec.md` §4.1 specifies.
    fn strict_cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.compute_capability_major
            .cmp(&other.compute_capability_major)
            .then(self.compute_capability_minor.cmp(&other.compute_capability_minor))
            .then(self.driver_version.cmp(&other.driver_version))
            .then(self.ram_bytes.cmp(&other.ram_bytes))
            .then(self.peak_flops.total_cmp(&other.peak_flops))
    }

    /// Loose comparator: ignores peak FLOPS and tolerates RAM within
    /// `[0.7x, 1.4x]` of `representative` (`spec.md` §4.1) — used to decide
    /// whether `self` should be *grouped* with the representative.
    fn loosely_equivalent_to(&self, representative: &Self) -> bool {
        if self.compute_capability_major != representative.compute_capability_major {
            return false;
        }
        if self.compute_capability_minor != representative.compute_capability_minor {
            return false;
        }
        if self.driver_version != representative.driver_version {
            return false;
        }
        let rep_ram = representative.ram_bytes as f64;
        if rep_ram <= 0.0 {
            return self.ram_bytes == representative.ram_bytes;
        }
        let ratio = self.ram_bytes as f64 / rep_ram;
        (0.7..=1.4).contains(&ratio)
    }
}

/// Merges two descriptions of the same physical device (native driver +
/// OpenCL) by PCI bus/device/domain identity, preferring the native
/// description's fields where both are present (`spec.md` §4.1).
pub fn merge_duplicate_descriptions(native: Option<ResourceDescriptor>, opencl: ResourceDescriptor) -> ResourceDescriptor {
    native.unwrap_or(opencl)
}

fn same_pci_identity(a: &ResourceDescriptor, b: &ResourceDescriptor) -> bool {
    a.pci_domain == b.pci_domain && a.pci_bus == b.pci_bus && a.pci_device == b.pci_device
}

/// Deduplicates descriptors that describe the same physical device as
/// reported by two sources (native + OpenCL), preferring the native one.
pub fn dedupe_by_pci_identity(descriptors: Vec<ResourceDescriptor>) -> Vec<ResourceDescriptor> {
    let mut merged: Vec<ResourceDescriptor> = Vec::new();
    'outer: for d in descriptors {
        for existing in merged.iter_mut() {
            if same_pci_identity(existing, &d) {
                // Native descriptors are reported with driver_version > 0 in
                // this model; prefer whichever already looks native.
                if existing.driver_version == 0 && d.driver_version != 0 {
                    *existing = d;
                }
                continue 'outer;
            }
        }
        merged.push(d);
    }
    merged
}

/// Runs vendor correlation for one vendor's descriptor list: selects the
/// most capable non-ignored instance as representative, marks equivalent
/// instances `Used`, user-excluded instances `Ignored`, and the rest
/// `Unused` (`spec.md` §4.1).
pub fn correlate_vendor(descriptors: &[ResourceDescriptor]) -> Vec<(ResourceDescriptor, InstanceDisposition)> {
    let mut dispositions: Vec<InstanceDisposition> = descriptors
        .iter()
        .map(|d| if d.user_excluded { InstanceDisposition::Ignored } else { InstanceDisposition::Unused })
        .collect();

    let representative = descriptors
        .iter()
        .enumerate()
        .filter(|(i, _)| !matches!(dispositions[*i], InstanceDisposition::Ignored))
        .max_by(|(_, a), (_, b)| a.strict_cmp(b))
        .map(|(i, d)| (i, d.clone()));

    if let Some((rep_index, rep)) = representative {
        dispositions[rep_index] = InstanceDisposition::Used;
        for (i, d) in descriptors.iter().enumerate() {
            if matches!(dispositions[i], InstanceDisposition::Ignored) {
                continue;
            }
            if i != rep_index && d.loosely_equivalent_to(&rep) {
                dispositions[i] = InstanceDisposition::Used;
            }
        }
    }

    descriptors.iter().cloned().zip(dispositions).collect()
}

/// Builds a `Resource` for one vendor from its correlated descriptors. If
/// every instance ends up `Ignored`/`Unused`, returns `None` — "a crash
/// yields 'no devices of that vendor'" (`spec.md` §4.1) generalizes to
/// "no usable devices of that vendor".
pub fn build_resource(
    rsc_type: usize,
    kind: ResourceKind,
    correlated: &[(ResourceDescriptor, InstanceDisposition)],
    cpu_peak_flops: f64,
) -> Option<Resource> {
    let used: Vec<&ResourceDescriptor> = correlated
        .iter()
        .filter(|(_, disp)| matches!(disp, InstanceDisposition::Used))
        .map(|(d, _)| d)
        .collect();
    if used.is_empty() {
        return None;
    }
    let mut mask = InstanceMask::EMPTY;
    for d in &used {
        mask.set(d.instance_index);
    }
    let relative_speed = if cpu_peak_flops > 0.0 {
        used.iter().map(|d| d.peak_flops).sum::<f64>() / cpu_peak_flops
    } else {
        0.0
    };
    Some(Resource {
        rsc_type,
        kind,
        n_instances: used.len() as u32,
        relative_speed,
        has_exclusions: false,
        instance_mask: mask,
    })
}

/// Per-core FLOPS estimate used as the CPU baseline for GPU
/// `relative_speed` when no host benchmark is available (`spec.md` §3).
/// The original client measures `host.p_fpops` with a Whetstone/Dhrystone
/// run; this core never launches that benchmark, so a flat estimate
/// stands in (resolved Open Question, see `DESIGN.md`).
pub const DEFAULT_CPU_GFLOPS_PER_CORE: f64 = 4.0;

/// The enumerated set of resources on this host, indexed by `rsc_type`.
/// Resource 0 is always CPU; resources `1..MAX_RSC_TYPES` are the
/// coprocessor vendor slots that were successfully correlated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceRegistry {
    resources: Vec<Resource>,
}

impl ResourceRegistry {
    pub fn new(cpu: Resource) -> Self {
        Self { resources: vec![cpu] }
    }

    /// Adds a correlated coprocessor resource; silently ignored once
    /// `MAX_RSC_TYPES` is reached (the `spec.md` §3 hard cap).
    pub fn add(&mut self, resource: Resource) {
        if self.resources.len() < MAX_RSC_TYPES {
            self.resources.push(resource);
        }
    }

    pub fn get(&self, rsc_type: usize) -> Option<&Resource> {
        self.resources.get(rsc_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn cpu(&self) -> &Resource {
        &self.resources[0]
    }
}
