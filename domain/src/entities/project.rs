// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! The `Project` entity (`spec.md` §3), with REC state inlined as in the
//! original `PROJECT_WORK_FETCH` (`original_source/client/work_fetch.h`).

use serde::{Deserialize, Serialize};

use crate::entities::resource::ResourceRegistry;
use crate::entities::resource_project_state::ResourceProjectState;
use crate::value_objects::{BackoffState, InstanceMask, MasterUrl, MAX_RSC_TYPES};

/// Recent Estimated Credit state for a project (`spec.md` §3 `RecState`
/// row, §4.3).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RecState {
    /// Recent estimated credit: an exponentially decaying instance-second
    /// counter. Always >= 0 (`spec.md` §3 invariant).
    pub rec: f64,
    /// Simulation/wall-clock time of the last decay application.
    pub rec_time: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub master_url: MasterUrl,
    pub project_name: String,

    /// User-assigned fairness weight (`spec.md` Glossary "Resource
    /// share").
    pub resource_share: f64,

    pub suspended: bool,
    pub dont_request_more_work: bool,

    /// Earliest time a new scheduler RPC may be sent to this project,
    /// independent of the work-fetch back-off (min RPC time from a
    /// previous reply).
    pub min_rpc_time: f64,

    /// Scheduler-RPC-level back-off (`spec.md` §7 "Scheduler RPC error").
    pub scheduler_rpc_backoff: BackoffState,

    pub rec: RecState,

    /// Per-resource work-fetch state, indexed by `rsc_type`
    /// (`spec.md` §3 `ResourceProjectState` row).
    pub resources: [ResourceProjectState; MAX_RSC_TYPES],

    /// True once a master-file fetch has been requested and not yet
    /// completed (`spec.md` §4.6: "pending master-file fetch").
    pub master_url_fetch_pending: bool,

    /// True if there are more pending uploads than the configured cap
    /// allows (`spec.md` §4.6: "too many pending uploads").
    pub too_many_uploads: bool,

    /// True while a download for this project is stalled
    /// (`spec.md` §4.6: "a stalled download for this project").
    pub download_stalled: bool,
}

impl Project {
    pub fn new(master_url: impl Into<MasterUrl>, project_name: impl Into<String>) -> Self {
        Self {
            master_url: master_url.into(),
            project_name: project_name.into(),
            resource_share: 1.0,
            suspended: false,
            dont_request_more_work: false,
            min_rpc_time: 0.0,
            scheduler_rpc_backoff: BackoffState::default(),
            rec: RecState::default(),
            resources: Default::default(),
            master_url_fetch_pending: false,
            too_many_uploads: false,
            download_stalled: false,
        }
    }

    pub fn resource_state(&self, rsc_type: usize) -> Option<&ResourceProjectState> {
        self.resources.get(rsc_type)
    }

    pub fn resource_state_mut(&mut self, rsc_type: usize) -> Option<&mut ResourceProjectState> {
        self.resources.get_mut(rsc_type)
    }

    /// Seeds `non_excluded_instances` for every registered resource type
    /// from the host's current `ResourceRegistry`, minus any
    /// `cc_config.gpu_exclude_instances` entries for this project
    /// (`spec.md` §3 invariant, §4.1, §6 "gpu_exclude_instances"). Called
    /// once at attach time; a fresh `Project` otherwise starts with every
    /// mask empty and is never eligible for work.
    pub fn init_resource_instances(&mut self, resources: &ResourceRegistry, gpu_exclude_instances: &[(usize, u32)]) {
        for resource in resources.iter() {
            let Some(rps) = self.resources.get_mut(resource.rsc_type) else { continue };
            let mut mask = InstanceMask::all(resource.n_instances);
            for &(rsc_type, instance) in gpu_exclude_instances {
                if rsc_type == resource.rsc_type {
                    mask.clear(instance);
                }
            }
            rps.non_excluded_instances = mask;
        }
    }

    /// A project is globally eligible to be contacted for a scheduler RPC
    /// when it isn't suspended, isn't mid master-file-fetch, and its
    /// scheduler-RPC back-off has elapsed.
    pub fn can_contact(&self, now: f64) -> bool {
        !self.suspended && !self.master_url_fetch_pending && now >= self.min_rpc_time && !self.scheduler_rpc_backoff.is_backed_off(now)
    }
}
