// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Property tests for the quantified invariants `spec.md` §8 names that
//! are cleanly exercised at the domain layer without a running tick loop:
//! instance-mask capacity/exclusion (invariant 1's placement precondition),
//! back-off monotonicity and capping (invariant 7, scenario S4), and a
//! weaker, honest version of graph refcount soundness (invariant 5) — the
//! idealized "refcount == referencing count" is not auto-maintained
//! anywhere in this codebase, so only non-negativity is asserted here.

use proptest::prelude::*;

use core_domain::entities::file_info::FileInfo;
use core_domain::entities::project::Project;
use core_domain::entities::resource::{Resource, ResourceRegistry};
use core_domain::value_objects::backoff::{BackoffState, INITIAL_BACKOFF_SECS, MAX_BACKOFF_SECS};
use core_domain::value_objects::InstanceMask;
use core_domain::ClientState;

proptest! {
    /// `InstanceMask::pick` never hands out more instances than the mask
    /// actually has set, and never an excluded one.
    #[test]
    fn instance_mask_pick_never_exceeds_available_non_excluded_capacity(
        n_instances in 0u32..32,
        excluded_bits in prop::collection::vec(0u32..32, 0..8),
        requested in 0u32..8,
    ) {
        let available = InstanceMask::all(n_instances);
        let mut excluded = InstanceMask::EMPTY;
        for bit in excluded_bits {
            excluded.set(bit);
        }

        if let Some(picked) = available.pick(requested, &excluded) {
            prop_assert_eq!(picked.count(), requested);
            prop_assert!(picked.is_subset_of(&available));
            prop_assert!(!picked.intersects(&excluded));
        } else {
            let usable = available.difference(&excluded).count();
            prop_assert!(usable < requested);
        }
    }

    /// `ClientState::attach_project` always seeds a usable, all-instances
    /// mask on its own (the bug this fixed: every mask used to start
    /// empty). Re-applying `init_resource_instances` with an exclude list
    /// afterward — what the CLI layer does once it has `CcConfig` in hand —
    /// narrows that mask to exactly "all instances minus excludes", never
    /// wider.
    #[test]
    fn attach_project_seeds_a_full_mask_that_excludes_then_narrow(
        n_cpu in 1u32..16,
        exclude_cpu_instance in prop::option::of(0u32..16),
    ) {
        let mut state = ClientState::new(ResourceRegistry::new(Resource::cpu(n_cpu)));
        let handle = state.attach_project(Project::new("https://example.org/p", "P")).unwrap();

        let mask = state.project(handle).unwrap().resource_state(0).unwrap().non_excluded_instances;
        prop_assert_eq!(mask.count(), n_cpu, "attach_project must seed every instance as usable by default");

        let excludes: Vec<(usize, u32)> = exclude_cpu_instance.map(|i| (0usize, i)).into_iter().collect();
        let resources = state.resources.clone();
        state.project_mut(handle).unwrap().init_resource_instances(&resources, &excludes);

        let mask = state.project(handle).unwrap().resource_state(0).unwrap().non_excluded_instances;
        let mut expected = InstanceMask::all(n_cpu);
        if let Some(i) = exclude_cpu_instance {
            expected.clear(i);
        }
        prop_assert_eq!(mask.count(), expected.count());
        for i in 0..n_cpu {
            prop_assert_eq!(mask.is_set(i), expected.is_set(i));
        }
    }

    /// Back-off doubles on each consecutive failure and never exceeds the
    /// cap, regardless of how many failures are fed in (scenario S4).
    #[test]
    fn backoff_doubles_monotonically_and_never_exceeds_cap(n_failures in 0usize..200, now in 0.0f64..1_000_000.0) {
        let mut backoff = BackoffState::default();
        let mut previous = 0.0;
        for _ in 0..n_failures {
            backoff.on_failure(now);
            prop_assert!(backoff.backoff_interval >= previous);
            prop_assert!(backoff.backoff_interval <= MAX_BACKOFF_SECS);
            previous = backoff.backoff_interval;
        }
        if n_failures > 0 {
            prop_assert!(backoff.backoff_interval >= INITIAL_BACKOFF_SECS);
        }
    }

    /// `clear_temporary` resets the clock (invariant 2's precondition: no
    /// target stays backed off forever) but never forgets the interval a
    /// network outage already taught it.
    #[test]
    fn clear_temporary_resets_the_clock_but_keeps_the_interval(n_failures in 1usize..50, now in 0.0f64..1_000_000.0) {
        let mut backoff = BackoffState::default();
        for _ in 0..n_failures {
            backoff.on_failure(now);
        }
        let interval_before = backoff.backoff_interval;
        backoff.clear_temporary();
        prop_assert_eq!(backoff.backoff_time, 0.0);
        prop_assert_eq!(backoff.backoff_interval, interval_before);
        prop_assert!(!backoff.is_backed_off(0.0));
    }

    /// Invariant 5 (weak form): detaching a project can never drive a
    /// file's refcount negative, however many files reference it or how
    /// many times detach runs (it's a saturating decrement, not a count
    /// reconciliation).
    #[test]
    fn detaching_a_project_never_underflows_file_refcounts(initial_refcount in 0u32..5, n_detach_attempts in 1usize..4) {
        let mut state = ClientState::new(ResourceRegistry::new(Resource::cpu(1)));
        let project = state.attach_project(Project::new("https://example.org/p", "P")).unwrap();
        let mut file = FileInfo::new(project, "data.bin", 1024, "deadbeef");
        file.refcount = initial_refcount;
        let file_handle = state.add_file(file);

        for _ in 0..n_detach_attempts {
            let _ = state.detach_project(project);
        }

        let expected = initial_refcount.saturating_sub(n_detach_attempts as u32);
        prop_assert_eq!(state.file(file_handle).unwrap().refcount, expected);
    }
}
