// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Exponential back-off, ported from
//! `original_source/client/work_fetch.h` (`RSC_PROJECT_WORK_FETCH::
//! resource_backoff` / `reset` / `clear_backoff`) and generalized for reuse
//! across scheduler-RPC, work-fetch, and file-transfer back-offs
//! (`spec.md` §4.6, §4.7, §7, §8 scenario S4).

use serde::{Deserialize, Serialize};

/// Default initial back-off on first failure, in seconds. The original
/// source does not expose this as a single named constant in the filtered
/// sources available here; 60s is the conventional BOINC client default and
/// is recorded as a resolved Open Question in `DESIGN.md`.
pub const INITIAL_BACKOFF_SECS: f64 = 60.0;

/// Upper bound on back-off duration (`spec.md` §4.6: "capped at an upper
/// bound, e.g., 24 h").
pub const MAX_BACKOFF_SECS: f64 = 24.0 * 3600.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BackoffState {
    /// Absolute time (simulation/wall clock seconds) until which this
    /// target is backed off.
    pub backoff_time: f64,
    /// Current back-off interval; persists across `clear_temporary` so a
    /// later failure resumes doubling from where it left off rather than
    /// restarting at `INITIAL_BACKOFF_SECS`.
    pub backoff_interval: f64,
}

impl BackoffState {
    pub fn is_backed_off(&self, now: f64) -> bool {
        now < self.backoff_time
    }

    /// Doubles the interval (capped) and sets `backoff_time` to `now +
    /// interval` — one failed interaction (`spec.md` §4.6, §8 S4).
    pub fn on_failure(&mut self, now: f64) {
        self.backoff_interval = if self.backoff_interval <= 0.0 {
            INITIAL_BACKOFF_SECS
        } else {
            (self.backoff_interval * 2.0).min(MAX_BACKOFF_SECS)
        };
        self.backoff_time = now + self.backoff_interval;
    }

    /// A successful interaction clears the back-off entirely (`spec.md`
    /// §4.6: "on success the back-off is cleared").
    pub fn on_success(&mut self) {
        self.backoff_time = 0.0;
        self.backoff_interval = 0.0;
    }

    /// A network-up event resets the clock but keeps the interval
    /// (`spec.md` §4.7, §8 S4: "retains the backoff_interval").
    pub fn clear_temporary(&mut self) {
        self.backoff_time = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_failure_uses_initial_backoff() {
        let mut b = BackoffState::default();
        b.on_failure(0.0);
        assert_eq!(b.backoff_interval, INITIAL_BACKOFF_SECS);
        assert_eq!(b.backoff_time, INITIAL_BACKOFF_SECS);
    }

    #[test]
    fn repeated_failures_double_up_to_cap() {
        let mut b = BackoffState::default();
        b.on_failure(0.0);
        b.on_failure(60.0);
        assert_eq!(b.backoff_interval, 120.0);

        // Drive it well past the cap.
        let mut now = 180.0;
        for _ in 0..20 {
            b.on_failure(now);
            now += b.backoff_interval;
        }
        assert_eq!(b.backoff_interval, MAX_BACKOFF_SECS);
    }

    #[test]
    fn success_clears_everything() {
        let mut b = BackoffState::default();
        b.on_failure(0.0);
        b.on_success();
        assert_eq!(b.backoff_interval, 0.0);
        assert!(!b.is_backed_off(0.0));
    }

    #[test]
    fn network_up_clears_clock_but_keeps_interval() {
        let mut b = BackoffState::default();
        b.on_failure(0.0);
        b.on_failure(60.0);
        let interval_before = b.backoff_interval;
        b.clear_temporary();
        assert_eq!(b.backoff_time, 0.0);
        assert_eq!(b.backoff_interval, interval_before);
        assert!(!b.is_backed_off(0.0));
    }
}
