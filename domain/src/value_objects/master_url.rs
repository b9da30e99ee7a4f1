// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Canonical project identity (`spec.md` §3: `master_url (canonical key)`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A project's master URL, canonicalized so it can be used as a stable,
/// lexicographically comparable map key (`spec.md` §4.3: "ties broken by
/// `master_url` lexicographically").
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MasterUrl(String);

impl MasterUrl {
    /// Canonicalizes by lower-casing the scheme/host and ensuring exactly
    /// one trailing slash, matching how the original client treats
    /// `master_url` as an opaque-but-normalized string key.
    pub fn new(raw: impl AsRef<str>) -> Self {
        let mut s = raw.as_ref().trim().to_lowercase();
        if !s.ends_with('/') {
            s.push('/');
        }
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MasterUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MasterUrl {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
impl From<String> for MasterUrl {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
