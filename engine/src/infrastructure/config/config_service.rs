// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Configuration Service
//!
//! Loads `CcConfig`, `GlobalPrefs`, and `NvcConfig` (`spec.md` §6) from a
//! layered source stack: built-in `Default` values, overridden by an
//! on-disk file (TOML, YAML, or JSON, inferred from the extension),
//! overridden in turn by environment variables under a per-config prefix.
//!
//! A file that fails to parse is non-fatal (`spec.md` §7): the file is left
//! untouched on disk, the caller gets the `Default` value back, and a
//! [`Notice`] describes what went wrong so the presentation layer can
//! surface it to the user.

use std::path::Path;

use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use tracing::warn;

use core_domain::events::Notice;
use core_domain::preferences::{CcConfig, GlobalPrefs, NvcConfig};

fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

fn load<T: Default + DeserializeOwned>(path: &Path, env_prefix: &str, kind: &str) -> (T, Option<Notice>) {
    // The data directory keeps the original client's `*.xml` file names
    // (`cc_config.xml`, `global_prefs.xml`) for operator familiarity, but
    // their content is TOML; the `config` crate can't infer that from the
    // extension, so the format is pinned explicitly.
    let result = Config::builder()
        .add_source(File::from(path.to_path_buf()).format(config::FileFormat::Toml).required(false))
        .add_source(Environment::with_prefix(env_prefix).separator("__"))
        .build()
        .and_then(Config::try_deserialize::<T>);

    match result {
        Ok(value) => (value, None),
        Err(e) => {
            warn!(kind, path = %path.display(), error = %e, "failed to load config, falling back to defaults");
            let notice = Notice {
                project: None,
                title: format!("{kind} configuration error"),
                description: format!("could not load {:?}: {e}", path),
                created_at: now_secs(),
            };
            (T::default(), Some(notice))
        }
    }
}

/// Loads the three on-disk configuration files the tick loop consults
/// (`spec.md` §6). Each path is independent: a missing or malformed file
/// only affects that one config, never the others.
pub struct ConfigService;

impl ConfigService {
    pub fn load_cc_config(path: &Path) -> (CcConfig, Option<Notice>) {
        load(path, "BOINC_CC_CONFIG", "cc_config")
    }

    pub fn load_global_prefs(path: &Path) -> (GlobalPrefs, Option<Notice>) {
        load(path, "BOINC_GLOBAL_PREFS", "global_prefs")
    }

    pub fn load_nvc_config(path: &Path) -> (NvcConfig, Option<Notice>) {
        load(path, "BOINC_NVC_CONFIG", "nvc_config")
    }
}
