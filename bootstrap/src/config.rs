//! # Bootstrap Configuration
//!
//! `AppConfig` holds the settings resolved during process start-up, before
//! the tick loop ever runs: the data directory (where `cc_config.xml`,
//! `global_prefs.xml` and the persistent state file live, per
//! `SPEC_FULL.md` §6), the log level, and the two exit-mode flags named in
//! `SPEC_FULL.md` §9.
//!
//! ## Immutability
//!
//! `AppConfig` is immutable after construction: thread-safe to share across
//! the tokio tasks the `engine` crate spawns, with no synchronization.
//!
//! ## Usage
//!
//! ```rust
//! use core_bootstrap::config::{AppConfig, LogLevel};
//! use std::path::PathBuf;
//!
//! let config = AppConfig::builder()
//!     .data_dir(PathBuf::from("/var/lib/boinc"))
//!     .log_level(LogLevel::Info)
//!     .build();
//!
//! println!("Data dir: {:?}", config.data_dir());
//! ```

use std::path::PathBuf;

/// Log level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

impl LogLevel {
    /// Convert to a `tracing::Level`.
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// Resolved bootstrap-phase configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Directory holding `cc_config.xml`, `global_prefs.xml`, the state
    /// file, and project slot subdirectories.
    data_dir: PathBuf,

    /// Log level.
    log_level: LogLevel,

    /// Override path for `cc_config.xml` (defaults to `data_dir/cc_config.xml`).
    cc_config_path: Option<PathBuf>,

    /// Override path for `global_prefs.xml` (defaults to `data_dir/global_prefs.xml`).
    global_prefs_path: Option<PathBuf>,

    /// Allow more than one client instance to run against the same data
    /// directory concurrently (normally rejected via a lock file).
    allow_multiple_clients: bool,

    /// Exit strategy: mark every runnable result `ABORTING` immediately
    /// instead of suspending and draining checkpoints first
    /// (`SPEC_FULL.md` §9).
    abort_jobs_on_exit: bool,

    /// Enable verbose (debug-level) console output regardless of `log_level`.
    verbose: bool,
}

impl AppConfig {
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    pub fn data_dir(&self) -> &std::path::Path {
        &self.data_dir
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn cc_config_path(&self) -> PathBuf {
        self.cc_config_path.clone().unwrap_or_else(|| self.data_dir.join("cc_config.xml"))
    }

    pub fn global_prefs_path(&self) -> PathBuf {
        self.global_prefs_path.clone().unwrap_or_else(|| self.data_dir.join("global_prefs.xml"))
    }

    pub fn state_file_path(&self) -> PathBuf {
        self.data_dir.join("client_state.xml")
    }

    pub fn allow_multiple_clients(&self) -> bool {
        self.allow_multiple_clients
    }

    pub fn abort_jobs_on_exit(&self) -> bool {
        self.abort_jobs_on_exit
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug, Default)]
pub struct AppConfigBuilder {
    data_dir: Option<PathBuf>,
    log_level: Option<LogLevel>,
    cc_config_path: Option<PathBuf>,
    global_prefs_path: Option<PathBuf>,
    allow_multiple_clients: bool,
    abort_jobs_on_exit: bool,
    verbose: bool,
}

impl AppConfigBuilder {
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(path.into());
        self
    }

    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.log_level = Some(level);
        self
    }

    pub fn cc_config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.cc_config_path = Some(path.into());
        self
    }

    pub fn global_prefs_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.global_prefs_path = Some(path.into());
        self
    }

    pub fn allow_multiple_clients(mut self, enabled: bool) -> Self {
        self.allow_multiple_clients = enabled;
        self
    }

    pub fn abort_jobs_on_exit(mut self, enabled: bool) -> Self {
        self.abort_jobs_on_exit = enabled;
        self
    }

    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    /// Build the configuration, defaulting `data_dir` to the current
    /// directory (matching the original client's "run from the data
    /// directory" convention) if unset.
    pub fn build(self) -> AppConfig {
        AppConfig {
            data_dir: self.data_dir.unwrap_or_else(|| PathBuf::from(".")),
            log_level: self.log_level.unwrap_or_default(),
            cc_config_path: self.cc_config_path,
            global_prefs_path: self.global_prefs_path,
            allow_multiple_clients: self.allow_multiple_clients,
            abort_jobs_on_exit: self.abort_jobs_on_exit,
            verbose: self.verbose,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_data_dir_to_current_directory() {
        let config = AppConfig::builder().build();
        assert_eq!(config.data_dir(), std::path::Path::new("."));
        assert_eq!(config.log_level(), LogLevel::Info);
        assert!(!config.allow_multiple_clients());
        assert!(!config.abort_jobs_on_exit());
    }

    #[test]
    fn derived_paths_fall_back_to_data_dir() {
        let config = AppConfig::builder().data_dir("/var/lib/boinc").build();
        assert_eq!(config.cc_config_path(), PathBuf::from("/var/lib/boinc/cc_config.xml"));
        assert_eq!(config.global_prefs_path(), PathBuf::from("/var/lib/boinc/global_prefs.xml"));
        assert_eq!(config.state_file_path(), PathBuf::from("/var/lib/boinc/client_state.xml"));
    }

    #[test]
    fn explicit_overrides_win_over_data_dir_derivation() {
        let config = AppConfig::builder()
            .data_dir("/var/lib/boinc")
            .cc_config_path("/etc/boinc/cc_config.xml")
            .build();
        assert_eq!(config.cc_config_path(), PathBuf::from("/etc/boinc/cc_config.xml"));
    }

    #[test]
    fn log_level_default_is_info() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
    }
}
