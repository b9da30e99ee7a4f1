//! # Platform Abstraction
//!
//! OS-specific queries the preference-gating logic needs before the tick
//! loop starts: CPU count (for `ResourceRegistry::cpu()` seeding) and
//! privilege/temp-dir queries used by the state-file and log-file paths.
//!
//! ## Architecture Pattern
//!
//! - **Interface**: `Platform` trait defines the contract
//! - **Implementations**: `UnixPlatform` (Linux/macOS), `WindowsPlatform`
//! - **Selection**: compile-time via `#[cfg]`
//!
//! This lives outside the `domain`/`engine` layers so it can call raw OS
//! APIs (`libc`, `/proc`, `winapi`) without leaking them into the
//! scheduling core.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[cfg(unix)]
mod unix;

#[cfg(windows)]
mod windows;

#[cfg(unix)]
pub use unix::UnixPlatform;

#[cfg(windows)]
pub use windows::WindowsPlatform;

/// Platform-specific errors
#[derive(Debug, Error)]
pub enum PlatformError {
    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Feature not supported on this platform
    #[error("Not supported on this platform: {0}")]
    NotSupported(String),

    /// Generic platform error
    #[error("Platform error: {0}")]
    Other(String),
}

/// Platform abstraction trait for OS-specific operations.
#[async_trait]
pub trait Platform: Send + Sync {
    /// System page size in bytes, used when sizing the state-file write buffer.
    fn page_size(&self) -> usize;

    /// Logical CPU count, used to seed the CPU `Resource` before any probe runs.
    fn cpu_count(&self) -> usize;

    /// Total physical memory in bytes.
    fn total_memory(&self) -> Result<u64, PlatformError>;

    /// Available (free) memory in bytes, consulted by `SchedulingGate`'s
    /// memory-headroom check.
    fn available_memory(&self) -> Result<u64, PlatformError>;

    /// Platform-specific line separator.
    fn line_separator(&self) -> &'static str;

    /// Platform-specific `PATH`-style path separator.
    fn path_separator(&self) -> char;

    /// Platform identifier ("linux", "macos", "windows", ...).
    fn platform_name(&self) -> &'static str;

    /// Platform-specific temporary directory, used for the resource-probe
    /// child process's scratch output.
    fn temp_dir(&self) -> PathBuf;

    /// Whether the process is running with elevated privileges.
    fn is_elevated(&self) -> bool;

    /// Set file permissions (Unix-specific, no-op on Windows).
    fn set_permissions(&self, path: &Path, mode: u32) -> Result<(), PlatformError>;

    /// Whether a path points to an executable file.
    fn is_executable(&self, path: &Path) -> bool;

    /// Flush file buffers to disk, used after writing the persistent state file.
    async fn sync_file(&self, file: &tokio::fs::File) -> Result<(), PlatformError>;
}

#[cfg(unix)]
type PlatformImpl = UnixPlatform;

#[cfg(windows)]
type PlatformImpl = WindowsPlatform;

/// Create the platform-specific implementation for the current OS.
pub fn create_platform() -> Box<dyn Platform> {
    Box::new(PlatformImpl::new())
}
