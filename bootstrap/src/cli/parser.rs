// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # CLI Parser
//!
//! Command-line interface parsing using clap. Security validation of
//! path-shaped arguments happens afterward in `validator`.

use clap::Parser;
use std::path::PathBuf;

/// Top-level CLI arguments for the client process.
#[derive(Parser, Debug, Clone)]
#[command(name = "boinc-client")]
#[command(about = concat!("BOINC scheduling core v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct Cli {
    /// Data directory holding cc_config.xml, global_prefs.xml, and the
    /// persistent state file.
    #[arg(short, long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Override path to cc_config.xml (defaults to `data_dir/cc_config.xml`).
    #[arg(long)]
    pub cc_config: Option<PathBuf>,

    /// Override path to global_prefs.xml (defaults to `data_dir/global_prefs.xml`).
    #[arg(long)]
    pub global_prefs: Option<PathBuf>,

    /// Enable debug-level console logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Allow more than one client instance against the same data directory.
    #[arg(long)]
    pub allow_multiple_clients: bool,

    /// On exit, mark every runnable result ABORTING instead of suspending
    /// tasks and draining checkpoints first.
    #[arg(long)]
    pub abort_jobs_on_exit: bool,

    /// Upper bound, in seconds, the tick loop sleeps between ticks when
    /// there is no pending work-fetch RPC or task event to react to.
    #[arg(long, default_value = "60")]
    pub max_tick_interval_secs: u64,
}

/// Parse CLI arguments from `std::env::args()`.
///
/// # Panics
///
/// `clap` exits the process with a usage message if parsing fails.
pub fn parse_cli() -> Cli {
    Cli::parse()
}
