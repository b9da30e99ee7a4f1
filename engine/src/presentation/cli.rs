// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Admin Commands
//!
//! `status` / `attach` / `detach` (`spec.md` §9 Design Notes), layered on
//! top of `core_bootstrap::cli::Cli`'s daemon flags via `clap`'s subcommand
//! support. These operate on the `ClientState` loaded from the state file
//! directly rather than over a running client's RPC socket, since the
//! scheduler-RPC transport is out of scope for this core (`spec.md` §1
//! Non-goals) — `main` loads the state, applies the command, and saves it
//! back before exiting.

use clap::Subcommand;

use core_domain::aggregates::ClientState;
use core_domain::entities::project::Project;
use core_domain::error::CoreError;
use core_domain::value_objects::MasterUrl;

/// Top-level CLI: the daemon's run flags, plus an optional admin
/// subcommand. Running with no subcommand starts the tick loop; running
/// with one loads the state file, applies the command, and exits.
#[derive(clap::Parser, Debug, Clone)]
#[command(name = "boinc-client")]
#[command(about = concat!("BOINC scheduling core v", env!("CARGO_PKG_VERSION")))]
#[command(version)]
pub struct EngineCli {
    #[command(flatten)]
    pub run: core_bootstrap::cli::Cli,

    #[command(subcommand)]
    pub command: Option<AdminCommand>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommand {
    /// Print a summary of every attached project and its results.
    Status,
    /// Attach a new project to the client state.
    Attach {
        master_url: String,
        project_name: String,
    },
    /// Detach a project, dropping every result, workunit, app, and app
    /// version that referenced it.
    Detach {
        master_url: String,
    },
}

/// Renders a human-readable summary of every attached project
/// (`spec.md` §9 Design Notes: "status").
pub fn render_status(state: &ClientState) -> String {
    let mut out = String::new();
    for (handle, project) in state.projects() {
        out.push_str(&format!(
            "{}  rec={:.2}  suspended={}  dont_request_more_work={}\n",
            project.master_url, project.rec.rec, project.suspended, project.dont_request_more_work
        ));
        let result_count = state.results().filter(|(_, r)| r.project == handle).count();
        out.push_str(&format!("  results: {result_count}\n"));
    }
    if out.is_empty() {
        out.push_str("no projects attached\n");
    }
    out
}

/// Attaches a project by master URL (`spec.md` §9 Design Notes: "attach").
/// Returns the existing project's handle unchanged if already attached,
/// matching the original client's idempotent attach behavior. Re-applies
/// `gpu_exclude_instances` on top of the registry-wide default mask
/// `ClientState::attach_project` seeds, so a freshly attached project
/// immediately honors the user's GPU exclusion list (`spec.md` §4.1, §6).
pub fn attach_project(state: &mut ClientState, master_url: &str, project_name: &str, gpu_exclude_instances: &[(usize, u32)]) -> Result<(), CoreError> {
    let master_url = MasterUrl::new(master_url);
    if state.project_by_url(&master_url).is_some() {
        return Ok(());
    }
    let handle = state.attach_project(Project::new(master_url, project_name.to_string()))?;
    let resources = state.resources.clone();
    if let Ok(project) = state.project_mut(handle) {
        project.init_resource_instances(&resources, gpu_exclude_instances);
    }
    Ok(())
}

/// Detaches a project by master URL (`spec.md` §9 Design Notes: "detach").
pub fn detach_project(state: &mut ClientState, master_url: &str) -> Result<(), CoreError> {
    let master_url = MasterUrl::new(master_url);
    let Some(handle) = state.project_by_url(&master_url) else {
        return Err(CoreError::unknown_entity(format!("no project attached at {master_url}")));
    };
    state.detach_project(handle)
}

#[cfg(test)]
mod tests {
    use core_domain::entities::resource::{Resource, ResourceRegistry};

    use super::*;

    fn empty_state() -> ClientState {
        ClientState::new(ResourceRegistry::new(Resource::cpu(4)))
    }

    #[test]
    fn status_on_an_empty_state_says_so() {
        let state = empty_state();
        assert_eq!(render_status(&state), "no projects attached\n");
    }

    #[test]
    fn attach_then_status_reports_the_project() {
        let mut state = empty_state();
        attach_project(&mut state, "https://example.org/", "Example Project", &[]).unwrap();
        let status = render_status(&state);
        assert!(status.contains("example.org"));
    }

    #[test]
    fn attach_is_idempotent() {
        let mut state = empty_state();
        attach_project(&mut state, "https://example.org/", "Example Project", &[]).unwrap();
        attach_project(&mut state, "https://example.org/", "Example Project", &[]).unwrap();
        assert_eq!(state.projects().count(), 1);
    }

    #[test]
    fn detach_removes_the_project() {
        let mut state = empty_state();
        attach_project(&mut state, "https://example.org/", "Example Project", &[]).unwrap();
        detach_project(&mut state, "https://example.org/").unwrap();
        assert_eq!(render_status(&state), "no projects attached\n");
    }

    #[test]
    fn detach_unknown_project_is_an_error() {
        let mut state = empty_state();
        assert!(detach_project(&mut state, "https://nope.example/").is_err());
    }

    #[test]
    fn engine_cli_parses_an_admin_subcommand() {
        let cli = <EngineCli as clap::Parser>::parse_from(["boinc-client", "attach", "https://example.org/", "Example"]);
        match cli.command {
            Some(AdminCommand::Attach { master_url, project_name }) => {
                assert_eq!(master_url, "https://example.org/");
                assert_eq!(project_name, "Example");
            }
            other => panic!("expected Attach, got {other:?}"),
        }
    }
}
