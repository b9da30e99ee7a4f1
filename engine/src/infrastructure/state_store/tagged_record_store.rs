// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Tagged-Record State Store
//!
//! Persists `ClientState` as a textual tagged-record format: one entity
//! per line, as `<tag> <json>` (`spec.md` §6 "a textual tagged-record
//! format carrying the full graph"). Resolves the REDESIGN FLAGS §9
//! strategy of "define a typed schema once; derive both reader and writer
//! from it" by reusing the entities' own `serde` derives as the schema,
//! rather than hand-rolling a parser per field. A line whose tag this
//! store doesn't recognize is kept verbatim and rewritten unchanged on the
//! next save, so a newer writer's fields are never silently dropped by an
//! older one (`spec.md` §9: "unknown tags recorded as opaque pass-through
//! to avoid data loss").

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{error, warn};

use core_domain::aggregates::ClientState;
use core_domain::entities::project::Project;
use core_domain::entities::resource::{Resource, ResourceRegistry};
use core_domain::entities::result::ResultState;
use core_domain::error::CoreError;
use core_domain::services::state_store::StateStore;

const TAG_RESOURCE_REGISTRY: &str = "resource_registry";
const TAG_PROJECT: &str = "project";
const TAG_APP: &str = "app";
const TAG_APP_VERSION: &str = "app_version";
const TAG_WORKUNIT: &str = "workunit";
const TAG_RESULT: &str = "result";
const TAG_FILE_INFO: &str = "file_info";

/// `StateStore` implementation backed by one plain-text file. Unknown tags
/// encountered on `load` are cached and re-emitted verbatim by the next
/// `save`, so `load` and `save` on the same store round-trip a foreign
/// writer's data even though this store doesn't understand it.
pub struct TaggedRecordStore {
    path: PathBuf,
    unknown_records: Mutex<Vec<String>>,
}

impl TaggedRecordStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path, unknown_records: Mutex::new(Vec::new()) }
    }

    fn record_line<T: serde::Serialize>(tag: &str, value: &T) -> std::result::Result<String, CoreError> {
        Ok(format!("{tag} {}", serde_json::to_string(value)?))
    }
}

#[async_trait]
impl StateStore for TaggedRecordStore {
    async fn load(&self) -> std::result::Result<ClientState, CoreError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                *self.unknown_records.lock().await = Vec::new();
                return Ok(ClientState::new(ResourceRegistry::new(Resource::cpu(1))));
            }
            Err(e) => return Err(CoreError::from(e)),
        };

        let mut registry = ResourceRegistry::new(Resource::cpu(1));
        let mut raw_projects = Vec::new();
        let mut raw_apps = Vec::new();
        let mut raw_versions = Vec::new();
        let mut raw_workunits = Vec::new();
        let mut raw_results = Vec::new();
        let mut raw_files = Vec::new();
        let mut unknown = Vec::new();

        for line in text.lines() {
            if line.trim().is_empty() {
                continue;
            }
            let Some((tag, payload)) = line.split_once(' ') else {
                unknown.push(line.to_string());
                continue;
            };
            match tag {
                TAG_RESOURCE_REGISTRY => match serde_json::from_str(payload) {
                    Ok(r) => registry = r,
                    Err(e) => {
                        warn!(error = %e, "unparseable resource_registry record, keeping as opaque pass-through");
                        unknown.push(line.to_string());
                    }
                },
                TAG_PROJECT => raw_projects.push(payload.to_string()),
                TAG_APP => raw_apps.push(payload.to_string()),
                TAG_APP_VERSION => raw_versions.push(payload.to_string()),
                TAG_WORKUNIT => raw_workunits.push(payload.to_string()),
                TAG_RESULT => raw_results.push(payload.to_string()),
                TAG_FILE_INFO => raw_files.push(payload.to_string()),
                _ => unknown.push(line.to_string()),
            }
        }

        let mut state = ClientState::new(registry);

        for raw in raw_projects {
            let project: Project = serde_json::from_str(&raw)?;
            if let Err(e) = state.attach_project(project) {
                warn!(error = %e, "dropping duplicate or invalid project record on load");
            }
        }
        for raw in raw_apps {
            state.add_app(serde_json::from_str(&raw)?);
        }
        for raw in raw_versions {
            state.upsert_app_version(serde_json::from_str(&raw)?);
        }
        for raw in raw_workunits {
            state.add_workunit(serde_json::from_str(&raw)?);
        }
        for raw in raw_results {
            state.add_result(serde_json::from_str(&raw)?);
        }
        for raw in raw_files {
            state.add_file(serde_json::from_str(&raw)?);
        }

        // Post-load identifier resolution (`spec.md` §9 Design Notes): the
        // lookup maps keyed by (project, name) must be rebuilt before any
        // `*_by_name`/`project_by_url` call succeeds again.
        state.resolve_references();
        quarantine_dangling_references(&mut state);

        *self.unknown_records.lock().await = unknown;
        Ok(state)
    }

    async fn save(&self, state: &ClientState) -> std::result::Result<(), CoreError> {
        let mut lines = Vec::new();
        lines.push(Self::record_line(TAG_RESOURCE_REGISTRY, &state.resources)?);
        for (_, project) in state.projects() {
            lines.push(Self::record_line(TAG_PROJECT, project)?);
        }
        for (_, app) in state.apps() {
            lines.push(Self::record_line(TAG_APP, app)?);
        }
        for (_, version) in state.app_versions() {
            lines.push(Self::record_line(TAG_APP_VERSION, version)?);
        }
        for (_, workunit) in state.workunits() {
            lines.push(Self::record_line(TAG_WORKUNIT, workunit)?);
        }
        for (_, result) in state.results() {
            lines.push(Self::record_line(TAG_RESULT, result)?);
        }
        for (_, file) in state.files() {
            lines.push(Self::record_line(TAG_FILE_INFO, file)?);
        }
        lines.extend(self.unknown_records.lock().await.iter().cloned());

        let mut content = lines.join("\n");
        content.push('\n');

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(CoreError::from)?;
        }
        let tmp_path = self.path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp_path).await.map_err(CoreError::from)?;
        file.write_all(content.as_bytes()).await.map_err(CoreError::from)?;
        file.flush().await.map_err(CoreError::from)?;
        tokio::fs::rename(&tmp_path, &self.path).await.map_err(CoreError::from)?;
        Ok(())
    }
}

/// Forces any runnable result whose `project`/`workunit`/`app_version`
/// handle doesn't resolve to `Failed`, so a corrupted or truncated state
/// file degrades one result at a time instead of making every later tick's
/// RR-Sim/scheduler pass fail outright (`spec.md` §4.2 additions:
/// "dangling references are quarantined... and dropped from scheduling").
fn quarantine_dangling_references(state: &mut ClientState) {
    let runnable: Vec<_> = state.results().filter(|(_, r)| r.state.is_runnable()).map(|(h, _)| h).collect();
    for handle in runnable {
        let Ok(result) = state.result(handle) else { continue };
        let dangling = state.project(result.project).is_err() || state.workunit(result.workunit).is_err() || state.app_version(result.app_version).is_err();
        if dangling {
            error!(?handle, "result references a missing project/workunit/app_version after load, quarantining from scheduling");
            if let Err(e) = state.mark_result_state(handle, ResultState::Failed) {
                error!(?handle, error = %e, "failed to quarantine result with dangling references");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_domain::entities::app::App;
    use core_domain::entities::app_version::AppVersion;
    use core_domain::entities::result::Result as JobResult;
    use core_domain::entities::workunit::Workunit;
    use std::sync::atomic::{AtomicU32, Ordering};

    static TEST_DIR_COUNTER: AtomicU32 = AtomicU32::new(0);

    fn populated_state() -> ClientState {
        let mut s = ClientState::new(ResourceRegistry::new(Resource::cpu(4)));
        let project = s.attach_project(Project::new("https://example.org/p", "Example")).unwrap();
        let app = s.add_app(App::new(project, "app"));
        let version = s.upsert_app_version(AppVersion::new(project, app, 1, "x86_64", "default"));
        let wu = s.add_workunit(Workunit::new(project, "wu_0", 1.0e9));
        let mut r = JobResult::new(project, wu, version, "r0", 1000.0);
        r.set_state(ResultState::Downloading).unwrap();
        r.set_state(ResultState::Ready).unwrap();
        s.add_result(r);
        s
    }

    #[tokio::test]
    async fn round_trips_a_populated_state_through_save_and_load() {
        let dir = tempdir();
        let path = dir.join("client_state.txt");
        let store = TaggedRecordStore::new(path.clone());

        let original = populated_state();
        store.save(&original).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded.resources.len(), original.resources.len());
        assert_eq!(loaded.projects().count(), 1);
        assert_eq!(loaded.results().count(), 1);
        let (_, result) = loaded.results().next().unwrap();
        assert_eq!(result.name, "r0");
        assert_eq!(result.state, ResultState::Ready);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn missing_state_file_yields_an_empty_state_rather_than_an_error() {
        let dir = tempdir();
        let path = dir.join("does_not_exist.txt");
        let store = TaggedRecordStore::new(path);

        let state = store.load().await.unwrap();
        assert_eq!(state.projects().count(), 0);
        assert_eq!(state.resources.len(), 1);

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn unknown_tagged_lines_survive_a_load_then_save_round_trip() {
        let dir = tempdir();
        let path = dir.join("client_state.txt");

        let registry_json = serde_json::to_string(&ResourceRegistry::new(Resource::cpu(2))).unwrap();
        let content = format!("resource_registry {registry_json}\nfuture_feature {{\"x\":1}}\n");
        tokio::fs::write(&path, content).await.unwrap();

        let store = TaggedRecordStore::new(path.clone());
        let state = store.load().await.unwrap();
        store.save(&state).await.unwrap();

        let saved = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(saved.contains("future_feature {\"x\":1}"));

        std::fs::remove_dir_all(dir).ok();
    }

    #[tokio::test]
    async fn a_result_with_a_dangling_workunit_reference_is_quarantined_on_load() {
        let dir = tempdir();
        let path = dir.join("client_state.txt");

        let mut s = ClientState::new(ResourceRegistry::new(Resource::cpu(2)));
        let project = s.attach_project(Project::new("https://a/", "A")).unwrap();
        let app = s.add_app(App::new(project, "app"));
        let version = s.upsert_app_version(AppVersion::new(project, app, 1, "x86_64", "default"));
        // Workunit handle 7 is never added, simulating a truncated file.
        let bogus_workunit = core_domain::value_objects::Handle::new(7usize);
        let mut r = JobResult::new(project, bogus_workunit, version, "dangling", 1000.0);
        r.set_state(ResultState::Downloading).unwrap();
        r.set_state(ResultState::Ready).unwrap();
        s.add_result(r);

        let store = TaggedRecordStore::new(path.clone());
        store.save(&s).await.unwrap();

        let loaded = store.load().await.unwrap();
        let (_, result) = loaded.results().next().unwrap();
        assert_eq!(result.state, ResultState::Failed);

        std::fs::remove_dir_all(dir).ok();
    }

    fn tempdir() -> std::path::PathBuf {
        let n = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("tagged_record_store_test_{}_{}", std::process::id(), n));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }
}
