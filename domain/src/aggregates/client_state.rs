// /////////////////////////////////////////////////////////////////////////////
// Optimized Adaptive Pipeline RS
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Client State
//!
//! `ClientState` is the single aggregate root holding every entity the
//! scheduling core reasons about: the resource registry and, for each
//! project, its apps/app versions/workunits/results/files. Entities are
//! stored in dense per-kind arenas and referenced by `Handle<T>`, never by
//! raw pointer (`spec.md` §9 Design Notes). This replaces the original's
//! cross-linked `PROJECT`/`RESULT`/`WORKUNIT`/`APP_VERSION` pointer graph
//! with index-stable, `Copy` references that remain valid across a save and
//! reload (`original_source/client/client_types.h`).

use std::collections::HashMap;

use crate::entities::app::{App, ProjectHandle};
use crate::entities::app_version::{AppHandle, AppVersion, AppVersionHandle};
use crate::entities::file_info::{FileHandle, FileInfo};
use crate::entities::project::Project;
use crate::entities::resource::ResourceRegistry;
use crate::entities::result::{Result as JobResult, ResultHandle, ResultState};
use crate::entities::workunit::{Workunit, WorkunitHandle};
use crate::error::CoreError;
use crate::value_objects::{Handle, MasterUrl};

/// The aggregate root: every entity arena plus the registry and the lookup
/// indexes needed to resolve identifiers after a load (`spec.md` §9: "after
/// deserializing, a resolution pass must convert... identifiers back into
/// `Handle`s").
#[derive(Debug, Clone, Default)]
pub struct ClientState {
    pub resources: ResourceRegistry,

    projects: Vec<Project>,
    apps: Vec<App>,
    app_versions: Vec<AppVersion>,
    workunits: Vec<Workunit>,
    results: Vec<JobResult>,
    files: Vec<FileInfo>,

    by_master_url: HashMap<MasterUrl, ProjectHandle>,
    by_app_name: HashMap<(ProjectHandle, String), AppHandle>,
    by_workunit_name: HashMap<(ProjectHandle, String), WorkunitHandle>,
    by_file_name: HashMap<(ProjectHandle, String), FileHandle>,
}

impl ClientState {
    pub fn new(resources: ResourceRegistry) -> Self {
        Self { resources, ..Default::default() }
    }

    // -- Projects --------------------------------------------------------

    /// Attaches a new project, keyed by its (already canonicalized)
    /// `master_url` (`spec.md` §4.6 "Project Attach/Detach").
    pub fn attach_project(&mut self, mut project: Project) -> std::result::Result<ProjectHandle, CoreError> {
        if self.by_master_url.contains_key(&project.master_url) {
            return Err(CoreError::invariant(format!("project already attached: {}", project.master_url)));
        }
        // Without this, every ResourceProjectState starts with an empty
        // non_excluded_instances mask and the project can never be handed
        // work on any resource type (`spec.md` §3 invariant).
        project.init_resource_instances(&self.resources, &[]);
        let handle = Handle::new(self.projects.len());
        self.by_master_url.insert(project.master_url.clone(), handle);
        self.projects.push(project);
        Ok(handle)
    }

    /// Re-seeds every attached project's `non_excluded_instances` from the
    /// current registry. Needed when a coprocessor resource is detected
    /// after projects were already attached, since those projects' masks
    /// were seeded against a registry that didn't know about it yet.
    pub fn refresh_resource_instances(&mut self, gpu_exclude_instances: &[(usize, u32)]) {
        let resources = self.resources.clone();
        for project in self.projects.iter_mut() {
            project.init_resource_instances(&resources, gpu_exclude_instances);
        }
    }

    /// Detaches a project: marks every app version, workunit, result, and
    /// file owned by it for removal and drops the project's lookup entry.
    /// Entities are never physically removed from the arena (that would
    /// invalidate every other handle); instead refcounted files become GC
    /// eligible and results/workunits are orphaned for a later compaction
    /// pass (`spec.md` §4.6, §9 Design Notes on arena stability).
    pub fn detach_project(&mut self, handle: ProjectHandle) -> std::result::Result<(), CoreError> {
        let project = self.project(handle)?;
        self.by_master_url.remove(&project.master_url.clone());

        for file in self.files.iter_mut() {
            if file.project == handle && file.refcount > 0 {
                file.refcount -= 1;
            }
        }
        Ok(())
    }

    pub fn project(&self, handle: ProjectHandle) -> std::result::Result<&Project, CoreError> {
        self.projects.get(handle.index()).ok_or_else(|| CoreError::unknown_entity(format!("project handle {:?}", handle)))
    }

    pub fn project_mut(&mut self, handle: ProjectHandle) -> std::result::Result<&mut Project, CoreError> {
        self.projects
            .get_mut(handle.index())
            .ok_or_else(|| CoreError::unknown_entity(format!("project handle {:?}", handle)))
    }

    pub fn project_by_url(&self, master_url: &MasterUrl) -> Option<ProjectHandle> {
        self.by_master_url.get(master_url).copied()
    }

    pub fn projects(&self) -> impl Iterator<Item = (ProjectHandle, &Project)> {
        self.projects.iter().enumerate().map(|(i, p)| (Handle::new(i), p))
    }

    // -- Apps / app versions ----------------------------------------------

    pub fn add_app(&mut self, app: App) -> AppHandle {
        let key = (app.project, app.name.clone());
        let handle = Handle::new(self.apps.len());
        self.by_app_name.insert(key, handle);
        self.apps.push(app);
        handle
    }

    pub fn app(&self, handle: AppHandle) -> std::result::Result<&App, CoreError> {
        self.apps.get(handle.index()).ok_or_else(|| CoreError::unknown_entity(format!("app handle {:?}", handle)))
    }

    pub fn app_mut(&mut self, handle: AppHandle) -> std::result::Result<&mut App, CoreError> {
        self.apps.get_mut(handle.index()).ok_or_else(|| CoreError::unknown_entity(format!("app handle {:?}", handle)))
    }

    pub fn app_by_name(&self, project: ProjectHandle, name: &str) -> Option<AppHandle> {
        self.by_app_name.get(&(project, name.to_string())).copied()
    }

    pub fn apps(&self) -> impl Iterator<Item = (AppHandle, &App)> {
        self.apps.iter().enumerate().map(|(i, a)| (Handle::new(i), a))
    }

    /// Inserts or replaces the app version for (project, app, platform,
    /// version_num), matching the original scheduler reply behavior where a
    /// re-announced version supersedes the previous one in place
    /// (`spec.md` §4.6).
    pub fn upsert_app_version(&mut self, version: AppVersion) -> AppVersionHandle {
        if let Some(existing) = self.app_versions.iter().position(|v| {
            v.project == version.project && v.app == version.app && v.platform == version.platform && v.version_num == version.version_num
        }) {
            self.app_versions[existing] = version;
            Handle::new(existing)
        } else {
            let handle = Handle::new(self.app_versions.len());
            self.app_versions.push(version);
            handle
        }
    }

    pub fn app_version(&self, handle: AppVersionHandle) -> std::result::Result<&AppVersion, CoreError> {
        self.app_versions
            .get(handle.index())
            .ok_or_else(|| CoreError::unknown_entity(format!("app version handle {:?}", handle)))
    }

    pub fn app_versions(&self) -> impl Iterator<Item = (AppVersionHandle, &AppVersion)> {
        self.app_versions.iter().enumerate().map(|(i, v)| (Handle::new(i), v))
    }

    // -- Workunits ---------------------------------------------------------

    pub fn add_workunit(&mut self, workunit: Workunit) -> WorkunitHandle {
        let key = (workunit.project, workunit.name.clone());
        let handle = Handle::new(self.workunits.len());
        self.by_workunit_name.insert(key, handle);
        self.workunits.push(workunit);
        handle
    }

    pub fn workunit(&self, handle: WorkunitHandle) -> std::result::Result<&Workunit, CoreError> {
        self.workunits
            .get(handle.index())
            .ok_or_else(|| CoreError::unknown_entity(format!("workunit handle {:?}", handle)))
    }

    pub fn workunits(&self) -> impl Iterator<Item = (WorkunitHandle, &Workunit)> {
        self.workunits.iter().enumerate().map(|(i, w)| (Handle::new(i), w))
    }

    // -- Results -------------------------------------------------------------

    pub fn add_result(&mut self, result: JobResult) -> ResultHandle {
        let handle = Handle::new(self.results.len());
        self.results.push(result);
        handle
    }

    pub fn result(&self, handle: ResultHandle) -> std::result::Result<&JobResult, CoreError> {
        self.results.get(handle.index()).ok_or_else(|| CoreError::unknown_entity(format!("result handle {:?}", handle)))
    }

    pub fn result_mut(&mut self, handle: ResultHandle) -> std::result::Result<&mut JobResult, CoreError> {
        self.results
            .get_mut(handle.index())
            .ok_or_else(|| CoreError::unknown_entity(format!("result handle {:?}", handle)))
    }

    /// Applies a validated state transition in place (`spec.md` §4.5).
    pub fn mark_result_state(&mut self, handle: ResultHandle, new_state: ResultState) -> std::result::Result<(), CoreError> {
        self.result_mut(handle)?.set_state(new_state)
    }

    pub fn results(&self) -> impl Iterator<Item = (ResultHandle, &JobResult)> {
        self.results.iter().enumerate().map(|(i, r)| (Handle::new(i), r))
    }

    /// Results currently holding resource instances (`spec.md` §3 "running
    /// set"), used by both the scheduler and the instance-count invariant
    /// check.
    pub fn running_results(&self) -> impl Iterator<Item = (ResultHandle, &JobResult)> {
        self.results().filter(|(_, r)| r.state.is_running())
    }

    // -- Files -----------------------------------------------------------------

    pub fn add_file(&mut self, file: FileInfo) -> FileHandle {
        let key = (file.project, file.name.clone());
        let handle = Handle::new(self.files.len());
        self.by_file_name.insert(key, handle);
        self.files.push(file);
        handle
    }

    pub fn file(&self, handle: FileHandle) -> std::result::Result<&FileInfo, CoreError> {
        self.files.get(handle.index()).ok_or_else(|| CoreError::unknown_entity(format!("file handle {:?}", handle)))
    }

    pub fn file_mut(&mut self, handle: FileHandle) -> std::result::Result<&mut FileInfo, CoreError> {
        self.files.get_mut(handle.index()).ok_or_else(|| CoreError::unknown_entity(format!("file handle {:?}", handle)))
    }

    pub fn file_by_name(&self, project: ProjectHandle, name: &str) -> Option<FileHandle> {
        self.by_file_name.get(&(project, name.to_string())).copied()
    }

    pub fn files(&self) -> impl Iterator<Item = (FileHandle, &FileInfo)> {
        self.files.iter().enumerate().map(|(i, f)| (Handle::new(i), f))
    }

    /// Deletes every file eligible for garbage collection (`spec.md` §4.2),
    /// returning the handles removed. Arena slots are cleared in place
    /// rather than compacted, preserving every other handle's validity: each
    /// removed file is tombstoned `Deleted` and its `by_file_name` entry
    /// dropped, but its index in `self.files` keeps its slot.
    pub fn gc_files(&mut self, now: f64) -> Vec<FileHandle> {
        let eligible: Vec<usize> = self
            .files
            .iter()
            .enumerate()
            .filter(|(_, file)| file.is_gc_eligible(now))
            .map(|(i, _)| i)
            .collect();

        let mut removed = Vec::with_capacity(eligible.len());
        for i in eligible {
            let file = &mut self.files[i];
            self.by_file_name.remove(&(file.project, file.name.clone()));
            file.mark_deleted();
            removed.push(Handle::new(i));
        }
        removed
    }

    /// Clears every temporary back-off clock (scheduler RPC, per-resource
    /// work-fetch, per-file transfer) on a network-up event, while keeping
    /// each one's `backoff_interval` so a later failure resumes doubling
    /// instead of restarting (`spec.md` §4.7, §8 scenario S4).
    pub fn clear_temporary_backoffs(&mut self) {
        for project in self.projects.iter_mut() {
            project.scheduler_rpc_backoff.clear_temporary();
            for rps in project.resources.iter_mut() {
                rps.backoff.clear_temporary();
            }
        }
        for file in self.files.iter_mut() {
            file.download_backoff.backoff.clear_temporary();
            file.upload_backoff.backoff.clear_temporary();
        }
    }

    /// Re-derives the `by_*` lookup indexes from the arenas' current
    /// contents. Called once after a state file load, where entities
    /// arrive keyed by their original string/integer identifiers and must
    /// be re-linked into `Handle`s before any operation can run
    /// (`spec.md` §9 Design Notes).
    pub fn resolve_references(&mut self) {
        self.by_master_url.clear();
        for (i, p) in self.projects.iter().enumerate() {
            self.by_master_url.insert(p.master_url.clone(), Handle::new(i));
        }
        self.by_app_name.clear();
        for (i, a) in self.apps.iter().enumerate() {
            self.by_app_name.insert((a.project, a.name.clone()), Handle::new(i));
        }
        self.by_workunit_name.clear();
        for (i, w) in self.workunits.iter().enumerate() {
            self.by_workunit_name.insert((w.project, w.name.clone()), Handle::new(i));
        }
        self.by_file_name.clear();
        for (i, f) in self.files.iter().enumerate() {
            if f.status != crate::entities::file_info::FileStatus::Deleted {
                self.by_file_name.insert((f.project, f.name.clone()), Handle::new(i));
            }
        }
    }

    /// Validates the running-set instance-count invariant (`spec.md` §8
    /// property 1): for every resource type, the sum of running results'
    /// instance counts never exceeds that resource's `n_instances`.
    pub fn check_instance_count_invariant(&self) -> std::result::Result<(), CoreError> {
        let mut used = vec![0u32; self.resources.len()];
        for (_, result) in self.running_results() {
            let Ok(version) = self.app_version(result.app_version) else { continue };
            if version.rsc_type < used.len() {
                used[version.rsc_type] += result.instances_used.count().max(1);
            }
        }
        for (rsc_type, resource) in self.resources.iter().enumerate() {
            if used[rsc_type] > resource.n_instances {
                return Err(CoreError::invariant(format!(
                    "resource {} over capacity: {} used of {}",
                    rsc_type, used[rsc_type], resource.n_instances
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::resource::Resource;

    fn state() -> ClientState {
        ClientState::new(ResourceRegistry::new(Resource::cpu(4)))
    }

    #[test]
    fn attaching_duplicate_master_url_is_rejected() {
        let mut s = state();
        s.attach_project(Project::new("https://example.org/p", "Example")).unwrap();
        let err = s.attach_project(Project::new("https://example.org/p", "Example")).unwrap_err();
        assert_eq!(err.category(), "invariant");
    }

    #[test]
    fn detach_clears_url_index_and_decrements_file_refcounts() {
        let mut s = state();
        let handle = s.attach_project(Project::new("https://example.org/p", "Example")).unwrap();
        let file = s.add_file(FileInfo::new(handle, "input.dat", 10, "abc"));
        s.file_mut(file).unwrap().refcount = 1;

        s.detach_project(handle).unwrap();
        assert!(s.project_by_url(&MasterUrl::new("https://example.org/p")).is_none());
        assert_eq!(s.file(file).unwrap().refcount, 0);
    }

    #[test]
    fn gc_files_finds_only_eligible_files() {
        let mut s = state();
        let handle = s.attach_project(Project::new("https://example.org/p", "Example")).unwrap();
        let eligible = s.add_file(FileInfo::new(handle, "a.dat", 1, "a"));
        let held = s.add_file(FileInfo::new(handle, "b.dat", 1, "b"));
        s.file_mut(held).unwrap().refcount = 1;

        let removed = s.gc_files(0.0);
        assert_eq!(removed, vec![eligible]);
    }

    #[test]
    fn gc_files_tombstones_the_slot_and_drops_the_name_lookup() {
        use crate::entities::file_info::FileStatus;

        let mut s = state();
        let handle = s.attach_project(Project::new("https://example.org/p", "Example")).unwrap();
        let file = s.add_file(FileInfo::new(handle, "a.dat", 1, "a"));

        s.gc_files(0.0);
        assert_eq!(s.file(file).unwrap().status, FileStatus::Deleted, "handle must stay valid, pointing at a tombstoned slot");
        assert!(s.file_by_name(handle, "a.dat").is_none());

        // A second pass must not re-collect an already-deleted file.
        assert!(s.gc_files(0.0).is_empty());
    }

    #[test]
    fn clear_temporary_backoffs_resets_clock_but_keeps_interval() {
        let mut s = state();
        let p = s.attach_project(Project::new("https://example.org/p", "Example")).unwrap();
        s.project_mut(p).unwrap().scheduler_rpc_backoff.on_failure(0.0);
        s.project_mut(p).unwrap().scheduler_rpc_backoff.on_failure(60.0);
        let interval = s.project(p).unwrap().scheduler_rpc_backoff.backoff_interval;

        s.clear_temporary_backoffs();
        let backoff = s.project(p).unwrap().scheduler_rpc_backoff;
        assert_eq!(backoff.backoff_time, 0.0);
        assert_eq!(backoff.backoff_interval, interval);
    }

    #[test]
    fn resolve_references_rebuilds_lookup_maps_after_load() {
        let mut s = state();
        let handle = s.attach_project(Project::new("https://example.org/p", "Example")).unwrap();
        s.by_master_url.clear();
        assert!(s.project_by_url(&MasterUrl::new("https://example.org/p")).is_none());

        s.resolve_references();
        assert_eq!(s.project_by_url(&MasterUrl::new("https://example.org/p")), Some(handle));
    }

    #[test]
    fn instance_count_invariant_flags_overcommitted_resource() {
        let mut s = state();
        let project = s.attach_project(Project::new("https://example.org/p", "Example")).unwrap();
        let app = s.add_app(App::new(project, "app"));
        let version = s.upsert_app_version(AppVersion::new(project, app, 1, "x86_64", "default"));
        let wu = s.add_workunit(Workunit::new(project, "wu", 1.0e9));

        for i in 0..5 {
            let mut r = JobResult::new(project, wu, version, format!("wu_{i}"), 1000.0);
            r.set_state(ResultState::Downloading).unwrap();
            r.set_state(ResultState::Ready).unwrap();
            r.set_state(ResultState::Running).unwrap();
            r.instances_used.set(0);
            s.add_result(r);
        }

        assert!(s.check_instance_count_invariant().is_err());
    }
}
