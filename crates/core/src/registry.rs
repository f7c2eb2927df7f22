//! Aggregation of multiple stores behind one view.
//!
//! The registry performs no caching of its own; listing caches belong to the
//! individual stores. It is a fan-out/fan-in coordinator: rare registrations
//! at startup, frequent concurrent lookups afterwards.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use serde::Serialize;

use crate::error::{Result, StoreError};
use crate::lazy::LazySession;
use crate::store::Store;
use crate::types::{Project, SessionMeta, Source};

/// Display-oriented information about a registered source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceInfo {
    pub source: Source,
    pub name: String,
    pub description: String,
    pub available: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub workspace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_path: Option<PathBuf>,
    pub project_count: usize,
}

/// Holds at most one [`Store`] per source tag; last registration wins.
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<BTreeMap<Source, Arc<dyn Store>>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, store: Arc<dyn Store>) {
        let source = store.source();
        self.stores
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(source, store);
    }

    pub fn get(&self, source: &Source) -> Option<Arc<dyn Store>> {
        self.stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(source)
            .cloned()
    }

    /// All registered stores, ordered by source tag.
    pub fn all(&self) -> Vec<Arc<dyn Store>> {
        self.stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    pub fn sources(&self) -> Vec<Source> {
        self.stores
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect()
    }

    /// Sources that currently have at least one project.
    pub fn available_sources(&self) -> Vec<Source> {
        self.all()
            .into_iter()
            .filter(|store| matches!(store.list_projects(), Ok(projects) if !projects.is_empty()))
            .map(|store| store.source())
            .collect()
    }

    /// Union of project listings across all sources. A failing source
    /// contributes zero records rather than failing the whole request.
    /// `path_exists` is stat-ed fresh on every call, never cached.
    pub fn list_all_projects(&self) -> Vec<Project> {
        let mut all = Vec::new();
        for store in self.all() {
            let mut projects = match store.list_projects() {
                Ok(projects) => projects,
                Err(err) => {
                    tracing::warn!(source = %store.source(), error = %err, "skipping source: project listing failed");
                    continue;
                }
            };
            for project in &mut projects {
                project.path_exists = project.path.is_dir();
            }
            all.append(&mut projects);
        }
        all
    }

    /// The most specific known project whose path contains `path`: a
    /// boundary-safe prefix match where, among nested candidates, the
    /// longest path wins. Lets commands auto-scope to the current working
    /// directory the way git scopes to a repository.
    pub fn find_project_for_path(&self, path: &Path) -> Option<Project> {
        let mut best: Option<Project> = None;
        for project in self.list_all_projects() {
            if !path.starts_with(&project.path) {
                continue;
            }
            let longer = best
                .as_ref()
                .map(|b| project.path.as_os_str().len() > b.path.as_os_str().len())
                .unwrap_or(true);
            if longer {
                best = Some(project);
            }
        }
        best
    }

    /// Status of every registered source, for display.
    pub fn source_status(&self) -> Vec<SourceInfo> {
        self.all()
            .into_iter()
            .map(|store| {
                let source = store.source();
                let workspace = store.workspace();
                let project_count = store.list_projects().map(|p| p.len()).unwrap_or(0);
                SourceInfo {
                    name: source.as_str().to_string(),
                    description: source.description(),
                    available: project_count > 0,
                    workspace_id: workspace.id,
                    base_path: workspace.base_path,
                    project_count,
                    source,
                }
            })
            .collect()
    }

    /// Find the store and session metadata owning an absolute session file
    /// path, across all sources.
    ///
    /// Two tiers: first ask each store directly (cheap adapter-side lookup),
    /// then fall back to a full listing scan comparing cleaned paths. The
    /// fallback keeps this correct when an adapter's fast path is
    /// incomplete.
    pub fn resolve_session_by_path(
        &self,
        session_path: &Path,
    ) -> Option<(Arc<dyn Store>, SessionMeta)> {
        if session_path.as_os_str().is_empty() {
            return None;
        }
        let clean = crate::pathcheck::lexical_clean(session_path);

        for store in self.all() {
            let Ok(Some(meta)) = store.get_session_meta(&session_path.to_string_lossy()) else {
                continue;
            };
            if crate::pathcheck::same_path(&meta.full_path, &clean) {
                return Some((store, meta));
            }
        }

        for store in self.all() {
            let Ok(projects) = store.list_projects() else {
                continue;
            };
            for project in projects {
                let Ok(sessions) = store.list_sessions(&project.id) else {
                    continue;
                };
                if let Some(meta) = sessions
                    .into_iter()
                    .find(|s| crate::pathcheck::same_path(&s.full_path, &clean))
                {
                    return Some((store, meta));
                }
            }
        }

        None
    }

    /// Resolve the owning store for a session file path, open it as a
    /// stream, and wrap it in a [`LazySession`].
    ///
    /// Opening prefers the resolved record's own ID and falls back to the
    /// literal file path: some adapters require a raw path, others their
    /// native ID.
    pub fn open_lazy_session_by_path(&self, session_path: &Path) -> Result<LazySession> {
        let (store, meta) = self
            .resolve_session_by_path(session_path)
            .ok_or_else(|| {
                StoreError::SessionNotFound(session_path.to_string_lossy().into_owned())
            })?;

        let session_id = if meta.id.is_empty() {
            meta.full_path.to_string_lossy().into_owned()
        } else {
            meta.id.clone()
        };

        let full_path = meta.full_path.to_string_lossy().into_owned();
        let reader = match store.open_session(&session_id) {
            Ok(reader) => reader,
            Err(err) if !full_path.is_empty() && full_path != session_id => {
                tracing::debug!(%session_id, error = %err, "open by id failed, retrying by path");
                store.open_session(&full_path)?
            }
            Err(err) => return Err(err),
        };

        let mut lazy = LazySession::new(reader)?;
        lazy.backfill_metadata(&meta);
        Ok(lazy)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::store::SessionReader;
    use crate::types::Workspace;
    use std::path::PathBuf;

    /// In-memory store used across the core test suite.
    pub(crate) struct FakeStore {
        pub source: Source,
        pub projects: Vec<Project>,
        pub sessions: Vec<SessionMeta>,
        /// When false, get_session_meta always answers None so the registry
        /// must take the listing-scan fallback.
        pub fast_path: bool,
        pub fail_listings: bool,
    }

    impl FakeStore {
        pub fn new(source: &str) -> Self {
            FakeStore {
                source: Source::new(source),
                projects: Vec::new(),
                sessions: Vec::new(),
                fast_path: true,
                fail_listings: false,
            }
        }

        pub fn with_project(mut self, path: &str, session_ids: &[&str]) -> Self {
            self.projects.push(Project {
                id: path.to_string(),
                name: PathBuf::from(path)
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                path: PathBuf::from(path),
                source: self.source.clone(),
                session_count: session_ids.len(),
                ..Default::default()
            });
            for id in session_ids {
                self.sessions.push(SessionMeta {
                    id: id.to_string(),
                    project_path: PathBuf::from(path),
                    full_path: PathBuf::from(path).join(format!("{id}.jsonl")),
                    source: self.source.clone(),
                    ..Default::default()
                });
            }
            self
        }
    }

    struct EmptyReader(SessionMeta);

    impl SessionReader for EmptyReader {
        fn metadata(&self) -> SessionMeta {
            self.0.clone()
        }
        fn read_next(&mut self) -> Result<Option<crate::types::Entry>> {
            Ok(None)
        }
    }

    impl Store for FakeStore {
        fn source(&self) -> Source {
            self.source.clone()
        }

        fn workspace(&self) -> Workspace {
            Workspace {
                id: format!("{}-ws", self.source),
                source: self.source.clone(),
                ..Default::default()
            }
        }

        fn list_projects(&self) -> Result<Vec<Project>> {
            if self.fail_listings {
                return Err(StoreError::Io("scan failed".to_string()));
            }
            Ok(self.projects.clone())
        }

        fn list_sessions(&self, project_id: &str) -> Result<Vec<SessionMeta>> {
            if self.fail_listings {
                return Err(StoreError::Io("scan failed".to_string()));
            }
            Ok(self
                .sessions
                .iter()
                .filter(|s| s.project_path.as_os_str() == project_id)
                .cloned()
                .collect())
        }

        fn get_session_meta(&self, session_id: &str) -> Result<Option<SessionMeta>> {
            if !self.fast_path {
                return Ok(None);
            }
            Ok(self
                .sessions
                .iter()
                .find(|s| s.id == session_id || s.full_path.as_os_str() == session_id)
                .cloned())
        }

        fn open_session(&self, session_id: &str) -> Result<Box<dyn SessionReader>> {
            let meta = self
                .get_session_meta(session_id)?
                .or_else(|| {
                    self.sessions
                        .iter()
                        .find(|s| s.id == session_id || s.full_path.as_os_str() == session_id)
                        .cloned()
                })
                .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
            Ok(Box::new(EmptyReader(meta)))
        }
    }

    #[test]
    fn last_registration_wins() {
        let registry = StoreRegistry::new();
        registry.register(Arc::new(FakeStore::new("claude").with_project("/a", &["s1"])));
        registry.register(Arc::new(FakeStore::new("claude").with_project("/b", &["s2"])));

        assert_eq!(registry.sources().len(), 1);
        let projects = registry.list_all_projects();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].path, PathBuf::from("/b"));
    }

    #[test]
    fn list_all_projects_unions_sources_and_skips_failures() {
        let registry = StoreRegistry::new();
        registry.register(Arc::new(FakeStore::new("claude").with_project("/a", &[])));
        let mut broken = FakeStore::new("codex").with_project("/b", &[]);
        broken.fail_listings = true;
        registry.register(Arc::new(broken));

        let projects = registry.list_all_projects();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].source, Source::new("claude"));
    }

    #[test]
    fn path_exists_is_checked_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let live = dir.path().join("live");
        std::fs::create_dir(&live).unwrap();

        let registry = StoreRegistry::new();
        registry.register(Arc::new(
            FakeStore::new("claude").with_project(live.to_str().unwrap(), &[]),
        ));

        assert!(registry.list_all_projects()[0].path_exists);

        std::fs::remove_dir(&live).unwrap();
        assert!(!registry.list_all_projects()[0].path_exists);
    }

    #[test]
    fn available_sources_requires_projects() {
        let registry = StoreRegistry::new();
        registry.register(Arc::new(FakeStore::new("claude").with_project("/a", &[])));
        registry.register(Arc::new(FakeStore::new("codex")));

        let available = registry.available_sources();
        assert_eq!(available, vec![Source::new("claude")]);
        assert_eq!(registry.sources().len(), 2);
    }

    #[test]
    fn find_project_for_path_prefers_most_specific() {
        let registry = StoreRegistry::new();
        registry.register(Arc::new(
            FakeStore::new("claude")
                .with_project("/p", &[])
                .with_project("/p/sub", &[]),
        ));

        let best = registry
            .find_project_for_path(Path::new("/p/sub/file.rs"))
            .expect("match");
        assert_eq!(best.path, PathBuf::from("/p/sub"));
    }

    #[test]
    fn find_project_for_path_is_boundary_safe() {
        let registry = StoreRegistry::new();
        registry.register(Arc::new(FakeStore::new("claude").with_project("/foo/bar", &[])));

        assert!(registry
            .find_project_for_path(Path::new("/foo/barbaz/x"))
            .is_none());
        assert!(registry
            .find_project_for_path(Path::new("/foo/bar/x"))
            .is_some());
        assert!(registry.find_project_for_path(Path::new("/foo/bar")).is_some());
    }

    #[test]
    fn resolve_session_by_path_uses_fast_path() {
        let registry = StoreRegistry::new();
        registry.register(Arc::new(
            FakeStore::new("claude").with_project("/proj", &["s1"]),
        ));

        let (store, meta) = registry
            .resolve_session_by_path(Path::new("/proj/s1.jsonl"))
            .expect("resolved");
        assert_eq!(store.source(), Source::new("claude"));
        assert_eq!(meta.id, "s1");
    }

    #[test]
    fn resolve_session_by_path_falls_back_to_listing_scan() {
        let mut store = FakeStore::new("claude").with_project("/proj", &["s1"]);
        store.fast_path = false;

        let registry = StoreRegistry::new();
        registry.register(Arc::new(store));

        let (_, meta) = registry
            .resolve_session_by_path(Path::new("/proj/s1.jsonl"))
            .expect("resolved via fallback");
        assert_eq!(meta.id, "s1");
    }

    #[test]
    fn open_lazy_session_by_path_backfills_metadata() {
        let registry = StoreRegistry::new();
        registry.register(Arc::new(
            FakeStore::new("claude").with_project("/proj", &["s1"]),
        ));

        let lazy = registry
            .open_lazy_session_by_path(Path::new("/proj/s1.jsonl"))
            .expect("opened");
        assert_eq!(lazy.metadata().id, "s1");
        assert!(!lazy.has_more());
    }

    #[test]
    fn two_populated_sources_aggregate_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let web = dir.path().join("web-app");
        let api = dir.path().join("api-server");
        std::fs::create_dir(&web).unwrap();
        std::fs::create_dir(&api).unwrap();

        let registry = StoreRegistry::new();
        registry.register(Arc::new(
            FakeStore::new("claude").with_project(web.to_str().unwrap(), &["c1", "c2"]),
        ));
        registry.register(Arc::new(
            FakeStore::new("codex").with_project(api.to_str().unwrap(), &["x1"]),
        ));

        let projects = registry.list_all_projects();
        assert_eq!(projects.len(), 2);
        assert!(projects.iter().all(|p| p.path_exists));

        let resolved = crate::resolve::resolve_project(&registry, web.to_str().unwrap())
            .expect("claude project by exact path");
        assert_eq!(resolved.source, Source::new("claude"));
        let resolved = crate::resolve::resolve_project(&registry, api.to_str().unwrap())
            .expect("codex project by exact path");
        assert_eq!(resolved.source, Source::new("codex"));

        // One character short of a real path must not match anything.
        let mut truncated = web.to_str().unwrap().to_string();
        truncated.pop();
        assert!(crate::resolve::resolve_project(&registry, &truncated).is_err());

        std::fs::remove_dir(&api).unwrap();
        let gone = registry
            .list_all_projects()
            .into_iter()
            .find(|p| p.source == Source::new("codex"))
            .expect("codex project still listed");
        assert!(!gone.path_exists);
    }

    #[test]
    fn open_lazy_session_unknown_path_is_not_found() {
        let registry = StoreRegistry::new();
        registry.register(Arc::new(FakeStore::new("claude")));

        let err = registry
            .open_lazy_session_by_path(Path::new("/nowhere/x.jsonl"))
            .map(|_| ())
            .unwrap_err();
        assert!(matches!(err, StoreError::SessionNotFound(_)));
    }
}
