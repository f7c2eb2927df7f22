//! Resolution of user-supplied project and session queries.
//!
//! Queries arrive as IDs, absolute or relative paths, path suffixes, or bare
//! directory names. Matching is deliberately strict: a suffix must line up on
//! a path-segment boundary, so `foo` matches `/code/foo` but never
//! `/code/oldfoo`. Ambiguity is reported, never guessed away.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::pathcheck::{lexical_clean, same_path};
use crate::registry::StoreRegistry;
use crate::store::Store;
use crate::types::{Project, SessionMeta};

/// How many ambiguous candidates to name before truncating the list.
const MAX_LISTED_CANDIDATES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// The query named a real directory that no source has sessions for.
    /// Distinct from not-found so callers can suggest starting a session
    /// there instead of fixing a typo.
    #[error("no sessions found in {0}")]
    EmptyDirectory(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("{}", render_ambiguous(.query, .candidates, *.omitted))]
    Ambiguous {
        query: String,
        candidates: Vec<String>,
        omitted: usize,
    },
}

fn render_ambiguous(query: &str, candidates: &[String], omitted: usize) -> String {
    let mut message = format!("query {query:?} is ambiguous, it matches:");
    for candidate in candidates {
        message.push_str("\n  - ");
        message.push_str(candidate);
    }
    if omitted > 0 {
        message.push_str(&format!("\n  ... and {omitted} more"));
    }
    message
}

fn ambiguous(query: &str, matches: &[Project]) -> ResolveError {
    let candidates: Vec<String> = matches
        .iter()
        .take(MAX_LISTED_CANDIDATES)
        .map(|p| p.path.display().to_string())
        .collect();
    ResolveError::Ambiguous {
        query: query.to_string(),
        candidates,
        omitted: matches.len().saturating_sub(MAX_LISTED_CANDIDATES),
    }
}

// ── Project resolution ──────────────────────────────────────────────────────

/// Resolve a project query against every registered source.
///
/// Precedence: exact ID, then exact path (relative queries are joined to the
/// current directory first), then boundary-safe path suffix. A separator-free
/// suffix query additionally matches on directory basename alone.
pub fn resolve_project(
    registry: &StoreRegistry,
    query: &str,
) -> std::result::Result<Project, ResolveError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ResolveError::ProjectNotFound(String::new()));
    }

    let projects = registry.list_all_projects();
    let query_path = absolutize_query(query);

    for project in &projects {
        if project.id == query || same_path(&project.path, &query_path) {
            return Ok(project.clone());
        }
    }

    let suffix_matches: Vec<Project> = projects
        .iter()
        .filter(|p| path_has_suffix(&p.path, query))
        .cloned()
        .collect();

    match suffix_matches.len() {
        1 => Ok(suffix_matches.into_iter().next().unwrap_or_default()),
        0 => {
            if looks_like_path_query(query) && query_path.is_dir() {
                Err(ResolveError::EmptyDirectory(
                    query_path.display().to_string(),
                ))
            } else {
                Err(ResolveError::ProjectNotFound(query.to_string()))
            }
        }
        _ => Err(ambiguous(query, &suffix_matches)),
    }
}

fn absolutize_query(query: &str) -> PathBuf {
    let path = Path::new(query);
    if path.is_absolute() {
        return lexical_clean(path);
    }
    match std::env::current_dir() {
        Ok(cwd) => lexical_clean(&cwd.join(path)),
        Err(_) => lexical_clean(path),
    }
}

/// Whether a query that failed to match should be treated as a directory
/// reference rather than a name typo.
fn looks_like_path_query(query: &str) -> bool {
    query.contains('/')
        || query.contains('\\')
        || query.starts_with('.')
        || query.starts_with('~')
}

/// Boundary-safe suffix match on a project path.
///
/// The suffix is lexically cleaned first, so `b//foo/` and `b/./foo` behave
/// as `b/foo`. Matching anchors on a segment boundary; partial segments never
/// match.
fn path_has_suffix(path: &Path, suffix: &str) -> bool {
    let cleaned = lexical_clean(Path::new(suffix));
    let suffix = cleaned.to_string_lossy().replace('\\', "/");
    let suffix = suffix.trim_end_matches('/');
    if suffix.is_empty() || suffix == "." {
        return false;
    }

    let path = path.to_string_lossy().replace('\\', "/");
    if !suffix.contains('/') {
        return path.rsplit('/').next() == Some(suffix);
    }
    if let Some(rest) = suffix.strip_prefix('/') {
        // Rooted suffix: only a full-path match counts.
        return path == suffix || path == format!("/{rest}");
    }
    path.ends_with(&format!("/{suffix}"))
}

// ── Session resolution ──────────────────────────────────────────────────────

/// Resolve a session query, optionally scoped to one project.
///
/// Absolute paths go through the registry's path resolution; otherwise the
/// query is matched against session IDs and transcript file names, with a
/// unique ID prefix accepted as shorthand.
pub fn resolve_session(
    registry: &StoreRegistry,
    project: Option<&Project>,
    query: &str,
) -> std::result::Result<(Arc<dyn Store>, SessionMeta), ResolveError> {
    let query = query.trim();
    if query.is_empty() {
        return Err(ResolveError::SessionNotFound(String::new()));
    }

    if Path::new(query).is_absolute() {
        return registry
            .resolve_session_by_path(Path::new(query))
            .ok_or_else(|| ResolveError::SessionNotFound(query.to_string()));
    }

    let candidates = session_candidates(registry, project);

    for (store, meta) in &candidates {
        let stem_match = meta
            .full_path
            .file_stem()
            .is_some_and(|stem| stem.to_string_lossy() == query);
        if meta.id == query || stem_match {
            return Ok((store.clone(), meta.clone()));
        }
    }

    let prefixed: Vec<&(Arc<dyn Store>, SessionMeta)> = candidates
        .iter()
        .filter(|(_, meta)| !meta.id.is_empty() && meta.id.starts_with(query))
        .collect();
    match prefixed.len() {
        1 => {
            let (store, meta) = prefixed[0];
            Ok((store.clone(), meta.clone()))
        }
        0 => Err(ResolveError::SessionNotFound(query.to_string())),
        _ => Err(ResolveError::Ambiguous {
            query: query.to_string(),
            candidates: prefixed
                .iter()
                .take(MAX_LISTED_CANDIDATES)
                .map(|(_, m)| m.id.clone())
                .collect(),
            omitted: prefixed.len().saturating_sub(MAX_LISTED_CANDIDATES),
        }),
    }
}

fn session_candidates(
    registry: &StoreRegistry,
    project: Option<&Project>,
) -> Vec<(Arc<dyn Store>, SessionMeta)> {
    let mut candidates = Vec::new();
    for store in registry.all() {
        let project_ids: Vec<String> = match project {
            Some(p) => vec![p.id.clone()],
            None => match store.list_projects() {
                Ok(projects) => projects.into_iter().map(|p| p.id).collect(),
                Err(err) => {
                    tracing::warn!(source = %store.source(), error = %err, "skipping source during session resolution");
                    continue;
                }
            },
        };
        for project_id in project_ids {
            let Ok(sessions) = store.list_sessions(&project_id) else {
                continue;
            };
            candidates.extend(sessions.into_iter().map(|meta| (store.clone(), meta)));
        }
    }
    candidates
}
