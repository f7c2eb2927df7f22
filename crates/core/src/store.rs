//! The capability interface every source adapter implements.

use crate::error::Result;
use crate::types::{Entry, Project, Session, SessionMeta, Source, Workspace};

/// Streaming access to session entries.
///
/// `read_next` returns `Ok(None)` at end of stream. Implementations may skip
/// malformed records internally; callers must tolerate receiving fewer
/// entries than the metadata advertises.
pub trait SessionReader: Send {
    /// Session metadata, available before the stream is drained.
    fn metadata(&self) -> SessionMeta;

    /// The next entry, or `Ok(None)` when the stream is exhausted.
    fn read_next(&mut self) -> Result<Option<Entry>>;
}

/// Access to projects and sessions from a single source on a single
/// workspace. All methods are synchronous, potentially-blocking filesystem
/// I/O; callers needing timeouts must bound them externally.
pub trait Store: Send + Sync {
    /// Stable source tag for this store.
    fn source(&self) -> Source;

    /// Workspace identity. Cheap; adapters cache what they need.
    fn workspace(&self) -> Workspace;

    /// Full current project list. Empty, not an error, if the source is
    /// unused.
    fn list_projects(&self) -> Result<Vec<Project>>;

    /// A single project by ID, or `Ok(None)` if unknown.
    fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(self
            .list_projects()?
            .into_iter()
            .find(|p| p.id == id || p.path.as_os_str() == id))
    }

    /// Full session list for a project.
    fn list_sessions(&self, project_id: &str) -> Result<Vec<SessionMeta>>;

    /// Session metadata by adapter-native ID or absolute file path, or
    /// `Ok(None)` if this store does not recognize the identifier.
    fn get_session_meta(&self, session_id: &str) -> Result<Option<SessionMeta>>;

    /// A fully materialized session. May be expensive on large transcripts;
    /// prefer [`Store::open_session`] plus lazy loading.
    fn load_session(&self, session_id: &str) -> Result<Session> {
        let mut reader = self.open_session(session_id)?;
        let meta = reader.metadata();
        let mut entries = Vec::new();
        while let Some(entry) = reader.read_next()? {
            entries.push(entry);
        }
        Ok(Session { meta, entries })
    }

    /// A streaming reader suitable for wrapping in
    /// [`crate::LazySession`].
    fn open_session(&self, session_id: &str) -> Result<Box<dyn SessionReader>>;
}
