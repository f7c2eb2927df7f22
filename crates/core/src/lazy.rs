//! Windowed, memory-bounded loading of session transcripts.
//!
//! Transcripts can reach many megabytes. Consumers need "enough to render"
//! immediately and the ability to pull more on demand, without a blocking
//! full read.

use std::sync::Mutex;

use crate::error::Result;
use crate::store::SessionReader;
use crate::types::{Entry, SessionMeta};

/// Estimated displayable content preloaded at construction time.
const PRELOAD_CONTENT_BYTES: usize = 8 * 1024;

struct LazyInner {
    entries: Vec<Entry>,
    reader: Option<Box<dyn SessionReader>>,
    fully_loaded: bool,
}

/// Wraps any [`SessionReader`] to provide incremental loading with a
/// displayable-content byte budget.
///
/// Guarded by an interior mutex: incremental loads may be triggered from
/// multiple call sites (a render loop polling while a prefetch is in
/// flight).
pub struct LazySession {
    meta: SessionMeta,
    inner: Mutex<LazyInner>,
}

impl LazySession {
    /// Wrap a reader and eagerly pull entries until ~8 KiB of displayable
    /// content has been accumulated or the stream ends, so callers get
    /// metadata and a first screen of content without a full read.
    pub fn new(reader: Box<dyn SessionReader>) -> Result<Self> {
        let session = LazySession {
            meta: reader.metadata(),
            inner: Mutex::new(LazyInner {
                entries: Vec::with_capacity(64),
                reader: Some(reader),
                fully_loaded: false,
            }),
        };
        session.load_more(PRELOAD_CONTENT_BYTES)?;
        Ok(session)
    }

    pub fn metadata(&self) -> SessionMeta {
        self.meta.clone()
    }

    /// Replace metadata fields the reader left empty with values discovered
    /// from a listing record.
    pub fn backfill_metadata(&mut self, from: &SessionMeta) {
        if self.meta.id.is_empty() {
            self.meta.id = from.id.clone();
        }
        if self.meta.full_path.as_os_str().is_empty() {
            self.meta.full_path = from.full_path.clone();
        }
        if self.meta.project_path.as_os_str().is_empty() {
            self.meta.project_path = from.project_path.clone();
        }
        if self.meta.source.is_unknown() {
            self.meta.source = from.source.clone();
        }
        if self.meta.first_prompt.is_empty() {
            self.meta.first_prompt = from.first_prompt.clone();
        }
        if self.meta.summary.is_empty() {
            self.meta.summary = from.summary.clone();
        }
        if self.meta.model.is_empty() {
            self.meta.model = from.model.clone();
        }
        if self.meta.git_branch.is_empty() {
            self.meta.git_branch = from.git_branch.clone();
        }
        if self.meta.entry_count == 0 {
            self.meta.entry_count = from.entry_count;
        }
        if self.meta.file_size == 0 {
            self.meta.file_size = from.file_size;
        }
        if self.meta.created_at.is_none() {
            self.meta.created_at = from.created_at;
        }
        if self.meta.modified_at.is_none() {
            self.meta.modified_at = from.modified_at;
        }
    }

    /// All currently loaded entries, in the adapter's emission order.
    pub fn entries(&self) -> Vec<Entry> {
        self.lock().entries.clone()
    }

    pub fn entry_count(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn has_more(&self) -> bool {
        !self.lock().fully_loaded
    }

    pub fn is_fully_loaded(&self) -> bool {
        self.lock().fully_loaded
    }

    /// Pull additional entries until `max_content_bytes` of displayable
    /// content has been read or the stream ends. Returns the number of newly
    /// loaded entries.
    pub fn load_more(&self, max_content_bytes: usize) -> Result<usize> {
        let mut inner = self.lock();
        let start = inner.entries.len();
        let mut content_bytes = 0usize;

        while content_bytes < max_content_bytes && !inner.fully_loaded {
            let Some(reader) = inner.reader.as_mut() else {
                break;
            };
            match reader.read_next()? {
                Some(entry) => {
                    content_bytes += entry.estimate_content_size();
                    inner.entries.push(entry);
                }
                None => inner.fully_loaded = true,
            }
        }

        Ok(inner.entries.len() - start)
    }

    /// Drain the stream unconditionally. Explicit opt-in for small sessions
    /// or export use cases.
    pub fn load_all(&self) -> Result<()> {
        let mut inner = self.lock();
        while !inner.fully_loaded {
            let Some(reader) = inner.reader.as_mut() else {
                break;
            };
            match reader.read_next()? {
                Some(entry) => inner.entries.push(entry),
                None => inner.fully_loaded = true,
            }
        }
        Ok(())
    }

    /// Loading progress in `[0, 1]`, based on loaded entry count over the
    /// metadata's total entry count. A heuristic: entry counts and content
    /// bytes are different units, and the metadata count may be unknown (0).
    pub fn progress(&self) -> f64 {
        let inner = self.lock();
        if inner.fully_loaded {
            return 1.0;
        }
        if self.meta.entry_count > 0 {
            let ratio = inner.entries.len() as f64 / self.meta.entry_count as f64;
            return ratio.clamp(0.0, 1.0);
        }
        0.0
    }

    /// Release the underlying reader. Idempotent; later loads are no-ops.
    pub fn close(&self) {
        let mut inner = self.lock();
        inner.reader = None;
        inner.fully_loaded = true;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LazyInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;
    use chrono::Utc;

    /// Reader over a fixed entry sequence, with optional injected failure.
    struct VecReader {
        meta: SessionMeta,
        entries: Vec<Entry>,
        pos: usize,
    }

    impl VecReader {
        fn new(entries: Vec<Entry>, advertised_count: usize) -> Self {
            VecReader {
                meta: SessionMeta {
                    id: "test".to_string(),
                    entry_count: advertised_count,
                    ..Default::default()
                },
                entries,
                pos: 0,
            }
        }
    }

    impl SessionReader for VecReader {
        fn metadata(&self) -> SessionMeta {
            self.meta.clone()
        }

        fn read_next(&mut self) -> Result<Option<Entry>> {
            if self.pos >= self.entries.len() {
                return Ok(None);
            }
            let entry = self.entries[self.pos].clone();
            self.pos += 1;
            Ok(Some(entry))
        }
    }

    fn entry(uuid: &str, text_len: usize) -> Entry {
        Entry {
            uuid: uuid.to_string(),
            parent_uuid: None,
            role: Role::User,
            timestamp: Utc::now(),
            source: Default::default(),
            workspace_id: String::new(),
            agent_id: String::new(),
            content_blocks: Vec::new(),
            text: "x".repeat(text_len),
            model: String::new(),
            usage: None,
            git_branch: String::new(),
            cwd: String::new(),
            is_sidechain: false,
        }
    }

    fn entries(count: usize, text_len: usize) -> Vec<Entry> {
        (0..count).map(|i| entry(&format!("e{i}"), text_len)).collect()
    }

    #[test]
    fn construction_preloads_up_to_budget() {
        // 4 KiB per entry: the 8 KiB preload stops after the entry that
        // crosses the budget, leaving the rest unread.
        let lazy = LazySession::new(Box::new(VecReader::new(entries(10, 4096), 10))).unwrap();
        assert!(lazy.entry_count() >= 2);
        assert!(lazy.entry_count() < 10);
        assert!(lazy.has_more());
    }

    #[test]
    fn small_session_fully_preloaded() {
        let lazy = LazySession::new(Box::new(VecReader::new(entries(3, 10), 3))).unwrap();
        assert_eq!(lazy.entry_count(), 3);
        assert!(!lazy.has_more());
        assert_eq!(lazy.progress(), 1.0);
    }

    #[test]
    fn load_more_respects_budget_and_reports_new_entries() {
        let lazy = LazySession::new(Box::new(VecReader::new(entries(100, 1024), 100))).unwrap();
        let before = lazy.entry_count();

        let loaded = lazy.load_more(2048).unwrap();
        assert!(loaded >= 1);
        assert_eq!(lazy.entry_count(), before + loaded);

        // A zero-budget call with content pending loads nothing further.
        let meta_total = 100;
        assert!(lazy.entry_count() < meta_total);
    }

    #[test]
    fn load_all_after_load_more_matches_direct_load_all() {
        let source = entries(50, 512);

        let direct = LazySession::new(Box::new(VecReader::new(source.clone(), 50))).unwrap();
        direct.load_all().unwrap();

        let stepped = LazySession::new(Box::new(VecReader::new(source, 50))).unwrap();
        stepped.load_more(1024).unwrap();
        stepped.load_more(1024).unwrap();
        stepped.load_all().unwrap();

        let a: Vec<String> = direct.entries().into_iter().map(|e| e.uuid).collect();
        let b: Vec<String> = stepped.entries().into_iter().map(|e| e.uuid).collect();
        assert_eq!(a, b);
        assert_eq!(a.len(), 50);
        assert!(direct.is_fully_loaded() && stepped.is_fully_loaded());
    }

    #[test]
    fn progress_is_bounded_even_when_metadata_count_is_low() {
        // Metadata advertises fewer entries than the stream yields; progress
        // must still stay within [0, 1].
        let lazy = LazySession::new(Box::new(VecReader::new(entries(20, 4096), 2))).unwrap();
        assert!(lazy.progress() <= 1.0);
        lazy.load_all().unwrap();
        assert_eq!(lazy.progress(), 1.0);
        assert_eq!(lazy.entry_count(), 20);
    }

    #[test]
    fn progress_zero_when_count_unknown() {
        let lazy = LazySession::new(Box::new(VecReader::new(entries(20, 4096), 0))).unwrap();
        assert!(lazy.has_more());
        assert_eq!(lazy.progress(), 0.0);
    }

    #[test]
    fn close_is_idempotent_and_stops_loading() {
        let lazy = LazySession::new(Box::new(VecReader::new(entries(20, 4096), 20))).unwrap();
        let loaded = lazy.entry_count();

        lazy.close();
        lazy.close();

        assert_eq!(lazy.load_more(usize::MAX).unwrap(), 0);
        assert_eq!(lazy.entry_count(), loaded);
        assert!(!lazy.has_more());
    }
}
