//! Per-adapter caching of project and session listings.
//!
//! Stores embed a [`StoreCache`] to avoid repeated filesystem scans. The
//! cache holds two independent entities: the project listing, and per-project
//! session listings keyed by project ID. Values expire after a configurable
//! TTL (zero = cache forever), failed loads are never stored, and concurrent
//! misses for the same key are coalesced into a single loader run.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, RwLock};
use std::time::{Duration, Instant};

use crate::error::{Result, StoreError};
use crate::types::{Project, SessionMeta};

/// Injectable time source so TTL expiry is deterministic in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock time. The default for production stores.
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Snapshot<T> {
    items: Vec<T>,
    stored_at: Instant,
}

impl<T: Clone> Snapshot<T> {
    fn fresh(&self, ttl: Duration, now: Instant) -> bool {
        ttl.is_zero() || now.saturating_duration_since(self.stored_at) < ttl
    }
}

/// A single in-flight load that late arrivals wait on. The leader stores its
/// result (success or failure) and wakes all waiters; everyone observes the
/// same outcome without re-running the loader.
struct Flight<T> {
    result: Mutex<Option<Result<Vec<T>>>>,
    done: Condvar,
}

impl<T: Clone> Flight<T> {
    fn new() -> Self {
        Flight {
            result: Mutex::new(None),
            done: Condvar::new(),
        }
    }

    fn complete(&self, result: Result<Vec<T>>) {
        let mut slot = self.result.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(result);
        self.done.notify_all();
    }

    fn wait(&self) -> Result<Vec<T>> {
        let mut slot = self.result.lock().unwrap_or_else(|e| e.into_inner());
        loop {
            if let Some(result) = slot.as_ref() {
                return result.clone();
            }
            slot = self
                .done
                .wait(slot)
                .unwrap_or_else(|e| e.into_inner());
        }
    }
}

/// Project and session listing cache embedded by store implementations.
pub struct StoreCache {
    name: Mutex<String>,
    ttl: Mutex<Duration>,
    clock: Arc<dyn Clock>,

    projects: RwLock<Option<Snapshot<Project>>>,
    sessions: RwLock<HashMap<String, Snapshot<SessionMeta>>>,

    // Coalescing state: one slot for the project listing, one per project ID
    // for session listings. Distinct project IDs never block each other.
    project_flight: Mutex<Option<Arc<Flight<Project>>>>,
    session_flights: Mutex<HashMap<String, Arc<Flight<SessionMeta>>>>,
}

impl Default for StoreCache {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Build a cache with an injected time source (testing).
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        StoreCache {
            name: Mutex::new(String::new()),
            ttl: Mutex::new(Duration::ZERO),
            clock,
            projects: RwLock::new(None),
            sessions: RwLock::new(HashMap::new()),
            project_flight: Mutex::new(None),
            session_flights: Mutex::new(HashMap::new()),
        }
    }

    /// Label used in trace events, usually the source tag.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.name.lock().unwrap_or_else(|e| e.into_inner()) = name.into();
    }

    /// Time-to-live for cached listings. `Duration::ZERO` (the default)
    /// caches forever.
    pub fn set_ttl(&self, ttl: Duration) {
        *self.ttl.lock().unwrap_or_else(|e| e.into_inner()) = ttl;
    }

    fn ttl(&self) -> Duration {
        *self.ttl.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ── Direct get/set ──────────────────────────────────────────────────

    /// The cached project list, or `None` on first access, after
    /// invalidation, or once the TTL has elapsed. Returns an independent
    /// copy; mutating it cannot affect the cache.
    pub fn get_projects(&self) -> Option<Vec<Project>> {
        let guard = self.projects.read().unwrap_or_else(|e| e.into_inner());
        let snapshot = guard.as_ref()?;
        if !snapshot.fresh(self.ttl(), self.clock.now()) {
            return None;
        }
        Some(snapshot.items.clone())
    }

    /// Store the project list. The input is copied; the caller may keep
    /// mutating its slice freely.
    pub fn set_projects(&self, projects: &[Project]) {
        let mut guard = self.projects.write().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Snapshot {
            items: projects.to_vec(),
            stored_at: self.clock.now(),
        });
    }

    /// The cached session list for a project, with the same freshness and
    /// copy semantics as [`StoreCache::get_projects`].
    pub fn get_sessions(&self, project_id: &str) -> Option<Vec<SessionMeta>> {
        let guard = self.sessions.read().unwrap_or_else(|e| e.into_inner());
        let snapshot = guard.get(project_id)?;
        if !snapshot.fresh(self.ttl(), self.clock.now()) {
            return None;
        }
        Some(snapshot.items.clone())
    }

    pub fn set_sessions(&self, project_id: &str, sessions: &[SessionMeta]) {
        let mut guard = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(
            project_id.to_string(),
            Snapshot {
                items: sessions.to_vec(),
                stored_at: self.clock.now(),
            },
        );
    }

    // ── Coalescing loads ────────────────────────────────────────────────

    /// Return the cached project list or run `loader` to fill it.
    ///
    /// Concurrent callers are coalesced: while a load is in flight, late
    /// arrivals wait for it and share its result instead of scanning again.
    /// Failures are shared with the waiters but never cached, so the next
    /// call retries.
    pub fn load_projects<F>(&self, loader: F) -> Result<Vec<Project>>
    where
        F: FnOnce() -> Result<Vec<Project>>,
    {
        if let Some(projects) = self.get_projects() {
            return Ok(projects);
        }

        let (flight, leader) = {
            let mut slot = self
                .project_flight
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            match slot.as_ref() {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::new());
                    *slot = Some(Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            return flight.wait();
        }

        let result = loader();
        match &result {
            Ok(projects) => self.set_projects(projects),
            Err(err) => self.trace_load_failure("projects", err),
        }
        flight.complete(result.clone());
        *self
            .project_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = None;
        result
    }

    /// Per-project equivalent of [`StoreCache::load_projects`]. Loads for
    /// different project IDs run fully in parallel.
    pub fn load_sessions<F>(&self, project_id: &str, loader: F) -> Result<Vec<SessionMeta>>
    where
        F: FnOnce() -> Result<Vec<SessionMeta>>,
    {
        if let Some(sessions) = self.get_sessions(project_id) {
            return Ok(sessions);
        }

        let (flight, leader) = {
            let mut flights = self
                .session_flights
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            match flights.get(project_id) {
                Some(flight) => (Arc::clone(flight), false),
                None => {
                    let flight = Arc::new(Flight::new());
                    flights.insert(project_id.to_string(), Arc::clone(&flight));
                    (flight, true)
                }
            }
        };

        if !leader {
            return flight.wait();
        }

        let result = loader();
        match &result {
            Ok(sessions) => self.set_sessions(project_id, sessions),
            Err(err) => self.trace_load_failure(project_id, err),
        }
        flight.complete(result.clone());
        self.session_flights
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(project_id);
        result
    }

    fn trace_load_failure(&self, key: &str, err: &StoreError) {
        let name = self.name.lock().unwrap_or_else(|e| e.into_inner());
        tracing::debug!(cache = %name, key, error = %err, "cache load failed, not cached");
    }

    // ── Invalidation ────────────────────────────────────────────────────

    /// Clear only the project listing.
    pub fn invalidate_projects(&self) {
        *self.projects.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// Clear one project's session listing, removing the entry entirely.
    pub fn invalidate_sessions(&self, project_id: &str) {
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(project_id);
    }

    /// Drop everything, forcing full rescans.
    pub fn clear(&self) {
        self.invalidate_projects();
        self.sessions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}
