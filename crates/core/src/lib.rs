//! Core access layer over AI coding assistant session storage.
//!
//! Every supported tool (Claude Code, Codex CLI, ...) keeps its conversation
//! logs in its own on-disk layout. This crate defines the common record types
//! and the [`Store`] capability trait that adapters implement, plus the
//! machinery that sits between many adapters and one consistent API: a
//! [`StoreRegistry`] that aggregates sources, a [`StoreCache`] with TTL and
//! request coalescing, a windowed [`LazySession`] loader for large
//! transcripts, query resolution for user-supplied identifiers, and a
//! symlink-resistant [`PathValidator`] for filesystem-affecting operations.

pub mod cache;
pub mod discover;
pub mod error;
pub mod lazy;
pub mod pathcheck;
pub mod registry;
pub mod resolve;
pub mod store;
pub mod types;

pub use cache::{Clock, StoreCache, SystemClock};
pub use discover::{Discovery, StoreFactory};
pub use error::{Result, StoreError};
pub use lazy::LazySession;
pub use pathcheck::PathValidator;
pub use registry::{SourceInfo, StoreRegistry};
pub use resolve::{resolve_project, resolve_session, ResolveError};
pub use store::{SessionReader, Store};
pub use types::{
    ContentBlock, Entry, Project, Role, Session, SessionMeta, Source, TokenUsage, Workspace,
};
