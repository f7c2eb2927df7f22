/// Error type shared by stores, the cache, and the registry.
///
/// Cloneable on purpose: when concurrent cache misses are coalesced into a
/// single loader run, every waiter receives the same failure. Io/json causes
/// are carried as rendered strings to keep the type `Clone`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(String),

    #[error("json error: {0}")]
    Json(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("path outside allowed directories: {0}")]
    PathNotAllowed(String),

    #[error("{0}")]
    Other(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Json(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
