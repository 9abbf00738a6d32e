use std::path::PathBuf;

use thiserror::Error;

/// Failure to retrieve a filter list.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("failed to read local list {path}: {source}")]
    Local {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => FetchError::Status(status.as_u16()),
            None => FetchError::Transport(err.to_string()),
        }
    }
}

/// Failure to read or write engine state on disk.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PersistenceError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        PersistenceError::Json {
            path: path.into(),
            source,
        }
    }
}

/// Errors surfaced by engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid filter rule")]
    InvalidRule,
    #[error("invalid filter id")]
    InvalidFilterId,
    #[error("custom filter not found: {0}")]
    FilterNotFound(String),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("initialization failed: {0}")]
    Initialization(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
