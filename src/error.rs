// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the on-disk revision cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Malformed revision range, rejected before anything touches disk
    #[error("invalid chunk: {reason}")]
    InvalidChunk { reason: String },

    #[error("corrupt chunk {file}: {reason}")]
    CorruptChunk { file: String, reason: String },

    /// Read paths degrade this to "no cache"; it never reaches callers of
    /// the public read operations.
    #[error("manifest {path} is unreadable: {reason}")]
    ManifestUnreadable { path: PathBuf, reason: String },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize cache data: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CacheError::Io { path: path.into(), source }
    }
}

/// Errors from a remote (or local) revision log source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("`{program}` exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("malformed log XML: {0}")]
    Xml(String),

    #[error(transparent)]
    Git(#[from] git2::Error),
}

/// Errors that abort a fetch run. Chunks committed before the failure stay
/// valid.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetching page {page} failed: {source}")]
    Source { page: usize, source: SourceError },

    #[error(transparent)]
    Cache(#[from] CacheError),
}
