//! Error types for castree_core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using castree_core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building, flushing or storing trees.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error occurred during file operations.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Object file is corrupted or invalid.
    #[error("Corrupted object at {path}: {reason}")]
    CorruptedObject { path: PathBuf, reason: String },

    /// Invalid content id format or encoding.
    #[error("Invalid content id: {reason}")]
    InvalidContentId { reason: String },

    /// Object not found in store.
    #[error("Object not found: {cid}")]
    ObjectNotFound { cid: String },

    /// Store is invalid or not initialized.
    #[error("Invalid store at {path}: {reason}")]
    InvalidStore { path: PathBuf, reason: String },

    /// Invalid object type.
    #[error("Invalid object type: expected {expected}, got {got}")]
    InvalidObjectType { expected: String, got: String },

    /// Invalid directory link (bad name or malformed encoding).
    #[error("Invalid link: {reason}")]
    InvalidLink { reason: String },

    /// Unsupported algorithm.
    #[error("Unsupported algorithm: {algorithm}")]
    UnsupportedAlgorithm { algorithm: String },

    /// Input paths imply more than one top-level directory.
    #[error("Multiple roots found: {}", roots.join(", "))]
    MultipleRoots { roots: Vec<String> },

    /// A path is used both as a file and as a directory.
    #[error("Path is both a file and a directory: {path}")]
    PathConflict { path: String },

    /// The persist collaborator failed for a directory object.
    #[error("Failed to persist directory {path}: {source}")]
    Persist {
        path: String,
        #[source]
        source: Box<Error>,
    },

    /// A referenced content id has no size entry.
    #[error("No size recorded for {cid}")]
    MissingSize { cid: String },

    /// A content id was given two different sizes.
    #[error("Conflicting sizes for {cid}: {existing} != {new}")]
    SizeConflict { cid: String, existing: u64, new: u64 },

    /// A directory's measured size does not fit in a u64.
    #[error("Directory size overflows u64 ({links} links)")]
    SizeOverflow { links: usize },

    /// The output sink no longer accepts records.
    #[error("Directory record sink is closed")]
    SinkClosed,
}

impl Error {
    /// Create a CorruptedObject error.
    pub fn corrupted_object(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptedObject {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidContentId error.
    pub fn invalid_content_id(reason: impl Into<String>) -> Self {
        Error::InvalidContentId {
            reason: reason.into(),
        }
    }

    /// Create an ObjectNotFound error.
    pub fn object_not_found(cid: impl Into<String>) -> Self {
        Error::ObjectNotFound { cid: cid.into() }
    }

    /// Create an InvalidStore error.
    pub fn invalid_store(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::InvalidStore {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an InvalidObjectType error.
    pub fn invalid_object_type(expected: impl Into<String>, got: impl Into<String>) -> Self {
        Error::InvalidObjectType {
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Create an InvalidLink error.
    pub fn invalid_link(reason: impl Into<String>) -> Self {
        Error::InvalidLink {
            reason: reason.into(),
        }
    }

    /// Create an UnsupportedAlgorithm error.
    pub fn unsupported_algorithm(algorithm: impl Into<String>) -> Self {
        Error::UnsupportedAlgorithm {
            algorithm: algorithm.into(),
        }
    }

    /// Create a PathConflict error.
    pub fn path_conflict(path: impl Into<String>) -> Self {
        Error::PathConflict { path: path.into() }
    }

    /// Wrap a collaborator failure for the directory at `path`.
    pub fn persist(path: impl Into<String>, source: Error) -> Self {
        Error::Persist {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Create a MissingSize error.
    pub fn missing_size(cid: impl Into<String>) -> Self {
        Error::MissingSize { cid: cid.into() }
    }

    /// Returns true for errors that mean an internal invariant was broken
    /// rather than bad input or a failing collaborator.
    pub fn is_internal(&self) -> bool {
        matches!(self, Error::MissingSize { .. } | Error::SizeConflict { .. })
    }
}

// Additional From implementations for external error types

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Error::Io { source: err.error }
    }
}

impl From<ignore::Error> for Error {
    fn from(err: ignore::Error) -> Self {
        // ignore::Error can wrap an io::Error or be a path error
        match err.io_error() {
            Some(io_err) => Error::Io {
                source: std::io::Error::new(io_err.kind(), io_err.to_string()),
            },
            None => Error::Io {
                source: std::io::Error::other(err.to_string()),
            },
        }
    }
}
