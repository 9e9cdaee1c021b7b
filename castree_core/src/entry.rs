//! Input file records and emitted directory records.

use crate::cid::ContentId;
use serde::{Deserialize, Serialize};

/// A regular file already stored in the content-addressed backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// `/`-separated path of the file.
    pub path: String,
    /// Size of the file content in bytes.
    pub size: u64,
    /// Content id of the stored file.
    pub cid: ContentId,
}

impl FileEntry {
    pub fn new(path: impl Into<String>, size: u64, cid: ContentId) -> Self {
        Self {
            path: path.into(),
            size,
            cid,
        }
    }
}

/// A directory persisted during a flush, reported through the record sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryRecord {
    /// Path of the directory, starting with the root directory's name.
    pub path: String,
    /// Measured size of the directory as returned by the persist collaborator.
    pub size: u64,
    /// Content id of the persisted directory object.
    pub cid: ContentId,
}
