//! Content id to size bookkeeping shared by a flush.

use crate::cid::ContentId;
use crate::entry::FileEntry;
use crate::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::error;

/// Maps content ids to the cumulative byte size of the object they name.
///
/// Seeded from the input files and extended once per persisted directory.
/// Entries are never removed or changed; writing an id again is accepted
/// only when the size agrees, since identical subtrees share an id.
#[derive(Debug, Default)]
pub struct SizeIndex {
    sizes: RwLock<HashMap<ContentId, u64>>,
}

impl SizeIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index holding the size of every input file.
    pub fn seed(entries: &[FileEntry]) -> Result<Self> {
        let index = Self::new();
        for entry in entries {
            index.record(entry.cid, entry.size)?;
        }
        Ok(index)
    }

    /// Size recorded for `cid`.
    ///
    /// A miss means a link was built for an object that was never seeded
    /// or persisted.
    pub fn lookup(&self, cid: &ContentId) -> Result<u64> {
        match self.sizes.read().get(cid) {
            Some(size) => Ok(*size),
            None => {
                error!(%cid, "size index has no entry for referenced content id");
                Err(Error::missing_size(cid.to_hex()))
            }
        }
    }

    /// Record the size of `cid`.
    pub fn record(&self, cid: ContentId, size: u64) -> Result<()> {
        let mut sizes = self.sizes.write();
        match sizes.get(&cid) {
            Some(&existing) if existing != size => {
                error!(%cid, existing, new = size, "conflicting sizes for content id");
                Err(Error::SizeConflict {
                    cid: cid.to_hex(),
                    existing,
                    new: size,
                })
            }
            Some(_) => Ok(()),
            None => {
                sizes.insert(cid, size);
                Ok(())
            }
        }
    }

    pub fn len(&self) -> usize {
        self.sizes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.read().is_empty()
    }
}
