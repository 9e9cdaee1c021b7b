//! Seams between the tree flusher and its collaborators.

use crate::cid::ContentId;
use crate::directory::DirectoryObject;
use crate::entry::DirectoryRecord;
use crate::error::{Error, Result};
use crate::object::HEADER_SIZE;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

/// Outcome of persisting a directory object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Persisted {
    /// Content id of the stored object.
    pub cid: ContentId,
    /// Measured size of the object including everything it links to.
    pub size: u64,
}

impl Persisted {
    /// Encode `object` and derive its id and measured size.
    ///
    /// Returns the payload alongside so stores can write it. Fails with
    /// [`Error::SizeOverflow`] when the measured size exceeds `u64`.
    pub fn seal(object: &DirectoryObject) -> Result<(Self, Vec<u8>)> {
        let payload = object.encode();
        let size = object
            .children_size()
            .and_then(|children| children.checked_add((HEADER_SIZE + payload.len()) as u64))
            .ok_or(Error::SizeOverflow {
                links: object.links().len(),
            })?;
        let persisted = Self {
            cid: ContentId::hash_bytes(&payload),
            size,
        };
        Ok((persisted, payload))
    }
}

/// Encodes and durably stores directory objects.
///
/// Implementations must be deterministic: the same object always yields the
/// same [`Persisted`].
#[async_trait]
pub trait Persist: Send + Sync {
    async fn persist(&self, object: &DirectoryObject) -> Result<Persisted>;
}

/// Receives a record for every persisted non-root directory.
///
/// Called from concurrently flushing subtrees, in completion order. Must
/// not block.
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: DirectoryRecord) -> Result<()>;
}

impl RecordSink for UnboundedSender<DirectoryRecord> {
    fn emit(&self, record: DirectoryRecord) -> Result<()> {
        self.send(record).map_err(|_| Error::SinkClosed)
    }
}

impl RecordSink for Mutex<Vec<DirectoryRecord>> {
    fn emit(&self, record: DirectoryRecord) -> Result<()> {
        self.lock().push(record);
        Ok(())
    }
}

/// Keeps directory objects in memory.
///
/// Produces the same ids and sizes as the on-disk store, so it can stand
/// in for it on dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<ContentId, DirectoryObject>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, cid: &ContentId) -> Option<DirectoryObject> {
        self.objects.lock().get(cid).cloned()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.lock().is_empty()
    }
}

#[async_trait]
impl Persist for MemoryStore {
    async fn persist(&self, object: &DirectoryObject) -> Result<Persisted> {
        let (persisted, _) = Persisted::seal(object)?;
        self.objects
            .lock()
            .entry(persisted.cid)
            .or_insert_with(|| object.clone());
        Ok(persisted)
    }
}
