//! Bottom-up flushing of a directory tree into persisted directory objects.

use crate::builder::{Directory, TreeBuilder, TreeNode};
use crate::cid::ContentId;
use crate::directory::{DirectoryObject, Link};
use crate::entry::{DirectoryRecord, FileEntry};
use crate::error::{Error, Result};
use crate::path::join_path;
use crate::persist::{Persist, RecordSink};
use crate::size_index::SizeIndex;
use futures::future::{BoxFuture, FutureExt, try_join_all};
use tracing::{debug, info};

/// Build the directory tree described by `entries` and persist it.
///
/// Every directory is persisted after all of its descendants. A record is
/// pushed to `sink` for each persisted directory except the root, whose id
/// is returned instead. Returns `Ok(None)` when no entry has a containing
/// directory. Fails with [`Error::MultipleRoots`] before persisting
/// anything when the entries do not share a single top-level directory.
pub async fn flush_tree<P, S>(
    entries: &[FileEntry],
    persist: &P,
    sink: &S,
) -> Result<Option<ContentId>>
where
    P: Persist + ?Sized,
    S: RecordSink + ?Sized,
{
    let Some((name, root)) = TreeBuilder::build(entries)?.into_root()? else {
        debug!(entries = entries.len(), "no directories to flush");
        return Ok(None);
    };

    let index = SizeIndex::seed(entries)?;
    let directories = root.directory_count();
    let cid = TreeFlusher::new(persist, sink, &index)
        .flush_root(name, root)
        .await?;

    info!(root = %cid, directories, files = entries.len(), "flushed directory tree");
    Ok(Some(cid))
}

/// Persists directories depth-first, children before parents.
pub struct TreeFlusher<'a, P: ?Sized, S: ?Sized> {
    persist: &'a P,
    sink: &'a S,
    index: &'a SizeIndex,
}

impl<'a, P, S> TreeFlusher<'a, P, S>
where
    P: Persist + ?Sized,
    S: RecordSink + ?Sized,
{
    /// `index` must already know the size of every leaf in the trees flushed.
    pub fn new(persist: &'a P, sink: &'a S, index: &'a SizeIndex) -> Self {
        Self {
            persist,
            sink,
            index,
        }
    }

    /// Flush the root directory `name`. No record is emitted for it.
    pub async fn flush_root(&self, name: String, root: Directory) -> Result<ContentId> {
        self.flush_directory(root, vec![name], false).await
    }

    fn flush_directory<'s>(
        &'s self,
        dir: Directory,
        path: Vec<String>,
        emit: bool,
    ) -> BoxFuture<'s, Result<ContentId>> {
        async move {
            // Dropping the join on the first error discards unfinished siblings.
            let resolved = try_join_all(
                dir.into_children()
                    .into_iter()
                    .map(|(name, child)| self.resolve_child(&path, name, child)),
            )
            .await?;

            let links = resolved
                .into_iter()
                .map(|(name, cid)| {
                    let size = self.index.lookup(&cid)?;
                    Link::new(name, size, cid)
                })
                .collect::<Result<Vec<_>>>()?;

            let dir_path = join_path(&path);
            let object = DirectoryObject::new(links);
            let persisted = self
                .persist
                .persist(&object)
                .await
                .map_err(|source| Error::persist(&dir_path, source))?;

            self.index.record(persisted.cid, persisted.size)?;
            debug!(
                path = %dir_path,
                cid = %persisted.cid,
                size = persisted.size,
                links = object.links().len(),
                "persisted directory"
            );

            if emit {
                self.sink.emit(DirectoryRecord {
                    path: dir_path,
                    size: persisted.size,
                    cid: persisted.cid,
                })?;
            }

            Ok(persisted.cid)
        }
        .boxed()
    }

    async fn resolve_child(
        &self,
        parent: &[String],
        name: String,
        child: TreeNode,
    ) -> Result<(String, ContentId)> {
        match child {
            TreeNode::Leaf(cid) => Ok((name, cid)),
            TreeNode::Directory(dir) => {
                let mut path = parent.to_vec();
                path.push(name.clone());
                let cid = self.flush_directory(dir, path, true).await?;
                Ok((name, cid))
            }
        }
    }
}
