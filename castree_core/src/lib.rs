//! # Castree Core
//!
//! Builds content-addressed directory trees from flat lists of files that are
//! already stored by content id.
//!
//! The input is a list of [`FileEntry`] records (`path`, `size`, `cid`). The
//! paths are folded into nested directories, and every directory is then
//! encoded and persisted bottom-up: a directory is only persisted once all
//! of its children have content ids. Sibling subtrees are flushed
//! concurrently. Each persisted directory other than the root is reported to
//! a [`RecordSink`]; the root's content id is returned.
//!
//! Persistence goes through the [`Persist`] trait. [`Store`] implements it on
//! disk and [`MemoryStore`] in memory.
//!
//! ## Example
//!
//! ```no_run
//! use castree_core::{Algorithm, DirectoryRecord, Store, flush_tree};
//! use parking_lot::Mutex;
//! use std::path::Path;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Store::init("./my-store", Algorithm::Blake3)?;
//!
//! // Store the files and describe them as flat entries
//! let entries = store.collect_entries(Path::new("./my-data"))?;
//!
//! // Build and persist the directory tree
//! let records: Mutex<Vec<DirectoryRecord>> = Mutex::new(Vec::new());
//! if let Some(root) = flush_tree(&entries, &store, &records).await? {
//!     println!("root {}", root);
//! }
//! # Ok(())
//! # }
//! ```

mod builder;
mod cid;
mod directory;
mod entry;
mod error;
mod flush;
mod object;
mod path;
mod persist;
mod size_index;
mod store;
mod walk;

pub use builder::{Directory, Forest, TreeBuilder, TreeNode};
pub use cid::{Algorithm, ContentId};
pub use directory::{DirectoryObject, Link, validate_name};
pub use entry::{DirectoryRecord, FileEntry};
pub use error::{Error, Result};
pub use flush::{TreeFlusher, flush_tree};
pub use object::{HEADER_SIZE, ObjectHeader, ObjectType};
pub use path::{join_path, split_path};
pub use persist::{MemoryStore, Persist, Persisted, RecordSink};
pub use size_index::SizeIndex;
pub use store::Store;
