//! Folding flat file entries into a nested directory tree.

use crate::cid::ContentId;
use crate::directory::validate_name;
use crate::entry::FileEntry;
use crate::error::{Error, Result};
use crate::path::{join_path, split_path};
use indexmap::IndexMap;
use indexmap::map::Entry;
use tracing::{debug, warn};

/// A node of the directory tree being built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeNode {
    /// A file, identified by its stored content id.
    Leaf(ContentId),
    /// A directory to be flushed.
    Directory(Directory),
}

/// Children of a directory, in first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directory {
    children: IndexMap<String, TreeNode>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&TreeNode> {
        self.children.get(name)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TreeNode)> {
        self.children.iter()
    }

    pub fn into_children(self) -> IndexMap<String, TreeNode> {
        self.children
    }

    /// Number of directories in this subtree, this one included.
    pub fn directory_count(&self) -> usize {
        1 + self
            .children
            .values()
            .map(|child| match child {
                TreeNode::Directory(dir) => dir.directory_count(),
                TreeNode::Leaf(_) => 0,
            })
            .sum::<usize>()
    }

    /// Child directory `name`, created if absent.
    fn subdirectory(&mut self, name: &str, path: &[&str]) -> Result<&mut Directory> {
        let node = self
            .children
            .entry(name.to_string())
            .or_insert_with(|| TreeNode::Directory(Directory::new()));
        match node {
            TreeNode::Directory(dir) => Ok(dir),
            TreeNode::Leaf(_) => Err(Error::path_conflict(join_path(path))),
        }
    }

    /// Set `name` to a leaf, replacing an earlier leaf of the same name.
    fn set_leaf(&mut self, name: &str, cid: ContentId, path: &[&str]) -> Result<()> {
        match self.children.entry(name.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(TreeNode::Leaf(cid));
                Ok(())
            }
            Entry::Occupied(mut slot) => match slot.get() {
                TreeNode::Directory(_) => Err(Error::path_conflict(join_path(path))),
                TreeNode::Leaf(old) => {
                    warn!(
                        path = %join_path(path),
                        old = %old,
                        new = %cid,
                        "duplicate file path, keeping the last entry"
                    );
                    slot.insert(TreeNode::Leaf(cid));
                    Ok(())
                }
            },
        }
    }
}

/// Top-level directories produced by [`TreeBuilder::build`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Forest {
    roots: IndexMap<String, Directory>,
}

impl Forest {
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Directory> {
        self.roots.get(name)
    }

    /// The single root directory and its name.
    ///
    /// Returns `Ok(None)` when no entry had a containing directory, and
    /// [`Error::MultipleRoots`] when more than one top-level name was seen.
    pub fn into_root(self) -> Result<Option<(String, Directory)>> {
        if self.roots.len() > 1 {
            return Err(Error::MultipleRoots {
                roots: self.roots.into_keys().collect(),
            });
        }
        Ok(self.roots.into_iter().next())
    }
}

/// Builds a [`Forest`] from flat file entries.
pub struct TreeBuilder;

impl TreeBuilder {
    /// Fold `entries` into nested directories.
    ///
    /// Paths with a single component have no containing directory and are
    /// skipped. Every other path creates its intermediate directories and
    /// ends in a leaf holding the entry's content id.
    pub fn build(entries: &[FileEntry]) -> Result<Forest> {
        let mut forest = Forest::default();

        for entry in entries {
            let components = split_path(&entry.path);
            let Some((file_name, dirs)) = components.split_last() else {
                debug!(path = %entry.path, "skipping entry with empty path");
                continue;
            };
            let Some((root, rest)) = dirs.split_first() else {
                debug!(path = %entry.path, "skipping top-level file");
                continue;
            };

            for component in &components {
                validate_name(component)?;
            }

            let mut dir = forest.roots.entry(root.to_string()).or_default();
            for (depth, name) in rest.iter().enumerate() {
                dir = dir.subdirectory(name, &components[..depth + 2])?;
            }
            dir.set_leaf(file_name, entry.cid, &components)?;
        }

        Ok(forest)
    }
}
