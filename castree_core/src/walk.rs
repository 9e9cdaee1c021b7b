//! Filesystem walking into file entries.

use crate::entry::FileEntry;
use crate::error::{Error, Result};
use crate::store::Store;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

impl Store {
    /// Store every regular file under `path` and describe it as a [`FileEntry`].
    ///
    /// Entry paths start with the name of `path` itself, so a directory
    /// yields a single root when the entries are flushed. A plain file
    /// yields one entry with a one-component path. Symlinks are skipped.
    /// `.gitignore` rules are respected; hidden files are included.
    pub fn collect_entries(&self, path: &Path) -> Result<Vec<FileEntry>> {
        let metadata = fs::symlink_metadata(path).map_err(|e| Error::Io {
            source: std::io::Error::new(
                e.kind(),
                format!("Cannot read {}: {}", path.display(), e),
            ),
        })?;

        let base_name = entry_name(path)?;

        if metadata.is_file() {
            let (cid, size) = self.put_blob(fs::File::open(path)?)?;
            return Ok(vec![FileEntry::new(base_name, size, cid)]);
        }

        if !metadata.is_dir() {
            return Err(Error::invalid_link(format!(
                "Unsupported file type: {}",
                path.display()
            )));
        }

        let walker = ignore::WalkBuilder::new(path)
            .hidden(false)
            .git_ignore(true)
            .follow_links(false)
            .build();

        let mut entries = Vec::new();
        for dir_entry in walker {
            let dir_entry = dir_entry?;
            let Some(file_type) = dir_entry.file_type() else {
                continue;
            };

            if file_type.is_symlink() {
                warn!(path = %dir_entry.path().display(), "skipping symlink");
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let relative = dir_entry.path().strip_prefix(path).map_err(|_| {
                Error::invalid_link(format!("Path escapes walk root: {}", dir_entry.path().display()))
            })?;

            let mut entry_path = base_name.clone();
            for component in relative.components() {
                let name = component.as_os_str().to_str().ok_or_else(|| {
                    Error::invalid_link(format!("Non UTF-8 path: {}", dir_entry.path().display()))
                })?;
                entry_path.push('/');
                entry_path.push_str(name);
            }

            let (cid, size) = self.put_blob(fs::File::open(dir_entry.path())?)?;
            debug!(path = %entry_path, %cid, size, "stored file");
            entries.push(FileEntry::new(entry_path, size, cid));
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }
}

/// UTF-8 final component of `path`, resolving `.` and similar through the
/// canonical path.
fn entry_name(path: &Path) -> Result<String> {
    let canonical = path.canonicalize()?;
    canonical
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| Error::invalid_link(format!("Invalid filename: {}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cid::{Algorithm, ContentId};
    use tempfile::TempDir;

    fn setup() -> (TempDir, Store) {
        let temp_dir = TempDir::new().unwrap();
        let store = Store::init(temp_dir.path().join("store"), Algorithm::Blake3).unwrap();
        (temp_dir, store)
    }

    #[test]
    fn test_collect_directory() {
        let (temp_dir, store) = setup();
        let source = temp_dir.path().join("project");
        fs::create_dir_all(source.join("src/nested")).unwrap();
        fs::write(source.join("README"), b"readme").unwrap();
        fs::write(source.join("src/main.rs"), b"fn main() {}").unwrap();
        fs::write(source.join("src/nested/.hidden"), b"h").unwrap();

        let entries = store.collect_entries(&source).unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec!["project/README", "project/src/main.rs", "project/src/nested/.hidden"]
        );

        let main = &entries[1];
        assert_eq!(main.size, 12);
        assert_eq!(main.cid, ContentId::hash_bytes(b"fn main() {}"));
        assert_eq!(store.get_blob(&main.cid).unwrap(), b"fn main() {}");
    }

    #[test]
    fn test_collect_single_file() {
        let (temp_dir, store) = setup();
        let file = temp_dir.path().join("alone.txt");
        fs::write(&file, b"solo").unwrap();

        let entries = store.collect_entries(&file).unwrap();
        assert_eq!(entries, vec![FileEntry::new("alone.txt", 4, ContentId::hash_bytes(b"solo"))]);
    }

    #[test]
    fn test_collect_missing_path() {
        let (temp_dir, store) = setup();
        assert!(store.collect_entries(&temp_dir.path().join("missing")).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_skipped() {
        let (temp_dir, store) = setup();
        let source = temp_dir.path().join("links");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("real"), b"data").unwrap();
        std::os::unix::fs::symlink(source.join("real"), source.join("alias")).unwrap();

        let entries = store.collect_entries(&source).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "links/real");
    }
}
