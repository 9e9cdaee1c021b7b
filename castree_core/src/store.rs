//! On-disk content-addressed store.

use crate::cid::{Algorithm, ContentId};
use crate::directory::DirectoryObject;
use crate::error::{Error, Result};
use crate::object::{HEADER_SIZE, ObjectHeader, ObjectType};
use crate::persist::{Persist, Persisted};
use async_trait::async_trait;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// A content-addressed store rooted at a directory.
///
/// Cheap to clone; clones refer to the same directory.
#[derive(Debug, Clone)]
pub struct Store {
    root: PathBuf,
    algorithm: Algorithm,
}

impl Store {
    /// Initialize a new store at the given path.
    ///
    /// Creates the directory structure:
    /// - `objects/blake3-256/` for storing objects
    /// - `config` file with version and algorithm
    pub fn init<P: AsRef<Path>>(root: P, algorithm: Algorithm) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("objects").join(algorithm.as_str()))?;

        let config_content = format!("version=1\nalgo={}\n", algorithm.as_str());
        fs::write(root.join("config"), config_content)?;

        Ok(Self { root, algorithm })
    }

    /// Open an existing store at the given path.
    ///
    /// Validates the store structure and reads the configuration.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        if !root.exists() {
            return Err(Error::invalid_store(&root, "directory does not exist"));
        }

        let config_path = root.join("config");
        if !config_path.exists() {
            return Err(Error::invalid_store(&root, "config file not found"));
        }

        let config_content = fs::read_to_string(&config_path)?;
        let algorithm = Self::parse_config(&root, &config_content)?;

        if !root.join("objects").join(algorithm.as_str()).exists() {
            return Err(Error::invalid_store(
                &root,
                "objects directory structure missing",
            ));
        }

        Ok(Self { root, algorithm })
    }

    /// Parse the config file to extract the algorithm.
    fn parse_config(root: &Path, content: &str) -> Result<Algorithm> {
        let mut version = None;
        let mut algo = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "version" => version = Some(value.trim()),
                    "algo" => algo = Some(value.trim()),
                    _ => {}
                }
            }
        }

        if version != Some("1") {
            return Err(Error::invalid_store(
                root,
                format!("unsupported config version: {:?}", version),
            ));
        }

        let algo_str = algo.ok_or_else(|| Error::invalid_store(root, "missing algo in config"))?;
        Algorithm::parse(algo_str)
    }

    /// Get the path to an object file given its content id.
    ///
    /// Returns: `objects/{algorithm}/{prefix}/{suffix}`
    pub fn object_path(&self, cid: &ContentId) -> PathBuf {
        self.root
            .join("objects")
            .join(self.algorithm.as_str())
            .join(cid.prefix())
            .join(cid.suffix())
    }

    /// Get the root directory of the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Get the algorithm used by this store.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Check whether an object is present.
    pub fn contains(&self, cid: &ContentId) -> bool {
        self.object_path(cid).exists()
    }

    /// Read the header of a stored object.
    pub fn read_header(&self, cid: &ContentId) -> Result<ObjectHeader> {
        let path = self.existing_object_path(cid)?;
        let mut file = fs::File::open(&path)?;
        let mut header_buf = [0u8; HEADER_SIZE];
        file.read_exact(&mut header_buf)?;
        ObjectHeader::decode(&header_buf, &path)
    }

    fn existing_object_path(&self, cid: &ContentId) -> Result<PathBuf> {
        let path = self.object_path(cid);
        if !path.exists() {
            return Err(Error::object_not_found(cid.to_hex()));
        }
        Ok(path)
    }

    /// Read an object, checking its type and that the payload hashes to `cid`.
    fn read_object(&self, cid: &ContentId, expected: ObjectType) -> Result<Vec<u8>> {
        let path = self.existing_object_path(cid)?;
        let data = fs::read(&path)?;

        let header = ObjectHeader::decode(&data, &path)?;
        if header.object_type != expected {
            return Err(Error::invalid_object_type(
                expected.as_str(),
                header.object_type.as_str(),
            ));
        }

        let payload = &data[HEADER_SIZE..];
        if payload.len() as u64 != header.payload_len {
            return Err(Error::corrupted_object(
                &path,
                format!(
                    "Payload length mismatch: expected {}, got {}",
                    header.payload_len,
                    payload.len()
                ),
            ));
        }

        let computed = ContentId::hash_bytes(payload);
        if computed != *cid {
            return Err(Error::corrupted_object(
                &path,
                format!("Hash mismatch: expected {}, got {}", cid, computed),
            ));
        }

        Ok(payload.to_vec())
    }

    /// Write an object atomically unless it is already present.
    fn write_object(&self, cid: &ContentId, object_type: ObjectType, payload: &[u8]) -> Result<()> {
        let obj_path = self.object_path(cid);
        if obj_path.exists() {
            return Ok(());
        }

        let Some(parent) = obj_path.parent() else {
            return Err(Error::invalid_store(&self.root, "object path has no parent"));
        };
        fs::create_dir_all(parent)?;

        let header = ObjectHeader::new(object_type, self.algorithm, payload.len() as u64);
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(&header.encode())?;
        temp_file.write_all(payload)?;
        temp_file.flush()?;
        temp_file.persist(&obj_path)?;

        Ok(())
    }

    /// Store file content from a reader.
    ///
    /// Returns the content id and the content size in bytes.
    pub fn put_blob<R: Read>(&self, mut reader: R) -> Result<(ContentId, u64)> {
        let mut payload = Vec::new();
        reader.read_to_end(&mut payload)?;

        let cid = ContentId::hash_bytes(&payload);
        self.write_object(&cid, ObjectType::Blob, &payload)?;
        Ok((cid, payload.len() as u64))
    }

    /// Retrieve file content by content id.
    pub fn get_blob(&self, cid: &ContentId) -> Result<Vec<u8>> {
        self.read_object(cid, ObjectType::Blob)
    }

    /// Stream a blob to a writer.
    pub fn blob_to_writer<W: Write>(&self, cid: &ContentId, mut writer: W) -> Result<()> {
        writer.write_all(&self.get_blob(cid)?)?;
        Ok(())
    }

    /// Store a directory object.
    pub fn put_directory(&self, object: &DirectoryObject) -> Result<Persisted> {
        let (persisted, payload) = Persisted::seal(object)?;
        self.write_object(&persisted.cid, ObjectType::Directory, &payload)?;
        Ok(persisted)
    }

    /// Retrieve a directory object by content id.
    ///
    /// Links come back in canonical (name) order.
    pub fn get_directory(&self, cid: &ContentId) -> Result<DirectoryObject> {
        DirectoryObject::decode(&self.read_object(cid, ObjectType::Directory)?)
    }
}

#[async_trait]
impl Persist for Store {
    async fn persist(&self, object: &DirectoryObject) -> Result<Persisted> {
        let store = self.clone();
        let object = object.clone();
        tokio::task::spawn_blocking(move || store.put_directory(&object))
            .await
            .map_err(|e| Error::Io {
                source: std::io::Error::other(e),
            })?
    }
}
