//! Stored object header.
//!
//! Every object file starts with a 16-byte header followed by the payload:
//!
//! ```text
//! 0x00  4   "CTRE" magic
//! 0x04  1   version (u8) = 1
//! 0x05  1   type: 1=blob, 2=directory
//! 0x06  1   algo: 1=blake3-256
//! 0x07  1   reserved (must be 0)
//! 0x08  8   payload_len (u64 LE)
//! 0x10  ... payload
//! ```

use crate::cid::Algorithm;
use crate::error::{Error, Result};
use std::path::Path;

/// Magic bytes at the start of every object file.
pub const MAGIC: &[u8; 4] = b"CTRE";

/// Current object format version.
pub const VERSION: u8 = 1;

/// Size of the object header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Object types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectType {
    /// File content.
    Blob = 1,
    /// A directory object.
    Directory = 2,
}

impl ObjectType {
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(ObjectType::Blob),
            2 => Some(ObjectType::Directory),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Blob => "blob",
            ObjectType::Directory => "directory",
        }
    }
}

/// A 16-byte object header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectHeader {
    /// Object type.
    pub object_type: ObjectType,
    /// Hash algorithm used.
    pub algorithm: Algorithm,
    /// Length of the payload in bytes.
    pub payload_len: u64,
}

impl ObjectHeader {
    pub fn new(object_type: ObjectType, algorithm: Algorithm, payload_len: u64) -> Self {
        Self {
            object_type,
            algorithm,
            payload_len,
        }
    }

    /// Encode the header to a 16-byte array.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4] = VERSION;
        buf[5] = self.object_type.to_u8();
        buf[6] = self.algorithm.id();
        buf[8..16].copy_from_slice(&self.payload_len.to_le_bytes());
        buf
    }

    /// Decode a header read from the object file at `path`.
    pub fn decode(buf: &[u8], path: &Path) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::corrupted_object(
                path,
                format!(
                    "Header too short: {} bytes (expected {})",
                    buf.len(),
                    HEADER_SIZE
                ),
            ));
        }

        if &buf[0..4] != MAGIC {
            return Err(Error::corrupted_object(
                path,
                format!("Invalid magic: {:?}", &buf[0..4]),
            ));
        }

        if buf[4] != VERSION {
            return Err(Error::corrupted_object(
                path,
                format!("Unsupported version: {}", buf[4]),
            ));
        }

        let object_type = ObjectType::from_u8(buf[5]).ok_or_else(|| {
            Error::corrupted_object(path, format!("Invalid object type: {}", buf[5]))
        })?;

        let algorithm = Algorithm::from_id(buf[6])?;

        if buf[7] != 0 {
            return Err(Error::corrupted_object(
                path,
                format!("Reserved byte must be 0, got {}", buf[7]),
            ));
        }

        let mut len_bytes = [0u8; 8];
        len_bytes.copy_from_slice(&buf[8..16]);

        Ok(Self {
            object_type,
            algorithm,
            payload_len: u64::from_le_bytes(len_bytes),
        })
    }
}
