//! Directory object encoding.

use crate::cid::{CID_SIZE, ContentId};
use crate::error::{Error, Result};
use std::io::Read;

/// Longest allowed link name in bytes.
pub const MAX_NAME_LEN: usize = 255;

/// Check that `name` can be stored as a link name.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_link("Name cannot be empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(Error::invalid_link(format!(
            "Name too long: {} bytes (max {})",
            name.len(),
            MAX_NAME_LEN
        )));
    }

    if name.contains('\0') {
        return Err(Error::invalid_link("Name cannot contain null bytes"));
    }

    Ok(())
}

/// A named reference from a directory to a child object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    /// Name of the child (UTF-8).
    pub name: String,
    /// Cumulative size of the child in bytes.
    pub size: u64,
    /// Content id of the child.
    pub cid: ContentId,
}

impl Link {
    /// Create a new link.
    pub fn new(name: impl Into<String>, size: u64, cid: ContentId) -> Result<Self> {
        let name = name.into();
        validate_name(&name)?;
        Ok(Self { name, size, cid })
    }

    /// Encode the link to bytes.
    ///
    /// Format:
    /// - 8 bytes: size (u64 LE)
    /// - 32 bytes: content id
    /// - 1 byte: name_len
    /// - N bytes: name (UTF-8)
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(8 + CID_SIZE + 1 + self.name.len());
        buf.extend_from_slice(&self.size.to_le_bytes());
        buf.extend_from_slice(self.cid.as_bytes());
        buf.push(self.name.len() as u8);
        buf.extend_from_slice(self.name.as_bytes());
        buf
    }

    /// Decode a link from a reader.
    pub fn decode<R: Read>(reader: &mut R) -> Result<Self> {
        let mut size_buf = [0u8; 8];
        reader.read_exact(&mut size_buf)?;
        let size = u64::from_le_bytes(size_buf);

        let mut cid_buf = [0u8; CID_SIZE];
        reader.read_exact(&mut cid_buf)?;
        let cid = ContentId::from_bytes(cid_buf);

        let mut name_len_buf = [0u8; 1];
        reader.read_exact(&mut name_len_buf)?;
        let name_len = name_len_buf[0] as usize;

        if name_len == 0 {
            return Err(Error::invalid_link("Name length is zero"));
        }

        let mut name_buf = vec![0u8; name_len];
        reader.read_exact(&mut name_buf)?;
        let name = String::from_utf8(name_buf)
            .map_err(|e| Error::invalid_link(format!("Invalid UTF-8 in name: {}", e)))?;

        Self::new(name, size, cid)
    }
}

/// A directory: an ordered list of links to its children.
///
/// Links keep the order they were given in. The encoding sorts them by name,
/// so the content id does not depend on that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryObject {
    links: Vec<Link>,
}

impl DirectoryObject {
    pub fn new(links: Vec<Link>) -> Self {
        Self { links }
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn into_links(self) -> Vec<Link> {
        self.links
    }

    /// Sum of the sizes of all children, or `None` if it overflows `u64`.
    pub fn children_size(&self) -> Option<u64> {
        self.links
            .iter()
            .try_fold(0u64, |total, link| total.checked_add(link.size))
    }

    /// Encode the links, sorted bytewise by name.
    pub fn encode(&self) -> Vec<u8> {
        let mut sorted: Vec<&Link> = self.links.iter().collect();
        sorted.sort_by(|a, b| a.name.as_bytes().cmp(b.name.as_bytes()));

        let mut buf = Vec::new();
        for link in sorted {
            buf.extend_from_slice(&link.encode());
        }
        buf
    }

    /// Decode a directory from its encoded payload.
    pub fn decode(data: &[u8]) -> Result<Self> {
        let mut reader = std::io::Cursor::new(data);
        let mut links = Vec::new();

        while reader.position() < data.len() as u64 {
            links.push(Link::decode(&mut reader)?);
        }

        Ok(Self { links })
    }
}
