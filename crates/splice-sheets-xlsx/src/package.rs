//! In-memory view of the ZIP container
//!
//! The whole archive is inflated once at open. Entry order is recorded so the
//! writer can reproduce it, and the original archive bytes are kept so clean
//! entries can be copied without recompression.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use crate::error::{XlsxError, XlsxResult};

/// Upper bound on the buffer reserved up front for one member.
const MAX_PREALLOCATION: u64 = 16 * 1024 * 1024;

/// One entry of the archive, in original order
#[derive(Debug, Clone)]
struct PackageEntry {
    name: String,
    is_dir: bool,
    data: Vec<u8>,
}

/// A loaded container: member path → inflated bytes, plus original ordering
#[derive(Debug, Clone)]
pub struct Package {
    source: Vec<u8>,
    entries: Vec<PackageEntry>,
    by_name: HashMap<String, usize>,
}

impl Package {
    /// Load a container from its raw bytes
    ///
    /// Fails with [`XlsxError::CorruptContainer`] if the archive structure is
    /// unreadable or an entry cannot be inflated.
    pub fn open(bytes: Vec<u8>) -> XlsxResult<Self> {
        let mut entries = Vec::new();
        let mut by_name = HashMap::new();

        {
            let mut archive = zip::ZipArchive::new(Cursor::new(bytes.as_slice()))?;
            for i in 0..archive.len() {
                let mut file = archive.by_index(i)?;
                let name = file.name().to_string();
                let is_dir = file.is_dir();

                let mut data = Vec::new();
                if !is_dir {
                    // the declared size comes from the archive and is not trusted
                    data.reserve(file.size().min(MAX_PREALLOCATION) as usize);
                    file.read_to_end(&mut data).map_err(|e| {
                        XlsxError::CorruptContainer(zip::result::ZipError::Io(e))
                    })?;
                    by_name.insert(name.clone(), entries.len());
                }

                entries.push(PackageEntry { name, is_dir, data });
            }
        }

        log::debug!(
            "opened package: {} entries, {} bytes",
            entries.len(),
            bytes.len()
        );

        Ok(Self {
            source: bytes,
            entries,
            by_name,
        })
    }

    /// Raw bytes of a member
    pub fn member(&self, path: &str) -> XlsxResult<&[u8]> {
        self.by_name
            .get(path)
            .map(|&i| self.entries[i].data.as_slice())
            .ok_or_else(|| XlsxError::MissingPart(path.to_string()))
    }

    /// Whether a member with this path exists
    pub fn contains(&self, path: &str) -> bool {
        self.by_name.contains_key(path)
    }

    /// Member paths (file entries only) in archive order
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.is_dir)
            .map(|e| e.name.as_str())
    }

    /// Number of entries in the archive
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The archive exactly as it was opened
    pub fn source_bytes(&self) -> &[u8] {
        &self.source
    }
}
