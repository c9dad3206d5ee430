//! Dirty tracking and surgical save
//!
//! Only parts recorded in the [`DirtyTracker`] are re-serialized. Every other
//! entry is copied from the source archive without recompression, so its
//! compressed bytes, headers and timestamps survive unchanged.

use std::collections::{BTreeMap, BTreeSet};
use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

use crate::error::{XlsxError, XlsxResult};
use crate::package::Package;

/// Member paths whose content changed during the session
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    parts: BTreeSet<String>,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a part as modified; returns whether it was clean before
    pub fn mark(&mut self, path: &str) -> bool {
        if self.parts.contains(path) {
            return false;
        }
        log::debug!("part {} is now dirty", path);
        self.parts.insert(path.to_string())
    }

    /// Dirty paths, sorted
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn clear(&mut self) {
        self.parts.clear();
    }
}

/// Re-emits a package with a set of replaced members
pub struct SurgicalWriter;

impl SurgicalWriter {
    /// Build the output archive
    ///
    /// `replacements` maps member paths to their new serialized bytes. With no
    /// replacements the source archive is returned as is. Otherwise entries
    /// keep their original order; replaced members keep their compression
    /// method and get a fixed timestamp so the same edits always produce the
    /// same bytes.
    pub fn write(package: &Package, replacements: &BTreeMap<String, Vec<u8>>) -> XlsxResult<Vec<u8>> {
        if replacements.is_empty() {
            log::debug!("no dirty parts; returning source archive");
            return Ok(package.source_bytes().to_vec());
        }

        if let Some(missing) = replacements.keys().find(|path| !package.contains(path)) {
            return Err(XlsxError::MissingPart(missing.clone()));
        }

        let source = package.source_bytes();
        let mut archive = ZipArchive::new(Cursor::new(source))?;
        let mut zip = ZipWriter::new(Cursor::new(Vec::with_capacity(source.len())));

        for i in 0..archive.len() {
            let file = archive.by_index(i)?;

            match replacements.get(file.name()) {
                Some(bytes) if !file.is_dir() => {
                    let method = match file.compression() {
                        CompressionMethod::Stored => CompressionMethod::Stored,
                        _ => CompressionMethod::Deflated,
                    };
                    let options = SimpleFileOptions::default()
                        .compression_method(method)
                        .last_modified_time(DateTime::default());

                    zip.start_file(file.name(), options).map_err(write_error)?;
                    zip.write_all(bytes)?;
                    log::debug!("rewrote {} ({} bytes)", file.name(), bytes.len());
                }
                _ => zip.raw_copy_file(file).map_err(write_error)?,
            }
        }

        let out = zip.finish().map_err(write_error)?.into_inner();
        log::debug!(
            "saved package: {} entries, {} rewritten, {} bytes",
            archive.len(),
            replacements.len(),
            out.len()
        );
        Ok(out)
    }
}

/// Errors while producing the output are I/O failures, not a corrupt input
fn write_error(err: zip::result::ZipError) -> XlsxError {
    match err {
        zip::result::ZipError::Io(e) => XlsxError::Io(e),
        other => XlsxError::Io(std::io::Error::new(std::io::ErrorKind::Other, other)),
    }
}
