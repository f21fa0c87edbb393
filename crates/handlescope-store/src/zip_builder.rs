//! Deflate zip assembly over stored and in-memory entries.

use crate::{ContentStore, Result};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// One entry of a zip archive.
#[derive(Debug, Clone)]
pub enum ZipEntry {
    /// A blob already persisted in the content store.
    Stored {
        /// Name inside the archive
        name: String,
        /// Relative path of the blob in the store
        relpath: PathBuf,
    },
    /// Raw in-memory content.
    Bytes {
        /// Name inside the archive
        name: String,
        /// File content
        content: Vec<u8>,
    },
}

/// Build the archive in memory and return its bytes.
///
/// The caller content-addresses the finished bytes, so identical archive
/// inputs land at the identical store path.
pub(crate) fn build(store: &ContentStore, entries: &[ZipEntry]) -> Result<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);

    for entry in entries {
        match entry {
            ZipEntry::Stored { name, relpath } => {
                let content = store.read(relpath)?;
                writer.start_file(name.as_str(), options)?;
                writer.write_all(&content).map_err(zip::result::ZipError::Io)?;
            }
            ZipEntry::Bytes { name, content } => {
                writer.start_file(name.as_str(), options)?;
                writer.write_all(content).map_err(zip::result::ZipError::Io)?;
            }
        }
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}
