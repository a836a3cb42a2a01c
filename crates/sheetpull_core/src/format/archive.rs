use std::io::{Cursor, Write};

use bytes::Bytes;
use sheetpull_error::{Result, ResultExt};
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, ZipWriter};

/// Wrap `content` in a zip archive holding a single deflated entry.
pub fn zip_single_entry(entry_name: &str, content: &[u8]) -> Result<Bytes> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer
        .start_file(entry_name, options)
        .context("Failed to start zip entry")?;
    writer
        .write_all(content)
        .context("Failed to write zip entry")?;
    let cursor = writer.finish().context("Failed to finish zip archive")?;

    Ok(Bytes::from(cursor.into_inner()))
}
