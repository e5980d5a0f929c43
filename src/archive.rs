//! Packaging watermarked images into a downloadable zip archive.

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::Result;

pub use crate::config::DEFAULT_ARCHIVE_NAME;

/// One file of the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Entry name, normally the original source file name.
    pub name: String,
    /// Entry contents.
    pub bytes: Vec<u8>,
}

/// Build a zip archive with one deflated entry per item.
///
/// When several entries share a name, the last one wins.
///
/// # Errors
///
/// Returns [`Error::Archive`](crate::Error::Archive) if the zip writer fails.
pub fn create_archive(entries: &[ArchiveEntry]) -> Result<Vec<u8>> {
    let last_index: HashMap<&str, usize> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| (entry.name.as_str(), i))
        .collect();

    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for (i, entry) in entries.iter().enumerate() {
        if last_index.get(entry.name.as_str()) != Some(&i) {
            debug!(name = %entry.name, "replacing duplicate archive entry");
            continue;
        }
        writer.start_file(entry.name.as_str(), options)?;
        writer.write_all(&entry.bytes)?;
    }

    let archive = writer.finish()?.into_inner();
    debug!(entries = last_index.len(), bytes = archive.len(), "archive created");
    Ok(archive)
}

/// Write an archive to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`Error::Io`](crate::Error::Io) if the file cannot be written.
pub fn save_archive(archive: &[u8], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::write(path, archive)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    fn entry(name: &str, bytes: &[u8]) -> ArchiveEntry {
        ArchiveEntry {
            name: name.to_string(),
            bytes: bytes.to_vec(),
        }
    }

    fn read_back(archive: Vec<u8>) -> Vec<(String, Vec<u8>)> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
        (0..zip.len())
            .map(|i| {
                let mut file = zip.by_index(i).unwrap();
                let mut bytes = Vec::new();
                file.read_to_end(&mut bytes).unwrap();
                (file.name().to_string(), bytes)
            })
            .collect()
    }

    #[test]
    fn archive_holds_one_entry_per_item() {
        let archive = create_archive(&[
            entry("kitchen.jpg", b"jpeg bytes"),
            entry("garden.png", b"png bytes"),
        ])
        .unwrap();

        let files = read_back(archive);
        assert_eq!(
            files,
            vec![
                ("kitchen.jpg".to_string(), b"jpeg bytes".to_vec()),
                ("garden.png".to_string(), b"png bytes".to_vec()),
            ]
        );
    }

    #[test]
    fn duplicate_names_keep_last_entry() {
        let archive = create_archive(&[
            entry("same.jpg", b"first"),
            entry("other.jpg", b"other"),
            entry("same.jpg", b"second"),
        ])
        .unwrap();

        let files = read_back(archive);
        assert_eq!(files.len(), 2);
        assert!(files.contains(&("same.jpg".to_string(), b"second".to_vec())));
    }

    #[test]
    fn empty_archive_is_valid() {
        let archive = create_archive(&[]).unwrap();
        assert!(read_back(archive).is_empty());
    }

    #[test]
    fn save_archive_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join(DEFAULT_ARCHIVE_NAME);

        save_archive(b"PK", &path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"PK");
    }
}
