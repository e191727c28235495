//! Upload directory scanning.
//!
//! Every listing request starts here: the upload directory is read in full,
//! each entry is stat'ed, and the result is a [`Catalog`] snapshot. There is
//! no persistent index and no background refresh, so a catalog is only as
//! fresh as the request that built it.
//!
//! ## What counts as an entry
//!
//! ```text
//! uploads/
//! ├── .DS_Store                    # hidden, skipped
//! ├── thumbnails/                  # subdirectory, skipped
//! │   └── phone1_clip-thumb.jpg
//! ├── phone1_beach.jpg             # image
//! ├── phone1_clip.mp4              # video
//! └── laptop_taxes.pdf             # other
//! ```
//!
//! Only regular files directly inside the directory are catalogued.
//!
//! ## Failure policy
//!
//! - The directory itself cannot be read → [`ScanError::Unreadable`]; the
//!   whole listing fails.
//! - A single entry cannot be stat'ed (deleted mid-scan, permissions, a
//!   non-UTF-8 name) → the entry is logged and left out. It is never
//!   included with zeroed fields, which would corrupt page counts.

use crate::media::{self, MediaType};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Cannot read upload directory {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// One stored file as seen at scan time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub filename: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

impl FileEntry {
    /// Build an entry, deriving its type from the filename.
    pub fn new(filename: impl Into<String>, size: u64, modified: DateTime<Utc>) -> Self {
        let filename = filename.into();
        let media_type = media::classify(&filename);
        Self {
            filename,
            size,
            modified,
            media_type,
        }
    }
}

/// Snapshot of every file in the upload directory.
///
/// Order is scan order and carries no meaning; the pager imposes the
/// canonical order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<FileEntry>,
}

impl Catalog {
    pub fn from_entries(entries: Vec<FileEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Scan `dir` into a catalog.
pub fn scan(dir: &Path) -> Result<Catalog, ScanError> {
    let read = fs::read_dir(dir).map_err(|source| ScanError::Unreadable {
        path: dir.to_path_buf(),
        source,
    })?;

    let candidates: Vec<PathBuf> = read
        .filter_map(|entry| match entry {
            Ok(e) => Some(e.path()),
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "skipping unreadable directory entry");
                None
            }
        })
        .filter(|p| !is_hidden(p))
        .collect();

    let entries: Vec<FileEntry> = candidates.par_iter().filter_map(|p| stat_entry(p)).collect();

    debug!(
        dir = %dir.display(),
        seen = candidates.len(),
        catalogued = entries.len(),
        "scanned upload directory"
    );

    Ok(Catalog::from_entries(entries))
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().starts_with('.'))
        .unwrap_or(true)
}

/// Stat a single path. `None` means "leave it out of the catalog".
fn stat_entry(path: &Path) -> Option<FileEntry> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping entry: stat failed");
            return None;
        }
    };
    if !meta.is_file() {
        return None;
    }

    let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
        warn!(path = %path.display(), "skipping entry: filename is not valid UTF-8");
        return None;
    };

    let modified = match meta.modified() {
        Ok(t) => DateTime::<Utc>::from(t),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping entry: no modification time");
            return None;
        }
    };

    Some(FileEntry::new(filename, meta.len(), modified))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::*;
    use tempfile::TempDir;

    #[test]
    fn scan_classifies_every_file() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "a.JPG", b"img", 10);
        write_file(tmp.path(), "b.mp4", b"vid", 20);
        write_file(tmp.path(), "c.pdf", b"doc", 5);

        let catalog = scan(tmp.path()).unwrap();
        assert_eq!(catalog.len(), 3);

        let a = find_entry(&catalog, "a.JPG");
        assert_eq!(a.media_type, MediaType::Image);
        assert_eq!(find_entry(&catalog, "b.mp4").media_type, MediaType::Video);
        assert_eq!(find_entry(&catalog, "c.pdf").media_type, MediaType::Other);
    }

    #[test]
    fn scan_reads_size_and_mtime() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "clip.webm", b"twelve bytes", 1_700_000_000);

        let catalog = scan(tmp.path()).unwrap();
        let entry = find_entry(&catalog, "clip.webm");
        assert_eq!(entry.size, 12);
        assert_eq!(entry.modified, ts(1_700_000_000));
    }

    #[test]
    fn hidden_files_and_directories_are_skipped() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), ".DS_Store", b"junk", 1);
        std::fs::create_dir_all(tmp.path().join("thumbnails")).unwrap();
        write_file(&tmp.path().join("thumbnails"), "x-thumb.jpg", b"t", 1);
        write_file(tmp.path(), "kept.png", b"p", 1);

        let catalog = scan(tmp.path()).unwrap();
        assert_eq!(filenames(&catalog), vec!["kept.png"]);
    }

    #[test]
    fn empty_directory_gives_empty_catalog() {
        let tmp = TempDir::new().unwrap();
        let catalog = scan(tmp.path()).unwrap();
        assert!(catalog.is_empty());
    }

    #[test]
    fn missing_directory_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let result = scan(&tmp.path().join("nope"));
        assert!(matches!(result, Err(ScanError::Unreadable { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn dangling_symlink_is_skipped_not_zero_filled() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "real.gif", b"gif", 3);
        std::os::unix::fs::symlink(tmp.path().join("gone.mp4"), tmp.path().join("broken.mp4"))
            .unwrap();

        let catalog = scan(tmp.path()).unwrap();
        assert_eq!(filenames(&catalog), vec!["real.gif"]);
    }

    #[test]
    fn file_entry_serializes_with_type_key() {
        let entry = FileEntry::new("x.mov", 7, ts(0));
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["filename"], "x.mov");
        assert_eq!(json["size"], 7);
        assert_eq!(json["type"], "video");
        assert_eq!(json["modified"], "1970-01-01T00:00:00Z");
    }
}
