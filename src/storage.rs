//! Upload ingest and deletion.
//!
//! Uploaded files land directly in the upload directory under a name that
//! carries the uploading device's identifier:
//!
//! ```text
//! X-Device-Id: phone-7f3a     +  "IMG 0042.JPG"
//! → uploads/phone-7f3a_IMG_0042.JPG
//! ```
//!
//! Duplicate detection is an exact filename match: if that name already
//! exists the upload is reported as a duplicate and the existing file is left
//! untouched. The check and the claim are a single `create_new` open, so two
//! concurrent uploads of the same name cannot both win. The body is then
//! streamed into the claimed file without being held in memory.

use crate::catalog::{self, ScanError};
use crate::filter::{self, Counts};
use crate::thumbnail;
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Device identifier used when an upload carries none.
pub const ANONYMOUS_DEVICE: &str = "anonymous";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),
    #[error("Invalid filename: {0:?}")]
    InvalidFilename(String),
    #[error("File not found: {0}")]
    NotFound(String),
}

/// What happened to an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Stored { filename: String },
    Duplicate { filename: String },
}

impl UploadOutcome {
    pub fn filename(&self) -> &str {
        match self {
            UploadOutcome::Stored { filename } | UploadOutcome::Duplicate { filename } => filename,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, UploadOutcome::Duplicate { .. })
    }
}

/// Reject names that could escape the upload directory or hide themselves.
pub fn validate_filename(name: &str) -> Result<&str, StorageError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.contains("..");
    if bad {
        return Err(StorageError::InvalidFilename(name.to_string()));
    }
    Ok(name)
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_` and drop leading dots.
fn sanitize_component(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    // ".." inside a name is harmless once separators are gone, but keep
    // stored names passing `validate_filename`.
    trimmed.replace("..", "_")
}

/// The name an upload is stored under.
///
/// Only the final path component of `original` is used, so a client sending
/// `../../etc/passwd` gets `device_passwd`.
pub fn stored_filename(device_id: Option<&str>, original: &str) -> Result<String, StorageError> {
    let base = original
        .rsplit(['/', '\\'])
        .next()
        .map(sanitize_component)
        .unwrap_or_default();
    if base.is_empty() {
        return Err(StorageError::InvalidFilename(original.to_string()));
    }

    let device = device_id
        .map(|d| sanitize_component(d.trim()))
        .filter(|d| !d.is_empty())
        .unwrap_or_else(|| ANONYMOUS_DEVICE.to_string());

    Ok(format!("{device}_{base}"))
}

/// Where an incoming upload goes.
#[derive(Debug)]
pub enum UploadTarget {
    New(PendingUpload),
    Duplicate { filename: String },
}

/// A freshly created upload file being filled chunk by chunk.
///
/// Dropping it before [`commit`](Self::commit) removes the file, so an
/// interrupted upload never shows up in a listing.
#[derive(Debug)]
pub struct PendingUpload {
    filename: String,
    path: PathBuf,
    file: tokio::fs::File,
    written: u64,
    committed: bool,
}

impl PendingUpload {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), StorageError> {
        self.file.write_all(chunk).await?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    pub async fn commit(mut self) -> Result<UploadOutcome, StorageError> {
        self.file.flush().await?;
        self.file.sync_all().await?;
        self.committed = true;
        info!(filename = %self.filename, size = self.written, "stored upload");
        Ok(UploadOutcome::Stored {
            filename: std::mem::take(&mut self.filename),
        })
    }
}

impl Drop for PendingUpload {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!(filename = %self.filename, "removed partial upload"),
            Err(e) => warn!(filename = %self.filename, error = %e, "could not remove partial upload"),
        }
    }
}

/// Claim the stored name for an upload, refusing to overwrite.
///
/// The returned file is empty; the caller streams the body into it.
pub fn create_upload(
    upload_dir: &Path,
    device_id: Option<&str>,
    original: &str,
) -> Result<UploadTarget, StorageError> {
    fs::create_dir_all(upload_dir)?;
    let filename = stored_filename(device_id, original)?;
    let path = upload_dir.join(&filename);

    let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            info!(%filename, "duplicate upload ignored");
            return Ok(UploadTarget::Duplicate { filename });
        }
        Err(e) => return Err(e.into()),
    };

    Ok(UploadTarget::New(PendingUpload {
        filename,
        path,
        file: tokio::fs::File::from_std(file),
        written: 0,
        committed: false,
    }))
}

/// Delete a stored file and its thumbnail, returning the new counts.
pub fn delete_file(
    upload_dir: &Path,
    thumbnail_dir: &Path,
    filename: &str,
) -> Result<Counts, StorageError> {
    let filename = validate_filename(filename)?;
    let path = upload_dir.join(filename);

    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(StorageError::NotFound(filename.to_string()));
        }
        Err(e) => return Err(e.into()),
    }

    let thumb = thumbnail_dir.join(thumbnail::thumbnail_name(filename));
    match fs::remove_file(&thumb) {
        Ok(()) => debug!(thumbnail = %thumb.display(), "removed thumbnail"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => debug!(thumbnail = %thumb.display(), error = %e, "could not remove thumbnail"),
    }

    info!(%filename, "deleted upload");
    let catalog = catalog::scan(upload_dir)?;
    Ok(filter::count(&catalog))
}
