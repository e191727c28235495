//! Thumbnail generation with a bounded number of concurrent jobs.
//!
//! Images are shrunk in-process with the `image` crate. Videos get a single
//! frame grabbed by an external encoder process (`ffmpeg` by default). Both
//! kinds of job are CPU and memory heavy, so every job first takes a permit
//! from a semaphore sized by `thumbnails.max_concurrent`; a bulk upload of
//! fifty videos therefore runs at most that many encoders at once instead of
//! starving the listing path.
//!
//! | Kind | Backend operation | Output |
//! |------|-------------------|--------|
//! | image | `DynamicImage::thumbnail` | `<thumbnail_dir>/<filename>.thumb.jpg` |
//! | video | `<encoder> -ss 1 -i <src> -frames:v 1` | `<thumbnail_dir>/<filename>.thumb.jpg` |
//! | other | none | error: unsupported |
//!
//! A thumbnail newer than its source is reused without taking a permit.

use crate::config::LockerConfig;
use crate::media::{self, MediaType};
use crate::storage::{self, StorageError};
use image::{DynamicImage, ImageFormat};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("Source file not found: {0}")]
    NotFound(String),
    #[error("No thumbnail for {0}: not an image or video")]
    Unsupported(String),
    #[error("Encoder `{encoder}` failed: {message}")]
    Encoder { encoder: String, message: String },
    #[error("Thumbnail worker failed: {0}")]
    Worker(String),
}

/// Name of the thumbnail file for a stored upload.
pub fn thumbnail_name(filename: &str) -> String {
    format!("{filename}.thumb.jpg")
}

/// The pixel work behind thumbnails. Swappable so tests can count calls and
/// concurrency without decoding or spawning anything.
pub trait ThumbnailBackend: Send + Sync {
    /// Shrink an image so its longer edge is at most `size`.
    fn image_thumbnail(&self, source: &Path, output: &Path, size: u32)
    -> Result<(), ThumbnailError>;

    /// Grab one frame of a video, scaled to `size` wide.
    fn video_frame(&self, source: &Path, output: &Path, size: u32) -> Result<(), ThumbnailError>;
}

/// Production backend: `image` crate for pictures, an encoder process for video.
pub struct NativeBackend {
    encoder: String,
}

impl NativeBackend {
    pub fn new(encoder: impl Into<String>) -> Self {
        Self {
            encoder: encoder.into(),
        }
    }

    fn run_encoder(&self, source: &Path, output: &Path, size: u32, offset: &str) -> Result<(), ThumbnailError> {
        let result = Command::new(&self.encoder)
            .args(["-y", "-loglevel", "error", "-ss", offset, "-i"])
            .arg(source)
            .args(["-frames:v", "1", "-vf"])
            .arg(format!("scale={size}:-2"))
            .arg(output)
            .output()
            .map_err(|e| ThumbnailError::Encoder {
                encoder: self.encoder.clone(),
                message: e.to_string(),
            })?;

        if !result.status.success() {
            return Err(ThumbnailError::Encoder {
                encoder: self.encoder.clone(),
                message: String::from_utf8_lossy(&result.stderr).trim().to_string(),
            });
        }
        Ok(())
    }
}

impl ThumbnailBackend for NativeBackend {
    fn image_thumbnail(&self, source: &Path, output: &Path, size: u32) -> Result<(), ThumbnailError> {
        let img = image::open(source)?;
        let small = img.thumbnail(size, size);
        // JPEG has no alpha channel
        DynamicImage::ImageRgb8(small.to_rgb8()).save_with_format(output, ImageFormat::Jpeg)?;
        Ok(())
    }

    fn video_frame(&self, source: &Path, output: &Path, size: u32) -> Result<(), ThumbnailError> {
        // Clips shorter than a second have no frame at 1s; fall back to the
        // first. Encoders either fail or write nothing in that case.
        let mut last_error = None;
        for offset in ["00:00:01", "00:00:00"] {
            match self.run_encoder(source, output, size, offset) {
                Ok(()) if output.exists() => return Ok(()),
                Ok(()) => {}
                Err(e) => {
                    debug!(offset, error = %e, "no frame at offset");
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ThumbnailError::Encoder {
            encoder: self.encoder.clone(),
            message: "no frame written".to_string(),
        }))
    }
}

/// Generates thumbnails for stored uploads under a concurrency cap.
pub struct ThumbnailService {
    backend: Arc<dyn ThumbnailBackend>,
    permits: Arc<Semaphore>,
    upload_dir: PathBuf,
    thumbnail_dir: PathBuf,
    size: u32,
}

impl ThumbnailService {
    pub fn new(config: &LockerConfig, backend: Arc<dyn ThumbnailBackend>) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(config.thumbnails.max_concurrent)),
            upload_dir: config.storage.upload_dir.clone(),
            thumbnail_dir: config.storage.thumbnail_dir.clone(),
            size: config.thumbnails.size,
        }
    }

    /// Service backed by [`NativeBackend`] with the configured encoder.
    pub fn native(config: &LockerConfig) -> Self {
        Self::new(
            config,
            Arc::new(NativeBackend::new(config.thumbnails.encoder.clone())),
        )
    }

    pub fn thumbnail_path(&self, filename: &str) -> PathBuf {
        self.thumbnail_dir.join(thumbnail_name(filename))
    }

    /// Make sure a thumbnail exists for `filename`; returns its file name
    /// inside the thumbnail directory.
    pub async fn generate(&self, filename: &str) -> Result<String, ThumbnailError> {
        let filename = storage::validate_filename(filename)?.to_string();
        let source = self.upload_dir.join(&filename);
        let output = self.thumbnail_path(&filename);

        let source_meta = match tokio::fs::metadata(&source).await {
            Ok(m) if m.is_file() => m,
            _ => return Err(ThumbnailError::NotFound(filename)),
        };

        let media_type = media::classify(&filename);
        if media_type == MediaType::Other {
            return Err(ThumbnailError::Unsupported(filename));
        }

        if is_fresh(&output, &source_meta).await {
            debug!(%filename, "thumbnail already up to date");
            return Ok(thumbnail_name(&filename));
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ThumbnailError::Worker(e.to_string()))?;

        tokio::fs::create_dir_all(&self.thumbnail_dir).await?;

        let backend = Arc::clone(&self.backend);
        let size = self.size;
        let job_output = output.clone();
        let result = tokio::task::spawn_blocking(move || match media_type {
            MediaType::Image => backend.image_thumbnail(&source, &job_output, size),
            _ => backend.video_frame(&source, &job_output, size),
        })
        .await
        .map_err(|e| ThumbnailError::Worker(e.to_string()))?;

        match result {
            Ok(()) => {
                info!(%filename, %media_type, "generated thumbnail");
                Ok(thumbnail_name(&filename))
            }
            Err(e) => {
                warn!(%filename, error = %e, "thumbnail generation failed");
                let _ = tokio::fs::remove_file(&output).await;
                Err(e)
            }
        }
    }
}

async fn is_fresh(thumbnail: &Path, source: &std::fs::Metadata) -> bool {
    let Ok(thumb_meta) = tokio::fs::metadata(thumbnail).await else {
        return false;
    };
    match (thumb_meta.modified(), source.modified()) {
        (Ok(t), Ok(s)) => t >= s,
        _ => false,
    }
}
