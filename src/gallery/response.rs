//! Listing response normalization.
//!
//! Servers have answered `/uploads` in more than one shape over time:
//!
//! ```text
//! ["a.jpg", "b.mp4"]                                  legacy bare array
//! {files: ["a.jpg"], hasMore: true}                   partial object
//! {files: [{filename, size, modified, type}],         current object
//!  counts, hasMore, page, totalFiles, totalPages}
//! ```
//!
//! Everything downstream sees only [`NormalizedListing`]. Missing fields take
//! fixed defaults: zero counts, `hasMore = false`, `totalPages = 1`, and
//! `totalFiles` equal to the number of files received.

use crate::filter::Counts;
use crate::media::{self, MediaType};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ResponseError {
    #[error("Unrecognized listing response: {0}")]
    Shape(#[from] serde_json::Error),
}

/// One file as the gallery renders it.
///
/// `size` and `modified` are absent for legacy responses that only name the
/// file.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryItem {
    pub filename: String,
    pub size: Option<u64>,
    pub modified: Option<String>,
    pub media_type: MediaType,
}

impl GalleryItem {
    pub fn named(filename: impl Into<String>) -> Self {
        let filename = filename.into();
        Self {
            media_type: media::classify(&filename),
            filename,
            size: None,
            modified: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedListing {
    pub files: Vec<GalleryItem>,
    pub counts: Counts,
    pub has_more: bool,
    pub page: Option<usize>,
    pub total_files: usize,
    pub total_pages: usize,
    pub error: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawListing {
    Legacy(Vec<RawFile>),
    Structured(RawStructured),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawFile {
    Name(String),
    Entry(RawEntry),
}

#[derive(Deserialize)]
struct RawEntry {
    #[serde(alias = "name")]
    filename: String,
    size: Option<u64>,
    modified: Option<Value>,
    #[serde(rename = "type")]
    media_type: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStructured {
    #[serde(default)]
    files: Option<Vec<RawFile>>,
    #[serde(default)]
    counts: Option<RawCounts>,
    #[serde(default)]
    has_more: Option<bool>,
    #[serde(default)]
    page: Option<usize>,
    #[serde(default)]
    total_files: Option<usize>,
    #[serde(default)]
    total: Option<usize>,
    #[serde(default)]
    total_pages: Option<usize>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize, Default)]
struct RawCounts {
    #[serde(default)]
    images: Option<usize>,
    #[serde(default)]
    videos: Option<usize>,
    #[serde(default)]
    others: Option<usize>,
}

impl From<RawFile> for GalleryItem {
    fn from(raw: RawFile) -> Self {
        match raw {
            RawFile::Name(name) => GalleryItem::named(name),
            RawFile::Entry(entry) => {
                // An unknown server-side type label falls back to the extension.
                let media_type = match entry.media_type.as_deref() {
                    Some("image") => MediaType::Image,
                    Some("video") => MediaType::Video,
                    Some("other") => MediaType::Other,
                    _ => media::classify(&entry.filename),
                };
                GalleryItem {
                    filename: entry.filename,
                    size: entry.size,
                    modified: entry.modified.and_then(|m| match m {
                        Value::String(s) => Some(s),
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    }),
                    media_type,
                }
            }
        }
    }
}

/// Convert any known response shape into a [`NormalizedListing`].
pub fn normalize(body: &Value) -> Result<NormalizedListing, ResponseError> {
    let raw = RawListing::deserialize(body)?;
    let listing = match raw {
        RawListing::Legacy(files) => {
            let files: Vec<GalleryItem> = files.into_iter().map(GalleryItem::from).collect();
            NormalizedListing {
                total_files: files.len(),
                files,
                counts: Counts::default(),
                has_more: false,
                page: None,
                total_pages: 1,
                error: None,
            }
        }
        RawListing::Structured(s) => {
            let files: Vec<GalleryItem> = s
                .files
                .unwrap_or_default()
                .into_iter()
                .map(GalleryItem::from)
                .collect();
            let counts = s.counts.unwrap_or_default();
            NormalizedListing {
                total_files: s.total_files.or(s.total).unwrap_or(files.len()),
                files,
                counts: Counts::new(
                    counts.images.unwrap_or(0),
                    counts.videos.unwrap_or(0),
                    counts.others.unwrap_or(0),
                ),
                has_more: s.has_more.unwrap_or(false),
                page: s.page,
                total_pages: s.total_pages.unwrap_or(1),
                error: s.error,
            }
        }
    };
    Ok(listing)
}
