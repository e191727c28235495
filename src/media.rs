//! Media type classification.
//!
//! Every stored file is one of three kinds, decided purely by its filename
//! extension through a static lookup table:
//!
//! | Kind | Extensions |
//! |------|------------|
//! | image | `jpg`, `jpeg`, `png`, `gif`, `webp` |
//! | video | `mp4`, `webm`, `mov` |
//! | other | everything else, including no extension |
//!
//! Matching is case-insensitive (`a.JPG` is an image). An unknown extension is
//! never an error: it classifies as [`MediaType::Other`].
//!
//! [`FilterKind`] is the listing-side view of the same table: the set of
//! entries a gallery request asks for. Parsing a filter is lenient so that a
//! stale bookmark or a legacy query parameter still produces a usable listing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// Type of a stored file, derived from its extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Other,
}

impl MediaType {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Other => "other",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Classify a filename by its extension.
pub fn classify(filename: &str) -> MediaType {
    let ext = Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        MediaType::Image
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        MediaType::Video
    } else {
        MediaType::Other
    }
}

/// Which subset of the catalog a listing request wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    All,
    Image,
    Video,
    Other,
}

impl FilterKind {
    /// Parse a filter parameter. Unknown values fall back to `All`.
    ///
    /// Plural forms (`images`, `videos`, `others`) are accepted since older
    /// clients used the count names as filter names.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image" | "images" => FilterKind::Image,
            "video" | "videos" => FilterKind::Video,
            "other" | "others" => FilterKind::Other,
            _ => FilterKind::All,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::All => "all",
            FilterKind::Image => "image",
            FilterKind::Video => "video",
            FilterKind::Other => "other",
        }
    }

    /// Whether a file of the given type belongs to this filter.
    pub fn matches(self, media_type: MediaType) -> bool {
        match self {
            FilterKind::All => true,
            FilterKind::Image => media_type == MediaType::Image,
            FilterKind::Video => media_type == MediaType::Video,
            FilterKind::Other => media_type == MediaType::Other,
        }
    }

    /// True for the type-specific filters (everything but `All`).
    pub fn is_type_filter(self) -> bool {
        self != FilterKind::All
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
