//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Listing (`ls`)
//!
//! ```text
//! 001 video   1.2 MB  2024-05-01 10:22  phone_clip.mp4
//! 002 image  340 KB   2024-04-30 18:03  phone_IMG_0042.JPG
//!
//! Page 1/2 · 2 of 3 files · more available
//! 3 files: 1 image, 1 video, 1 other
//! ```
//!
//! ## Gallery (`browse`)
//!
//! Items are numbered continuously as pages are merged in; clearing the view
//! restarts the numbering.
//!
//! ```text
//! 001 image  phone_IMG_0042.JPG
//! 002 video  phone_clip.mp4
//! -- page 1/3 · image filter · 42 files --
//! ```
//!
//! ## Upload
//!
//! ```text
//! uploaded   phone_IMG_0042.JPG
//! duplicate  phone_clip.mp4
//! skipped    phone_notes.pdf (already on server)
//! failed     big.mov: Server returned 413: ...
//! ```
//!
//! # Architecture
//!
//! Each output has a `format_*` function (returns `Vec<String>` or `String`)
//! for testability and, where the CLI needs one, a `print_*` wrapper that
//! writes to stdout. Format functions are pure.

use crate::client::{ClientError, FileMetadata, UploadReport};
use crate::filter::Counts;
use crate::gallery::{Effect, GalleryItem, GallerySink, PaginationInfo};
use crate::listing::ListingResponse;
use crate::media::FilterKind;
use std::path::Path;

// ============================================================================
// Shared helpers
// ============================================================================

fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Human-readable byte size with one decimal above a kilobyte.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if value >= 100.0 {
        format!("{value:.0} {}", UNITS[unit])
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

pub fn format_counts(counts: &Counts) -> String {
    format!(
        "{}: {}, {}, {}",
        plural(counts.all, "file"),
        plural(counts.images, "image"),
        plural(counts.videos, "video"),
        plural(counts.others, "other")
    )
}

// ============================================================================
// Listing
// ============================================================================

/// Format a listing response as printed by `ls`.
pub fn format_listing(response: &ListingResponse) -> Vec<String> {
    let mut lines = Vec::new();

    let error = match response {
        ListingResponse::Page(p) => p.error.as_ref(),
        ListingResponse::DuplicateCheck(d) => d.error.as_ref(),
    };
    if let Some(error) = error {
        lines.push(format!("error: {error}"));
        return lines;
    }

    for (i, file) in response.files().iter().enumerate() {
        lines.push(format!(
            "{} {:<6} {:>8}  {}  {}",
            format_index(i + 1),
            file.media_type,
            format_size(file.size),
            file.modified.format("%Y-%m-%d %H:%M"),
            file.filename
        ));
    }
    if response.files().is_empty() {
        lines.push("(no files)".to_string());
    }

    lines.push(String::new());
    match response {
        ListingResponse::Page(p) => {
            let mut footer = format!(
                "Page {}/{} · {} of {}",
                p.page,
                p.total_pages,
                p.files.len(),
                plural(p.total_files, "file")
            );
            if p.has_more {
                footer.push_str(" · more available");
            }
            lines.push(footer);
        }
        ListingResponse::DuplicateCheck(d) => {
            lines.push(format!("All {}", plural(d.total, "file")));
        }
    }
    lines.push(format_counts(&response.counts()));
    lines
}

pub fn print_listing(response: &ListingResponse) {
    for line in format_listing(response) {
        println!("{}", line);
    }
}

// ============================================================================
// Gallery
// ============================================================================

fn format_item(index: usize, item: &GalleryItem) -> String {
    let mut line = format!("{} {:<6} {}", format_index(index), item.media_type, item.filename);
    if let Some(size) = item.size {
        line.push_str(&format!(" ({})", format_size(size)));
    }
    line
}

fn filter_label(kind: FilterKind) -> String {
    match kind {
        FilterKind::All => "all files".to_string(),
        other => format!("{other} filter"),
    }
}

pub fn format_pagination(info: &PaginationInfo) -> String {
    let mut line = format!(
        "-- page {}/{} · {} · {}",
        info.current_page,
        info.total_pages.max(1),
        filter_label(info.filter),
        plural(info.total_files, "file")
    );
    if info.has_more {
        line.push_str(" · 'n' for more");
    }
    line.push_str(" --");
    line
}

/// Renders gallery effects as terminal lines.
///
/// Scroll restoration has no terminal equivalent and is ignored.
#[derive(Debug, Default)]
pub struct TerminalSink {
    shown: usize,
    lines: Vec<String>,
}

impl TerminalSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines produced since the last call.
    pub fn take_lines(&mut self) -> Vec<String> {
        std::mem::take(&mut self.lines)
    }

    pub fn flush(&mut self) {
        for line in self.take_lines() {
            println!("{}", line);
        }
    }
}

impl GallerySink for TerminalSink {
    fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::ClearView => self.shown = 0,
            Effect::AppendItems(items) => {
                for item in items {
                    self.shown += 1;
                    self.lines.push(format_item(self.shown, item));
                }
            }
            Effect::ShowEmpty(kind) => self.lines.push(match kind {
                FilterKind::All => "No files uploaded yet.".to_string(),
                other => format!("No {other} files."),
            }),
            Effect::ShowRetry { replace, message } => {
                if *replace {
                    self.shown = 0;
                }
                self.lines
                    .push(format!("Failed to load files: {message} ('r' to retry)"));
            }
            Effect::Pagination(info) => {
                self.lines.push(format_pagination(info));
                self.lines.push(format_counts(&info.counts));
            }
            Effect::RestoreScroll(_) => {}
        }
    }
}

// ============================================================================
// Upload
// ============================================================================

pub fn format_upload(path: &Path, result: &Result<UploadReport, ClientError>) -> String {
    match result {
        Ok(UploadReport::Uploaded(name)) => format!("uploaded   {name}"),
        Ok(UploadReport::Duplicate(name)) => format!("duplicate  {name}"),
        Ok(UploadReport::Skipped(name)) => format!("skipped    {name} (already on server)"),
        Err(e) => format!("failed     {}: {e}", path.display()),
    }
}

/// One line for the details view.
pub fn format_metadata(filename: &str, result: &Result<FileMetadata, ClientError>) -> String {
    match result {
        Ok(meta) => {
            let size = meta
                .content_length
                .map(format_size)
                .unwrap_or_else(|| "unknown size".to_string());
            match &meta.content_type {
                Some(kind) => format!("{filename}: {size}, {kind}"),
                None => format!("{filename}: {size}"),
            }
        }
        Err(e) => format!("{filename}: {e}"),
    }
}
