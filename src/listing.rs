//! The listing endpoint's contract: query normalization and response shapes.
//!
//! ```text
//! GET /uploads?filter=image&page=2&limit=20
//! → {files, counts, hasMore, page, totalFiles, totalPages}
//!
//! GET /uploads?filter=all&checkDuplicates=true
//! → {files, counts, total}
//! ```
//!
//! Query parameters are parsed leniently. A gallery that sends a stale or
//! malformed parameter still gets a listing: unknown filters mean `all`,
//! unparseable pages mean page 1, unparseable limits mean the configured
//! default.
//!
//! When the upload directory cannot be read the response keeps the success
//! shape (empty `files`, zero counts) and adds an `error` message, so clients
//! never need a separate parser for failures.

use crate::catalog::{self, Catalog, FileEntry, ScanError};
use crate::config::ListingConfig;
use crate::filter::{self, Counts};
use crate::media::FilterKind;
use crate::pager;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Query string as received. Every field is optional text so that a bad
/// value degrades to a default instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawListingQuery {
    pub filter: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
    #[serde(rename = "checkDuplicates")]
    pub check_duplicates: Option<String>,
}

/// Normalized listing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingQuery {
    pub filter: FilterKind,
    pub page: usize,
    pub limit: usize,
    pub check_duplicates: bool,
}

impl ListingQuery {
    pub fn from_raw(raw: &RawListingQuery, settings: &ListingConfig) -> Self {
        let page = raw
            .page
            .as_deref()
            .and_then(parse_positive)
            .unwrap_or(1);
        let limit = settings.effective_page_size(raw.limit.as_deref().and_then(parse_positive));
        let check_duplicates = raw
            .check_duplicates
            .as_deref()
            .map(parse_flag)
            .unwrap_or(false);

        Self {
            filter: raw
                .filter
                .as_deref()
                .map(FilterKind::parse)
                .unwrap_or_default(),
            page,
            limit,
            check_duplicates,
        }
    }

    /// A plain page request.
    pub fn page(filter: FilterKind, page: usize, limit: usize) -> Self {
        Self {
            filter,
            page,
            limit,
            check_duplicates: false,
        }
    }
}

/// Parse a 1-based integer. Zero and negatives clamp to 1; junk yields `None`.
fn parse_positive(raw: &str) -> Option<usize> {
    let n: i64 = raw.trim().parse().ok()?;
    Some(n.max(1) as usize)
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// A paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResponse {
    pub files: Vec<FileEntry>,
    pub counts: Counts,
    pub has_more: bool,
    pub page: usize,
    pub total_files: usize,
    pub total_pages: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The full filter view, for client-side duplicate detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateCheckResponse {
    pub files: Vec<FileEntry>,
    pub counts: Counts,
    pub total: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ListingResponse {
    Page(PageResponse),
    DuplicateCheck(DuplicateCheckResponse),
}

impl ListingResponse {
    pub fn files(&self) -> &[FileEntry] {
        match self {
            ListingResponse::Page(p) => &p.files,
            ListingResponse::DuplicateCheck(d) => &d.files,
        }
    }

    pub fn counts(&self) -> Counts {
        match self {
            ListingResponse::Page(p) => p.counts,
            ListingResponse::DuplicateCheck(d) => d.counts,
        }
    }

    pub fn is_error(&self) -> bool {
        match self {
            ListingResponse::Page(p) => p.error.is_some(),
            ListingResponse::DuplicateCheck(d) => d.error.is_some(),
        }
    }
}

/// Answer a listing query against an already-scanned catalog.
pub fn build_listing(catalog: &Catalog, query: &ListingQuery) -> ListingResponse {
    let counts = filter::count(catalog);
    let view = filter::filter(catalog, query.filter);

    if query.check_duplicates {
        let files = pager::full_listing(&view);
        return ListingResponse::DuplicateCheck(DuplicateCheckResponse {
            total: files.len(),
            files,
            counts,
            error: None,
        });
    }

    let page = pager::paginate(&view, query.page, query.limit);
    ListingResponse::Page(PageResponse {
        files: page.items,
        counts,
        has_more: page.has_more,
        page: page.page_number,
        total_files: page.total_items,
        total_pages: page.total_pages,
        error: None,
    })
}

/// Scan `dir` and answer the query.
pub fn list_directory(dir: &Path, query: &ListingQuery) -> Result<ListingResponse, ScanError> {
    let catalog = catalog::scan(dir)?;
    Ok(build_listing(&catalog, query))
}

/// A failure response with the success shape: no files, zero counts.
pub fn error_listing(query: &ListingQuery, message: impl Into<String>) -> ListingResponse {
    let error = Some(message.into());
    if query.check_duplicates {
        ListingResponse::DuplicateCheck(DuplicateCheckResponse {
            files: Vec::new(),
            counts: Counts::default(),
            total: 0,
            error,
        })
    } else {
        ListingResponse::Page(PageResponse {
            files: Vec::new(),
            counts: Counts::default(),
            has_more: false,
            page: query.page.max(1),
            total_files: 0,
            total_pages: 0,
            error,
        })
    }
}
