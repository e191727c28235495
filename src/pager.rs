//! Ordering and page slicing over a [`FilterView`].
//!
//! ## Order
//!
//! Directory scans come back in whatever order the filesystem likes, so the
//! pager imposes one before slicing:
//!
//! 1. `modified` descending (newest upload first)
//! 2. `filename` ascending when two files share a modification time
//!
//! The second key matters: without it two requests for consecutive pages
//! can see equal-mtime files in different orders and show one twice while
//! skipping another.
//!
//! ## Pages
//!
//! Pages are 1-indexed. `page < 1` is treated as 1 and `page_size < 1` as 1.
//! A page past the end is not an error: it has no items, `has_more = false`
//! and the real `total_items`/`total_pages`, which is how callers learn they
//! have reached the end.
//!
//! ```text
//! total_pages = ceil(total_items / page_size)
//! has_more    = page * page_size < total_items
//! ```

use crate::catalog::FileEntry;
use crate::filter::FilterView;

/// One page of a filter view. Recomputed on every request, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<FileEntry>,
    pub page_number: usize,
    pub page_size: usize,
    pub total_items: usize,
    pub total_pages: usize,
    pub has_more: bool,
}

/// Sort entries into listing order: newest first, then filename.
pub fn sort_entries(entries: &mut [&FileEntry]) {
    entries.sort_by(|a, b| {
        b.modified
            .cmp(&a.modified)
            .then_with(|| a.filename.cmp(&b.filename))
    });
}

/// Slice a view into the requested page.
pub fn paginate(view: &FilterView<'_>, page: usize, page_size: usize) -> Page {
    let page_number = page.max(1);
    let page_size = page_size.max(1);
    let total_items = view.len();
    let total_pages = total_items.div_ceil(page_size);

    let mut ordered = view.entries.clone();
    sort_entries(&mut ordered);

    let start = (page_number - 1).saturating_mul(page_size);
    let items: Vec<FileEntry> = ordered
        .into_iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect();

    Page {
        items,
        page_number,
        page_size,
        total_items,
        total_pages,
        has_more: page_number.saturating_mul(page_size) < total_items,
    }
}

/// Every entry of the view in listing order, ignoring pagination.
///
/// Used for duplicate checks: a client building a membership set from a
/// single page would miss collisions on every other page.
pub fn full_listing(view: &FilterView<'_>) -> Vec<FileEntry> {
    let mut ordered = view.entries.clone();
    sort_entries(&mut ordered);
    ordered.into_iter().cloned().collect()
}
