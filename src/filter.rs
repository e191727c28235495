//! Catalog partitioning and per-type counts.
//!
//! A listing request narrows the catalog to one [`FilterView`] and reports
//! [`Counts`] for the whole catalog so the gallery can label its filter tabs.
//! `Counts::all` is never stored independently: it is always the sum of the
//! three per-type counts, so it cannot drift from them.

use crate::catalog::{Catalog, FileEntry};
use crate::media::{FilterKind, MediaType};
use serde::{Deserialize, Serialize};

/// Per-type file counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    pub images: usize,
    pub videos: usize,
    pub others: usize,
    pub all: usize,
}

impl Counts {
    /// Build counts from the per-type values, deriving `all`.
    pub fn new(images: usize, videos: usize, others: usize) -> Self {
        Self {
            images,
            videos,
            others,
            all: images + videos + others,
        }
    }

    /// Recompute `all` from the per-type values.
    ///
    /// Used on counts that arrive from elsewhere (e.g. a server response)
    /// whose `all` field cannot be trusted.
    pub fn normalized(self) -> Self {
        Self::new(self.images, self.videos, self.others)
    }

    /// The count matching a filter.
    pub fn for_filter(&self, kind: FilterKind) -> usize {
        match kind {
            FilterKind::All => self.all,
            FilterKind::Image => self.images,
            FilterKind::Video => self.videos,
            FilterKind::Other => self.others,
        }
    }
}

/// Count the catalog by type.
pub fn count(catalog: &Catalog) -> Counts {
    let (mut images, mut videos, mut others) = (0, 0, 0);
    for entry in catalog.entries() {
        match entry.media_type {
            MediaType::Image => images += 1,
            MediaType::Video => videos += 1,
            MediaType::Other => others += 1,
        }
    }
    Counts::new(images, videos, others)
}

/// The subset of a catalog matching one filter.
#[derive(Debug, Clone)]
pub struct FilterView<'a> {
    pub kind: FilterKind,
    pub entries: Vec<&'a FileEntry>,
}

impl FilterView<'_> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Narrow a catalog to the entries matching `kind`.
pub fn filter(catalog: &Catalog, kind: FilterKind) -> FilterView<'_> {
    let entries = catalog
        .entries()
        .iter()
        .filter(|e| kind.matches(e.media_type))
        .collect();
    FilterView { kind, entries }
}
