//! The gallery's load cycle.
//!
//! ```text
//!            request_page / retry / on_deleted
//!   Idle ─────────────────────────────────────► Loading
//!   Rendered ◄──────────── complete ─────────────┤
//!   Errored  ◄──────────── fail ─────────────────┘
//! ```
//!
//! Only one fetch is ever in flight. Any request made while `Loading` is
//! dropped and returns `None`; the caller does nothing. Transitions never
//! touch a display directly: they return [`Effect`]s which a [`GallerySink`]
//! applies, so the whole machine runs in tests without a transport or a
//! terminal.

use super::persist::PersistedView;
use super::response::{self, GalleryItem};
use crate::filter::Counts;
use crate::media::FilterKind;
use std::collections::HashSet;
use tracing::{debug, warn};

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Scroll position at the moment a load was requested.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub scroll_top: f64,
    pub document_height: f64,
}

impl Viewport {
    /// Position as a fraction of the document height, in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        if self.document_height > 0.0 {
            (self.scroll_top / self.document_height).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }
}

/// What the transport should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub filter: FilterKind,
    pub page: usize,
    pub limit: usize,
}

impl FetchRequest {
    pub fn path_and_query(&self) -> String {
        format!(
            "/uploads?filter={}&page={}&limit={}",
            self.filter, self.page, self.limit
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading(FetchRequest),
    Rendered,
    Errored(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollRestore {
    /// Scroll to this fraction of the new document height.
    Fraction(f64),
    Top,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PaginationInfo {
    pub filter: FilterKind,
    pub current_page: usize,
    pub total_pages: usize,
    pub total_files: usize,
    pub has_more: bool,
    pub counts: Counts,
}

/// A display change produced by a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    ClearView,
    AppendItems(Vec<GalleryItem>),
    ShowEmpty(FilterKind),
    /// `replace` swaps the whole view for the retry affordance; otherwise it
    /// is appended below the items already shown.
    ShowRetry { replace: bool, message: String },
    Pagination(PaginationInfo),
    RestoreScroll(ScrollRestore),
}

/// Applies effects to some display.
pub trait GallerySink {
    fn apply(&mut self, effect: &Effect);

    fn apply_all(&mut self, effects: &[Effect]) {
        for effect in effects {
            self.apply(effect);
        }
    }
}

/// A sink that just records the resulting view.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySink {
    pub items: Vec<GalleryItem>,
    pub empty: Option<FilterKind>,
    pub retry: Option<(bool, String)>,
    pub pagination: Option<PaginationInfo>,
    pub scroll: Option<ScrollRestore>,
}

impl MemorySink {
    pub fn filenames(&self) -> Vec<&str> {
        self.items.iter().map(|i| i.filename.as_str()).collect()
    }
}

impl GallerySink for MemorySink {
    fn apply(&mut self, effect: &Effect) {
        match effect {
            Effect::ClearView => {
                self.items.clear();
                self.empty = None;
                self.retry = None;
            }
            Effect::AppendItems(items) => {
                self.items.extend(items.iter().cloned());
                self.empty = None;
                self.retry = None;
            }
            Effect::ShowEmpty(kind) => self.empty = Some(*kind),
            Effect::ShowRetry { replace, message } => {
                if *replace {
                    self.items.clear();
                }
                self.retry = Some((*replace, message.clone()));
            }
            Effect::Pagination(info) => self.pagination = Some(info.clone()),
            Effect::RestoreScroll(scroll) => self.scroll = Some(*scroll),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PendingLoad {
    request: FetchRequest,
    reset: bool,
    anchor: Option<f64>,
}

/// Client-side gallery state.
#[derive(Debug, Clone)]
pub struct GalleryState {
    filter: FilterKind,
    page: usize,
    page_size: usize,
    rendered: HashSet<String>,
    total_pages: usize,
    total_files: usize,
    has_more: bool,
    counts: Counts,
    load: LoadState,
    pending: Option<PendingLoad>,
    last: Option<PendingLoad>,
}

impl Default for GalleryState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl GalleryState {
    pub fn new(page_size: usize) -> Self {
        Self {
            filter: FilterKind::All,
            page: 1,
            page_size: page_size.max(1),
            rendered: HashSet::new(),
            total_pages: 0,
            total_files: 0,
            has_more: false,
            counts: Counts::default(),
            load: LoadState::Idle,
            pending: None,
            last: None,
        }
    }

    /// Start from a persisted filter and page. Nothing is rendered yet.
    pub fn from_view(view: &PersistedView, page_size: usize) -> Self {
        Self {
            filter: view.filter,
            page: view.page.max(1),
            ..Self::new(page_size)
        }
    }

    pub fn view(&self) -> PersistedView {
        PersistedView {
            filter: self.filter,
            page: self.page,
        }
    }

    pub fn filter(&self) -> FilterKind {
        self.filter
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn counts(&self) -> Counts {
        self.counts
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.load, LoadState::Loading(_))
    }

    pub fn is_rendered(&self, filename: &str) -> bool {
        self.rendered.contains(filename)
    }

    pub fn rendered_len(&self) -> usize {
        self.rendered.len()
    }

    /// Ask for a page.
    ///
    /// Switching filter or asking for page 1 starts a fresh view: the display
    /// and the set of rendered filenames are cleared when the response
    /// arrives. Any other page is merged into what is shown. The current
    /// filter and page only move once the load has settled, so a failed
    /// page is requested again rather than skipped.
    pub fn request_page(
        &mut self,
        filter: FilterKind,
        page: usize,
        preserve_scroll: bool,
        viewport: Viewport,
    ) -> Option<FetchRequest> {
        if self.is_loading() {
            debug!(%filter, page, "load in flight, request dropped");
            return None;
        }

        let page = page.max(1);
        let reset = page == 1 || filter != self.filter;

        self.begin(PendingLoad {
            request: FetchRequest {
                filter,
                page,
                limit: self.page_size,
            },
            reset,
            anchor: preserve_scroll.then(|| viewport.fraction()),
        })
    }

    /// Load the page after the current one, keeping the scroll position.
    pub fn next_page(&mut self, viewport: Viewport) -> Option<FetchRequest> {
        if !self.has_more {
            return None;
        }
        self.request_page(self.filter, self.page + 1, true, viewport)
    }

    /// Switch to another filter, starting at page 1.
    pub fn set_filter(&mut self, filter: FilterKind) -> Option<FetchRequest> {
        self.request_page(filter, 1, false, Viewport::default())
    }

    /// Re-issue the most recent request.
    pub fn retry(&mut self) -> Option<FetchRequest> {
        if self.is_loading() {
            return None;
        }
        let last = self.last.clone()?;
        self.begin(last)
    }

    /// A file was deleted: reload the current filter and page in place.
    ///
    /// The reload replaces the view rather than patching out one item, so
    /// items shifting in from later pages show up and counts stay exact.
    pub fn on_deleted(&mut self, filename: &str, viewport: Viewport) -> Option<FetchRequest> {
        if self.is_loading() {
            debug!(%filename, "load in flight, reload after delete dropped");
            return None;
        }
        debug!(%filename, "reloading after delete");
        self.begin(PendingLoad {
            request: FetchRequest {
                filter: self.filter,
                page: self.page,
                limit: self.page_size,
            },
            reset: true,
            anchor: Some(viewport.fraction()),
        })
    }

    fn begin(&mut self, pending: PendingLoad) -> Option<FetchRequest> {
        let request = pending.request.clone();
        self.load = LoadState::Loading(request.clone());
        self.last = Some(pending.clone());
        self.pending = Some(pending);
        Some(request)
    }

    /// Apply a response body.
    ///
    /// A body carrying an `error` field, or one in no known shape, is handled
    /// exactly like a transport failure.
    pub fn complete(&mut self, body: &serde_json::Value) -> Vec<Effect> {
        if !self.is_loading() {
            debug!("response with no load in flight ignored");
            return Vec::new();
        }
        let listing = match response::normalize(body) {
            Ok(listing) => listing,
            Err(e) => return self.fail(e.to_string()),
        };
        if let Some(error) = listing.error {
            return self.fail(error);
        }
        let Some(pending) = self.pending.take() else {
            return Vec::new();
        };

        self.commit(&pending);
        let mut effects = Vec::new();
        if pending.reset {
            self.rendered.clear();
            effects.push(Effect::ClearView);
        }

        let fresh: Vec<GalleryItem> = listing
            .files
            .into_iter()
            .filter(|item| self.rendered.insert(item.filename.clone()))
            .collect();

        self.counts = listing.counts;
        self.total_files = listing.total_files;
        self.total_pages = listing.total_pages;
        self.has_more = listing.has_more;

        if self.rendered.is_empty() {
            effects.push(Effect::ShowEmpty(self.filter));
        } else if !fresh.is_empty() {
            effects.push(Effect::AppendItems(fresh));
        }
        effects.push(Effect::Pagination(self.pagination()));
        effects.push(Effect::RestoreScroll(match pending.anchor {
            Some(fraction) => ScrollRestore::Fraction(fraction),
            None => ScrollRestore::Top,
        }));

        self.load = LoadState::Rendered;
        effects
    }

    /// Apply a transport or server failure.
    ///
    /// A later page never blanks what is already shown: the retry affordance
    /// is appended below the items and the current page stays where it was.
    /// A fresh view under a type filter shows the category as empty; under
    /// `all` the view is replaced by the retry affordance.
    pub fn fail(&mut self, message: impl Into<String>) -> Vec<Effect> {
        let message = message.into();
        let Some(pending) = self.pending.take() else {
            debug!(%message, "failure with no load in flight ignored");
            return Vec::new();
        };
        let request = &pending.request;
        warn!(filter = %request.filter, page = request.page, %message, "gallery load failed");

        if !pending.reset {
            self.load = LoadState::Errored(message.clone());
            return vec![Effect::ShowRetry {
                replace: false,
                message,
            }];
        }

        self.commit(&pending);
        self.rendered.clear();
        if self.filter.is_type_filter() {
            self.total_files = 0;
            self.total_pages = 0;
            self.has_more = false;
            self.load = LoadState::Rendered;
            return vec![
                Effect::ClearView,
                Effect::ShowEmpty(self.filter),
                Effect::Pagination(self.pagination()),
            ];
        }

        self.load = LoadState::Errored(message.clone());
        vec![
            Effect::ClearView,
            Effect::ShowRetry {
                replace: true,
                message,
            },
        ]
    }

    fn commit(&mut self, pending: &PendingLoad) {
        self.filter = pending.request.filter;
        self.page = pending.request.page;
    }

    fn pagination(&self) -> PaginationInfo {
        PaginationInfo {
            filter: self.filter,
            current_page: self.page,
            total_pages: self.total_pages,
            total_files: self.total_files,
            has_more: self.has_more,
            counts: self.counts,
        }
    }
}
