//! Client-side gallery: paging through a remote listing.
//!
//! The gallery never assumes the listing is stable between requests. Files
//! arrive and disappear while a user pages, so page 2 may repeat an item
//! already shown from page 1. Items are merged by filename: whatever is
//! already on screen is skipped.
//!
//! | Module | Role |
//! |--------|------|
//! | [`state`] | `GalleryState` load cycle, effects and sinks |
//! | [`response`] | Normalizes every listing shape the server has produced |
//! | [`persist`] | Filter/page persistence and URL rehydration |
//! | [`queue`] | Modal deferral queue and the metadata preload limiter |
//! | [`session`] | Interactive browse commands driving all of the above |

pub mod persist;
pub mod queue;
pub mod response;
pub mod session;
pub mod state;

pub use persist::PersistedView;
pub use queue::{MetadataPreloader, ModalGate};
pub use response::{GalleryItem, NormalizedListing, ResponseError};
pub use session::{Action, BrowseCommand, BrowseSession, Task};
pub use state::{
    Effect, FetchRequest, GallerySink, GalleryState, LoadState, MemorySink, PaginationInfo,
    ScrollRestore, Viewport,
};
