//! # Media Locker
//!
//! A self-hosted media locker for a local network. Phones and laptops upload
//! photos, videos and documents to one machine; any browser or terminal on
//! the LAN pages through them with type filters.
//!
//! # Architecture: Scan, Filter, Page
//!
//! Every listing request is answered from a fresh look at the upload
//! directory. There is no index to keep in sync with uploads and deletes:
//!
//! ```text
//! uploads/  ──scan──►  Catalog  ──filter──►  FilterView  ──paginate──►  Page
//!                      (all files,           (one type or all,          (newest first,
//!                       size + mtime)         plus Counts)               one slice)
//! ```
//!
//! The gallery on the other end never assumes two pages came from the same
//! directory state. It merges pages by filename so an upload landing between
//! page 1 and page 2 shifts items without duplicating them on screen.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`media`] | Extension table, `MediaType` classification, `FilterKind` parsing |
//! | [`catalog`] | Scans the upload directory into a `Catalog` of `FileEntry` values |
//! | [`filter`] | Per-type `Counts` and filtered views |
//! | [`pager`] | Newest-first ordering and page slicing |
//! | [`listing`] | `/uploads` query normalization and response shapes |
//! | [`storage`] | Upload naming, duplicate detection, delete |
//! | [`thumbnail`] | Bounded thumbnail generation (in-process images, encoder for video) |
//! | [`server`] | axum router and handlers |
//! | [`gallery`] | Client-side gallery state machine |
//! | [`client`] | HTTP client driving the gallery and uploads |
//! | [`config`] | `locker.toml` loading, merging and validation |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Filesystem as the Only Store
//!
//! A stored file's name, size and modification time are its whole record.
//! Deleting a file from a shell is as good as deleting it through the API,
//! and copying the upload directory is a complete backup.
//!
//! ## Names Carry the Device
//!
//! Uploads are stored as `{deviceId}_{originalName}`. Two phones can both
//! upload `IMG_0001.JPG` without colliding, while the same phone re-sending
//! a file is detected as a duplicate by an exact name match.
//!
//! ## Newest First, Then by Name
//!
//! Pages are ordered by modification time, newest first. Files sharing a
//! timestamp are ordered by filename so that the same directory state always
//! pages the same way.

pub mod catalog;
pub mod client;
pub mod config;
pub mod filter;
pub mod gallery;
pub mod listing;
pub mod media;
pub mod output;
pub mod pager;
pub mod server;
pub mod storage;
pub mod thumbnail;

#[cfg(test)]
pub(crate) mod test_helpers;
