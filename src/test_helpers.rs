//! Shared fixtures for unit tests.

use crate::catalog::{Catalog, FileEntry};
use chrono::{DateTime, TimeZone, Utc};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A UTC timestamp `secs` seconds after the epoch.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().unwrap()
}

/// Write `bytes` to `dir/name` and set its mtime to `mtime_secs`.
pub fn write_file(dir: &Path, name: &str, bytes: &[u8], mtime_secs: i64) {
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    let mtime = UNIX_EPOCH + Duration::from_secs(mtime_secs as u64);
    set_mtime(&path, mtime);
}

pub fn set_mtime(path: &Path, mtime: SystemTime) {
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(mtime)
        .unwrap();
}

/// An in-memory catalog. Each entry's size is the length of its name.
pub fn catalog_of(entries: &[(&str, i64)]) -> Catalog {
    Catalog::from_entries(
        entries
            .iter()
            .map(|(name, secs)| FileEntry::new(*name, name.len() as u64, ts(*secs)))
            .collect(),
    )
}

/// Find an entry by filename, panicking with the available names.
pub fn find_entry<'a>(catalog: &'a Catalog, name: &str) -> &'a FileEntry {
    catalog
        .entries()
        .iter()
        .find(|e| e.filename == name)
        .unwrap_or_else(|| panic!("entry '{}' not found in {:?}", name, filenames(catalog)))
}

/// Sorted filenames of a catalog.
pub fn filenames(catalog: &Catalog) -> Vec<&str> {
    let mut names: Vec<&str> = catalog.entries().iter().map(|e| e.filename.as_str()).collect();
    names.sort();
    names
}
