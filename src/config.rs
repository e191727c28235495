//! Server configuration.
//!
//! Handles loading, validating and merging `locker.toml`. Stock defaults are
//! serialized to a TOML table and the user's file is merged on top, so a
//! config file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [server]
//! bind = "0.0.0.0"          # Listen address (LAN-wide by default)
//! port = 3000
//! max_upload_mb = 4096      # Largest accepted upload
//!
//! [storage]
//! upload_dir = "uploads"                 # Where uploaded files live
//! thumbnail_dir = "uploads/thumbnails"   # Generated thumbnails
//!
//! [listing]
//! default_page_size = 20    # Used when a request has no usable `limit`
//! max_page_size = 200       # Upper bound on `limit`
//!
//! [thumbnails]
//! size = 320                # Longer edge of generated thumbnails, in pixels
//! max_concurrent = 2        # Thumbnail jobs allowed to run at once
//! encoder = "ffmpeg"        # Executable used to grab video frames
//! ```
//!
//! Relative storage paths are resolved against the directory the config
//! file was loaded from. Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the config file looked up in the config directory.
pub const CONFIG_FILENAME: &str = "locker.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `locker.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockerConfig {
    /// Listen address and port.
    pub server: ServerConfig,
    /// Upload and thumbnail directories.
    pub storage: StorageConfig,
    /// Page size defaults and limits for the listing endpoint.
    pub listing: ListingConfig,
    /// Thumbnail generation settings.
    pub thumbnails: ThumbnailsConfig,
}

impl LockerConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listing.default_page_size == 0 {
            return Err(ConfigError::Validation(
                "listing.default_page_size must be at least 1".into(),
            ));
        }
        if self.listing.max_page_size < self.listing.default_page_size {
            return Err(ConfigError::Validation(
                "listing.max_page_size must be >= listing.default_page_size".into(),
            ));
        }
        if self.server.max_upload_mb == 0 {
            return Err(ConfigError::Validation(
                "server.max_upload_mb must be at least 1".into(),
            ));
        }
        if self.thumbnails.max_concurrent == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.max_concurrent must be at least 1".into(),
            ));
        }
        if self.thumbnails.size == 0 {
            return Err(ConfigError::Validation(
                "thumbnails.size must be non-zero".into(),
            ));
        }
        if self.thumbnails.encoder.trim().is_empty() {
            return Err(ConfigError::Validation(
                "thumbnails.encoder must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Resolve relative storage paths against `base`.
    pub fn resolve_paths(mut self, base: &Path) -> Self {
        if self.storage.upload_dir.is_relative() {
            self.storage.upload_dir = base.join(&self.storage.upload_dir);
        }
        if self.storage.thumbnail_dir.is_relative() {
            self.storage.thumbnail_dir = base.join(&self.storage.thumbnail_dir);
        }
        self
    }
}

/// Listen address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Largest accepted upload body, in megabytes.
    pub max_upload_mb: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 3000,
            max_upload_mb: 4096,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.max_upload_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX)
    }
}

/// Storage locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub thumbnail_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            thumbnail_dir: PathBuf::from("uploads/thumbnails"),
        }
    }
}

/// Listing endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ListingConfig {
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 200,
        }
    }
}

impl ListingConfig {
    /// Clamp a requested page size into `[1, max_page_size]`, falling back
    /// to the default when the request has none.
    pub fn effective_page_size(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(n) if n > 0 => n.min(self.max_page_size),
            _ => self.default_page_size,
        }
    }
}

/// Thumbnail generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ThumbnailsConfig {
    /// Longer edge of generated thumbnails, in pixels.
    pub size: u32,
    /// Thumbnail jobs (image resizes and encoder processes) allowed at once.
    pub max_concurrent: usize,
    /// Executable used to extract a video frame.
    pub encoder: String,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        Self {
            size: 320,
            max_concurrent: 2,
            encoder: "ffmpeg".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(LockerConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// Tables merge key-by-key; any other overlay value replaces the base value.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `locker.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(dir: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<LockerConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: LockerConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `locker.toml` in `dir`, with storage paths resolved
/// against `dir`.
pub fn load_config(dir: &Path) -> Result<LockerConfig, ConfigError> {
    let base = stock_defaults_value();
    let overlay = load_raw_config(dir)?;
    Ok(resolve_config(base, overlay)?.resolve_paths(dir))
}

/// Returns a fully-commented stock `locker.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Media Locker Configuration
# ==========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Server
# ---------------------------------------------------------------------------
[server]
# Address to listen on. 0.0.0.0 makes the locker reachable from the LAN.
bind = "0.0.0.0"
port = 3000

# Largest accepted upload, in megabytes.
max_upload_mb = 4096

# ---------------------------------------------------------------------------
# Storage
# ---------------------------------------------------------------------------
[storage]
# Relative paths are resolved against the directory holding this file.
upload_dir = "uploads"
thumbnail_dir = "uploads/thumbnails"

# ---------------------------------------------------------------------------
# Listing
# ---------------------------------------------------------------------------
[listing]
# Page size used when a request carries no usable `limit`.
default_page_size = 20

# Largest `limit` a client may ask for.
max_page_size = 200

# ---------------------------------------------------------------------------
# Thumbnails
# ---------------------------------------------------------------------------
[thumbnails]
# Longer edge of generated thumbnails, in pixels.
size = 320

# Thumbnail jobs allowed to run at once. Video frames are extracted by an
# external encoder process, so keep this low on small machines.
max_concurrent = 2

# Executable used to extract a frame from uploaded videos.
encoder = "ffmpeg"
"##
}
