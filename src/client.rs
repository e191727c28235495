//! HTTP client for a running locker.
//!
//! Drives a [`GalleryState`] over the network and performs uploads with a
//! duplicate pre-check:
//!
//! ```text
//! GET /uploads?filter=all&checkDuplicates=true   → names already stored
//! stored_filename(device, "IMG 1.jpg")           → "phone_IMG_1.jpg"
//! already stored?  skip : POST /upload
//! ```
//!
//! The pre-check saves bandwidth only. The server still refuses to overwrite,
//! so a race between two clients ends in a reported duplicate, not data loss.

use crate::filter::Counts;
use crate::gallery::{Effect, FetchRequest, GalleryState, response};
use crate::server::{DEVICE_ID_HEADER, DeleteResponse, ThumbnailRequest, ThumbnailResponse, UploadResponse};
use crate::storage::{self, StorageError};
use reqwest::multipart::{Form, Part};
use reqwest::{Response, Url};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),
    #[error("Server returned {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("Unexpected response: {0}")]
    Response(#[from] response::ResponseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result of uploading one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadReport {
    Uploaded(String),
    /// The server already had this name.
    Duplicate(String),
    /// The pre-check found the name; nothing was sent.
    Skipped(String),
}

impl UploadReport {
    pub fn filename(&self) -> &str {
        match self {
            UploadReport::Uploaded(f) | UploadReport::Duplicate(f) | UploadReport::Skipped(f) => f,
        }
    }
}

/// Headers of a stored file, fetched without its body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileMetadata {
    pub content_length: Option<u64>,
    pub content_type: Option<String>,
}

#[derive(Clone)]
pub struct LockerClient {
    http: reqwest::Client,
    base: Url,
    device_id: String,
}

impl LockerClient {
    pub fn new(base: &str, device_id: impl Into<String>) -> Result<Self, ClientError> {
        let mut base =
            Url::parse(base).map_err(|e| ClientError::InvalidUrl(format!("{base}: {e}")))?;
        // Endpoints are joined relative to the base, so it must end in a slash
        // for a path prefix like `/locker` to survive.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self {
            http: reqwest::Client::new(),
            base,
            device_id: device_id.into(),
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    fn endpoint(&self, path_and_query: &str) -> Result<Url, ClientError> {
        self.base
            .join(path_and_query.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{path_and_query}: {e}")))
    }

    /// `base/<first>/<name>` with `name` percent-encoded as one segment.
    fn file_endpoint(&self, first: &str, name: &str) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base.to_string()))?
            .pop_if_empty()
            .push(first)
            .push(name);
        Ok(url)
    }

    async fn get_json(&self, path_and_query: &str) -> Result<Value, ClientError> {
        let url = self.endpoint(path_and_query)?;
        debug!(%url, "GET");
        let resp = self.http.get(url).send().await?;
        Ok(checked(resp).await?.json().await?)
    }

    /// Fetch one page and feed the result into the gallery.
    pub async fn load(&self, state: &mut GalleryState, request: &FetchRequest) -> Vec<Effect> {
        match self.get_json(&request.path_and_query()).await {
            Ok(body) => state.complete(&body),
            Err(e) => state.fail(e.to_string()),
        }
    }

    /// Every filename currently stored.
    pub async fn existing_filenames(&self) -> Result<HashSet<String>, ClientError> {
        let body = self
            .get_json("/uploads?filter=all&checkDuplicates=true")
            .await?;
        let listing = response::normalize(&body)?;
        if let Some(error) = listing.error {
            return Err(ClientError::Rejected {
                status: 500,
                message: error,
            });
        }
        Ok(listing.files.into_iter().map(|f| f.filename).collect())
    }

    /// Upload raw bytes under `original_name`.
    pub async fn upload_bytes(
        &self,
        original_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReport, ClientError> {
        let part = Part::bytes(bytes).file_name(original_name.to_string());
        let form = Form::new().part("file", part);
        let resp = self
            .http
            .post(self.endpoint("/upload")?)
            .header(DEVICE_ID_HEADER, &self.device_id)
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = checked(resp).await?.json().await?;
        if body.is_duplicate {
            Ok(UploadReport::Duplicate(body.filename))
        } else {
            info!(filename = %body.filename, "uploaded");
            Ok(UploadReport::Uploaded(body.filename))
        }
    }

    /// Upload a local file unless `existing` already holds its stored name.
    pub async fn upload_path(
        &self,
        path: &Path,
        existing: &HashSet<String>,
    ) -> Result<UploadReport, ClientError> {
        let original = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stored = storage::stored_filename(Some(&self.device_id), &original)?;
        if existing.contains(&stored) {
            debug!(%stored, "already on server, skipping");
            return Ok(UploadReport::Skipped(stored));
        }
        let bytes = tokio::fs::read(path).await?;
        self.upload_bytes(&original, bytes).await
    }

    pub async fn delete(&self, filename: &str) -> Result<Counts, ClientError> {
        let resp = self
            .http
            .delete(self.file_endpoint("delete", filename)?)
            .send()
            .await?;
        let body: DeleteResponse = checked(resp).await?.json().await?;
        Ok(body.counts)
    }

    /// Ask the server to build a thumbnail. Returns its URL path.
    pub async fn generate_thumbnail(&self, filename: &str) -> Result<String, ClientError> {
        let resp = self
            .http
            .post(self.endpoint("/api/generate-thumbnail")?)
            .json(&ThumbnailRequest {
                filename: filename.to_string(),
            })
            .send()
            .await?;
        let body: ThumbnailResponse = checked(resp).await?.json().await?;
        Ok(body.thumbnail)
    }

    pub async fn file_metadata(&self, filename: &str) -> Result<FileMetadata, ClientError> {
        let resp = self
            .http
            .head(self.file_endpoint("files", filename)?)
            .send()
            .await?;
        let resp = checked(resp).await?;
        let headers = resp.headers();
        Ok(FileMetadata {
            content_length: headers
                .get(reqwest::header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok()),
            content_type: headers
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        })
    }
}

/// Turn a non-2xx response into [`ClientError::Rejected`], using the body's
/// `message` or `error` field when there is one.
async fn checked(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("error"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(text);
    Err(ClientError::Rejected {
        status: status.as_u16(),
        message,
    })
}
