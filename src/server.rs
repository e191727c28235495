//! HTTP surface of the locker.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `GET` | `/uploads` | paginated or duplicate-check listing |
//! | `DELETE` | `/delete/{filename}` | remove a file and its thumbnail |
//! | `POST` | `/api/generate-thumbnail` | create a missing thumbnail |
//! | `POST` | `/upload` | multipart upload, `X-Device-Id` header |
//! | `GET` | `/files/{filename}` | stored bytes |
//! | `GET` | `/thumbnails/{name}` | generated thumbnails |
//!
//! Every listing request runs its own directory scan on the blocking pool.
//! There is no shared index, so handlers share nothing mutable beyond the
//! thumbnail semaphore.

use crate::config::LockerConfig;
use crate::filter::Counts;
use crate::listing::{self, ListingQuery, ListingResponse, RawListingQuery};
use crate::storage::{self, StorageError, UploadOutcome, UploadTarget};
use crate::thumbnail::{ThumbnailError, ThumbnailService};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Header carrying the client-generated device identifier.
pub const DEVICE_ID_HEADER: &str = "x-device-id";

#[derive(Clone)]
pub struct AppState {
    config: Arc<LockerConfig>,
    thumbnails: Arc<ThumbnailService>,
}

impl AppState {
    pub fn new(config: LockerConfig, thumbnails: ThumbnailService) -> Self {
        Self {
            config: Arc::new(config),
            thumbnails: Arc::new(thumbnails),
        }
    }
}

/// Error response for the mutation endpoints: `{success: false, message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        let status = match &e {
            StorageError::InvalidFilename(_) => StatusCode::BAD_REQUEST,
            StorageError::NotFound(_) => StatusCode::NOT_FOUND,
            StorageError::Io(_) | StorageError::Scan(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

impl From<ThumbnailError> for ApiError {
    fn from(e: ThumbnailError) -> Self {
        let status = match &e {
            ThumbnailError::Storage(StorageError::InvalidFilename(_)) => StatusCode::BAD_REQUEST,
            ThumbnailError::NotFound(_) => StatusCode::NOT_FOUND,
            ThumbnailError::Unsupported(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, e.to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    success: bool,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub success: bool,
    pub message: String,
    pub counts: Counts,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThumbnailRequest {
    pub filename: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ThumbnailResponse {
    pub success: bool,
    pub thumbnail: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub success: bool,
    pub filename: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_duplicate: bool,
}

pub fn router(state: AppState) -> Router {
    let uploads = ServeDir::new(&state.config.storage.upload_dir);
    let thumbnails = ServeDir::new(&state.config.storage.thumbnail_dir);
    let upload_limit = state.config.server.max_upload_bytes();

    Router::new()
        .route("/uploads", get(list_uploads))
        .route("/delete/{filename}", delete(delete_upload))
        .route("/api/generate-thumbnail", post(generate_thumbnail))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .nest_service("/files", uploads)
        .nest_service("/thumbnails", thumbnails)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: LockerConfig) -> std::io::Result<()> {
    tokio::fs::create_dir_all(&config.storage.upload_dir).await?;
    tokio::fs::create_dir_all(&config.storage.thumbnail_dir).await?;

    let address = config.server.address();
    let listener = TcpListener::bind(&address).await?;
    info!(
        address = %listener.local_addr()?,
        uploads = %config.storage.upload_dir.display(),
        "media locker listening"
    );

    let thumbnails = ThumbnailService::native(&config);
    let app = router(AppState::new(config, thumbnails));

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutting down");
        })
        .await
}

async fn list_uploads(
    State(state): State<AppState>,
    Query(raw): Query<RawListingQuery>,
) -> (StatusCode, Json<ListingResponse>) {
    let query = ListingQuery::from_raw(&raw, &state.config.listing);
    let dir = state.config.storage.upload_dir.clone();

    let result = tokio::task::spawn_blocking(move || listing::list_directory(&dir, &query)).await;
    match result {
        Ok(Ok(response)) => (StatusCode::OK, Json(response)),
        Ok(Err(e)) => {
            warn!(error = %e, "listing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(listing::error_listing(&query, e.to_string())),
            )
        }
        Err(e) => {
            warn!(error = %e, "listing task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(listing::error_listing(&query, "listing task failed")),
            )
        }
    }
}

async fn delete_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let upload_dir = state.config.storage.upload_dir.clone();
    let thumbnail_dir = state.config.storage.thumbnail_dir.clone();
    let name = filename.clone();

    let counts = tokio::task::spawn_blocking(move || {
        storage::delete_file(&upload_dir, &thumbnail_dir, &name)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(Json(DeleteResponse {
        success: true,
        message: format!("Deleted {filename}"),
        counts,
    }))
}

async fn generate_thumbnail(
    State(state): State<AppState>,
    Json(req): Json<ThumbnailRequest>,
) -> Result<Json<ThumbnailResponse>, ApiError> {
    let name = state.thumbnails.generate(&req.filename).await?;
    Ok(Json(ThumbnailResponse {
        success: true,
        thumbnail: format!("/thumbnails/{name}"),
    }))
}

async fn upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let device_id = headers
        .get(DEVICE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    while let Some(mut field) = multipart.next_field().await.map_err(bad_upload)? {
        let Some(original) = field.file_name().map(str::to_string) else {
            continue;
        };

        let upload_dir = state.config.storage.upload_dir.clone();
        let device_id = device_id.clone();
        let target = tokio::task::spawn_blocking(move || {
            storage::create_upload(&upload_dir, device_id.as_deref(), &original)
        })
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;

        let outcome = match target {
            UploadTarget::Duplicate { filename } => {
                // Read the rest of the body so the client sees a clean response.
                while field.chunk().await.map_err(bad_upload)?.is_some() {}
                UploadOutcome::Duplicate { filename }
            }
            UploadTarget::New(mut pending) => {
                while let Some(chunk) = field.chunk().await.map_err(bad_upload)? {
                    pending.write_chunk(&chunk).await?;
                }
                pending.commit().await?
            }
        };

        let is_duplicate = outcome.is_duplicate();
        let filename = match outcome {
            UploadOutcome::Stored { filename } | UploadOutcome::Duplicate { filename } => filename,
        };
        return Ok(Json(UploadResponse {
            success: true,
            filename,
            is_duplicate,
        }));
    }

    Err(ApiError::new(StatusCode::BAD_REQUEST, "No file in upload"))
}

fn bad_upload(e: MultipartError) -> ApiError {
    ApiError::new(e.status(), e.body_text())
}

