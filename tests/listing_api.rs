//! HTTP endpoint tests driving the router directly, without a socket.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use media_locker::config::LockerConfig;
use media_locker::server::{self, AppState};
use media_locker::thumbnail::{ThumbnailBackend, ThumbnailError, ThumbnailService};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;
use tower::ServiceExt;

struct StubBackend;

impl ThumbnailBackend for StubBackend {
    fn image_thumbnail(&self, _: &Path, output: &Path, _: u32) -> Result<(), ThumbnailError> {
        std::fs::write(output, b"jpeg")?;
        Ok(())
    }

    fn video_frame(&self, _: &Path, output: &Path, _: u32) -> Result<(), ThumbnailError> {
        std::fs::write(output, b"jpeg")?;
        Ok(())
    }
}

struct Fixture {
    _tmp: TempDir,
    config: LockerConfig,
    app: Router,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let config = LockerConfig::default().resolve_paths(tmp.path());
    std::fs::create_dir_all(&config.storage.upload_dir).unwrap();
    let thumbnails = ThumbnailService::new(&config, Arc::new(StubBackend));
    let app = server::router(AppState::new(config.clone(), thumbnails));
    Fixture {
        _tmp: tmp,
        config,
        app,
    }
}

impl Fixture {
    fn upload_dir(&self) -> &Path {
        &self.config.storage.upload_dir
    }

    fn add(&self, name: &str, mtime_secs: u64) {
        let path = self.upload_dir().join(name);
        std::fs::write(&path, name.as_bytes()).unwrap();
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(UNIX_EPOCH + Duration::from_secs(mtime_secs))
            .unwrap();
    }

    fn scenario(&self) {
        self.add("a.jpg", 10);
        self.add("b.mp4", 20);
        self.add("c.pdf", 5);
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }
}

fn names(body: &Value) -> Vec<String> {
    body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["filename"].as_str().unwrap().to_string())
        .collect()
}

fn multipart(filename: &str, bytes: &[u8], device: Option<&str>) -> Request<Body> {
    let boundary = "locker-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let mut builder = Request::post("/upload").header(
        "content-type",
        format!("multipart/form-data; boundary={boundary}"),
    );
    if let Some(device) = device {
        builder = builder.header("X-Device-Id", device);
    }
    builder.body(Body::from(body)).unwrap()
}

// =========================================================================
// GET /uploads
// =========================================================================

#[tokio::test]
async fn first_page_newest_first() {
    let fx = fixture();
    fx.scenario();

    let (status, body) = fx.get("/uploads?filter=all&page=1&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body), vec!["b.mp4", "a.jpg"]);
    assert_eq!(body["hasMore"], true);
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["totalFiles"], 3);
    assert_eq!(
        body["counts"],
        serde_json::json!({"images": 1, "videos": 1, "others": 1, "all": 3})
    );
    assert_eq!(body["files"][0]["type"], "video");
    assert_eq!(body["files"][0]["size"], 5);
}

#[tokio::test]
async fn pages_partition_the_view() {
    let fx = fixture();
    for i in 0..7 {
        fx.add(&format!("f{i}.png"), 100 + i);
    }

    let mut seen = Vec::new();
    for page in 1..=3 {
        let (_, body) = fx.get(&format!("/uploads?page={page}&limit=3")).await;
        seen.extend(names(&body));
        assert_eq!(body["hasMore"], page < 3);
    }
    assert_eq!(seen.len(), 7);
    let mut sorted = seen.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), 7);
}

#[tokio::test]
async fn out_of_range_page_is_empty() {
    let fx = fixture();
    fx.scenario();
    let (status, body) = fx.get("/uploads?page=9&limit=2").await;
    assert_eq!(status, StatusCode::OK);
    assert!(names(&body).is_empty());
    assert_eq!(body["totalPages"], 2);
    assert_eq!(body["hasMore"], false);
}

#[tokio::test]
async fn type_filter_and_unknown_filter() {
    let fx = fixture();
    fx.scenario();

    let (_, body) = fx.get("/uploads?filter=other").await;
    assert_eq!(names(&body), vec!["c.pdf"]);
    assert_eq!(body["counts"]["all"], 3);

    let (status, body) = fx.get("/uploads?filter=documents&page=abc&limit=xyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body).len(), 3);
    assert_eq!(body["page"], 1);
}

#[tokio::test]
async fn duplicate_check_ignores_limit() {
    let fx = fixture();
    fx.scenario();
    let (_, body) = fx.get("/uploads?filter=all&limit=1&checkDuplicates=true").await;
    assert_eq!(body["total"], 3);
    assert_eq!(names(&body).len(), 3);
    assert!(body.get("hasMore").is_none());
}

#[tokio::test]
async fn unreadable_directory_keeps_response_shape() {
    let fx = fixture();
    std::fs::remove_dir_all(fx.upload_dir()).unwrap();

    let (status, body) = fx.get("/uploads").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["files"], serde_json::json!([]));
    assert_eq!(body["counts"]["all"], 0);
    assert_eq!(body["hasMore"], false);
    assert!(body["error"].is_string());
}

// =========================================================================
// DELETE /delete/{filename}
// =========================================================================

#[tokio::test]
async fn delete_then_relist() {
    let fx = fixture();
    fx.scenario();
    let thumb_dir = &fx.config.storage.thumbnail_dir;
    std::fs::create_dir_all(thumb_dir).unwrap();
    std::fs::write(thumb_dir.join("b.mp4.thumb.jpg"), b"t").unwrap();

    let (status, body) = fx
        .send(Request::delete("/delete/b.mp4").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["counts"]["videos"], 0);
    assert_eq!(body["counts"]["all"], 2);
    assert!(!thumb_dir.join("b.mp4.thumb.jpg").exists());

    let (_, body) = fx.get("/uploads?page=1&limit=2").await;
    assert_eq!(names(&body), vec!["a.jpg", "c.pdf"]);
}

#[tokio::test]
async fn delete_missing_is_404() {
    let fx = fixture();
    let (status, body) = fx
        .send(Request::delete("/delete/ghost.jpg").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn delete_traversal_is_400() {
    let fx = fixture();
    let (status, body) = fx
        .send(
            Request::delete("/delete/..%2Flocker.toml")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

// =========================================================================
// POST /upload
// =========================================================================

#[tokio::test]
async fn upload_then_duplicate() {
    let fx = fixture();

    let (status, body) = fx.send(multipart("IMG 1.jpg", b"first", Some("phone"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["filename"], "phone_IMG_1.jpg");
    assert!(body.get("isDuplicate").is_none());

    let (status, body) = fx.send(multipart("IMG 1.jpg", b"second", Some("phone"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["isDuplicate"], true);

    let stored = std::fs::read(fx.upload_dir().join("phone_IMG_1.jpg")).unwrap();
    assert_eq!(stored, b"first");

    let (_, listing) = fx.get("/uploads").await;
    assert_eq!(names(&listing), vec!["phone_IMG_1.jpg"]);
}

#[tokio::test]
async fn upload_without_device_is_anonymous() {
    let fx = fixture();
    let (_, body) = fx.send(multipart("notes.pdf", b"%PDF", None)).await;
    assert_eq!(body["filename"], "anonymous_notes.pdf");
}

#[tokio::test]
async fn large_upload_is_written_whole() {
    let fx = fixture();
    let video: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let (status, body) = fx.send(multipart("clip.mp4", &video, Some("phone"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["filename"], "phone_clip.mp4");
    let stored = std::fs::read(fx.upload_dir().join("phone_clip.mp4")).unwrap();
    assert_eq!(stored.len(), video.len());
    assert!(stored == video);
}

#[tokio::test]
async fn interrupted_upload_leaves_no_file() {
    let fx = fixture();
    let boundary = "cut";
    // The body ends mid-file, before the closing boundary.
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"clip.mp4\"\r\n\r\npartial video bytes"
    );
    let request = Request::post("/upload")
        .header("X-Device-Id", "phone")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, body) = fx.send(request).await;
    assert!(status.is_client_error(), "{status}");
    assert_eq!(body["success"], false);
    assert!(!fx.upload_dir().join("phone_clip.mp4").exists());

    let (_, listing) = fx.get("/uploads").await;
    assert!(names(&listing).is_empty());
}

#[tokio::test]
async fn upload_without_file_is_400() {
    let fx = fixture();
    let boundary = "b";
    let body = format!("--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nhi\r\n--{boundary}--\r\n");
    let request = Request::post("/upload")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, body) = fx.send(request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

// =========================================================================
// Thumbnails and file serving
// =========================================================================

#[tokio::test]
async fn generate_thumbnail_and_serve_it() {
    let fx = fixture();
    fx.add("d_clip.mp4", 1);

    let request = Request::post("/api/generate-thumbnail")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"filename":"d_clip.mp4"}"#))
        .unwrap();
    let (status, body) = fx.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["thumbnail"], "/thumbnails/d_clip.mp4.thumb.jpg");

    let response = fx
        .app
        .clone()
        .oneshot(
            Request::get("/thumbnails/d_clip.mp4.thumb.jpg")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"jpeg");
}

#[tokio::test]
async fn thumbnail_for_missing_file_fails() {
    let fx = fixture();
    let request = Request::post("/api/generate-thumbnail")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"filename":"ghost.jpg"}"#))
        .unwrap();
    let (status, body) = fx.send(request).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn stored_files_are_served() {
    let fx = fixture();
    fx.add("d_a.jpg", 1);
    let response = fx
        .app
        .clone()
        .oneshot(Request::get("/files/d_a.jpg").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"d_a.jpg");
}
