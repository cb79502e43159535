//! HTTP gateway integration tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use chrono::{TimeDelta, TimeZone, Utc};
use oncelink_core::domain::{ConsumeOutcome, ObjectStoreError, StoreError, TokenRecord};
use oncelink_core::impls::{InMemoryObjectStore, InMemoryRecordStore, SqliteRecordStore};
use oncelink_core::ports::{
    Clock, FixedClock, ObjectStore, RecordStore, StoreStatus, StoredObject, SystemClock,
};
use oncelink_core::{GrantConfig, LifecycleBuilder, LifecycleManager, MediaRef, Token};
use oncelink_server::{AppState, router};
use serde_json::Value;
use tower::ServiceExt;

const BASE_URL: &str = "http://share.example";
const BOUNDARY: &str = "X-ONCELINK-BOUNDARY";

// ============================================================================
// Helpers
// ============================================================================

fn app() -> Router {
    app_with_limit(1024 * 1024)
}

fn app_with_limit(max_upload_bytes: usize) -> Router {
    let config = GrantConfig::default();
    let store = Arc::new(InMemoryRecordStore::new(&config, Arc::new(SystemClock)));
    let (app, _) = app_over(store, Arc::new(InMemoryObjectStore::new(BASE_URL)), max_upload_bytes);
    app
}

fn app_over(
    store: Arc<dyn RecordStore>,
    objects: Arc<dyn ObjectStore>,
    max_upload_bytes: usize,
) -> (Router, LifecycleManager) {
    let manager = LifecycleBuilder::new(GrantConfig::default())
        .record_store(store)
        .object_store(objects)
        .build()
        .unwrap();
    let app = router(AppState::new(manager.clone(), BASE_URL, 5), max_upload_bytes);
    (app, manager)
}

fn multipart_body(field: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{field}\"; filename=\"a.png\"\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {content_type}\r\n\r\n").as_bytes());
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str) -> Request<Body> {
    Request::post(uri).body(Body::empty()).unwrap()
}

async fn upload_png(app: &Router) -> String {
    let (status, json) = send_json(
        app,
        upload_request(multipart_body("file", "image/png", b"\x89PNG-bytes")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    let link = json["link"].as_str().unwrap().to_string();
    link.strip_prefix(BASE_URL).unwrap().to_string()
}

/// `/media/<key>` as embedded in the viewer page.
async fn media_path(app: &Router, view_path: &str) -> String {
    let (status, _, body) = send(app, get(view_path)).await;
    assert_eq!(status, StatusCode::OK);
    let page = String::from_utf8(body).unwrap();
    let start = page.find("/media/").unwrap();
    let end = start + page[start..].find('"').unwrap();
    page[start..end].to_string()
}

// ============================================================================
// Full flow
// ============================================================================

#[tokio::test]
async fn upload_view_expire_flow() {
    let app = app();
    let view_path = upload_png(&app).await;
    assert!(view_path.starts_with("/view/"));
    let token = view_path.trim_start_matches("/view/").to_string();

    // 表示（何度でも）
    for _ in 0..2 {
        let (status, headers, body) = send(&app, get(&view_path)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CACHE_CONTROL], "no-store");
        let page = String::from_utf8(body).unwrap();
        assert!(page.contains(&format!("fetch(\"../expire/{token}\"")));
        assert!(page.contains(&format!("src=\"{BASE_URL}/media/")));
    }

    // メディア本体
    let media = media_path(&app, &view_path).await;
    let (status, headers, bytes) = send(&app, get(&media)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "image/png");
    assert_eq!(bytes, b"\x89PNG-bytes");

    // finalize は何度呼んでも success:true
    for _ in 0..2 {
        let (status, json) = send_json(&app, post(&format!("/expire/{token}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "success": true }));
    }

    let (status, _, body) = send(&app, get(&view_path)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(String::from_utf8(body).unwrap().contains("Link Expired"));

    // 消費後はメディアも配信しない
    let (status, _, _) = send(&app, get(&media)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ============================================================================
// Expired presentation
// ============================================================================

#[tokio::test]
async fn unknown_and_malformed_tokens_look_identical() {
    let app = app();
    let (unknown_status, _, unknown_body) = send(&app, get("/view/nonexistent")).await;
    let (malformed_status, _, malformed_body) = send(&app, get("/view/%3Cscript%3E")).await;

    assert_eq!(unknown_status, StatusCode::NOT_FOUND);
    assert_eq!(malformed_status, StatusCode::NOT_FOUND);
    assert_eq!(unknown_body, malformed_body);
}

#[tokio::test]
async fn consumed_token_looks_like_unknown_token() {
    let app = app();
    let view_path = upload_png(&app).await;
    let token = view_path.trim_start_matches("/view/");
    send_json(&app, post(&format!("/expire/{token}"))).await;

    let (_, _, consumed) = send(&app, get(&view_path)).await;
    let (_, _, unknown) = send(&app, get("/view/nonexistent")).await;
    assert_eq!(consumed, unknown);
}

#[tokio::test]
async fn expire_on_unknown_token_still_succeeds() {
    let app = app();
    let (status, json) = send_json(&app, post("/expire/nonexistent")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
}

// ============================================================================
// Upload validation
// ============================================================================

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let app = app();
    let (status, json) = send_json(
        &app,
        upload_request(multipart_body("avatar", "image/png", b"bytes")),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert_eq!(json["error"], "No file uploaded");
}

#[tokio::test]
async fn upload_with_empty_file_is_rejected() {
    let app = app();
    let (status, json) = send_json(&app, upload_request(multipart_body("file", "image/png", b""))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn non_multipart_upload_is_rejected() {
    let app = app();
    let request = Request::post("/upload")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))
        .unwrap();
    let (status, json) = send_json(&app, request).await;

    assert!(status.is_client_error());
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn oversized_upload_is_rejected() {
    let app = app_with_limit(1024);
    let (status, json) = send_json(
        &app,
        upload_request(multipart_body("file", "image/png", &vec![7u8; 4096])),
    )
    .await;

    assert!(status.is_client_error(), "unexpected status {status}");
    assert_eq!(json["success"], false);
}

// ============================================================================
// Media & health
// ============================================================================

#[tokio::test]
async fn unknown_media_is_not_found() {
    let app = app();
    let (status, _, _) = send(&app, get("/media/01ARZ3NDEKTSV4RRFFQ69G5FAV")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_counts() {
    let app = app();
    let view_path = upload_png(&app).await;
    upload_png(&app).await;
    let token = view_path.trim_start_matches("/view/");
    send_json(&app, post(&format!("/expire/{token}"))).await;

    let (status, json) = send_json(&app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        json,
        serde_json::json!({ "status": "ok", "unviewed": 1, "consumed": 1 })
    );
}

// ============================================================================
// Media lifetime & hardening
// ============================================================================

#[tokio::test]
async fn media_is_reclaimed_with_expired_grant() {
    let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()));
    let store = Arc::new(InMemoryRecordStore::new(&GrantConfig::default(), clock.clone()));
    let objects = Arc::new(InMemoryObjectStore::new(BASE_URL));
    let (app, manager) = app_over(store, objects.clone(), 1024 * 1024);

    let view_path = upload_png(&app).await;
    let media = media_path(&app, &view_path).await;

    clock.advance(TimeDelta::hours(1));
    assert_eq!(manager.reclaim_expired().await.unwrap(), 1);

    let (status, _, _) = send(&app, get(&media)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(objects.is_empty());
}

#[tokio::test]
async fn media_responses_cannot_be_sniffed_or_scripted() {
    let app = app();
    let view_path = upload_png(&app).await;
    let media = media_path(&app, &view_path).await;

    let (status, headers, _) = send(&app, get(&media)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
    assert_eq!(headers[header::CONTENT_SECURITY_POLICY], "sandbox");
}

#[tokio::test]
async fn html_upload_is_refused() {
    let app = app();
    let (status, json) = send_json(
        &app,
        upload_request(multipart_body(
            "file",
            "text/html",
            b"<script>alert(document.domain)</script>",
        )),
    )
    .await;

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["success"], false);
    let (_, health) = send_json(&app, get("/health")).await;
    assert_eq!(health["unviewed"], 0);
}

#[tokio::test]
async fn svg_upload_is_refused() {
    let app = app();
    let (status, _) = send_json(
        &app,
        upload_request(multipart_body("file", "image/svg+xml", b"<svg onload=alert(1)/>")),
    )
    .await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
}

#[tokio::test]
async fn stored_non_image_is_served_as_opaque_bytes() {
    let objects = Arc::new(InMemoryObjectStore::new(BASE_URL));
    let store = Arc::new(InMemoryRecordStore::new(&GrantConfig::default(), Arc::new(SystemClock)));
    let (app, _) = app_over(store, objects.clone(), 1024 * 1024);

    let media_ref = objects
        .put(b"<script>alert(1)</script>".to_vec(), "text/html")
        .await
        .unwrap();
    let path = media_ref.as_str().strip_prefix(BASE_URL).unwrap();

    let (status, headers, _) = send(&app, get(path)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/octet-stream");
    assert_eq!(headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
}

// ============================================================================
// Failure paths
// ============================================================================

struct DownStore;

#[async_trait]
impl RecordStore for DownStore {
    fn clock(&self) -> Arc<dyn Clock> {
        Arc::new(SystemClock)
    }

    async fn put(&self, _record: TokenRecord) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn get(&self, _token: &Token) -> Result<Option<TokenRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn try_consume(&self, _token: &Token) -> Result<ConsumeOutcome, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn purge_expired(&self) -> Result<Vec<TokenRecord>, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }

    async fn status(&self) -> Result<StoreStatus, StoreError> {
        Err(StoreError::Unavailable("connection refused".into()))
    }
}

struct RejectingObjects;

#[async_trait]
impl ObjectStore for RejectingObjects {
    async fn put(&self, _bytes: Vec<u8>, _content_type: &str) -> Result<MediaRef, ObjectStoreError> {
        Err(ObjectStoreError::Other("quota exceeded".into()))
    }

    async fn fetch(&self, _key: &str) -> Result<Option<StoredObject>, ObjectStoreError> {
        Ok(None)
    }

    async fn delete(&self, _media_ref: &MediaRef) -> Result<bool, ObjectStoreError> {
        Ok(false)
    }
}

fn down_app() -> Router {
    app_over(
        Arc::new(DownStore),
        Arc::new(InMemoryObjectStore::new(BASE_URL)),
        1024 * 1024,
    )
    .0
}

#[tokio::test]
async fn view_reports_unavailable_when_store_is_down() {
    let app = down_app();
    let (status, headers, body) = send(&app, get("/view/ab12cd34")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(!String::from_utf8(body).unwrap().contains("Link Expired"));
}

#[tokio::test]
async fn expire_reports_unavailable_when_store_is_down() {
    let app = down_app();
    let (status, json) = send_json(&app, post("/expire/ab12cd34")).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json["success"], false);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn upload_reports_server_error_when_store_is_down() {
    let app = down_app();
    let (status, json) = send_json(
        &app,
        upload_request(multipart_body("file", "image/png", b"\x89PNG-bytes")),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("unavailable"));
    assert!(json.get("link").is_none());
}

#[tokio::test]
async fn upload_reports_server_error_when_object_store_rejects() {
    let store = Arc::new(InMemoryRecordStore::new(&GrantConfig::default(), Arc::new(SystemClock)));
    let (app, _) = app_over(store.clone(), Arc::new(RejectingObjects), 1024 * 1024);

    let (status, json) = send_json(
        &app,
        upload_request(multipart_body("file", "image/png", b"\x89PNG-bytes")),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert!(json["error"].as_str().unwrap().contains("upload failed"));
    assert_eq!(store.stored_len(), 0);
}

// ============================================================================
// Concurrency
// ============================================================================

/// Counts how many `try_consume` calls won.
struct CountingStore {
    inner: InMemoryRecordStore,
    wins: AtomicUsize,
}

#[async_trait]
impl RecordStore for CountingStore {
    fn clock(&self) -> Arc<dyn Clock> {
        self.inner.clock()
    }

    async fn put(&self, record: TokenRecord) -> Result<(), StoreError> {
        self.inner.put(record).await
    }

    async fn get(&self, token: &Token) -> Result<Option<TokenRecord>, StoreError> {
        self.inner.get(token).await
    }

    async fn try_consume(&self, token: &Token) -> Result<ConsumeOutcome, StoreError> {
        let outcome = self.inner.try_consume(token).await?;
        if let ConsumeOutcome::Consumed(_) = outcome {
            self.wins.fetch_add(1, Ordering::SeqCst);
        }
        Ok(outcome)
    }

    async fn purge_expired(&self) -> Result<Vec<TokenRecord>, StoreError> {
        self.inner.purge_expired().await
    }

    async fn status(&self) -> Result<StoreStatus, StoreError> {
        self.inner.status().await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn parallel_expire_calls_all_succeed_but_consume_once() {
    let store = Arc::new(CountingStore {
        inner: InMemoryRecordStore::new(&GrantConfig::default(), Arc::new(SystemClock)),
        wins: AtomicUsize::new(0),
    });
    let (app, _) = app_over(store.clone(), Arc::new(InMemoryObjectStore::new(BASE_URL)), 1024 * 1024);
    let view_path = upload_png(&app).await;
    let token = view_path.trim_start_matches("/view/").to_string();

    let barrier = Arc::new(tokio::sync::Barrier::new(32));
    let handles: Vec<_> = (0..32)
        .map(|_| {
            let app = app.clone();
            let uri = format!("/expire/{token}");
            let barrier = Arc::clone(&barrier);
            tokio::spawn(async move {
                barrier.wait().await;
                send_json(&app, post(&uri)).await
            })
        })
        .collect();

    for handle in handles {
        let (status, json) = handle.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, serde_json::json!({ "success": true }));
    }
    assert_eq!(store.wins.load(Ordering::SeqCst), 1);

    let (_, health) = send_json(&app, get("/health")).await;
    assert_eq!(health["consumed"], 1);
    assert_eq!(health["unviewed"], 0);
}

// ============================================================================
// Shared record store
// ============================================================================

#[tokio::test]
async fn gateways_sharing_a_database_share_grants() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("grants.db").display());
    let objects: Arc<dyn ObjectStore> = Arc::new(InMemoryObjectStore::new(BASE_URL));

    let mut gateways = Vec::new();
    for _ in 0..2 {
        let store = SqliteRecordStore::connect(&url, &GrantConfig::default(), Arc::new(SystemClock))
            .await
            .unwrap();
        gateways.push(app_over(Arc::new(store), objects.clone(), 1024 * 1024).0);
    }
    let (a, b) = (&gateways[0], &gateways[1]);

    let view_path = upload_png(a).await;
    let token = view_path.trim_start_matches("/view/").to_string();

    let (status, _, _) = send(b, get(&view_path)).await;
    assert_eq!(status, StatusCode::OK);

    send_json(b, post(&format!("/expire/{token}"))).await;

    let (status, _, _) = send(a, get(&view_path)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
