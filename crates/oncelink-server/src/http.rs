//! Delivery gateway routes.
//!
//! - `POST /upload`         multipart `file` -> `{success, link}`
//! - `GET  /view/:token`    viewer page, or the expired page
//! - `POST /expire/:token`  finalize; `{success:true}` whether or not this call won
//! - `GET  /media/:key`     media hosted by the injected object store (until the grant ends)
//! - `GET  /health`
//!
//! Only raster image types are accepted: the viewer renders media through `<img>`
//! and `/media` is served from the same origin as the viewer.

use std::sync::Arc;

use axum::{Json, Router};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use oncelink_core::domain::ObjectStoreError;
use oncelink_core::{GrantError, LifecycleManager, Token, ViewOutcome};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::pages;

const UPLOAD_FIELD: &str = "file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// SVG is left out: it is a script-capable document.
const ACCEPTED_MEDIA_TYPES: &[&str] = &[
    "image/avif",
    "image/bmp",
    "image/gif",
    "image/jpeg",
    "image/png",
    "image/webp",
];

/// Normalized type if `raw` (parameters allowed) is one we serve.
fn accepted_media_type(raw: &str) -> Option<&'static str> {
    let essence = raw
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ACCEPTED_MEDIA_TYPES
        .iter()
        .copied()
        .find(|accepted| *accepted == essence)
}

#[derive(Clone)]
pub struct AppState {
    manager: LifecycleManager,
    base_url: Arc<str>,
    view_seconds: u32,
}

impl AppState {
    pub fn new(manager: LifecycleManager, base_url: &str, view_seconds: u32) -> Self {
        Self {
            manager,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            view_seconds,
        }
    }

    /// `<base_url>/view/<token>`
    pub fn share_link(&self, token: &Token) -> String {
        format!("{}/view/{}", self.base_url, token)
    }
}

pub fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/view/:token", get(view))
        .route("/expire/:token", post(expire))
        .route("/media/:key", get(media))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UploadResponse {
    fn ok(link: String) -> Self {
        Self {
            success: true,
            link: Some(link),
            error: None,
        }
    }

    fn failed(status: StatusCode, error: impl Into<String>) -> (StatusCode, Json<Self>) {
        let body = Self {
            success: false,
            link: None,
            error: Some(error.into()),
        };
        (status, Json(body))
    }
}

async fn upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> (StatusCode, Json<UploadResponse>) {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return UploadResponse::failed(rejection.status(), rejection.body_text()),
    };

    let mut upload = None;
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return UploadResponse::failed(e.status(), e.body_text()),
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let Some(content_type) = field.content_type().and_then(accepted_media_type) else {
            tracing::warn!(content_type = ?field.content_type(), "upload type refused");
            return UploadResponse::failed(
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "Only image uploads are supported",
            );
        };
        match field.bytes().await {
            Ok(bytes) => upload = Some((bytes.to_vec(), content_type)),
            Err(e) => return UploadResponse::failed(e.status(), e.body_text()),
        }
        break;
    }

    let Some((bytes, content_type)) = upload.filter(|(bytes, _)| !bytes.is_empty()) else {
        return UploadResponse::failed(StatusCode::BAD_REQUEST, "No file uploaded");
    };

    match state.manager.publish(bytes, content_type).await {
        Ok(token) => (StatusCode::OK, Json(UploadResponse::ok(state.share_link(&token)))),
        Err(e) => {
            tracing::error!(error = %e, kind = ?e.kind(), "upload rejected");
            UploadResponse::failed(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn view(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let Some(token) = Token::parse(&raw) else {
        return expired();
    };

    match state.manager.begin_view(&token).await {
        Ok(ViewOutcome::Viewable(media_ref)) => {
            let page = pages::viewer_page(&media_ref, &token, state.view_seconds);
            private(Html(page).into_response())
        }
        Ok(ViewOutcome::Expired) => expired(),
        Err(e) => {
            tracing::error!(error = %e, "view lookup failed");
            private((StatusCode::SERVICE_UNAVAILABLE, Html(pages::unavailable_page())).into_response())
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExpireResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn expire(State(state): State<AppState>, Path(raw): Path<String>) -> Response {
    let done = Json(ExpireResponse {
        success: true,
        error: None,
    });
    let Some(token) = Token::parse(&raw) else {
        return done.into_response();
    };

    match state.manager.finalize_view(&token).await {
        // 勝者かどうかは呼び出し側に見せない
        Ok(_) => done.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "finalize failed");
            let body = ExpireResponse {
                success: false,
                error: Some(transient_message(&e)),
            };
            (StatusCode::SERVICE_UNAVAILABLE, Json(body)).into_response()
        }
    }
}

async fn media(State(state): State<AppState>, Path(key): Path<String>) -> Response {
    match state.manager.fetch_media(&key).await {
        Ok(Some(object)) => {
            // 保存時の申告値は信用しない
            let content_type =
                accepted_media_type(&object.content_type).unwrap_or(DEFAULT_CONTENT_TYPE);
            let mut response = object.bytes.into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
            headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
            headers.insert(header::CONTENT_SECURITY_POLICY, HeaderValue::from_static("sandbox"));
            private(response)
        }
        Ok(None) | Err(ObjectStoreError::InvalidKey(_)) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "media fetch failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub unviewed: usize,
    pub consumed: usize,
}

async fn health(State(state): State<AppState>) -> Response {
    match state.manager.status().await {
        Ok(status) => Json(HealthResponse {
            status: "ok",
            unviewed: status.unviewed,
            consumed: status.consumed,
        })
        .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({ "status": "unavailable" })),
            )
                .into_response()
        }
    }
}

fn expired() -> Response {
    private((StatusCode::NOT_FOUND, Html(pages::expired_page())).into_response())
}

/// Links and media must not be cached or leak the token via Referer.
fn private(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    response
}

fn transient_message(e: &GrantError) -> String {
    match e {
        GrantError::StoreUnavailable(_) => "store unavailable, try again".to_string(),
        other => other.to_string(),
    }
}
