//! HTTP request handlers
//!
//! Ingestion endpoints turn producer JSON or uploaded files into queue
//! items. Malformed input is rejected here with 400 and never reaches the
//! scheduler.

use axum::{
    extract::{
        multipart::{Field, MultipartRejection},
        rejection::JsonRejection,
        Multipart, State,
    },
    http::StatusCode,
    Json,
};
use tokio::io::AsyncWriteExt;
use kiosk_common::events::MediaKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::AppState;
use crate::error::Error;
use crate::playback::QueueItem;
use crate::uploads::UploadStore;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    playing: bool,
    queue_length: usize,
}

/// Body of the per-kind link endpoints
#[derive(Debug, Deserialize)]
pub struct LinkRequest {
    #[serde(default)]
    src: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    /// Milliseconds; integer or integer string
    #[serde(default)]
    duration: Option<Value>,
}

/// Body of the generic enqueue endpoint
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    src: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    duration: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    success: bool,
    id: Uuid,
    #[serde(rename = "type")]
    kind: MediaKind,
    src: String,
    caption: String,
    /// Milliseconds actually applied: requested, image default, or 0 when
    /// a video's length is probed at play time
    duration: u64,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    error: String,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Producer input that cannot become a queue item
#[derive(Error, Debug, PartialEq, Eq)]
pub enum IngestError {
    #[error("No src")]
    MissingSource,

    #[error("No file")]
    MissingFile,

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Invalid type: {0}")]
    InvalidKind(String),

    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

impl IngestError {
    fn into_rejection(self) -> (StatusCode, Json<ErrorResponse>) {
        warn!("Rejected enqueue request: {}", self);
        (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: self.to_string(),
            }),
        )
    }
}

fn internal_error(message: String) -> (StatusCode, Json<ErrorResponse>) {
    warn!("{}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: message }),
    )
}

// ============================================================================
// Validation
// ============================================================================

/// Parse an optional duration in milliseconds.
///
/// Accepts a non-negative integer or a string holding one; null and empty
/// strings mean "not given".
pub fn parse_duration(value: Option<&Value>) -> Result<Option<u64>, IngestError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_u64()
            .map(Some)
            .ok_or_else(|| IngestError::InvalidDuration(n.to_string())),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| IngestError::InvalidDuration(s.clone())),
        Some(other) => Err(IngestError::InvalidDuration(other.to_string())),
    }
}

/// Validate raw fields into a queue item
pub fn build_item(
    kind: MediaKind,
    src: Option<String>,
    caption: Option<String>,
    duration: Option<&Value>,
) -> Result<QueueItem, IngestError> {
    let src = src
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or(IngestError::MissingSource)?;
    let duration = parse_duration(duration)?;

    Ok(QueueItem::new(kind, src, caption.unwrap_or_default(), duration))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.scheduler.is_accepting() {
            "ok".to_string()
        } else {
            "stopping".to_string()
        },
        module: "kiosk-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        playing: !state.scheduler.is_idle(),
        queue_length: state.scheduler.pending_len(),
    })
}

/// POST /api/queue - Enqueue an item of either kind
pub async fn enqueue_item(
    State(state): State<AppState>,
    payload: Result<Json<EnqueueRequest>, JsonRejection>,
) -> ApiResult<EnqueueResponse> {
    let Json(req) = payload
        .map_err(|e| IngestError::InvalidBody(e.body_text()).into_rejection())?;

    let kind = req
        .kind
        .as_deref()
        .ok_or_else(|| IngestError::InvalidKind("missing".to_string()))
        .and_then(|kind| {
            kind.parse::<MediaKind>()
                .map_err(|_| IngestError::InvalidKind(kind.to_string()))
        })
        .map_err(IngestError::into_rejection)?;

    let item = build_item(kind, req.src, req.caption, req.duration.as_ref())
        .map_err(IngestError::into_rejection)?;
    enqueue(&state, item)
}

/// POST /api/upload/image-by-link
pub async fn enqueue_image_link(
    State(state): State<AppState>,
    payload: Result<Json<LinkRequest>, JsonRejection>,
) -> ApiResult<EnqueueResponse> {
    enqueue_link(&state, MediaKind::Image, payload)
}

/// POST /api/upload/video-by-link
pub async fn enqueue_video_link(
    State(state): State<AppState>,
    payload: Result<Json<LinkRequest>, JsonRejection>,
) -> ApiResult<EnqueueResponse> {
    enqueue_link(&state, MediaKind::Video, payload)
}

fn enqueue_link(
    state: &AppState,
    kind: MediaKind,
    payload: Result<Json<LinkRequest>, JsonRejection>,
) -> ApiResult<EnqueueResponse> {
    let Json(req) = payload
        .map_err(|e| IngestError::InvalidBody(e.body_text()).into_rejection())?;

    let item = build_item(kind, req.src, req.caption, req.duration.as_ref())
        .map_err(IngestError::into_rejection)?;
    enqueue(state, item)
}

/// POST /api/upload/image-by-file - multipart: `src` file, `caption`, `duration`
pub async fn enqueue_image_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<EnqueueResponse> {
    enqueue_file(&state, MediaKind::Image, multipart).await
}

/// POST /api/upload/video-by-file - multipart: `src` file, `caption`, `duration`
pub async fn enqueue_video_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<EnqueueResponse> {
    enqueue_file(&state, MediaKind::Video, multipart).await
}

/// Fields collected from an upload form
#[derive(Debug, Default)]
struct UploadForm {
    /// Stored file name
    stored: Option<String>,
    caption: Option<String>,
    duration: Option<Value>,
}

async fn enqueue_file(
    state: &AppState,
    kind: MediaKind,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<EnqueueResponse> {
    let mut multipart =
        multipart.map_err(|e| IngestError::InvalidBody(e.body_text()).into_rejection())?;

    let mut form = UploadForm::default();
    let read = read_upload_form(&state.uploads, &mut multipart, &mut form).await;

    let outcome = read.and_then(|()| {
        let stored = form
            .stored
            .as_deref()
            .ok_or_else(|| IngestError::MissingFile.into_rejection())?;
        build_item(
            kind,
            Some(state.uploads.public_src(stored)),
            form.caption.take(),
            form.duration.as_ref(),
        )
        .map_err(IngestError::into_rejection)
    });

    let result = outcome.and_then(|item| enqueue(state, item));
    if result.is_err() {
        // Rejected requests keep no file
        if let Some(stored) = &form.stored {
            discard_upload(&state.uploads, stored).await;
        }
    }
    result
}

async fn read_upload_form(
    uploads: &UploadStore,
    multipart: &mut Multipart,
    form: &mut UploadForm,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let invalid = |e: axum::extract::multipart::MultipartError| {
        IngestError::InvalidBody(e.body_text()).into_rejection()
    };

    while let Some(field) = multipart.next_field().await.map_err(invalid)? {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("src") if field.file_name().is_some() && form.stored.is_none() => {
                let name = UploadStore::file_name_for(field.file_name());
                // Record first so a failed write is still cleaned up
                form.stored = Some(name.clone());
                store_field(uploads, &name, field).await?;
            }
            Some("caption") => form.caption = Some(field.text().await.map_err(invalid)?),
            Some("duration") => {
                form.duration = Some(Value::String(field.text().await.map_err(invalid)?))
            }
            _ => debug!("Ignoring upload form field {:?}", field_name),
        }
    }
    Ok(())
}

/// Stream one file field to disk
async fn store_field(
    uploads: &UploadStore,
    name: &str,
    mut field: Field<'_>,
) -> Result<(), (StatusCode, Json<ErrorResponse>)> {
    let path = uploads.path_for(name);
    let mut file = tokio::fs::File::create(&path)
        .await
        .map_err(|e| internal_error(format!("Failed to create {}: {}", path.display(), e)))?;

    let mut written = 0usize;
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| IngestError::InvalidBody(e.body_text()).into_rejection())?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| internal_error(format!("Failed to write {}: {}", path.display(), e)))?;
        written += chunk.len();
    }
    file.flush()
        .await
        .map_err(|e| internal_error(format!("Failed to write {}: {}", path.display(), e)))?;

    info!("Stored upload {} ({} bytes)", name, written);
    Ok(())
}

async fn discard_upload(uploads: &UploadStore, name: &str) {
    let path = uploads.path_for(name);
    match tokio::fs::remove_file(&path).await {
        Ok(()) => debug!("Discarded upload {}", name),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to discard {}: {}", path.display(), e),
    }
}

fn enqueue(state: &AppState, item: QueueItem) -> ApiResult<EnqueueResponse> {
    match state.scheduler.enqueue(item) {
        Ok(entry) => {
            info!(
                "Enqueued {} {} ({})",
                entry.item.kind(),
                entry.item.source(),
                entry.queue_entry_id
            );
            Ok(Json(EnqueueResponse {
                success: true,
                id: entry.queue_entry_id,
                kind: entry.item.kind(),
                src: entry.item.source().to_string(),
                caption: entry.item.caption().to_string(),
                duration: state.scheduler.delay_policy().applied_duration_ms(&entry.item),
            }))
        }
        Err(Error::ShuttingDown) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse {
                error: Error::ShuttingDown.to_string(),
            }),
        )),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_duration_forms() {
        assert_eq!(parse_duration(None), Ok(None));
        assert_eq!(parse_duration(Some(&json!(null))), Ok(None));
        assert_eq!(parse_duration(Some(&json!(5000))), Ok(Some(5000)));
        assert_eq!(parse_duration(Some(&json!("2500"))), Ok(Some(2500)));
        assert_eq!(parse_duration(Some(&json!(" "))), Ok(None));
        assert_eq!(parse_duration(Some(&json!(0))), Ok(Some(0)));
    }

    #[test]
    fn test_parse_duration_rejects_negative_and_fractional() {
        assert!(parse_duration(Some(&json!(-1))).is_err());
        assert!(parse_duration(Some(&json!(1.5))).is_err());
        assert!(parse_duration(Some(&json!("-20"))).is_err());
        assert!(parse_duration(Some(&json!("abc"))).is_err());
        assert!(parse_duration(Some(&json!([1]))).is_err());
    }

    #[test]
    fn test_build_item_requires_src() {
        assert_eq!(
            build_item(MediaKind::Image, None, None, None),
            Err(IngestError::MissingSource)
        );
        assert_eq!(
            build_item(MediaKind::Image, Some("  ".to_string()), None, None),
            Err(IngestError::MissingSource)
        );
    }

    #[test]
    fn test_build_item_defaults() {
        let item = build_item(MediaKind::Video, Some("b.mp4".to_string()), None, None).unwrap();
        assert_eq!(item.kind(), MediaKind::Video);
        assert_eq!(item.source(), "b.mp4");
        assert_eq!(item.caption(), "");
        assert_eq!(item.requested_duration_ms(), None);
    }
}
