//! HTTP handlers for video upload and signed playback.

use crate::{
    errors::AppError,
    models::video::StoredVideo,
    services::{blob_store::store_video, signing::UrlSignature},
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use serde::Deserialize;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

/// Multipart field carrying the video.
const FILE_FIELD: &str = "file";

/// Used when the multipart part carries no filename.
const DEFAULT_UPLOAD_NAME: &str = "video";

/// `POST /upload-video/`
///
/// Stores the `file` part and answers with a 24-hour read URL. Storage
/// failures are the one error that surfaces as an HTTP 500.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<StoredVideo>, AppError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }
        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_UPLOAD_NAME)
            .to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::new(e.status(), e.body_text()))?;
        upload = Some((filename, data));
        break;
    }

    let Some((filename, data)) = upload else {
        return Err(AppError::unprocessable(format!(
            "multipart field `{FILE_FIELD}` is required"
        )));
    };

    let size = data.len();
    let stored = store_video(state.blobs.as_ref(), &filename, data, state.url_ttl)
        .await
        .map_err(|err| {
            warn!(error = %err, filename = %filename, "video upload failed");
            AppError::internal(err.to_string())
        })?;

    info!(
        video_name = %stored.video_name,
        size_bytes = size,
        "video uploaded"
    );
    Ok(Json(stored))
}

/// Signature parameters of a playback URL.
#[derive(Debug, Deserialize)]
pub struct PlaybackQuery {
    pub st: Option<i64>,
    pub se: Option<i64>,
    pub sig: Option<String>,
}

impl PlaybackQuery {
    fn signature(self) -> Option<UrlSignature> {
        Some(UrlSignature {
            starts_at: self.st?,
            expires_at: self.se?,
            sig: self.sig?,
        })
    }
}

/// `GET /videos/{name}`: stream a locally stored video to a holder of a
/// valid signed URL.
pub async fn serve_video(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(query): Query<PlaybackQuery>,
) -> Result<Response, AppError> {
    let Some(store) = state.local_videos.as_ref() else {
        return Err(AppError::new(StatusCode::NOT_FOUND, "videos are not served by this host"));
    };
    let Some(signature) = query.signature() else {
        return Err(AppError::new(StatusCode::FORBIDDEN, "missing url signature"));
    };

    let blob = store.open_signed(&name, &signature, Utc::now()).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(&blob.settings.content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream")),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&blob.settings.content_disposition)
            .unwrap_or_else(|_| HeaderValue::from_static("inline")),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(blob.size_bytes));

    let mut response = Response::new(Body::from_stream(ReaderStream::new(blob.file)));
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = headers;
    Ok(response)
}
