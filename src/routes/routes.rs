//! Defines the HTTP surface of the video hub.
//!
//! ## Structure
//! - `POST /upload-video/` -> store a video, answer with a 24-hour read URL
//! - `POST /add-comment/`  -> classify and store a comment
//! - `GET  /get-comments/` -> list a video's comments, newest first
//! - `GET  /videos/{name}` -> signed playback of locally stored videos
//! - `GET  /healthz`, `GET /readyz` -> probes
//! - `/frontend` -> optional static frontend
//!
//! The API paths also answer without their trailing slash.

use crate::{
    handlers::{
        comment_handlers::{add_comment, get_comments},
        health_handlers::{healthz, readyz},
        video_handlers::{serve_video, upload_video},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use std::path::PathBuf;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

#[derive(Debug, Clone)]
pub struct RouteOptions {
    /// Largest accepted request body, in bytes.
    pub max_body_bytes: usize,

    /// Directory served under `/frontend`, if any.
    pub frontend_dir: Option<PathBuf>,
}

/// Build the router. State is attached by the caller via `with_state`.
pub fn routes(options: &RouteOptions) -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/upload-video/", post(upload_video))
        .route("/upload-video", post(upload_video))
        .route("/add-comment/", post(add_comment))
        .route("/add-comment", post(add_comment))
        .route("/get-comments/", get(get_comments))
        .route("/get-comments", get(get_comments))
        .route("/videos/{name}", get(serve_video));

    if let Some(dir) = &options.frontend_dir {
        router = router.nest_service(
            "/frontend",
            ServeDir::new(dir).append_index_html_on_directories(true),
        );
    }

    router
        .layer(DefaultBodyLimit::max(options.max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
