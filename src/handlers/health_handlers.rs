//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the comment database and blob storage

use crate::{services::comment_store::CommentStoreError, state::AppState};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;

/// `GET /healthz`
///
/// Very small liveness probe, never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// 1. Runs `SELECT 1` through the comment store, reconnecting if the backoff
///    allows. An unconfigured database counts as ready: comments are simply
///    disabled.
/// 2. Asks the blob store for a round-trip (scratch file on disk, or a
///    container lookup in the cloud).
///
/// HTTP 200 when every check passes, HTTP 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let configured = state.comments.status().await.configured;
    let database = match state.comments.ping().await {
        Ok(()) => CheckStatus::ok(),
        Err(CommentStoreError::Unavailable(_)) if !configured => CheckStatus {
            ok: true,
            error: Some("not configured, comments disabled".into()),
        },
        Err(err) => CheckStatus::failed(err.to_string()),
    };

    let storage = match state.blobs.probe().await {
        Ok(()) => CheckStatus::ok(),
        Err(err) => CheckStatus::failed(err.to_string()),
    };

    let overall_ok = database.ok && storage.ok;
    let mut checks = HashMap::new();
    checks.insert("database", database);
    checks.insert("storage", storage);

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };
    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}
