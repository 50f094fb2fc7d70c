//! HTTP handlers for submitting and listing comments.
//!
//! Both endpoints always answer 200: database trouble is reported in an
//! `error` field of the JSON body.

use crate::{
    models::{
        comment::{Comment, NewComment},
        sentiment::SentimentLabel,
    },
    state::AppState,
};
use axum::{
    Form, Json,
    extract::{Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct AddCommentForm {
    pub video_name: String,
    pub comment_text: String,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum AddCommentResponse {
    Added {
        status: &'static str,
        sentiment: SentimentLabel,
    },
    Failed {
        error: String,
    },
}

#[derive(Debug, Deserialize)]
pub struct GetCommentsQuery {
    pub video_name: String,
}

#[derive(Debug, Serialize)]
pub struct GetCommentsResponse {
    pub comments: Vec<Comment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `POST /add-comment/`
///
/// Checks the database first so an outage does not cost a classifier call,
/// then classifies the text and stores the comment.
pub async fn add_comment(
    State(state): State<AppState>,
    Form(form): Form<AddCommentForm>,
) -> Json<AddCommentResponse> {
    if let Err(err) = state.comments.pool().await {
        return Json(AddCommentResponse::Failed {
            error: err.to_string(),
        });
    }

    let sentiment = state.sentiment.classify(&form.comment_text).await;
    let comment = NewComment {
        video_name: form.video_name,
        text: form.comment_text,
        sentiment,
    };

    match state.comments.append(&comment).await {
        Ok(()) => {
            info!(
                video_name = %comment.video_name,
                sentiment = %sentiment.label,
                "comment added"
            );
            Json(AddCommentResponse::Added {
                status: "Comment added",
                sentiment: sentiment.label,
            })
        }
        Err(err) => {
            warn!(error = %err, video_name = %comment.video_name, "comment insert failed");
            Json(AddCommentResponse::Failed {
                error: err.to_string(),
            })
        }
    }
}

/// `GET /get-comments/?video_name=...`: newest first.
pub async fn get_comments(
    State(state): State<AppState>,
    Query(query): Query<GetCommentsQuery>,
) -> Json<GetCommentsResponse> {
    match state.comments.list(&query.video_name).await {
        Ok(comments) => Json(GetCommentsResponse {
            comments,
            error: None,
        }),
        Err(err) => {
            warn!(error = %err, video_name = %query.video_name, "listing comments failed");
            Json(GetCommentsResponse {
                comments: Vec::new(),
                error: Some(err.to_string()),
            })
        }
    }
}
