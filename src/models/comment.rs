//! Represents a viewer comment attached to a video.

use crate::models::sentiment::{Sentiment, SentimentLabel};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// The columns of a `comments` row that a listing reads back.
///
/// Sentiment columns are nullable so rows written by older tooling still load.
#[derive(Clone, FromRow, Debug)]
pub struct CommentRow {
    /// Comment body as submitted.
    pub comment_text: String,

    /// Sentiment label, if one was recorded.
    pub sentiment: Option<String>,

    pub positive_score: Option<f64>,
    pub neutral_score: Option<f64>,
    pub negative_score: Option<f64>,

    /// Server-assigned creation time.
    pub created_at: DateTime<Utc>,
}

/// A comment as returned by `GET /get-comments/`.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct Comment {
    pub text: String,
    pub sentiment: SentimentLabel,
    pub positive: f64,
    pub neutral: f64,
    pub negative: f64,
    pub created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            text: row.comment_text,
            sentiment: SentimentLabel::from_column(row.sentiment.as_deref()),
            positive: row.positive_score.unwrap_or(0.0),
            neutral: row.neutral_score.unwrap_or(0.0),
            negative: row.negative_score.unwrap_or(0.0),
            created_at: row.created_at,
        }
    }
}

/// A comment about to be persisted.
#[derive(Clone, Debug)]
pub struct NewComment {
    pub video_name: String,
    pub text: String,
    pub sentiment: Sentiment,
}
