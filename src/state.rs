//! Shared state handed to every handler.

use crate::services::{
    blob_store::BlobStore, comment_store::CommentStore, local_store::LocalBlobStore,
    sentiment::SentimentService,
};
use chrono::Duration;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    /// Where uploads go.
    pub blobs: Arc<dyn BlobStore>,

    /// Set when videos are kept on local disk and served by this process.
    pub local_videos: Option<Arc<LocalBlobStore>>,

    pub sentiment: SentimentService,
    pub comments: Arc<CommentStore>,

    /// Lifetime of the read URL returned by an upload.
    pub url_ttl: Duration,
}
