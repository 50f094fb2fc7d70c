//! Storage abstraction for video payloads.
//!
//! Backends own durability and URL signing; the HTTP layer only sees this
//! trait.

use crate::{
    models::video::{ContentSettings, SignedUrl, StoredVideo, normalize_video_name},
    services::signing::SignatureError,
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Duration;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("invalid blob name `{0}`")]
    InvalidName(String),
    #[error("blob `{0}` not found")]
    NotFound(String),
    #[error("access denied: {0}")]
    Signature(#[from] SignatureError),
    #[error("blob storage request failed: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("storage misconfigured: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Which backend a `BlobStore` talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Azure,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `name`, replacing any existing blob of that name.
    async fn put(&self, name: &str, data: Bytes, settings: &ContentSettings) -> StorageResult<()>;

    /// Issue a read-only URL for `name`, valid from now for `ttl`.
    async fn signed_read_url(&self, name: &str, ttl: Duration) -> StorageResult<SignedUrl>;

    /// Cheap round-trip used by the readiness probe.
    async fn probe(&self) -> StorageResult<()>;

    fn kind(&self) -> BackendKind;
}

/// Normalize `filename`, store `data` under it as an inline video and return
/// a read URL valid for `ttl`.
pub async fn store_video(
    store: &dyn BlobStore,
    filename: &str,
    data: Bytes,
    ttl: Duration,
) -> StorageResult<StoredVideo> {
    let name = normalize_video_name(filename);
    store
        .put(&name, data, &ContentSettings::inline_video())
        .await?;
    let signed = store.signed_read_url(&name, ttl).await?;

    Ok(StoredVideo {
        video_url: signed.url,
        video_name: name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{local_store::LocalBlobStore, signing::UrlSigner};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Records calls instead of storing anything.
    #[derive(Default)]
    struct RecordingStore {
        puts: Mutex<Vec<(String, ContentSettings)>>,
        fail: bool,
    }

    #[async_trait]
    impl BlobStore for RecordingStore {
        async fn put(&self, name: &str, _data: Bytes, settings: &ContentSettings) -> StorageResult<()> {
            if self.fail {
                return Err(StorageError::Config("store is read-only".into()));
            }
            self.puts
                .lock()
                .unwrap()
                .push((name.to_string(), settings.clone()));
            Ok(())
        }

        async fn signed_read_url(&self, name: &str, ttl: Duration) -> StorageResult<SignedUrl> {
            let now = chrono::Utc::now();
            Ok(SignedUrl {
                url: format!("memory://{name}"),
                starts_at: now,
                expires_at: now + ttl,
            })
        }

        async fn probe(&self) -> StorageResult<()> {
            Ok(())
        }

        fn kind(&self) -> BackendKind {
            BackendKind::Local
        }
    }

    #[tokio::test]
    async fn stores_under_normalized_name_as_inline_video() {
        let store = RecordingStore::default();
        let stored = store_video(&store, "holiday.MOV", Bytes::from_static(b"x"), Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(stored.video_name, "holiday.mp4");
        assert_eq!(stored.video_url, "memory://holiday.mp4");
        let puts = store.puts.lock().unwrap();
        assert_eq!(
            puts.as_slice(),
            &[("holiday.mp4".to_string(), ContentSettings::inline_video())]
        );
    }

    #[tokio::test]
    async fn storage_failure_is_returned() {
        let store = RecordingStore {
            fail: true,
            ..RecordingStore::default()
        };
        let result = store_video(&store, "a.mp4", Bytes::new(), Duration::hours(24)).await;
        assert!(matches!(result, Err(StorageError::Config(_))));
    }

    #[tokio::test]
    async fn same_name_uploads_overwrite_on_disk() {
        let dir = tempdir().unwrap();
        let store = LocalBlobStore::new(dir.path(), "http://localhost", UrlSigner::new(b"k".to_vec()))
            .await
            .unwrap();

        let first = store_video(&store, "clip.avi", Bytes::from_static(b"one"), Duration::hours(24))
            .await
            .unwrap();
        let second = store_video(&store, "clip.mkv", Bytes::from_static(b"two"), Duration::hours(24))
            .await
            .unwrap();

        assert_eq!(first.video_name, second.video_name);
        assert_eq!(std::fs::read(dir.path().join("objects").join("clip.mp4")).unwrap(), b"two");
    }
}
