//! LocalBlobStore: videos on local disk, served back by this process through
//! HMAC-signed URLs.
//!
//! Layout under `base_path`:
//! - `objects/{name}`: the payloads
//! - `props/{name}.json`: the content settings each payload was uploaded with
//! - `tmp/`: in-flight writes and readiness scratch files
//!
//! Only `objects/` is addressable by blob names, so any single path segment
//! is a valid name.

use crate::{
    models::video::{ContentSettings, SignedUrl},
    services::{
        blob_store::{BackendKind, BlobStore, StorageError, StorageResult},
        signing::{UrlSignature, UrlSigner},
    },
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    time::Instant,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

const MAX_NAME_LEN: usize = 1024;
const OBJECTS_DIR: &str = "objects";
const PROPS_DIR: &str = "props";
const TMP_DIR: &str = "tmp";

#[derive(Clone, Debug)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    public_url: String,
    signer: UrlSigner,
}

/// An opened blob ready to be streamed out.
#[derive(Debug)]
pub struct OpenedBlob {
    pub file: File,
    pub size_bytes: u64,
    pub settings: ContentSettings,
}

impl LocalBlobStore {
    /// Create the store, making sure its directories exist.
    pub async fn new(
        base_path: impl Into<PathBuf>,
        public_url: impl Into<String>,
        signer: UrlSigner,
    ) -> StorageResult<Self> {
        let base_path = base_path.into();
        for dir in [OBJECTS_DIR, PROPS_DIR, TMP_DIR] {
            fs::create_dir_all(base_path.join(dir)).await?;
        }
        Ok(Self {
            base_path,
            public_url: public_url.into().trim_end_matches('/').to_string(),
            signer,
        })
    }

    /// A name must be exactly one path segment inside `objects/`.
    fn ensure_name_safe(name: &str) -> StorageResult<()> {
        let invalid = name.is_empty()
            || name.len() > MAX_NAME_LEN
            || name == "."
            || name == ".."
            || name
                .bytes()
                .any(|b| b.is_ascii_control() || b == b'/' || b == b'\\');
        if invalid {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    fn blob_path(&self, name: &str) -> PathBuf {
        self.base_path.join(OBJECTS_DIR).join(name)
    }

    fn tmp_path(&self, prefix: &str) -> PathBuf {
        self.base_path
            .join(TMP_DIR)
            .join(format!("{prefix}-{}", Uuid::new_v4()))
    }

    fn props_path(&self, name: &str) -> PathBuf {
        self.base_path.join(PROPS_DIR).join(format!("{name}.json"))
    }

    /// Write `bytes` to `dest` through a file in `tmp/`: write, fsync, rename.
    async fn write_atomic(&self, dest: &Path, bytes: &[u8]) -> StorageResult<()> {
        let tmp_path = self.tmp_path("write");

        let result: io::Result<()> = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, dest).await
        }
        .await;

        if let Err(err) = result {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        Ok(())
    }

    async fn read_settings(&self, name: &str) -> StorageResult<ContentSettings> {
        match fs::read(self.props_path(name)).await {
            Ok(raw) => Ok(serde_json::from_slice(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(ContentSettings::inline_video()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    /// Open a blob for reading after checking its URL signature at `now`.
    pub async fn open_signed(
        &self,
        name: &str,
        signature: &UrlSignature,
        now: DateTime<Utc>,
    ) -> StorageResult<OpenedBlob> {
        Self::ensure_name_safe(name)?;
        self.signer.verify(name, signature, now)?;

        let file = File::open(self.blob_path(name)).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::NotFound(name.to_string())
            } else {
                StorageError::Io(err)
            }
        })?;
        let size_bytes = file.metadata().await?.len();
        let settings = self.read_settings(name).await?;

        Ok(OpenedBlob {
            file,
            size_bytes,
            settings,
        })
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, name: &str, data: Bytes, settings: &ContentSettings) -> StorageResult<()> {
        Self::ensure_name_safe(name)?;
        let start = Instant::now();

        let props = serde_json::to_vec(settings)?;
        self.write_atomic(&self.props_path(name), &props).await?;
        self.write_atomic(&self.blob_path(name), &data).await?;

        info!(
            video_name = %name,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "stored video on local disk"
        );
        Ok(())
    }

    async fn signed_read_url(&self, name: &str, ttl: Duration) -> StorageResult<SignedUrl> {
        Self::ensure_name_safe(name)?;
        let now = Utc::now();
        let signature = self.signer.sign(name, now, ttl);

        let url = format!(
            "{}/videos/{}?{}",
            self.public_url,
            urlencoding::encode(name),
            signature.to_query()
        );
        debug!(video_name = %name, expires_at = signature.expires_at, "signed local read url");

        Ok(SignedUrl {
            url,
            starts_at: now,
            expires_at: now + ttl,
        })
    }

    /// Write, read back and delete a scratch file under `tmp/`.
    async fn probe(&self) -> StorageResult<()> {
        let tmp_path = self.tmp_path("readyz");
        fs::write(&tmp_path, b"readyz").await?;
        let read_back = fs::read(&tmp_path).await;
        let _ = fs::remove_file(&tmp_path).await;
        if read_back? != b"readyz" {
            return Err(StorageError::Io(io::Error::new(
                ErrorKind::InvalidData,
                "probe file content mismatch",
            )));
        }
        Ok(())
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }
}
