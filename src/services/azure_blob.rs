//! AzureBlobStore: videos in an Azure Storage container, through the
//! `object_store` Azure backend.
//!
//! Uploads are a single put carrying the content settings as blob
//! properties. Read URLs are service SAS links signed locally with the
//! account key.

use crate::{
    models::video::{ContentSettings, SignedUrl},
    services::blob_store::{BackendKind, BlobStore, StorageError, StorageResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use futures::StreamExt;
use http::Method;
use object_store::{
    Attribute, AttributeValue, Attributes, ClientOptions, ObjectStore, PutOptions, PutPayload,
    azure::{MicrosoftAzure, MicrosoftAzureBuilder},
    path::Path,
    signer::Signer,
};
use std::time::Instant;
use tracing::info;

/// Prefix listed by the readiness probe; it matches no uploaded video.
const PROBE_PREFIX: &str = ".readyz";

/// Account name, key and blob endpoint of a storage account.
#[derive(Clone)]
pub struct AzureCredentials {
    pub account_name: String,
    pub account_key: String,
    pub blob_endpoint: String,
}

impl std::fmt::Debug for AzureCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureCredentials")
            .field("account_name", &self.account_name)
            .field("blob_endpoint", &self.blob_endpoint)
            .finish_non_exhaustive()
    }
}

impl AzureCredentials {
    /// Credentials for the public cloud endpoint of `account_name`.
    pub fn new(account_name: impl Into<String>, account_key: impl Into<String>) -> Self {
        let account_name = account_name.into();
        let blob_endpoint = format!("https://{account_name}.blob.core.windows.net");
        Self {
            account_name,
            account_key: account_key.into(),
            blob_endpoint,
        }
    }

    /// Parse a storage connection string such as
    /// `DefaultEndpointsProtocol=https;AccountName=..;AccountKey=..;EndpointSuffix=core.windows.net`.
    ///
    /// An explicit `BlobEndpoint` wins over protocol + suffix.
    pub fn from_connection_string(conn: &str) -> StorageResult<Self> {
        let mut account_name = None;
        let mut account_key = None;
        let mut protocol = "https".to_string();
        let mut suffix = "core.windows.net".to_string();
        let mut blob_endpoint = None;

        for part in conn.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = part.split_once('=') else {
                return Err(StorageError::Config(format!(
                    "connection string segment `{part}` has no `=`"
                )));
            };
            match key {
                "AccountName" => account_name = Some(value.to_string()),
                "AccountKey" => account_key = Some(value.to_string()),
                "DefaultEndpointsProtocol" => protocol = value.to_string(),
                "EndpointSuffix" => suffix = value.to_string(),
                "BlobEndpoint" => blob_endpoint = Some(value.trim_end_matches('/').to_string()),
                _ => {}
            }
        }

        let account_name = account_name.ok_or_else(|| {
            StorageError::Config("connection string is missing AccountName".into())
        })?;
        let account_key = account_key.ok_or_else(|| {
            StorageError::Config("connection string is missing AccountKey".into())
        })?;
        let blob_endpoint = blob_endpoint
            .unwrap_or_else(|| format!("{protocol}://{account_name}.blob.{suffix}"));

        Ok(Self {
            account_name,
            account_key,
            blob_endpoint,
        })
    }
}

#[derive(Debug)]
pub struct AzureBlobStore {
    store: MicrosoftAzure,
    container: String,
}

impl AzureBlobStore {
    /// Build the store for `container`. Fails on a malformed account key or
    /// endpoint; nothing is sent over the network.
    pub fn new(
        credentials: AzureCredentials,
        container: impl Into<String>,
        timeout: std::time::Duration,
    ) -> StorageResult<Self> {
        let container = container.into();
        let endpoint = credentials.blob_endpoint.trim_end_matches('/').to_string();
        let allow_http = endpoint.starts_with("http://");

        let store = MicrosoftAzureBuilder::new()
            .with_account(credentials.account_name)
            .with_access_key(credentials.account_key.trim())
            .with_container_name(container.clone())
            .with_endpoint(endpoint)
            .with_allow_http(allow_http)
            .with_client_options(ClientOptions::new().with_timeout(timeout))
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { store, container })
    }

    /// Fail unless the container exists and the credentials can list it.
    pub async fn check_container(&self) -> StorageResult<()> {
        self.probe().await?;
        info!(container = %self.container, "blob container reachable");
        Ok(())
    }
}

fn blob_attributes(settings: &ContentSettings) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert(
        Attribute::ContentType,
        AttributeValue::from(settings.content_type.clone()),
    );
    attributes.insert(
        Attribute::ContentDisposition,
        AttributeValue::from(settings.content_disposition.clone()),
    );
    attributes
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn put(&self, name: &str, data: Bytes, settings: &ContentSettings) -> StorageResult<()> {
        let start = Instant::now();
        let size = data.len();
        let location = Path::from(name);
        let options = PutOptions {
            attributes: blob_attributes(settings),
            ..Default::default()
        };

        self.store
            .put_opts(&location, PutPayload::from(data), options)
            .await?;

        info!(
            video_name = %name,
            container = %self.container,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "uploaded video to blob storage"
        );
        Ok(())
    }

    async fn signed_read_url(&self, name: &str, ttl: Duration) -> StorageResult<SignedUrl> {
        let expires_in = ttl
            .to_std()
            .map_err(|_| StorageError::Config(format!("negative url ttl {ttl}")))?;
        let now = Utc::now();
        let url = self
            .store
            .signed_url(Method::GET, &Path::from(name), expires_in)
            .await?;

        Ok(SignedUrl {
            url: url.to_string(),
            starts_at: now,
            expires_at: now + ttl,
        })
    }

    /// Lists a prefix nothing is stored under: one request that fails if the
    /// container is missing or the key is rejected.
    async fn probe(&self) -> StorageResult<()> {
        let prefix = Path::from(PROBE_PREFIX);
        match self.store.list(Some(&prefix)).next().await {
            Some(Err(err)) => Err(err.into()),
            _ => Ok(()),
        }
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Azure
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    // base64("test-key")
    const KEY: &str = "dGVzdC1rZXk=";

    fn store(endpoint: &str) -> AzureBlobStore {
        let creds = AzureCredentials {
            account_name: "acct".into(),
            account_key: KEY.into(),
            blob_endpoint: endpoint.into(),
        };
        AzureBlobStore::new(creds, "videocontainer", std::time::Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn parses_public_cloud_connection_string() {
        let creds = AzureCredentials::from_connection_string(
            "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=abc/def==;EndpointSuffix=core.windows.net",
        )
        .unwrap();
        assert_eq!(creds.account_name, "acct");
        assert_eq!(creds.account_key, "abc/def==");
        assert_eq!(creds.blob_endpoint, "https://acct.blob.core.windows.net");
    }

    #[test]
    fn explicit_blob_endpoint_wins() {
        let creds = AzureCredentials::from_connection_string(
            "AccountName=devstoreaccount1;AccountKey=a2V5;BlobEndpoint=http://127.0.0.1:10000/devstoreaccount1/;",
        )
        .unwrap();
        assert_eq!(creds.blob_endpoint, "http://127.0.0.1:10000/devstoreaccount1");
    }

    #[test]
    fn connection_string_without_key_is_rejected() {
        let err = AzureCredentials::from_connection_string("AccountName=acct").unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn invalid_account_key_is_rejected() {
        let creds = AzureCredentials::new("acct", "not base64!");
        let err =
            AzureBlobStore::new(creds, "c", std::time::Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, StorageError::Config(_)));
    }

    #[test]
    fn content_settings_become_blob_properties() {
        let attributes = blob_attributes(&ContentSettings::inline_video());
        assert_eq!(
            attributes.get(&Attribute::ContentType).map(AsRef::<str>::as_ref),
            Some("video/mp4")
        );
        assert_eq!(
            attributes.get(&Attribute::ContentDisposition).map(AsRef::<str>::as_ref),
            Some("inline")
        );
    }

    #[tokio::test]
    async fn read_url_is_a_read_only_sas_for_the_blob() {
        let store = store("https://acct.blob.core.windows.net");
        let signed = store
            .signed_read_url("clip.mp4", Duration::hours(24))
            .await
            .unwrap();

        assert!(
            signed
                .url
                .starts_with("https://acct.blob.core.windows.net/videocontainer/clip.mp4?")
        );
        assert!(signed.url.contains("sp=r"));
        assert!(signed.url.contains("sig="));
        assert_eq!(signed.expires_at - signed.starts_at, Duration::hours(24));
    }

    #[tokio::test]
    async fn put_sends_block_blob_with_content_settings() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/acct/videocontainer/clip.mp4")
            .match_query(Matcher::Any)
            .match_header("x-ms-blob-type", "BlockBlob")
            .match_header("x-ms-blob-content-type", "video/mp4")
            .match_header("x-ms-blob-content-disposition", "inline")
            .match_body("payload")
            .with_status(201)
            .with_header("etag", "\"0x8DC0000000000\"")
            .create_async()
            .await;

        let store = store(&format!("{}/acct", server.url()));
        store
            .put("clip.mp4", Bytes::from_static(b"payload"), &ContentSettings::inline_video())
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn put_surfaces_service_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PUT", "/acct/videocontainer/clip.mp4")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("AuthenticationFailed")
            .create_async()
            .await;

        let store = store(&format!("{}/acct", server.url()));
        let err = store
            .put("clip.mp4", Bytes::from_static(b"x"), &ContentSettings::inline_video())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ObjectStore(_)), "{err:?}");
    }

    #[tokio::test]
    async fn missing_container_fails_the_check() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/acct/videocontainer")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body("ContainerNotFound")
            .create_async()
            .await;

        let store = store(&format!("{}/acct", server.url()));
        assert!(store.check_container().await.is_err());
    }
}
