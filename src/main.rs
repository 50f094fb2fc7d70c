use anyhow::{Context, Result};
use axum::Router;
use chrono::Duration;
use config::{AppConfig, StorageConfig};
use services::{
    azure_blob::AzureBlobStore,
    blob_store::BlobStore,
    comment_store::{self, CommentStore, ReconnectPolicy},
    local_store::LocalBlobStore,
    sentiment::{SentimentService, TextAnalyticsClient},
    signing::UrlSigner,
};
use std::{io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;

const HTTP_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting video-hub with config: {:?}", cfg);

    if let Some(url) = &cfg.database_url {
        ensure_sqlite_parent_dir(url)?;
    }

    let comments = Arc::new(CommentStore::new(
        cfg.database_url.clone(),
        cfg.db_max_connections,
        ReconnectPolicy::default(),
    ));

    // --- Handle migration mode ---
    if migrate {
        let pool = comments
            .pool()
            .await
            .context("connecting to the comment database")?;
        comment_store::ensure_schema(&pool).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // Connect eagerly so a bad database shows up in the startup log.
    if cfg.database_url.is_none() {
        tracing::warn!("No comment database configured; comments disabled");
    } else if comments.pool().await.is_err() {
        tracing::warn!("Comment database unavailable at startup; comments disabled until it reconnects");
    }

    let http = reqwest::Client::builder()
        .timeout(http_timeout())
        .build()
        .context("building HTTP client")?;

    let sentiment = match &cfg.sentiment {
        Some(sc) => SentimentService::new(Arc::new(TextAnalyticsClient::new(
            http.clone(),
            sc.endpoint.clone(),
            sc.api_key.0.clone(),
            sc.language.clone(),
        ))),
        None => {
            tracing::warn!("Text Analytics not configured; comments will be tagged `unknown`");
            SentimentService::disabled()
        }
    };

    let (blobs, local_videos) = build_blob_store(&cfg).await?;
    tracing::info!("Blob backend ready: {:?}", blobs.kind());

    let state = state::AppState {
        blobs,
        local_videos,
        sentiment,
        comments,
        url_ttl: Duration::hours(cfg.url_ttl_hours),
    };

    // --- Build router ---
    let options = routes::routes::RouteOptions {
        max_body_bytes: cfg.max_upload_bytes(),
        frontend_dir: cfg.frontend_dir.clone(),
    };
    let app: Router = routes::routes::routes(&options).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the configured blob store. The local store is also returned on its
/// own so its playback route can reach it.
async fn build_blob_store(
    cfg: &AppConfig,
) -> Result<(Arc<dyn BlobStore>, Option<Arc<LocalBlobStore>>)> {
    match &cfg.storage {
        StorageConfig::Local { dir } => {
            let secret = match &cfg.signing_secret {
                Some(secret) => secret.0.as_bytes().to_vec(),
                None => {
                    tracing::warn!(
                        "VIDEO_HUB_SIGNING_SECRET not set; video links will not survive a restart"
                    );
                    uuid::Uuid::new_v4().as_bytes().to_vec()
                }
            };
            let store = Arc::new(
                LocalBlobStore::new(dir, cfg.public_url.clone(), UrlSigner::new(secret))
                    .await
                    .with_context(|| format!("preparing storage directory {}", dir.display()))?,
            );
            tracing::info!("Storing videos under {}", dir.display());
            let blobs: Arc<dyn BlobStore> = store.clone();
            Ok((blobs, Some(store)))
        }
        StorageConfig::Azure {
            credentials,
            container,
        } => {
            let store = AzureBlobStore::new(credentials.clone(), container.clone(), http_timeout())?;
            store
                .check_container()
                .await
                .with_context(|| format!("checking blob container `{}`", container))?;
            tracing::info!("Storing videos in blob container {}", container);
            let blobs: Arc<dyn BlobStore> = Arc::new(store);
            Ok((blobs, None))
        }
    }
}

fn http_timeout() -> std::time::Duration {
    std::time::Duration::from_secs(HTTP_TIMEOUT_SECS)
}

/// Create the directory holding a SQLite database file, if it is missing.
fn ensure_sqlite_parent_dir(database_url: &str) -> Result<()> {
    let db_path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();
    if db_path.is_empty() || db_path.starts_with(":memory:") {
        return Ok(());
    }

    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating database directory {:?}", parent))?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    Ok(())
}
