//! CommentStore: persistence for viewer comments on top of a SQLite pool.
//!
//! The pool is owned by the store and shared by all requests; each operation
//! acquires one pooled connection and hands it back when the guard drops.
//!
//! Connection policy: the store tries to connect at startup. While it has no
//! pool, every operation may attempt a reconnect, but attempts are spaced by
//! an exponential backoff. Inside the backoff window operations fail fast
//! with `CommentStoreError::Unavailable`.

use crate::models::comment::{Comment, CommentRow, NewComment};
use backoff::{ExponentialBackoff, backoff::Backoff};
use chrono::{SecondsFormat, Utc};
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{str::FromStr, time::Duration};
use thiserror::Error;
use tokio::{sync::Mutex, time::Instant};
use tracing::{debug, info, warn};

/// Schema applied on every successful (re)connect.
pub const SCHEMA_SQL: &str = include_str!("../../migrations/0001_init.sql");

pub const NOT_CONNECTED: &str = "SQL Database not connected.";

#[derive(Debug, Error)]
pub enum CommentStoreError {
    #[error("{0}")]
    Unavailable(String),
    #[error("failed to store comment: {0}")]
    WriteFailed(#[source] sqlx::Error),
    #[error("failed to load comments: {0}")]
    ReadFailed(#[source] sqlx::Error),
}

pub type CommentStoreResult<T> = Result<T, CommentStoreError>;

/// Bounds of the exponential backoff between reconnect attempts.
#[derive(Debug, Clone, Copy)]
pub struct ReconnectPolicy {
    pub initial: Duration,
    pub max: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(60),
        }
    }
}

impl ReconnectPolicy {
    /// A doubling, unjittered backoff that never gives up.
    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.initial,
            initial_interval: self.initial,
            randomization_factor: 0.0,
            multiplier: 2.0,
            max_interval: self.max,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Snapshot of the store's connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreStatus {
    pub configured: bool,
    pub connected: bool,
    pub consecutive_failures: u32,
}

struct ConnState {
    pool: Option<SqlitePool>,
    failures: u32,
    retry_at: Option<Instant>,
    backoff: ExponentialBackoff,
}

pub struct CommentStore {
    database_url: Option<String>,
    max_connections: u32,
    policy: ReconnectPolicy,
    state: Mutex<ConnState>,
}

impl std::fmt::Debug for CommentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommentStore")
            .field("configured", &self.database_url.is_some())
            .field("max_connections", &self.max_connections)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl CommentStore {
    /// A store that connects lazily to `database_url`. `None` disables
    /// comments entirely.
    pub fn new(database_url: Option<String>, max_connections: u32, policy: ReconnectPolicy) -> Self {
        Self {
            database_url,
            max_connections: max_connections.max(1),
            policy,
            state: Mutex::new(ConnState {
                pool: None,
                failures: 0,
                retry_at: None,
                backoff: policy.backoff(),
            }),
        }
    }

    pub async fn status(&self) -> StoreStatus {
        let state = self.state.lock().await;
        StoreStatus {
            configured: self.database_url.is_some() || state.pool.is_some(),
            connected: state.pool.is_some(),
            consecutive_failures: state.failures,
        }
    }

    /// Return the pool, reconnecting first if allowed by the backoff.
    pub async fn pool(&self) -> CommentStoreResult<SqlitePool> {
        let mut state = self.state.lock().await;
        if let Some(pool) = &state.pool {
            return Ok(pool.clone());
        }

        let Some(url) = self.database_url.as_deref() else {
            return Err(CommentStoreError::Unavailable(NOT_CONNECTED.into()));
        };

        if let Some(retry_at) = state.retry_at {
            if Instant::now() < retry_at {
                debug!("database reconnect suppressed by backoff");
                return Err(CommentStoreError::Unavailable(NOT_CONNECTED.into()));
            }
        }

        match self.open(url).await {
            Ok(pool) => {
                info!("connected to comment database");
                state.pool = Some(pool.clone());
                state.failures = 0;
                state.retry_at = None;
                state.backoff.reset();
                Ok(pool)
            }
            Err(err) => {
                state.failures += 1;
                let delay = state.backoff.next_backoff().unwrap_or(self.policy.max);
                state.retry_at = Some(Instant::now() + delay);
                warn!(
                    error = %err,
                    failures = state.failures,
                    retry_in_ms = delay.as_millis() as u64,
                    "could not connect to comment database, comments disabled"
                );
                Err(CommentStoreError::Unavailable(NOT_CONNECTED.into()))
            }
        }
    }

    async fn open(&self, url: &str) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(options)
            .await?;
        ensure_schema(&pool).await?;
        Ok(pool)
    }

    /// Insert one comment, stamped with the current UTC time.
    pub async fn append(&self, comment: &NewComment) -> CommentStoreResult<()> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await.map_err(CommentStoreError::WriteFailed)?;

        let created_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
        sqlx::query(
            "INSERT INTO comments (
                video_name, comment_text, sentiment,
                positive_score, neutral_score, negative_score, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&comment.video_name)
        .bind(&comment.text)
        .bind(comment.sentiment.label.as_str())
        .bind(comment.sentiment.positive)
        .bind(comment.sentiment.neutral)
        .bind(comment.sentiment.negative)
        .bind(created_at)
        .execute(&mut *conn)
        .await
        .map_err(CommentStoreError::WriteFailed)?;

        debug!(video_name = %comment.video_name, "stored comment");
        Ok(())
    }

    /// All comments for `video_name`, newest first.
    pub async fn list(&self, video_name: &str) -> CommentStoreResult<Vec<Comment>> {
        let pool = self.pool().await?;
        let mut conn = pool.acquire().await.map_err(CommentStoreError::ReadFailed)?;

        let rows = sqlx::query_as::<_, CommentRow>(
            "SELECT comment_text, sentiment,
                    positive_score, neutral_score, negative_score, created_at
             FROM comments
             WHERE video_name = ?
             ORDER BY created_at DESC, id DESC",
        )
        .bind(video_name)
        .fetch_all(&mut *conn)
        .await
        .map_err(CommentStoreError::ReadFailed)?;

        Ok(rows.into_iter().map(Comment::from).collect())
    }

    /// Round-trip `SELECT 1` for the readiness probe.
    pub async fn ping(&self) -> CommentStoreResult<()> {
        let pool = self.pool().await?;
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&pool)
            .await
            .map(|_| ())
            .map_err(CommentStoreError::ReadFailed)
    }
}

/// Apply the embedded schema statement by statement.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let statements = SCHEMA_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty());

    for stmt in statements {
        debug!("executing schema SQL: {}", stmt);
        sqlx::query(stmt).execute(pool).await?;
    }
    Ok(())
}
