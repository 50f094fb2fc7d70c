use crate::services::azure_blob::AzureCredentials;
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt, path::PathBuf, str::FromStr};

/// Longest accepted read-URL lifetime: one year.
pub const MAX_URL_TTL_HOURS: i64 = 24 * 365;

/// A value that must not end up in logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(pub String);

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"***\"")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    Local,
    Azure,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "azure" => Ok(Self::Azure),
            other => bail!("unknown storage backend `{}` (expected `local` or `azure`)", other),
        }
    }
}

/// Where uploaded videos go.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local {
        dir: PathBuf,
    },
    Azure {
        credentials: AzureCredentials,
        container: String,
    },
}

/// Text Analytics endpoint used for sentiment scoring.
#[derive(Debug, Clone)]
pub struct SentimentConfig {
    pub endpoint: String,
    pub api_key: Secret,
    pub language: String,
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageConfig,
    /// Base URL clients use to reach this service; prefixes local video links.
    pub public_url: String,
    pub signing_secret: Option<Secret>,
    pub url_ttl_hours: i64,
    pub max_upload_mb: usize,
    pub frontend_dir: Option<PathBuf>,
    /// `None` disables comments.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// `None` tags every comment as `unknown`.
    pub sentiment: Option<SentimentConfig>,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Video upload and comment sentiment API")]
pub struct Args {
    /// Host to bind to (overrides VIDEO_HUB_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides VIDEO_HUB_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Where videos are stored (overrides VIDEO_HUB_STORAGE_BACKEND)
    #[arg(long, value_enum)]
    pub storage_backend: Option<StorageBackend>,

    /// Directory for the local backend (overrides VIDEO_HUB_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,

    /// Public base URL of this service (overrides VIDEO_HUB_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Lifetime of video read URLs in hours (overrides VIDEO_HUB_URL_TTL_HOURS)
    #[arg(long)]
    pub url_ttl_hours: Option<i64>,

    /// Largest accepted upload in MiB (overrides VIDEO_HUB_MAX_UPLOAD_MB)
    #[arg(long)]
    pub max_upload_mb: Option<usize>,

    /// Static frontend served under /frontend (overrides VIDEO_HUB_FRONTEND_DIR)
    #[arg(long)]
    pub frontend_dir: Option<PathBuf>,

    /// Comment database URL (overrides VIDEO_HUB_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Apply the comment schema and exit
    #[arg(long)]
    pub migrate: bool,
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        None => Ok(default),
    }
}

fn non_empty(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        Self::from_sources(args, |key| env::var(key).ok())
    }

    /// Merge CLI args over values found through `lookup`.
    pub fn from_sources(
        args: Args,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(Self, bool)> {
        let host = args
            .host
            .or_else(|| non_empty(&lookup, "VIDEO_HUB_HOST"))
            .unwrap_or_else(|| "0.0.0.0".into());
        let port = match args.port {
            Some(port) => port,
            None => parse_var(&lookup, "VIDEO_HUB_PORT", 8000u16)?,
        };

        let backend = match args.storage_backend {
            Some(backend) => backend,
            None => parse_var(&lookup, "VIDEO_HUB_STORAGE_BACKEND", StorageBackend::Local)?,
        };
        let storage = match backend {
            StorageBackend::Local => StorageConfig::Local {
                dir: args
                    .storage_dir
                    .or_else(|| non_empty(&lookup, "VIDEO_HUB_STORAGE_DIR").map(PathBuf::from))
                    .unwrap_or_else(|| PathBuf::from("./data/videos")),
            },
            StorageBackend::Azure => StorageConfig::Azure {
                credentials: azure_credentials(&lookup)?,
                container: non_empty(&lookup, "AZURE_STORAGE_CONTAINER")
                    .unwrap_or_else(|| "videocontainer".into()),
            },
        };

        let public_url = args
            .public_url
            .or_else(|| non_empty(&lookup, "VIDEO_HUB_PUBLIC_URL"))
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        let url_ttl_hours = match args.url_ttl_hours {
            Some(hours) => hours,
            None => parse_var(&lookup, "VIDEO_HUB_URL_TTL_HOURS", 24i64)?,
        };
        if !(1..=MAX_URL_TTL_HOURS).contains(&url_ttl_hours) {
            bail!(
                "url ttl must be between 1 and {} hours, got {}",
                MAX_URL_TTL_HOURS,
                url_ttl_hours
            );
        }

        let max_upload_mb = match args.max_upload_mb {
            Some(mb) => mb,
            None => parse_var(&lookup, "VIDEO_HUB_MAX_UPLOAD_MB", 1024usize)?,
        };

        let sentiment = match (
            non_empty(&lookup, "AZURE_TEXT_ANALYTICS_ENDPOINT"),
            non_empty(&lookup, "AZURE_TEXT_ANALYTICS_KEY"),
        ) {
            (Some(endpoint), Some(key)) => Some(SentimentConfig {
                endpoint,
                api_key: Secret(key),
                language: non_empty(&lookup, "AZURE_TEXT_ANALYTICS_LANGUAGE")
                    .unwrap_or_else(|| "en".into()),
            }),
            _ => None,
        };

        let cfg = Self {
            host,
            port,
            storage,
            public_url,
            signing_secret: non_empty(&lookup, "VIDEO_HUB_SIGNING_SECRET").map(Secret),
            url_ttl_hours,
            max_upload_mb,
            frontend_dir: args
                .frontend_dir
                .or_else(|| non_empty(&lookup, "VIDEO_HUB_FRONTEND_DIR").map(PathBuf::from)),
            database_url: args
                .database_url
                .or_else(|| non_empty(&lookup, "VIDEO_HUB_DATABASE_URL")),
            db_max_connections: parse_var(&lookup, "VIDEO_HUB_DB_MAX_CONNECTIONS", 5u32)?,
            sentiment,
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// Connection string first, then explicit account name + key.
fn azure_credentials(lookup: &impl Fn(&str) -> Option<String>) -> Result<AzureCredentials> {
    if let Some(conn) = non_empty(lookup, "AZURE_CONNECTION_STRING") {
        return AzureCredentials::from_connection_string(&conn)
            .context("parsing AZURE_CONNECTION_STRING");
    }
    match (
        non_empty(lookup, "AZURE_STORAGE_ACCOUNT_NAME"),
        non_empty(lookup, "AZURE_STORAGE_ACCOUNT_KEY"),
    ) {
        (Some(name), Some(key)) => Ok(AzureCredentials::new(name, key)),
        _ => bail!(
            "azure storage backend needs AZURE_CONNECTION_STRING or \
             AZURE_STORAGE_ACCOUNT_NAME and AZURE_STORAGE_ACCOUNT_KEY"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(cli: &[&str], vars: &[(&str, &str)]) -> Result<(AppConfig, bool)> {
        let args = Args::parse_from(std::iter::once("video-hub").chain(cli.iter().copied()));
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_sources(args, move |key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_degrade_optional_collaborators() {
        let (cfg, migrate) = load(&[], &[]).unwrap();
        assert!(!migrate);
        assert_eq!(cfg.addr(), "0.0.0.0:8000");
        assert_eq!(cfg.public_url, "http://localhost:8000");
        assert_eq!(cfg.url_ttl_hours, 24);
        assert_eq!(cfg.max_upload_bytes(), 1024 * 1024 * 1024);
        assert!(cfg.database_url.is_none());
        assert!(cfg.sentiment.is_none());
        assert!(matches!(cfg.storage, StorageConfig::Local { ref dir } if dir == &PathBuf::from("./data/videos")));
    }

    #[test]
    fn cli_overrides_environment() {
        let (cfg, migrate) = load(
            &["--port", "9000", "--database-url", "sqlite://cli.db", "--migrate"],
            &[
                ("VIDEO_HUB_PORT", "7000"),
                ("VIDEO_HUB_DATABASE_URL", "sqlite://env.db"),
                ("VIDEO_HUB_HOST", "127.0.0.1"),
            ],
        )
        .unwrap();
        assert!(migrate);
        assert_eq!(cfg.addr(), "127.0.0.1:9000");
        assert_eq!(cfg.database_url.as_deref(), Some("sqlite://cli.db"));
    }

    #[test]
    fn invalid_port_is_an_error() {
        let err = load(&[], &[("VIDEO_HUB_PORT", "eighty")]).unwrap_err();
        assert!(format!("{:#}", err).contains("VIDEO_HUB_PORT"));
    }

    #[test]
    fn sentiment_needs_endpoint_and_key() {
        let (cfg, _) = load(&[], &[("AZURE_TEXT_ANALYTICS_ENDPOINT", "https://x")]).unwrap();
        assert!(cfg.sentiment.is_none());

        let (cfg, _) = load(
            &[],
            &[
                ("AZURE_TEXT_ANALYTICS_ENDPOINT", "https://x"),
                ("AZURE_TEXT_ANALYTICS_KEY", "k"),
            ],
        )
        .unwrap();
        let sentiment = cfg.sentiment.unwrap();
        assert_eq!(sentiment.language, "en");
        assert_eq!(format!("{:?}", sentiment.api_key), "\"***\"");
    }

    #[test]
    fn azure_backend_reads_connection_string() {
        let (cfg, _) = load(
            &["--storage-backend", "azure"],
            &[(
                "AZURE_CONNECTION_STRING",
                "DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=a2V5;EndpointSuffix=core.windows.net",
            )],
        )
        .unwrap();
        match cfg.storage {
            StorageConfig::Azure {
                credentials,
                container,
            } => {
                assert_eq!(credentials.account_name, "acct");
                assert_eq!(container, "videocontainer");
            }
            other => panic!("unexpected storage config {:?}", other),
        }
    }

    #[test]
    fn azure_backend_without_credentials_fails() {
        assert!(load(&[], &[("VIDEO_HUB_STORAGE_BACKEND", "azure")]).is_err());
    }

    #[test]
    fn non_positive_ttl_is_rejected() {
        assert!(load(&["--url-ttl-hours", "0"], &[]).is_err());
    }

    #[test]
    fn ttl_is_capped_at_one_year() {
        let (cfg, _) = load(&["--url-ttl-hours", "8760"], &[]).unwrap();
        assert_eq!(cfg.url_ttl_hours, MAX_URL_TTL_HOURS);

        assert!(load(&["--url-ttl-hours", "8761"], &[]).is_err());
        let err = load(&[], &[("VIDEO_HUB_URL_TTL_HOURS", "9223372036854775807")]).unwrap_err();
        assert!(format!("{:#}", err).contains("url ttl"));
    }
}
