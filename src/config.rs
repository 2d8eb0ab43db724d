use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub public_base_url: Option<String>,
    pub presign_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct LocalStorageConfig {
    pub root: PathBuf,
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub enum StorageConfig {
    S3(S3Config),
    Local(LocalStorageConfig),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub listen_addr: SocketAddr,
    pub database_url: String,
    pub db_max_connections: u32,
    pub storage: StorageConfig,
    pub store_timeout: Duration,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = var("APP_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse_or(&var, "APP_PORT", 8080)?;
        let listen_addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("invalid APP_HOST {host:?}"))?;

        let database_url = var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let storage = match var("STORAGE_BACKEND").as_deref().unwrap_or("s3") {
            "s3" => StorageConfig::S3(S3Config {
                bucket: var("S3_BUCKET").context("S3_BUCKET must be set for the s3 backend")?,
                region: var("S3_REGION").unwrap_or_else(|| "eu-north-1".into()),
                endpoint: var("S3_ENDPOINT"),
                access_key: var("S3_ACCESS_KEY"),
                secret_key: var("S3_SECRET_KEY"),
                public_base_url: var("S3_PUBLIC_BASE_URL"),
                presign_ttl: Duration::from_secs(parse_or(&var, "PRESIGN_TTL_SECS", 600)?),
            }),
            "local" => StorageConfig::Local(LocalStorageConfig {
                root: var("STORAGE_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("public/images")),
                public_base_url: var("PUBLIC_IMAGE_BASE_URL").unwrap_or_else(|| "/images".into()),
            }),
            other => anyhow::bail!("unknown STORAGE_BACKEND {other:?} (expected s3 or local)"),
        };

        Ok(Self {
            listen_addr,
            database_url,
            db_max_connections: parse_or(&var, "DB_MAX_CONNECTIONS", 10)?,
            storage,
            store_timeout: Duration::from_secs(parse_or(&var, "STORE_TIMEOUT_SECS", 30)?),
            max_upload_bytes: parse_or(&var, "MAX_UPLOAD_BYTES", 10 * 1024 * 1024)?,
        })
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
