use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use uuid::Uuid;

use crate::config::{LocalStorageConfig, S3Config};

/// Binary object store for meal images.
#[async_trait]
pub trait StorageClient: Send + Sync {
    /// Writes `body` under `key`, replacing any existing object.
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    /// URL the presentation layer can fetch the object from.
    async fn object_url(&self, key: &str) -> anyhow::Result<String>;
}

fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key)
}

#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_base_url: Option<String>,
    presign_ttl: Duration,
}

impl S3Storage {
    pub async fn new(cfg: &S3Config) -> anyhow::Result<Self> {
        let mut loader = defaults(BehaviorVersion::latest()).region(Region::new(cfg.region.clone()));
        if let (Some(access_key), Some(secret_key)) = (&cfg.access_key, &cfg.secret_key) {
            loader = loader.credentials_provider(Credentials::new(
                access_key, secret_key, None, None, "static",
            ));
        }
        let shared = loader.load().await;

        let mut conf = S3ConfigBuilder::from(&shared);
        if let Some(endpoint) = &cfg.endpoint {
            // MinIO and friends
            conf = conf.endpoint_url(endpoint).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(conf.build()),
            bucket: cfg.bucket.clone(),
            public_base_url: cfg.public_base_url.clone(),
            presign_ttl: cfg.presign_ttl,
        })
    }
}

#[async_trait]
impl StorageClient for S3Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type)
            .send()
            .await
            .with_context(|| format!("s3 put_object {key}"))?;
        Ok(())
    }

    async fn object_url(&self, key: &str) -> anyhow::Result<String> {
        if let Some(base) = &self.public_base_url {
            return Ok(join_url(base, key));
        }
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(PresigningConfig::expires_in(self.presign_ttl)?)
            .await
            .with_context(|| format!("s3 presign_get {key}"))?;
        Ok(presigned.uri().to_string())
    }
}

/// Stores objects as flat files under `root`.
#[derive(Clone)]
pub struct LocalStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub async fn new(cfg: &LocalStorageConfig) -> anyhow::Result<Self> {
        fs::create_dir_all(&cfg.root)
            .await
            .with_context(|| format!("create storage dir {}", cfg.root.display()))?;
        Ok(Self {
            root: cfg.root.clone(),
            public_base_url: cfg.public_base_url.clone(),
        })
    }

    /// Keys are single file names; anything that could leave `root` is refused.
    fn key_path(&self, key: &str) -> anyhow::Result<PathBuf> {
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) if !key.contains(['/', '\\']) => {
                Ok(self.root.join(key))
            }
            _ => anyhow::bail!("invalid object key: {key:?}"),
        }
    }
}

async fn write_synced(path: &Path, body: &[u8]) -> anyhow::Result<()> {
    let mut file = fs::File::create(path)
        .await
        .with_context(|| format!("create {}", path.display()))?;
    file.write_all(body)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    file.sync_all()
        .await
        .with_context(|| format!("sync {}", path.display()))?;
    Ok(())
}

#[async_trait]
impl StorageClient for LocalStorage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        let path = self.key_path(key)?;
        // unique per writer so concurrent puts of one key never share a temp file
        let partial = self.root.join(format!(".{key}.{}.partial", Uuid::new_v4()));

        let result = async {
            write_synced(&partial, &body).await?;
            fs::rename(&partial, &path)
                .await
                .with_context(|| format!("rename into {}", path.display()))
        }
        .await;
        if result.is_err() {
            let _ = fs::remove_file(&partial).await;
        }
        result?;

        debug!(%key, content_type, bytes = body.len(), "stored object on disk");
        Ok(())
    }

    async fn object_url(&self, key: &str) -> anyhow::Result<String> {
        self.key_path(key)?;
        Ok(join_url(&self.public_base_url, key))
    }
}
