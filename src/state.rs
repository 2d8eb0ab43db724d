use std::sync::Arc;

use anyhow::Context;

use crate::config::{AppConfig, StorageConfig};
use crate::meals::repo::{MealRepo, PgMealRepo, SqliteMealRepo};
use crate::meals::services::MealService;
use crate::storage::{LocalStorage, S3Storage, StorageClient};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub storage: Arc<dyn StorageClient>,
    pub meals: Arc<MealService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let repo: Arc<dyn MealRepo> = if config.database_url.starts_with("sqlite:") {
            Arc::new(SqliteMealRepo::connect(&config.database_url).await?)
        } else {
            Arc::new(PgMealRepo::connect(&config.database_url, config.db_max_connections).await?)
        };

        let storage: Arc<dyn StorageClient> = match &config.storage {
            StorageConfig::S3(s3) => Arc::new(S3Storage::new(s3).await.context("init s3 storage")?),
            StorageConfig::Local(local) => Arc::new(LocalStorage::new(local).await?),
        };

        Ok(Self::from_parts(Arc::new(config), storage, repo))
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        storage: Arc<dyn StorageClient>,
        repo: Arc<dyn MealRepo>,
    ) -> Self {
        let meals = Arc::new(MealService::new(storage.clone(), repo, config.store_timeout));
        Self {
            config,
            storage,
            meals,
        }
    }

    #[cfg(test)]
    pub fn for_tests(storage: Arc<dyn StorageClient>, repo: Arc<dyn MealRepo>) -> Self {
        use crate::config::S3Config;
        use std::time::Duration;

        let config = Arc::new(AppConfig {
            listen_addr: ([127, 0, 0, 1], 0).into(),
            database_url: "sqlite::memory:".into(),
            db_max_connections: 1,
            storage: StorageConfig::S3(S3Config {
                bucket: "fake".into(),
                region: "eu-north-1".into(),
                endpoint: None,
                access_key: None,
                secret_key: None,
                public_base_url: None,
                presign_ttl: Duration::from_secs(60),
            }),
            store_timeout: Duration::from_secs(5),
            max_upload_bytes: 1024 * 1024,
        });
        Self::from_parts(config, storage, repo)
    }
}
