use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

use super::dto::MealSubmission;
use super::error::{RepoError, SubmitError};
use super::repo::MealRepo;
use super::repo_types::MealRecord;
use super::sanitize::sanitize;
use super::slug::{derive_identifier, object_key};
use super::validate::{validate, ValidationError};
use crate::storage::StorageClient;

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Runs the submission pipeline and the read queries over injected stores.
pub struct MealService {
    storage: Arc<dyn StorageClient>,
    repo: Arc<dyn MealRepo>,
    timeout: Duration,
}

impl MealService {
    pub fn new(storage: Arc<dyn StorageClient>, repo: Arc<dyn MealRepo>, timeout: Duration) -> Self {
        Self {
            storage,
            repo,
            timeout,
        }
    }

    pub fn repo(&self) -> &Arc<dyn MealRepo> {
        &self.repo
    }

    async fn bounded_repo<T, F>(&self, fut: F) -> Result<T, RepoError>
    where
        F: Future<Output = Result<T, RepoError>>,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| RepoError::Timeout(self.timeout))?
    }

    /// Validate, sanitize, derive the identifier, store the image, then insert
    /// the record. The image is always written before the row that points at
    /// it; a failed insert leaves the image behind and is reported as such.
    #[instrument(skip(self, submission), fields(title = %submission.title))]
    pub async fn submit(&self, submission: MealSubmission) -> Result<String, SubmitError> {
        validate(&submission)?;
        let Some(image) = submission.image else {
            return Err(ValidationError::MissingImage.into());
        };

        let instructions = sanitize(submission.instructions.trim());

        let slug = derive_identifier(&submission.title);
        if slug.is_empty() {
            return Err(SubmitError::EmptyIdentifier);
        }
        let key = object_key(&slug, &image.file_name).ok_or(SubmitError::InvalidExtension)?;

        // Fail fast so an existing meal's image is never overwritten. The
        // unique index on insert still decides concurrent races.
        if self.bounded_repo(self.repo.get_by_slug(&slug)).await?.is_some() {
            warn!(%slug, "meal identifier already taken");
            return Err(SubmitError::DuplicateIdentifier(slug));
        }

        let content_type = image
            .content_type
            .as_deref()
            .filter(|ct| !ct.trim().is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        let size = image.bytes.len();
        match tokio::time::timeout(
            self.timeout,
            self.storage.put_object(&key, image.bytes, content_type),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let reason = format!("{e:#}");
                error!(error = %reason, %key, "image upload failed");
                return Err(SubmitError::ObjectStore(e));
            }
            Err(_) => {
                error!(%key, timeout = ?self.timeout, "image upload timed out");
                return Err(SubmitError::ObjectStoreTimeout(self.timeout));
            }
        }

        let record = MealRecord {
            slug,
            title: submission.title.trim().to_string(),
            summary: submission.summary.trim().to_string(),
            instructions,
            image: key,
            creator: submission.creator.trim().to_string(),
            creator_email: submission.creator_email.trim().to_string(),
        };

        if let Err(e) = self.bounded_repo(self.repo.insert(&record)).await {
            warn!(
                error = %e,
                slug = %record.slug,
                orphaned_key = %record.image,
                "meal insert failed after image upload; object left orphaned"
            );
            return Err(e.into());
        }

        info!(slug = %record.slug, key = %record.image, bytes = size, "meal saved");
        Ok(record.slug)
    }

    pub async fn list(&self) -> Result<Vec<MealRecord>, RepoError> {
        self.bounded_repo(self.repo.list_all()).await
    }

    pub async fn get(&self, slug: &str) -> Result<Option<MealRecord>, RepoError> {
        self.bounded_repo(self.repo.get_by_slug(slug)).await
    }
}
