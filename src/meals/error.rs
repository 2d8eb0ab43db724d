use std::time::Duration;

use thiserror::Error;

use super::validate::ValidationError;

/// Record store failures.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("a meal with identifier '{0}' already exists")]
    Duplicate(String),

    #[error("record store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl RepoError {
    /// Maps a unique-constraint violation on insert to `Duplicate`.
    pub(crate) fn from_insert(err: sqlx::Error, slug: &str) -> Self {
        match err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                RepoError::Duplicate(slug.to_string())
            }
            other => RepoError::Database(other),
        }
    }
}

/// Every way `MealService::submit` can fail.
#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("image file name has no extension")]
    InvalidExtension,

    #[error("title does not contain any letters or digits")]
    EmptyIdentifier,

    #[error("a meal with identifier '{0}' already exists")]
    DuplicateIdentifier(String),

    #[error("object store call timed out after {0:?}")]
    ObjectStoreTimeout(Duration),

    #[error("object store failure: {0:#}")]
    ObjectStore(anyhow::Error),

    #[error("record store failure: {0}")]
    RecordStore(#[source] RepoError),
}

impl From<RepoError> for SubmitError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Duplicate(slug) => SubmitError::DuplicateIdentifier(slug),
            other => SubmitError::RecordStore(other),
        }
    }
}

impl SubmitError {
    /// Stable machine-readable reason surfaced to clients.
    pub fn code(&self) -> &'static str {
        match self {
            SubmitError::Validation(v) => v.code(),
            SubmitError::InvalidExtension => "invalid_extension",
            SubmitError::EmptyIdentifier => "empty_identifier",
            SubmitError::DuplicateIdentifier(_) => "duplicate_identifier",
            SubmitError::ObjectStoreTimeout(_) | SubmitError::RecordStore(RepoError::Timeout(_)) => {
                "timeout"
            }
            SubmitError::ObjectStore(_) => "object_store",
            SubmitError::RecordStore(_) => "record_store",
        }
    }

    /// True when the failure happened before any store was touched.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            SubmitError::Validation(_)
                | SubmitError::InvalidExtension
                | SubmitError::EmptyIdentifier
        )
    }
}
