use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::meals::error::{RepoError, SubmitError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error("meal '{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("upload exceeds the request size limit")]
    PayloadTooLarge,

    #[error("object store failure: {0:#}")]
    Storage(anyhow::Error),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Submit(e) if e.is_rejection() => (StatusCode::UNPROCESSABLE_ENTITY, e.code()),
            ApiError::Submit(e @ SubmitError::DuplicateIdentifier(_)) => {
                (StatusCode::CONFLICT, e.code())
            }
            ApiError::Submit(e @ SubmitError::ObjectStore(_)) => (StatusCode::BAD_GATEWAY, e.code()),
            ApiError::Submit(
                e @ (SubmitError::ObjectStoreTimeout(_)
                | SubmitError::RecordStore(RepoError::Timeout(_))),
            ) => (StatusCode::GATEWAY_TIMEOUT, e.code()),
            ApiError::Submit(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.code()),
            ApiError::Repo(RepoError::Timeout(_)) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            ApiError::Repo(_) => (StatusCode::INTERNAL_SERVER_ERROR, "record_store"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::PayloadTooLarge => (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large"),
            ApiError::Storage(_) => (StatusCode::BAD_GATEWAY, "object_store"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            error!(error = %self, code, "request failed");
        }
        let body = Json(json!({ "code": code, "message": self.to_string() }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::meals::validate::ValidationError;

    #[test]
    fn statuses_follow_failure_kind() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (
                SubmitError::from(ValidationError::MissingImage).into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (SubmitError::InvalidExtension.into(), StatusCode::UNPROCESSABLE_ENTITY),
            (
                SubmitError::DuplicateIdentifier("tacos".into()).into(),
                StatusCode::CONFLICT,
            ),
            (
                SubmitError::ObjectStore(anyhow::anyhow!("down")).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                SubmitError::ObjectStoreTimeout(Duration::from_secs(1)).into(),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                SubmitError::RecordStore(RepoError::Timeout(Duration::from_secs(1))).into(),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (RepoError::Timeout(Duration::from_secs(1)).into(), StatusCode::GATEWAY_TIMEOUT),
            (
                SubmitError::RecordStore(RepoError::Database(sqlx::Error::PoolClosed)).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ApiError::BadRequest("x".into()), StatusCode::BAD_REQUEST),
            (ApiError::PayloadTooLarge, StatusCode::PAYLOAD_TOO_LARGE),
        ];
        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
