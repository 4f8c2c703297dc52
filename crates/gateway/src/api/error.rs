use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde::Serialize;

use common::allocation::AllocationError;
use common::gateway::GatewayError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("invalid request: {0}")]
    BadRequest(String),
}

/// JSON body returned for every failed request
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

/// Status and S3 style error code for a gateway error
pub fn error_code(error: &GatewayError) -> (StatusCode, &'static str) {
    match error {
        GatewayError::BucketNotFound { .. } => (StatusCode::NOT_FOUND, "NoSuchBucket"),
        GatewayError::ObjectNotFound { .. } => (StatusCode::NOT_FOUND, "NoSuchKey"),
        GatewayError::InvalidBucketName { .. } => (StatusCode::BAD_REQUEST, "InvalidBucketName"),
        GatewayError::BucketAlreadyExists { .. } => (StatusCode::CONFLICT, "BucketAlreadyExists"),
        GatewayError::TypeMismatch { .. } => (StatusCode::CONFLICT, "TypeMismatch"),
        GatewayError::RootBucketDeletion => (StatusCode::METHOD_NOT_ALLOWED, "MethodNotAllowed"),
        GatewayError::BucketNotEmpty { .. } => (StatusCode::CONFLICT, "BucketNotEmpty"),
        GatewayError::InvalidRange(_) => (StatusCode::RANGE_NOT_SATISFIABLE, "InvalidRange"),
        GatewayError::Backend(AllocationError::SizeMismatch { .. }) => {
            (StatusCode::BAD_REQUEST, "IncompleteBody")
        }
        GatewayError::Staging(_) | GatewayError::Backend(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "InternalError")
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Gateway(e) => error_code(e),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "InvalidArgument"),
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        } else {
            tracing::debug!("request rejected: {}", self);
        }

        let body = ErrorBody {
            code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
