use std::path::PathBuf;

use crate::allocation::{AllocationError, NodeKind};

use super::range::RangeError;

/// Errors surfaced to the gateway host.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("bucket not found: {bucket}")]
    BucketNotFound { bucket: String },
    #[error("object not found: {bucket}/{object}")]
    ObjectNotFound { bucket: String, object: String },
    #[error("invalid bucket name: {bucket:?}")]
    InvalidBucketName { bucket: String },
    #[error("bucket already exists: {bucket}")]
    BucketAlreadyExists { bucket: String },
    #[error("{} is a {found}, expected a {expected}", .path.display())]
    TypeMismatch {
        path: PathBuf,
        expected: NodeKind,
        found: NodeKind,
    },
    #[error("cannot remove the root bucket")]
    RootBucketDeletion,
    #[error("bucket is not empty: {bucket}")]
    BucketNotEmpty { bucket: String },
    #[error("invalid range: {0}")]
    InvalidRange(#[from] RangeError),
    #[error("staging error: {0}")]
    Staging(#[from] std::io::Error),
    #[error("allocation error: {0}")]
    Backend(#[from] AllocationError),
}

impl GatewayError {
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GatewayError::BucketNotFound { .. } | GatewayError::ObjectNotFound { .. }
        )
    }

    /// The request can never succeed as issued, regardless of retries
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            GatewayError::RootBucketDeletion
                | GatewayError::BucketNotEmpty { .. }
                | GatewayError::InvalidBucketName { .. }
        )
    }
}

/// Translate a backend error raised while resolving a bucket
pub(crate) fn bucket_error(err: AllocationError, bucket: &str) -> GatewayError {
    match err {
        AllocationError::NotFound(_) => GatewayError::BucketNotFound {
            bucket: bucket.to_string(),
        },
        AllocationError::AlreadyExists(_) => GatewayError::BucketAlreadyExists {
            bucket: bucket.to_string(),
        },
        err => kind_error(err),
    }
}

/// Translate a backend error raised while resolving an object
pub(crate) fn object_error(err: AllocationError, bucket: &str, object: &str) -> GatewayError {
    match err {
        AllocationError::NotFound(_) => GatewayError::ObjectNotFound {
            bucket: bucket.to_string(),
            object: object.to_string(),
        },
        err => kind_error(err),
    }
}

fn kind_error(err: AllocationError) -> GatewayError {
    match err {
        AllocationError::NotADirectory(path) => GatewayError::TypeMismatch {
            path,
            expected: NodeKind::Directory,
            found: NodeKind::File,
        },
        AllocationError::IsADirectory(path) => GatewayError::TypeMismatch {
            path,
            expected: NodeKind::File,
            found: NodeKind::Directory,
        },
        err => GatewayError::Backend(err),
    }
}
