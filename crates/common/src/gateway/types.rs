use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::allocation::{Node, ObjectReader};

use super::GatewayError;

/// Storage class reported for every object
pub const STORAGE_CLASS: &str = "STANDARD";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketInfo {
    pub name: String,
    pub created: DateTime<Utc>,
    /// The bucket stands in for an allocation that has never been written to
    pub synthesized: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectInfo {
    pub bucket: String,
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub mod_time: DateTime<Utc>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub storage_class: Option<String>,
}

impl ObjectInfo {
    /// Describe `node` as the object `name` inside `bucket`
    pub(crate) fn from_node(bucket: &str, name: String, node: &Node) -> Self {
        Self {
            bucket: bucket.to_string(),
            name,
            size: node.actual_size,
            is_dir: node.is_dir(),
            mod_time: node.updated_at,
            content_type: node.mime_type.clone(),
            etag: (!node.content_hash.is_empty()).then(|| node.content_hash.clone()),
            storage_class: node.is_file().then(|| STORAGE_CLASS.to_string()),
        }
    }

    /// Metadata for an operation that did not re-read the backend
    pub(crate) fn summary(bucket: &str, name: &str, size: u64, mod_time: DateTime<Utc>) -> Self {
        Self {
            bucket: bucket.to_string(),
            name: name.to_string(),
            size,
            is_dir: false,
            mod_time,
            content_type: None,
            etag: None,
            storage_class: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListObjectsInfo {
    pub objects: Vec<ObjectInfo>,
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    /// Marker to pass back for the next page; empty unless truncated
    pub next_marker: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListObjectsV2Info {
    pub objects: Vec<ObjectInfo>,
    pub prefixes: Vec<String>,
    pub is_truncated: bool,
    pub continuation_token: String,
    pub next_continuation_token: String,
}

/// An object stream and the metadata it was opened with
#[derive(Debug)]
pub struct GetObjectReader {
    pub info: ObjectInfo,
    /// Offset of the first byte in `reader` within the object
    pub offset: u64,
    /// Number of bytes `reader` yields
    pub length: u64,
    pub reader: ObjectReader,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeletedObject {
    pub object_name: String,
}

#[derive(Debug)]
pub struct DeleteObjectError {
    pub object_name: String,
    pub error: GatewayError,
}

/// Outcome of a batch delete; every object lands in exactly one list
#[derive(Debug, Default)]
pub struct DeleteObjectsResult {
    pub deleted: Vec<DeletedObject>,
    pub errors: Vec<DeleteObjectError>,
}
