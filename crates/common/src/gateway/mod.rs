//! Object storage view of an allocation
//!
//! The gateway presents an allocation tree through a flat bucket / key
//! namespace:
//!
//! - **Root bucket**: aliases the allocation root `/` and always exists
//! - **Buckets**: every top-level directory `/<name>`
//! - **Objects**: files beneath a bucket, keyed relative to the bucket path
//!
//! ```text
//! /                      bucket "root"
//! ├── a.txt              object "a.txt" in "root"
//! └── docs               bucket "docs"
//!     ├── readme.md      object "readme.md" in "docs", "docs/readme.md" in "root"
//!     └── sub/           common prefix "sub/" in "docs"
//! ```
//!
//! [`StorageGateway`] is the contract the host serves requests through.
//! [`AllocationGateway`] implements it over any [`Allocation`], composing
//! the [`PathMapper`], [`DirectoryLister`] and [`ObjectIo`] components. It
//! holds no mutable state, so one instance is shared by every request.

use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::allocation::Allocation;
use crate::config::GatewayConfig;

mod error;
mod lister;
mod object_io;
mod path;
mod range;
mod resolver;
mod types;

pub use error::GatewayError;
pub use lister::DirectoryLister;
pub use object_io::ObjectIo;
pub use path::{clean, PathMapper, RemotePath, ROOT_PATH};
pub use range::{RangeError, RangeSpec};
pub use resolver::resolve_single;
pub use types::{
    BucketInfo, DeleteObjectError, DeleteObjectsResult, DeletedObject, GetObjectReader,
    ListObjectsInfo, ListObjectsV2Info, ObjectInfo, STORAGE_CLASS,
};

#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// The root bucket followed by every top-level directory
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, GatewayError>;

    async fn make_bucket(&self, bucket: &str) -> Result<(), GatewayError>;

    async fn get_bucket_info(&self, bucket: &str) -> Result<BucketInfo, GatewayError>;

    /// Remove a bucket. The root bucket can never be removed and non-empty
    /// buckets only with `force`.
    async fn delete_bucket(&self, bucket: &str, force: bool) -> Result<(), GatewayError>;

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> Result<ListObjectsInfo, GatewayError>;

    async fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: &str,
        delimiter: &str,
        max_keys: usize,
        start_after: &str,
    ) -> Result<ListObjectsV2Info, GatewayError>;

    async fn get_object_info(&self, bucket: &str, object: &str)
        -> Result<ObjectInfo, GatewayError>;

    async fn get_object(
        &self,
        bucket: &str,
        object: &str,
        range: Option<RangeSpec>,
    ) -> Result<GetObjectReader, GatewayError>;

    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        content_type: Option<&str>,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size: Option<u64>,
    ) -> Result<ObjectInfo, GatewayError>;

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_object: &str,
        dst_bucket: &str,
        dst_object: &str,
    ) -> Result<ObjectInfo, GatewayError>;

    async fn delete_object(&self, bucket: &str, object: &str) -> Result<ObjectInfo, GatewayError>;

    /// Delete each object independently, collecting per-object failures
    async fn delete_objects(&self, bucket: &str, objects: &[String]) -> DeleteObjectsResult;
}

/// [`StorageGateway`] over an [`Allocation`]
#[derive(Debug)]
pub struct AllocationGateway<A> {
    alloc: A,
    paths: PathMapper,
}

impl<A: Allocation> AllocationGateway<A> {
    pub fn new(alloc: A, config: &GatewayConfig) -> Self {
        Self {
            alloc,
            paths: PathMapper::new(config.root_bucket_name.clone()),
        }
    }

    pub fn allocation(&self) -> &A {
        &self.alloc
    }

    pub fn paths(&self) -> &PathMapper {
        &self.paths
    }

    fn lister(&self) -> DirectoryLister<'_, A> {
        DirectoryLister::new(&self.alloc, &self.paths)
    }

    fn objects(&self) -> ObjectIo<'_, A> {
        ObjectIo::new(&self.alloc, &self.paths)
    }
}

#[async_trait]
impl<A: Allocation> StorageGateway for AllocationGateway<A> {
    async fn list_buckets(&self) -> Result<Vec<BucketInfo>, GatewayError> {
        self.lister().list_buckets().await
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), GatewayError> {
        self.objects().create_bucket(bucket).await
    }

    async fn get_bucket_info(&self, bucket: &str) -> Result<BucketInfo, GatewayError> {
        self.lister().bucket_info(bucket).await
    }

    async fn delete_bucket(&self, bucket: &str, force: bool) -> Result<(), GatewayError> {
        self.objects().delete_bucket(bucket, force).await
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> Result<ListObjectsInfo, GatewayError> {
        self.lister()
            .list_objects(bucket, prefix, marker, delimiter, max_keys)
            .await
    }

    async fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: &str,
        delimiter: &str,
        max_keys: usize,
        start_after: &str,
    ) -> Result<ListObjectsV2Info, GatewayError> {
        self.lister()
            .list_objects_v2(
                bucket,
                prefix,
                continuation_token,
                delimiter,
                max_keys,
                start_after,
            )
            .await
    }

    async fn get_object_info(
        &self,
        bucket: &str,
        object: &str,
    ) -> Result<ObjectInfo, GatewayError> {
        self.objects().object_info(bucket, object).await
    }

    async fn get_object(
        &self,
        bucket: &str,
        object: &str,
        range: Option<RangeSpec>,
    ) -> Result<GetObjectReader, GatewayError> {
        self.objects().get(bucket, object, range.as_ref()).await
    }

    async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        content_type: Option<&str>,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size: Option<u64>,
    ) -> Result<ObjectInfo, GatewayError> {
        self.objects()
            .put(bucket, object, content_type, reader, size)
            .await
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_object: &str,
        dst_bucket: &str,
        dst_object: &str,
    ) -> Result<ObjectInfo, GatewayError> {
        self.objects()
            .copy(src_bucket, src_object, dst_bucket, dst_object)
            .await
    }

    async fn delete_object(&self, bucket: &str, object: &str) -> Result<ObjectInfo, GatewayError> {
        self.objects().delete(bucket, object).await
    }

    async fn delete_objects(&self, bucket: &str, objects: &[String]) -> DeleteObjectsResult {
        self.objects().delete_batch(bucket, objects).await
    }
}
