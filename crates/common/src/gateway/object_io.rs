//! Object reads, writes, copies and deletes, plus bucket creation and removal.

use std::path::Path;

use chrono::Utc;
use tokio::io::AsyncRead;

use crate::allocation::{Allocation, NodeKind, WriteOptions, DEFAULT_CONTENT_TYPE};

use super::error::{bucket_error, object_error};
use super::path::{PathMapper, RemotePath, ROOT_PATH};
use super::range::{self, RangeSpec};
use super::resolver::resolve_single;
use super::types::{
    DeleteObjectError, DeleteObjectsResult, DeletedObject, GetObjectReader, ObjectInfo,
};
use super::GatewayError;

pub struct ObjectIo<'a, A: ?Sized> {
    alloc: &'a A,
    paths: &'a PathMapper,
}

impl<'a, A> ObjectIo<'a, A>
where
    A: Allocation + ?Sized,
{
    pub fn new(alloc: &'a A, paths: &'a PathMapper) -> Self {
        Self { alloc, paths }
    }

    pub async fn object_info(
        &self,
        bucket: &str,
        object: &str,
    ) -> Result<ObjectInfo, GatewayError> {
        let remote = self.paths.to_remote_path(bucket, object);
        let node = resolve_single(self.alloc, &remote.path)
            .await
            .map_err(|e| object_error(e, bucket, object))?
            .ok_or_else(|| GatewayError::ObjectNotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            })?;

        let name = self.paths.to_object_key(bucket, &remote.path);
        Ok(ObjectInfo::from_node(bucket, name, &node))
    }

    /// Open `object` for reading, optionally restricted to `range`
    ///
    /// The staged copy of the file lives as long as the returned reader.
    pub async fn get(
        &self,
        bucket: &str,
        object: &str,
        range: Option<&RangeSpec>,
    ) -> Result<GetObjectReader, GatewayError> {
        let remote = self.paths.to_remote_path(bucket, object);
        let node = resolve_single(self.alloc, &remote.path)
            .await
            .map_err(|e| object_error(e, bucket, object))?
            .ok_or_else(|| GatewayError::ObjectNotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            })?;
        if node.is_dir() {
            return Err(GatewayError::TypeMismatch {
                path: remote.path,
                expected: NodeKind::File,
                found: NodeKind::Directory,
            });
        }

        let staged = self
            .alloc
            .open_reader(&remote.path, node.actual_size)
            .await
            .map_err(|e| object_error(e, bucket, object))?;

        // dropping `staged` on an invalid range removes the staged file
        let (offset, length) = range::offset_length(range, staged.len())?;
        let reader = staged.into_section(offset, length).await?;

        let name = self.paths.to_object_key(bucket, &remote.path);
        Ok(GetObjectReader {
            info: ObjectInfo::from_node(bucket, name, &node),
            offset,
            length,
            reader,
        })
    }

    /// Upload `reader` as `object`, replacing any existing file
    pub async fn put(
        &self,
        bucket: &str,
        object: &str,
        content_type: Option<&str>,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        size: Option<u64>,
    ) -> Result<ObjectInfo, GatewayError> {
        let remote = self.paths.to_remote_path(bucket, object);
        let existing = resolve_single(self.alloc, &remote.path)
            .await
            .map_err(|e| object_error(e, bucket, object))?;
        if let Some(node) = &existing {
            if node.is_dir() {
                return Err(GatewayError::TypeMismatch {
                    path: remote.path,
                    expected: NodeKind::File,
                    found: NodeKind::Directory,
                });
            }
        }

        let content_type = content_type
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE);
        let options = WriteOptions {
            content_type: content_type.to_string(),
            size,
            is_update: existing.is_some(),
        };
        tracing::debug!(
            "put_object: {} ({}, update={})",
            remote.path.display(),
            options.content_type,
            options.is_update
        );

        let written = self
            .alloc
            .write_stream(&remote.path, reader, &options)
            .await
            .map_err(|e| object_error(e, bucket, object))?;

        Ok(ObjectInfo::summary(bucket, object, written, Utc::now()))
    }

    /// Copy an object, reporting the destination as the backend sees it afterwards
    pub async fn copy(
        &self,
        src_bucket: &str,
        src_object: &str,
        dst_bucket: &str,
        dst_object: &str,
    ) -> Result<ObjectInfo, GatewayError> {
        let src = self.paths.to_remote_path(src_bucket, src_object);
        let dst = self.paths.to_remote_path(dst_bucket, dst_object);

        self.alloc
            .copy(&src.path, &dst.path)
            .await
            .map_err(|e| object_error(e, src_bucket, src_object))?;

        let node = self
            .alloc
            .resolve(&dst.path)
            .await
            .map_err(|e| object_error(e, dst_bucket, dst_object))?;

        Ok(ObjectInfo::summary(
            dst_bucket,
            dst_object,
            node.actual_size,
            node.updated_at,
        ))
    }

    /// Allocation path of `object`, refusing keys that name the bucket itself
    fn object_path(&self, bucket: &str, object: &str) -> Result<RemotePath, GatewayError> {
        let remote = self.paths.to_remote_path(bucket, object);
        if remote.path == self.paths.bucket_path(bucket) {
            return Err(GatewayError::ObjectNotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            });
        }
        Ok(remote)
    }

    pub async fn delete(&self, bucket: &str, object: &str) -> Result<ObjectInfo, GatewayError> {
        let remote = self.object_path(bucket, object)?;
        let node = resolve_single(self.alloc, &remote.path)
            .await
            .map_err(|e| object_error(e, bucket, object))?
            .ok_or_else(|| GatewayError::ObjectNotFound {
                bucket: bucket.to_string(),
                object: object.to_string(),
            })?;

        self.alloc
            .delete(&remote.path)
            .await
            .map_err(|e| object_error(e, bucket, object))?;

        let name = self.paths.to_object_key(bucket, &remote.path);
        Ok(ObjectInfo {
            is_dir: node.is_dir(),
            ..ObjectInfo::summary(bucket, &name, node.actual_size, Utc::now())
        })
    }

    /// Delete every object independently; one failure never stops the rest
    pub async fn delete_batch(&self, bucket: &str, objects: &[String]) -> DeleteObjectsResult {
        let mut result = DeleteObjectsResult::default();
        for object in objects {
            let outcome = match self.object_path(bucket, object) {
                Ok(remote) => self
                    .alloc
                    .delete(&remote.path)
                    .await
                    .map_err(|e| object_error(e, bucket, object)),
                Err(e) => Err(e),
            };

            match outcome {
                Ok(()) => result.deleted.push(DeletedObject {
                    object_name: object.clone(),
                }),
                Err(error) => {
                    tracing::debug!("delete_objects: {}/{} failed: {}", bucket, object, error);
                    result.errors.push(DeleteObjectError {
                        object_name: object.clone(),
                        error,
                    });
                }
            }
        }
        result
    }

    pub async fn create_bucket(&self, bucket: &str) -> Result<(), GatewayError> {
        let path = self.paths.checked_bucket_path(bucket).ok_or_else(|| {
            GatewayError::InvalidBucketName {
                bucket: bucket.to_string(),
            }
        })?;
        self.alloc
            .create_dir(&path)
            .await
            .map_err(|e| bucket_error(e, bucket))
    }

    /// Remove a bucket directory; only empty buckets unless `force` is set
    pub async fn delete_bucket(&self, bucket: &str, force: bool) -> Result<(), GatewayError> {
        // aliases such as "" or ".." also clean to the root
        if self.paths.is_root_bucket(bucket)
            || self.paths.bucket_path(bucket) == Path::new(ROOT_PATH)
        {
            return Err(GatewayError::RootBucketDeletion);
        }

        let path = self
            .paths
            .checked_bucket_path(bucket)
            .ok_or_else(|| GatewayError::BucketNotFound {
                bucket: bucket.to_string(),
            })?;
        let node = resolve_single(self.alloc, &path)
            .await
            .map_err(|e| bucket_error(e, bucket))?
            .ok_or_else(|| GatewayError::BucketNotFound {
                bucket: bucket.to_string(),
            })?;

        if !node.is_dir() {
            return Err(GatewayError::TypeMismatch {
                path,
                expected: NodeKind::Directory,
                found: node.kind,
            });
        }
        if !force && node.size > 0 {
            return Err(GatewayError::BucketNotEmpty {
                bucket: bucket.to_string(),
            });
        }

        tracing::info!("deleting bucket {} (force={})", bucket, force);
        self.alloc
            .delete(&path)
            .await
            .map_err(|e| bucket_error(e, bucket))
    }
}
