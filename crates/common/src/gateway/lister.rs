//! Bucket and object listings.
//!
//! Listings are a pass-through over [`Allocation::list`]: the backend decides
//! ordering and owns the pagination cursor. This layer only picks what to
//! list, drops directories from object results and relabels paths as keys.

use std::path::Path;

use chrono::{Duration, Utc};

use crate::allocation::{Allocation, AllocationError, ListOptions, NodeKind};

use super::error::bucket_error;
use super::path::{PathMapper, ROOT_PATH};
use super::resolver::resolve_single;
use super::types::{BucketInfo, ListObjectsInfo, ListObjectsV2Info, ObjectInfo};
use super::GatewayError;

/// How far back the root bucket of a never-written allocation claims to
/// have been created
const PLACEHOLDER_AGE_HOURS: i64 = 30;

pub struct DirectoryLister<'a, A: ?Sized> {
    alloc: &'a A,
    paths: &'a PathMapper,
}

impl<'a, A> DirectoryLister<'a, A>
where
    A: Allocation + ?Sized,
{
    pub fn new(alloc: &'a A, paths: &'a PathMapper) -> Self {
        Self { alloc, paths }
    }

    fn placeholder_root(&self) -> BucketInfo {
        BucketInfo {
            name: self.paths.root_bucket().to_string(),
            created: Utc::now() - Duration::hours(PLACEHOLDER_AGE_HOURS),
            synthesized: true,
        }
    }

    /// The root bucket followed by every top-level directory
    pub async fn list_buckets(&self) -> Result<Vec<BucketInfo>, GatewayError> {
        let root_path = Path::new(ROOT_PATH);
        let root = match resolve_single(self.alloc, root_path).await? {
            Some(root) => root,
            None => {
                tracing::debug!("list_buckets: allocation is empty");
                return Ok(vec![self.placeholder_root()]);
            }
        };

        let options = ListOptions {
            type_filter: Some(NodeKind::Directory),
            delimited: true,
            ..Default::default()
        };
        let page = self.alloc.list(root_path, &options).await?;

        let mut buckets = Vec::with_capacity(page.nodes.len() + 1);
        buckets.push(BucketInfo {
            name: self.paths.root_bucket().to_string(),
            created: root.created_at,
            synthesized: false,
        });
        buckets.extend(
            page.nodes
                .into_iter()
                .filter(|node| node.is_dir())
                .map(|node| BucketInfo {
                    name: node.name,
                    created: node.created_at,
                    synthesized: false,
                }),
        );
        Ok(buckets)
    }

    pub async fn bucket_info(&self, bucket: &str) -> Result<BucketInfo, GatewayError> {
        let path = self
            .paths
            .checked_bucket_path(bucket)
            .ok_or_else(|| GatewayError::BucketNotFound {
                bucket: bucket.to_string(),
            })?;
        let node = resolve_single(self.alloc, &path)
            .await
            .map_err(|e| bucket_error(e, bucket))?;

        match node {
            Some(node) if node.is_dir() => Ok(BucketInfo {
                name: bucket.to_string(),
                created: node.created_at,
                synthesized: false,
            }),
            Some(node) => Err(GatewayError::TypeMismatch {
                path,
                expected: NodeKind::Directory,
                found: node.kind,
            }),
            None if self.paths.is_root_bucket(bucket) => Ok(self.placeholder_root()),
            None => Err(GatewayError::BucketNotFound {
                bucket: bucket.to_string(),
            }),
        }
    }

    /// One page of the objects under `prefix` in `bucket`
    ///
    /// A missing prefix is an empty listing rather than an error. Any
    /// non-empty `delimiter` lists one level and groups subdirectories
    /// into common prefixes.
    pub async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        marker: &str,
        delimiter: &str,
        max_keys: usize,
    ) -> Result<ListObjectsInfo, GatewayError> {
        let remote = self.paths.to_remote_path(bucket, prefix);
        tracing::debug!(
            "list_objects: bucket={} prefix={} remote={} marker={}",
            bucket,
            prefix,
            remote.path.display(),
            marker
        );

        let node = match resolve_single(self.alloc, &remote.path).await? {
            Some(node) => node,
            None => return Ok(ListObjectsInfo::default()),
        };

        if node.is_file() {
            // a file has no children to list as a directory
            if remote.is_suffix {
                return Ok(ListObjectsInfo::default());
            }
            let name = self.paths.to_object_key(bucket, &node.path);
            return Ok(ListObjectsInfo {
                objects: vec![ObjectInfo::from_node(bucket, name, &node)],
                ..Default::default()
            });
        }

        // directories under the root are buckets in their own right
        let type_filter = (self.paths.is_root_bucket(bucket) && remote.is_root())
            .then_some(NodeKind::File);
        let options = ListOptions {
            marker: marker.to_string(),
            type_filter,
            max_keys,
            delimited: !delimiter.is_empty(),
        };

        let page = match self.alloc.list(&remote.path, &options).await {
            Ok(page) => page,
            Err(AllocationError::NotFound(_)) if remote.is_root() => {
                return Ok(ListObjectsInfo::default());
            }
            Err(e) => return Err(e.into()),
        };

        let objects = page
            .nodes
            .iter()
            .filter(|node| !node.is_dir())
            .map(|node| {
                let name = self.paths.to_object_key(bucket, &node.path);
                ObjectInfo::from_node(bucket, name, node)
            })
            .collect();
        let prefixes = page
            .common_prefixes
            .iter()
            .map(|dir| self.paths.to_prefix_key(bucket, dir))
            .collect();

        Ok(ListObjectsInfo {
            objects,
            prefixes,
            is_truncated: page.is_truncated,
            next_marker: page.next_marker,
        })
    }

    /// Same as [`DirectoryLister::list_objects`], resuming from
    /// `continuation_token` or else `start_after`
    pub async fn list_objects_v2(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: &str,
        delimiter: &str,
        max_keys: usize,
        start_after: &str,
    ) -> Result<ListObjectsV2Info, GatewayError> {
        let marker = if continuation_token.is_empty() {
            start_after
        } else {
            continuation_token
        };

        let page = self
            .list_objects(bucket, prefix, marker, delimiter, max_keys)
            .await?;

        Ok(ListObjectsV2Info {
            objects: page.objects,
            prefixes: page.prefixes,
            is_truncated: page.is_truncated,
            continuation_token: continuation_token.to_string(),
            next_continuation_token: page.next_marker,
        })
    }
}
