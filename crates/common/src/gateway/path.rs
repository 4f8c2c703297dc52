//! Mapping between (bucket, key) pairs and allocation paths.
//!
//! The root bucket aliases the allocation root, so its keys are plain
//! absolute paths. Every other bucket is a top-level directory and its keys
//! are relative to `/<bucket>`.

use std::path::{Component, Path, PathBuf};

/// Path of the allocation root
pub const ROOT_PATH: &str = "/";

/// An allocation path built from a bucket and a key or prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    /// Normalised absolute path, never ending in a separator except for `/`
    pub path: PathBuf,
    /// The key ended in `/`, i.e. the caller asked for a directory
    pub is_suffix: bool,
}

impl RemotePath {
    pub fn is_root(&self) -> bool {
        self.path == Path::new(ROOT_PATH)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    root_bucket: String,
}

impl PathMapper {
    pub fn new(root_bucket: impl Into<String>) -> Self {
        Self {
            root_bucket: root_bucket.into(),
        }
    }

    pub fn root_bucket(&self) -> &str {
        &self.root_bucket
    }

    pub fn is_root_bucket(&self, bucket: &str) -> bool {
        bucket == self.root_bucket
    }

    /// Allocation path of the bucket itself
    pub fn bucket_path(&self, bucket: &str) -> PathBuf {
        if self.is_root_bucket(bucket) {
            PathBuf::from(ROOT_PATH)
        } else {
            clean(&format!("/{}", bucket))
        }
    }

    /// Allocation path of the bucket, or `None` when `bucket` is not a single
    /// path segment (empty, `.`, `..` or containing `/`) and so cannot name a
    /// top-level directory.
    pub fn checked_bucket_path(&self, bucket: &str) -> Option<PathBuf> {
        if self.is_root_bucket(bucket) {
            return Some(PathBuf::from(ROOT_PATH));
        }
        if bucket.is_empty() || bucket == "." || bucket == ".." || bucket.contains('/') {
            return None;
        }
        Some(self.bucket_path(bucket))
    }

    /// Build the allocation path for `key` inside `bucket`
    pub fn to_remote_path(&self, bucket: &str, key: &str) -> RemotePath {
        let joined = if self.is_root_bucket(bucket) {
            format!("/{}", key)
        } else {
            format!("/{}/{}", bucket, key)
        };

        RemotePath {
            path: clean(&joined),
            is_suffix: key.ends_with('/'),
        }
    }

    /// Key of the allocation `path` relative to `bucket`
    ///
    /// Paths outside the bucket come back as their absolute form without
    /// the leading separator.
    pub fn to_object_key(&self, bucket: &str, path: &Path) -> String {
        let base = self.bucket_path(bucket);
        match path.strip_prefix(&base) {
            Ok(rel) => rel.to_string_lossy().to_string(),
            Err(_) => path.to_string_lossy().trim_start_matches('/').to_string(),
        }
    }

    /// Key of a directory, as reported in common prefixes: `sub/dir/`
    pub fn to_prefix_key(&self, bucket: &str, dir: &str) -> String {
        let key = self.to_object_key(bucket, &clean(dir));
        if key.is_empty() {
            key
        } else {
            format!("{}/", key)
        }
    }
}

/// Lexically normalise `path` into an absolute path.
///
/// Empty and `.` segments are dropped and `..` removes the previous segment,
/// never climbing above `/`.
pub fn clean(path: &str) -> PathBuf {
    let mut out = PathBuf::from(ROOT_PATH);
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::ParentDir => {
                out.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    out
}
