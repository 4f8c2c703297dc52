use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use super::staging::StagedFile;
use super::{
    node_name, paginate, Allocation, AllocationError, ListOptions, ListPage, Node, NodeKind,
    WriteOptions,
};

/// Largest buffer reserved up front for a write of declared size
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

/// In-memory allocation tree
///
/// The root directory does not exist until the first directory or file is
/// created, mirroring a freshly created allocation that has never been
/// written to.
#[derive(Debug, Clone)]
pub struct MemoryAllocation {
    inner: Arc<RwLock<BTreeMap<PathBuf, MemoryEntry>>>,
    staging_dir: PathBuf,
}

#[derive(Debug, Clone)]
struct MemoryEntry {
    kind: NodeKind,
    data: Bytes,
    mime_type: Option<String>,
    content_hash: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MemoryEntry {
    fn dir(now: DateTime<Utc>) -> Self {
        Self {
            kind: NodeKind::Directory,
            data: Bytes::new(),
            mime_type: None,
            content_hash: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    fn file(data: Bytes, mime_type: String, created_at: DateTime<Utc>) -> Self {
        let content_hash = hex::encode(Sha256::digest(&data));
        Self {
            kind: NodeKind::File,
            data,
            mime_type: Some(mime_type),
            content_hash,
            created_at,
            updated_at: Utc::now(),
        }
    }
}

impl MemoryAllocation {
    /// Create an empty allocation that stages reads inside `staging_dir`
    pub fn new(staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BTreeMap::new())),
            staging_dir: staging_dir.into(),
        }
    }

    fn read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, BTreeMap<PathBuf, MemoryEntry>>, AllocationError>
    {
        self.inner.read().map_err(|e| {
            AllocationError::Internal(format!("failed to acquire read lock: {}", e))
        })
    }

    fn write(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<PathBuf, MemoryEntry>>, AllocationError>
    {
        self.inner.write().map_err(|e| {
            AllocationError::Internal(format!("failed to acquire write lock: {}", e))
        })
    }
}

fn to_node(tree: &BTreeMap<PathBuf, MemoryEntry>, path: &Path, entry: &MemoryEntry) -> Node {
    let size = match entry.kind {
        NodeKind::File => entry.data.len() as u64,
        NodeKind::Directory => tree
            .range(path.to_path_buf()..)
            .take_while(|(p, _)| p.starts_with(path))
            .filter(|(_, e)| e.kind == NodeKind::File)
            .map(|(_, e)| e.data.len() as u64)
            .sum(),
    };

    Node {
        path: path.to_path_buf(),
        name: node_name(path),
        kind: entry.kind,
        size,
        actual_size: size,
        mime_type: entry.mime_type.clone(),
        content_hash: entry.content_hash.clone(),
        created_at: entry.created_at,
        updated_at: entry.updated_at,
    }
}

/// Create every missing directory from the root down to `dir` inclusive
fn create_parents(
    tree: &mut BTreeMap<PathBuf, MemoryEntry>,
    dir: &Path,
    now: DateTime<Utc>,
) -> Result<(), AllocationError> {
    let mut ancestors: Vec<&Path> = dir.ancestors().collect();
    ancestors.reverse();
    for ancestor in ancestors {
        match tree.get(ancestor) {
            Some(entry) if entry.kind == NodeKind::File => {
                return Err(AllocationError::NotADirectory(ancestor.to_path_buf()));
            }
            Some(_) => {}
            None => {
                tree.insert(ancestor.to_path_buf(), MemoryEntry::dir(now));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Allocation for MemoryAllocation {
    async fn resolve(&self, path: &Path) -> Result<Node, AllocationError> {
        let tree = self.read()?;
        let entry = tree
            .get(path)
            .ok_or_else(|| AllocationError::NotFound(path.to_path_buf()))?;
        Ok(to_node(&tree, path, entry))
    }

    async fn list(&self, path: &Path, options: &ListOptions) -> Result<ListPage, AllocationError> {
        let tree = self.read()?;
        match tree.get(path) {
            None => return Err(AllocationError::NotFound(path.to_path_buf())),
            Some(entry) if entry.kind == NodeKind::File => {
                return Err(AllocationError::NotADirectory(path.to_path_buf()));
            }
            Some(_) => {}
        }

        let candidates = tree
            .range(path.to_path_buf()..)
            .take_while(|(p, _)| p.starts_with(path))
            .filter(|(p, _)| p.as_path() != path)
            .filter(|(p, _)| !options.delimited || p.parent() == Some(path))
            .map(|(p, e)| to_node(&tree, p, e))
            .collect();

        Ok(paginate(path, candidates, options))
    }

    async fn create_dir(&self, path: &Path) -> Result<(), AllocationError> {
        let mut tree = self.write()?;
        if tree.contains_key(path) {
            return Err(AllocationError::AlreadyExists(path.to_path_buf()));
        }
        create_parents(&mut tree, path, Utc::now())
    }

    async fn delete(&self, path: &Path) -> Result<(), AllocationError> {
        let mut tree = self.write()?;
        if !tree.contains_key(path) {
            return Err(AllocationError::NotFound(path.to_path_buf()));
        }
        tree.retain(|p, _| !p.starts_with(path));
        Ok(())
    }

    async fn copy(&self, src: &Path, dst: &Path) -> Result<(), AllocationError> {
        let mut tree = self.write()?;
        let source = match tree.get(src) {
            None => return Err(AllocationError::NotFound(src.to_path_buf())),
            Some(entry) if entry.kind == NodeKind::Directory => {
                return Err(AllocationError::IsADirectory(src.to_path_buf()));
            }
            Some(entry) => entry.clone(),
        };
        if let Some(existing) = tree.get(dst) {
            if existing.kind == NodeKind::Directory {
                return Err(AllocationError::IsADirectory(dst.to_path_buf()));
            }
        }

        let now = Utc::now();
        if let Some(parent) = dst.parent() {
            create_parents(&mut tree, parent, now)?;
        }
        let mime_type = source
            .mime_type
            .unwrap_or_else(|| super::DEFAULT_CONTENT_TYPE.to_string());
        tree.insert(dst.to_path_buf(), MemoryEntry::file(source.data, mime_type, now));
        Ok(())
    }

    async fn open_reader(&self, path: &Path, size: u64) -> Result<StagedFile, AllocationError> {
        let data = {
            let tree = self.read()?;
            match tree.get(path) {
                None => return Err(AllocationError::NotFound(path.to_path_buf())),
                Some(entry) if entry.kind == NodeKind::Directory => {
                    return Err(AllocationError::IsADirectory(path.to_path_buf()));
                }
                Some(entry) => entry.data.clone(),
            }
        };
        if data.len() as u64 != size {
            tracing::debug!(
                "staging {} with {} bytes, caller expected {}",
                path.display(),
                data.len(),
                size
            );
        }

        Ok(StagedFile::from_bytes(&self.staging_dir, data).await?)
    }

    async fn write_stream(
        &self,
        path: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        options: &WriteOptions,
    ) -> Result<u64, AllocationError> {
        // declared sizes come from the client, so they only hint the buffer
        let hint = options.size.map_or(0, |size| size.min(MAX_PREALLOC));
        let mut buf = Vec::with_capacity(hint as usize);
        reader.read_to_end(&mut buf).await?;
        let written = buf.len() as u64;
        if let Some(expected) = options.size {
            if expected != written {
                return Err(AllocationError::SizeMismatch {
                    expected,
                    actual: written,
                });
            }
        }

        let mut tree = self.write()?;
        let now = Utc::now();
        let created_at = match (tree.get(path), options.is_update) {
            (Some(entry), _) if entry.kind == NodeKind::Directory => {
                return Err(AllocationError::IsADirectory(path.to_path_buf()));
            }
            (Some(entry), true) => entry.created_at,
            (Some(_), false) => return Err(AllocationError::AlreadyExists(path.to_path_buf())),
            (None, true) => return Err(AllocationError::NotFound(path.to_path_buf())),
            (None, false) => now,
        };
        if let Some(parent) = path.parent() {
            create_parents(&mut tree, parent, now)?;
        }
        tree.insert(
            path.to_path_buf(),
            MemoryEntry::file(Bytes::from(buf), options.content_type.clone(), created_at),
        );

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn options(is_update: bool) -> WriteOptions {
        WriteOptions {
            content_type: "text/plain".to_string(),
            size: None,
            is_update,
        }
    }

    async fn put(alloc: &MemoryAllocation, path: &str, data: &[u8]) {
        let mut reader = Cursor::new(data.to_vec());
        alloc
            .write_stream(Path::new(path), &mut reader, &options(false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_root_is_created_lazily() {
        let staging = tempfile::tempdir().unwrap();
        let alloc = MemoryAllocation::new(staging.path());

        let err = alloc.resolve(Path::new("/")).await.unwrap_err();
        assert!(err.is_not_found());

        put(&alloc, "/docs/readme.md", b"hello").await;
        let root = alloc.resolve(Path::new("/")).await.unwrap();
        assert!(root.is_dir());
        assert_eq!(root.size, 5);
        assert_eq!(root.name, "/");
    }

    #[tokio::test]
    async fn test_write_rejects_create_over_existing() {
        let staging = tempfile::tempdir().unwrap();
        let alloc = MemoryAllocation::new(staging.path());
        put(&alloc, "/a.txt", b"one").await;

        let mut reader = Cursor::new(b"two".to_vec());
        let err = alloc
            .write_stream(Path::new("/a.txt"), &mut reader, &options(false))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::AlreadyExists(_)));

        let mut reader = Cursor::new(b"three".to_vec());
        alloc
            .write_stream(Path::new("/a.txt"), &mut reader, &options(true))
            .await
            .unwrap();
        assert_eq!(alloc.resolve(Path::new("/a.txt")).await.unwrap().size, 5);
    }

    #[tokio::test]
    async fn test_write_checks_declared_size() {
        let staging = tempfile::tempdir().unwrap();
        let alloc = MemoryAllocation::new(staging.path());

        let mut reader = Cursor::new(b"abc".to_vec());
        let options = WriteOptions {
            size: Some(4),
            ..options(false)
        };
        let err = alloc
            .write_stream(Path::new("/a.txt"), &mut reader, &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::SizeMismatch {
                expected: 4,
                actual: 3
            }
        ));
        assert!(alloc.resolve(Path::new("/a.txt")).await.is_err());
    }

    #[tokio::test]
    async fn test_huge_declared_size_is_a_mismatch() {
        let staging = tempfile::tempdir().unwrap();
        let alloc = MemoryAllocation::new(staging.path());

        let mut reader = Cursor::new(Vec::new());
        let options = WriteOptions {
            size: Some(u64::MAX / 2),
            ..options(false)
        };
        let err = alloc
            .write_stream(Path::new("/huge.bin"), &mut reader, &options)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AllocationError::SizeMismatch { actual: 0, .. }
        ));
        assert!(alloc.resolve(Path::new("/huge.bin")).await.is_err());
    }

    #[tokio::test]
    async fn test_file_under_file_is_rejected() {
        let staging = tempfile::tempdir().unwrap();
        let alloc = MemoryAllocation::new(staging.path());
        put(&alloc, "/a", b"x").await;

        let err = alloc.create_dir(Path::new("/a/b")).await.unwrap_err();
        assert!(matches!(err, AllocationError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn test_delete_removes_subtree() {
        let staging = tempfile::tempdir().unwrap();
        let alloc = MemoryAllocation::new(staging.path());
        put(&alloc, "/docs/a.txt", b"a").await;
        put(&alloc, "/docs/sub/b.txt", b"b").await;
        put(&alloc, "/docsx.txt", b"c").await;

        alloc.delete(Path::new("/docs")).await.unwrap();
        assert!(alloc.resolve(Path::new("/docs/sub/b.txt")).await.is_err());
        assert!(alloc.resolve(Path::new("/docsx.txt")).await.is_ok());
    }

    #[tokio::test]
    async fn test_list_delimited_only_direct_children() {
        let staging = tempfile::tempdir().unwrap();
        let alloc = MemoryAllocation::new(staging.path());
        put(&alloc, "/docs/a.txt", b"a").await;
        put(&alloc, "/docs/sub/b.txt", b"b").await;

        let page = alloc
            .list(
                Path::new("/docs"),
                &ListOptions {
                    delimited: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.nodes.len(), 1);
        assert_eq!(page.nodes[0].name, "a.txt");
        assert_eq!(page.common_prefixes, vec!["/docs/sub/".to_string()]);

        let page = alloc
            .list(Path::new("/docs"), &ListOptions::default())
            .await
            .unwrap();
        let names: Vec<_> = page.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a.txt", "sub", "b.txt"]);
    }
}
