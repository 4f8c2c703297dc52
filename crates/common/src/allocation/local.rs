use std::io;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use super::staging::StagedFile;
use super::{
    node_name, paginate, Allocation, AllocationError, ListOptions, ListPage, Node, NodeKind,
    WriteOptions,
};

const HASH_CHUNK_SIZE: usize = 64 * 1024;

/// How much work `node` does beyond reading metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Detail {
    /// Hash file contents and sum directory sizes
    Full,
    /// Metadata only
    Listing,
}

/// Allocation backed by a directory on the local filesystem
///
/// The allocation root maps to `root` on disk. `root` is only created once
/// something is written, so a fresh allocation resolves `/` as not found.
/// Content types are not persisted; they are guessed from file extensions.
///
/// Listings read metadata only: listed files carry no content hash and
/// listed directories report size 0. `resolve` fills in both.
#[derive(Debug, Clone)]
pub struct LocalAllocation {
    root: PathBuf,
    staging_dir: PathBuf,
}

impl LocalAllocation {
    pub fn new(root: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            staging_dir: staging_dir.into(),
        }
    }

    /// Map an allocation path onto the disk
    fn disk_path(&self, path: &Path) -> Result<PathBuf, AllocationError> {
        let mut disk = self.root.clone();
        for component in path.components() {
            match component {
                Component::RootDir | Component::CurDir => {}
                Component::Normal(part) => disk.push(part),
                Component::ParentDir | Component::Prefix(_) => {
                    return Err(AllocationError::Internal(format!(
                        "path escapes the allocation: {}",
                        path.display()
                    )));
                }
            }
        }
        Ok(disk)
    }

    async fn node(
        &self,
        path: &Path,
        disk: &Path,
        detail: Detail,
    ) -> Result<Node, AllocationError> {
        let metadata = fs::metadata(disk).await.map_err(|e| not_found(e, path))?;
        let updated_at: DateTime<Utc> = metadata.modified()?.into();
        let created_at: DateTime<Utc> = metadata
            .created()
            .map(Into::into)
            .unwrap_or(updated_at);

        let (kind, size, mime_type, content_hash) = if metadata.is_dir() {
            let size = match detail {
                Detail::Full => dir_size(disk).await?,
                Detail::Listing => 0,
            };
            (NodeKind::Directory, size, None, String::new())
        } else {
            let mime = mime_guess::from_path(disk).first_or_octet_stream();
            let content_hash = match detail {
                Detail::Full => hash_file(disk).await?,
                Detail::Listing => String::new(),
            };
            (
                NodeKind::File,
                metadata.len(),
                Some(mime.to_string()),
                content_hash,
            )
        };

        Ok(Node {
            path: path.to_path_buf(),
            name: node_name(path),
            kind,
            size,
            actual_size: size,
            mime_type,
            content_hash,
            created_at,
            updated_at,
        })
    }

    /// Collect the nodes beneath `path`, recursing unless `delimited`
    async fn walk(
        &self,
        path: &Path,
        disk: &Path,
        delimited: bool,
    ) -> Result<Vec<Node>, AllocationError> {
        let mut nodes = Vec::new();
        let mut pending = vec![(path.to_path_buf(), disk.to_path_buf())];
        while let Some((dir, dir_disk)) = pending.pop() {
            let mut entries = fs::read_dir(&dir_disk).await?;
            while let Some(entry) = entries.next_entry().await? {
                let child = dir.join(entry.file_name());
                let child_disk = entry.path();
                let node = self.node(&child, &child_disk, Detail::Listing).await?;
                if node.is_dir() && !delimited {
                    pending.push((child, child_disk));
                }
                nodes.push(node);
            }
        }
        Ok(nodes)
    }

    /// Create the parents of `path` on disk, refusing to descend through files
    async fn ensure_parents(&self, path: &Path) -> Result<(), AllocationError> {
        let mut current = PathBuf::from("/");
        let parent = path.parent().unwrap_or(Path::new("/"));
        for component in parent.components().skip(1) {
            current.push(component);
            let disk = self.disk_path(&current)?;
            match fs::metadata(&disk).await {
                Ok(metadata) if !metadata.is_dir() => {
                    return Err(AllocationError::NotADirectory(current));
                }
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => break,
                Err(e) => return Err(e.into()),
            }
        }
        fs::create_dir_all(self.disk_path(parent)?).await?;
        Ok(())
    }
}

fn not_found(error: io::Error, path: &Path) -> AllocationError {
    if error.kind() == io::ErrorKind::NotFound {
        AllocationError::NotFound(path.to_path_buf())
    } else {
        AllocationError::Io(error)
    }
}

async fn dir_size(disk: &Path) -> io::Result<u64> {
    let mut total = 0;
    let mut pending = vec![disk.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if metadata.is_dir() {
                pending.push(entry.path());
            } else {
                total += metadata.len();
            }
        }
    }
    Ok(total)
}

async fn hash_file(disk: &Path) -> io::Result<String> {
    let mut file = fs::File::open(disk).await?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[async_trait]
impl Allocation for LocalAllocation {
    async fn resolve(&self, path: &Path) -> Result<Node, AllocationError> {
        let disk = self.disk_path(path)?;
        self.node(path, &disk, Detail::Full).await
    }

    async fn list(&self, path: &Path, options: &ListOptions) -> Result<ListPage, AllocationError> {
        let disk = self.disk_path(path)?;
        let metadata = fs::metadata(&disk).await.map_err(|e| not_found(e, path))?;
        if !metadata.is_dir() {
            return Err(AllocationError::NotADirectory(path.to_path_buf()));
        }

        let candidates = self.walk(path, &disk, options.delimited).await?;
        Ok(paginate(path, candidates, options))
    }

    async fn create_dir(&self, path: &Path) -> Result<(), AllocationError> {
        let disk = self.disk_path(path)?;
        if fs::try_exists(&disk).await? {
            return Err(AllocationError::AlreadyExists(path.to_path_buf()));
        }
        self.ensure_parents(path).await?;
        fs::create_dir_all(&disk).await?;
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<(), AllocationError> {
        let disk = self.disk_path(path)?;
        let metadata = fs::metadata(&disk).await.map_err(|e| not_found(e, path))?;
        if metadata.is_dir() {
            fs::remove_dir_all(&disk).await?;
        } else {
            fs::remove_file(&disk).await?;
        }
        Ok(())
    }

    async fn copy(&self, src: &Path, dst: &Path) -> Result<(), AllocationError> {
        let src_disk = self.disk_path(src)?;
        let dst_disk = self.disk_path(dst)?;
        let metadata = fs::metadata(&src_disk).await.map_err(|e| not_found(e, src))?;
        if metadata.is_dir() {
            return Err(AllocationError::IsADirectory(src.to_path_buf()));
        }
        if fs::metadata(&dst_disk).await.is_ok_and(|m| m.is_dir()) {
            return Err(AllocationError::IsADirectory(dst.to_path_buf()));
        }

        self.ensure_parents(dst).await?;
        fs::copy(&src_disk, &dst_disk).await?;
        Ok(())
    }

    async fn open_reader(&self, path: &Path, size: u64) -> Result<StagedFile, AllocationError> {
        let disk = self.disk_path(path)?;
        let metadata = fs::metadata(&disk).await.map_err(|e| not_found(e, path))?;
        if metadata.is_dir() {
            return Err(AllocationError::IsADirectory(path.to_path_buf()));
        }

        let staged = StagedFile::copy_from(&self.staging_dir, &disk).await?;
        if staged.len() != size {
            tracing::debug!(
                "staged {} with {} bytes, caller expected {}",
                path.display(),
                staged.len(),
                size
            );
        }
        Ok(staged)
    }

    async fn write_stream(
        &self,
        path: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        options: &WriteOptions,
    ) -> Result<u64, AllocationError> {
        let disk = self.disk_path(path)?;
        match (fs::metadata(&disk).await, options.is_update) {
            (Ok(metadata), _) if metadata.is_dir() => {
                return Err(AllocationError::IsADirectory(path.to_path_buf()));
            }
            (Ok(_), false) => return Err(AllocationError::AlreadyExists(path.to_path_buf())),
            (Err(e), true) => return Err(not_found(e, path)),
            (Err(e), false) if e.kind() != io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        self.ensure_parents(path).await?;

        let mut file = fs::File::create(&disk).await?;
        let written = tokio::io::copy(reader, &mut file).await?;
        file.flush().await?;
        drop(file);

        if let Some(expected) = options.size {
            if expected != written {
                if let Err(e) = fs::remove_file(&disk).await {
                    tracing::warn!("failed to remove short write {}: {}", disk.display(), e);
                }
                return Err(AllocationError::SizeMismatch {
                    expected,
                    actual: written,
                });
            }
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn setup() -> (LocalAllocation, tempfile::TempDir) {
        let temp = tempfile::tempdir().unwrap();
        let staging = temp.path().join("staging");
        std::fs::create_dir_all(&staging).unwrap();
        let alloc = LocalAllocation::new(temp.path().join("alloc"), staging);
        (alloc, temp)
    }

    async fn put(alloc: &LocalAllocation, path: &str, data: &[u8]) {
        let mut reader = Cursor::new(data.to_vec());
        let options = WriteOptions {
            content_type: "text/plain".to_string(),
            size: Some(data.len() as u64),
            is_update: false,
        };
        alloc
            .write_stream(Path::new(path), &mut reader, &options)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fresh_allocation_has_no_root() {
        let (alloc, _temp) = setup();
        assert!(alloc.resolve(Path::new("/")).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_resolve_file_and_directory() {
        let (alloc, _temp) = setup();
        put(&alloc, "/docs/readme.txt", b"# hello").await;

        let file = alloc.resolve(Path::new("/docs/readme.txt")).await.unwrap();
        assert!(file.is_file());
        assert_eq!(file.size, 7);
        assert_eq!(file.name, "readme.txt");
        assert_eq!(file.mime_type.as_deref(), Some("text/plain"));
        assert_eq!(file.content_hash.len(), 64);

        let dir = alloc.resolve(Path::new("/docs")).await.unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.size, 7);
    }

    #[tokio::test]
    async fn test_rejects_parent_traversal() {
        let (alloc, _temp) = setup();
        let err = alloc.resolve(Path::new("/../etc")).await.unwrap_err();
        assert!(matches!(err, AllocationError::Internal(_)));
    }

    #[tokio::test]
    async fn test_list_and_copy() {
        let (alloc, _temp) = setup();
        put(&alloc, "/a.txt", b"aaa").await;
        alloc.create_dir(Path::new("/docs")).await.unwrap();
        alloc
            .copy(Path::new("/a.txt"), Path::new("/docs/b.txt"))
            .await
            .unwrap();

        let page = alloc
            .list(Path::new("/"), &ListOptions::default())
            .await
            .unwrap();
        let paths: Vec<_> = page
            .nodes
            .iter()
            .map(|n| n.path.to_string_lossy().to_string())
            .collect();
        assert_eq!(paths, vec!["/a.txt", "/docs", "/docs/b.txt"]);
    }

    #[tokio::test]
    async fn test_listing_skips_hashing() {
        let (alloc, _temp) = setup();
        put(&alloc, "/docs/a.txt", b"aaaa").await;

        let page = alloc
            .list(Path::new("/"), &ListOptions::default())
            .await
            .unwrap();
        let dir = page.nodes.iter().find(|n| n.name == "docs").unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir.size, 0);
        let file = page.nodes.iter().find(|n| n.name == "a.txt").unwrap();
        assert_eq!(file.size, 4);
        assert!(file.content_hash.is_empty());

        let resolved = alloc.resolve(Path::new("/docs/a.txt")).await.unwrap();
        assert_eq!(resolved.content_hash.len(), 64);
        assert_eq!(alloc.resolve(Path::new("/docs")).await.unwrap().size, 4);
    }

    #[tokio::test]
    async fn test_staged_read() {
        let (alloc, temp) = setup();
        put(&alloc, "/a.txt", b"abcdef").await;

        let staged = alloc.open_reader(Path::new("/a.txt"), 6).await.unwrap();
        let mut reader = staged.into_section(1, 3).await.unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).await.unwrap();
        assert_eq!(out, b"bcd");
        reader.close().unwrap();

        let staged_files = std::fs::read_dir(temp.path().join("staging")).unwrap().count();
        assert_eq!(staged_files, 0);
    }
}
