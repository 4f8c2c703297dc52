//! Allocation service seam
//!
//! An allocation is a single-rooted tree of directories and files owned by a
//! storage backend. Everything the gateway knows about the tree goes through
//! the [`Allocation`] trait:
//!
//! - **[`Allocation::resolve`]**: metadata for one path
//! - **[`Allocation::list`]**: one page of children, with cursor and common prefixes
//! - **[`Allocation::create_dir`]**, **[`Allocation::delete`]**, **[`Allocation::copy`]**: tree mutations
//! - **[`Allocation::open_reader`]**: materialise a file into a local [`StagedFile`]
//! - **[`Allocation::write_stream`]**: upload or update a file from a reader
//!
//! Two backends ship with the crate: [`MemoryAllocation`] and [`LocalAllocation`].
//! Both share the pagination rules implemented by [`paginate`].

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

mod local;
mod memory;
mod staging;

pub use local::LocalAllocation;
pub use memory::MemoryAllocation;
pub use staging::{ObjectReader, StagedFile};

/// Content type used when nothing better is known.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Directory,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::File => write!(f, "file"),
            NodeKind::Directory => write!(f, "directory"),
        }
    }
}

/// Snapshot of a single entry in the allocation tree.
///
/// Nodes are owned by the backend; the gateway only reads them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Absolute path within the allocation, e.g. `/docs/readme.md`
    pub path: PathBuf,
    /// Last path segment, `/` for the allocation root
    pub name: String,
    pub kind: NodeKind,
    /// Stored size. For directories, the total size of the files beneath.
    pub size: u64,
    /// Size of the original content as uploaded
    pub actual_size: u64,
    pub mime_type: Option<String>,
    /// Hex encoded SHA-256 of the file content, empty for directories and
    /// when not computed
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }
}

/// Options for a single [`Allocation::list`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Resume strictly after this path, relative to the listed directory
    pub marker: String,
    /// Only return nodes of this kind
    pub type_filter: Option<NodeKind>,
    /// Maximum number of nodes in the page, `0` for no limit
    pub max_keys: usize,
    /// List direct children only and report subdirectories as common prefixes
    pub delimited: bool,
}

/// One page of a directory listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListPage {
    pub nodes: Vec<Node>,
    pub is_truncated: bool,
    /// Cursor for the next page; non-empty exactly when `is_truncated`
    pub next_marker: String,
    /// Absolute directory paths with a trailing `/`, delimited listings only
    pub common_prefixes: Vec<String>,
}

/// Options for [`Allocation::write_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub content_type: String,
    /// Expected number of bytes, if known up front
    pub size: Option<u64>,
    /// Replace an existing file instead of creating a new one
    pub is_update: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AllocationError {
    #[error("path not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("path already exists: {}", .0.display())]
    AlreadyExists(PathBuf),
    #[error("path is not a directory: {}", .0.display())]
    NotADirectory(PathBuf),
    #[error("path is a directory: {}", .0.display())]
    IsADirectory(PathBuf),
    #[error("size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: u64, actual: u64 },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("allocation error: {0}")]
    Internal(String),
}

impl AllocationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AllocationError::NotFound(_))
    }
}

#[async_trait]
pub trait Allocation: Send + Sync + fmt::Debug + 'static {
    /// Get the node at `path`
    ///
    /// # Returns
    /// * `Ok(Node)` - The node description
    /// * `Err(AllocationError::NotFound)` - Nothing exists at `path`
    async fn resolve(&self, path: &Path) -> Result<Node, AllocationError>;

    /// List one page of the nodes beneath the directory at `path`
    ///
    /// Non-delimited listings walk the whole subtree. Pages are ordered
    /// lexicographically by path. Backends may leave `content_hash` empty
    /// and directory `size` at 0 in listed nodes; `resolve` is exact.
    async fn list(&self, path: &Path, options: &ListOptions) -> Result<ListPage, AllocationError>;

    /// Create a directory, along with any missing parents
    async fn create_dir(&self, path: &Path) -> Result<(), AllocationError>;

    /// Delete a file, or a directory and everything beneath it
    async fn delete(&self, path: &Path) -> Result<(), AllocationError>;

    /// Copy the file at `src` to `dst`
    async fn copy(&self, src: &Path, dst: &Path) -> Result<(), AllocationError>;

    /// Materialise the file at `path` into a local staging file
    ///
    /// # Arguments
    /// * `path` - The file to read
    /// * `size` - The size reported by [`Allocation::resolve`]
    async fn open_reader(&self, path: &Path, size: u64) -> Result<StagedFile, AllocationError>;

    /// Stream `reader` into the file at `path`, returning the number of bytes written
    async fn write_stream(
        &self,
        path: &Path,
        reader: &mut (dyn AsyncRead + Send + Unpin),
        options: &WriteOptions,
    ) -> Result<u64, AllocationError>;
}

/// Apply marker, type filter, delimiter and page size to the candidate nodes
/// found beneath `base`.
///
/// Candidates are sorted by path string before anything else, so backends may
/// hand them over in any order. Directories seen in a delimited listing are
/// reported as common prefixes and do not count toward `max_keys`, unless the
/// type filter selects directories.
pub fn paginate(base: &Path, mut candidates: Vec<Node>, options: &ListOptions) -> ListPage {
    candidates.sort_by(|a, b| path_key(&a.path).cmp(&path_key(&b.path)));

    let offset = if options.marker.is_empty() {
        None
    } else {
        Some(path_key(&base.join(options.marker.trim_start_matches('/'))))
    };

    let mut remaining = candidates
        .into_iter()
        .filter(|node| match &offset {
            Some(offset) => path_key(&node.path).as_str() > offset.as_str(),
            None => true,
        })
        .filter(|node| match options.type_filter {
            Some(kind) => node.kind == kind,
            None => true,
        })
        .peekable();

    // an explicit directory filter asks for the directories themselves
    let group_dirs = options.delimited && options.type_filter != Some(NodeKind::Directory);

    let mut page = ListPage::default();
    while let Some(node) = remaining.next() {
        if group_dirs && node.is_dir() {
            page.common_prefixes.push(format!("{}/", path_key(&node.path)));
            continue;
        }

        page.nodes.push(node);
        if options.max_keys != 0 && page.nodes.len() >= options.max_keys {
            if remaining.peek().is_some() {
                let last = &page.nodes[page.nodes.len() - 1].path;
                page.is_truncated = true;
                page.next_marker = relative_key(base, last);
            }
            break;
        }
    }

    page
}

/// Path as a comparable string without a trailing separator
pub(crate) fn path_key(path: &Path) -> String {
    let key = path.to_string_lossy();
    if key.len() > 1 {
        key.trim_end_matches('/').to_string()
    } else {
        key.to_string()
    }
}

fn relative_key(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .map(|rel| rel.to_string_lossy().to_string())
        .unwrap_or_else(|_| path_key(path))
}

/// Last segment of `path`, `/` for the root
pub(crate) fn node_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "/".to_string())
}
