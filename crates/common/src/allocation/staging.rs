//! Local staging of remote file content.
//!
//! A read materialises the remote file into a temporary file before it can be
//! range-read. The temporary file is owned by a [`StagedFile`] and, once a
//! range has been picked, by the [`ObjectReader`] handed to the caller. Both
//! remove it when closed or dropped, whichever comes first.

use std::io::{self, SeekFrom};
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use tempfile::TempPath;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, ReadBuf, Take};

/// A file copied into the local staging directory.
#[derive(Debug)]
pub struct StagedFile {
    file: Option<File>,
    path: Option<TempPath>,
    len: u64,
}

impl StagedFile {
    /// Write `data` into a fresh temporary file inside `staging_dir`.
    pub async fn from_bytes(staging_dir: &Path, data: bytes::Bytes) -> io::Result<Self> {
        let staging_dir = staging_dir.to_path_buf();
        let path = tokio::task::spawn_blocking(move || -> io::Result<TempPath> {
            use std::io::Write;

            let mut tmp = tempfile::Builder::new()
                .prefix("staged-")
                .tempfile_in(&staging_dir)?;
            tmp.write_all(&data)?;
            tmp.flush()?;
            Ok(tmp.into_temp_path())
        })
        .await
        .map_err(io::Error::other)??;

        Self::open(path).await
    }

    /// Copy the file at `source` into a fresh temporary file inside `staging_dir`.
    pub async fn copy_from(staging_dir: &Path, source: &Path) -> io::Result<Self> {
        let path = tempfile::Builder::new()
            .prefix("staged-")
            .tempfile_in(staging_dir)?
            .into_temp_path();
        tokio::fs::copy(source, &path).await?;

        Self::open(path).await
    }

    async fn open(path: TempPath) -> io::Result<Self> {
        let file = File::open(&path).await?;
        let len = file.metadata().await?.len();
        Ok(Self {
            file: Some(file),
            path: Some(path),
            len,
        })
    }

    /// Length of the staged content in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Turn the staged file into a reader over `length` bytes starting at `offset`.
    ///
    /// On failure the staged file is released before the error is returned.
    pub async fn into_section(mut self, offset: u64, length: u64) -> io::Result<ObjectReader> {
        let mut file = match self.file.take() {
            Some(file) => file,
            None => return Err(io::Error::other("staged file already released")),
        };
        if let Err(e) = file.seek(SeekFrom::Start(offset)).await {
            drop(file);
            return Err(e);
        }

        Ok(ObjectReader {
            reader: Some(file.take(length)),
            path: self.path.take(),
        })
    }

    /// Close the file handle and remove the staged file.
    pub fn close(mut self) -> io::Result<()> {
        self.release()
    }

    fn release(&mut self) -> io::Result<()> {
        drop(self.file.take());
        match self.path.take() {
            Some(path) => path.close(),
            None => Ok(()),
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("failed to remove staged file: {}", e);
        }
    }
}

/// Bounded reader over a staged file.
///
/// Reading to the end does not release the staged file; call
/// [`ObjectReader::close`] or drop the reader.
#[derive(Debug)]
pub struct ObjectReader {
    reader: Option<Take<File>>,
    path: Option<TempPath>,
}

impl ObjectReader {
    /// Bytes left to read
    pub fn remaining(&self) -> u64 {
        self.reader.as_ref().map(|r| r.limit()).unwrap_or(0)
    }

    /// Close the reader and remove the staged file, reporting removal failures.
    pub fn close(mut self) -> io::Result<()> {
        self.release()
    }

    fn release(&mut self) -> io::Result<()> {
        drop(self.reader.take());
        match self.path.take() {
            Some(path) => path.close(),
            None => Ok(()),
        }
    }
}

impl AsyncRead for ObjectReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut().reader.as_mut() {
            Some(reader) => Pin::new(reader).poll_read(cx, buf),
            None => Poll::Ready(Ok(())),
        }
    }
}

impl Drop for ObjectReader {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("failed to remove staged file: {}", e);
        }
    }
}
