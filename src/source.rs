//! Upload content sources and the single-pass reader/hasher.
//!
//! A [`ContentSource`] hands out a byte stream for one uploaded file. The
//! orchestrator opens it only after the file passed validation, and reads
//! it exactly once with [`read_and_hash`].

use async_trait::async_trait;
use bytes::Bytes;
use std::io;
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use doclens_core::digest::ContentHasher;

/// Size of each read from an upload stream.
const READ_CHUNK: usize = 64 * 1024;

pub type ContentReader = Box<dyn AsyncRead + Send + Unpin>;

/// Something that can produce the bytes of one uploaded file.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Open the stream. Called at most once per file.
    async fn open(&self) -> io::Result<ContentReader>;
}

/// An uploaded file: its client-supplied name and where its bytes come from.
pub struct UploadedFile {
    pub file_name: String,
    pub content: Box<dyn ContentSource>,
}

impl UploadedFile {
    pub fn new(file_name: impl Into<String>, content: impl ContentSource + 'static) -> Self {
        Self {
            file_name: file_name.into(),
            content: Box::new(content),
        }
    }
}

/// Content already buffered in memory (multipart uploads). Opening shares
/// the buffer instead of copying it.
pub struct MemoryContent {
    bytes: Bytes,
}

impl MemoryContent {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

#[async_trait]
impl ContentSource for MemoryContent {
    async fn open(&self) -> io::Result<ContentReader> {
        Ok(Box::new(io::Cursor::new(self.bytes.clone())))
    }
}

/// A file on local disk (CLI uploads).
pub struct FileContent {
    path: PathBuf,
}

impl FileContent {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ContentSource for FileContent {
    async fn open(&self) -> io::Result<ContentReader> {
        let file = tokio::fs::File::open(&self.path).await?;
        Ok(Box::new(file))
    }
}

/// Read `reader` to the end once, returning the full payload and its hex
/// SHA-256 digest.
///
/// Each read races `cancel`; cancellation fails with
/// [`io::ErrorKind::Interrupted`]. Any read error aborts the whole read, so
/// a truncated payload is never returned.
pub async fn read_and_hash<R>(mut reader: R, cancel: &CancellationToken) -> io::Result<(Vec<u8>, String)>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = ContentHasher::new();
    let mut chunk = vec![0u8; READ_CHUNK];
    loop {
        let n = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "upload read cancelled"));
            }
            n = reader.read(&mut chunk) => n?,
        };
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(hasher.finish())
}
