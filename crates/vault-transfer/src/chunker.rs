use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeekExt, SeekFrom};

use crate::TransferError;

/// Reads a local file as an ordered sequence of fixed-size byte ranges.
///
/// Chunk indices count from zero here; the wire protocol numbers chunks from
/// one, which is the caller's concern. Readers over distinct indices hold
/// independent file handles and do not affect each other's position.
#[derive(Debug)]
pub struct Chunker {
    path: PathBuf,
    chunk_size: i64,
    file_size: i64,
    num_chunks: i64,
}

impl Chunker {
    /// Opens `path` for chunked reading with the given chunk size in bytes.
    ///
    /// A chunk size below one is a programmer error and fails with
    /// [`TransferError::InvalidChunkSize`]. A zero-byte file still counts as
    /// one (empty) chunk, since the upload protocol requires every file to
    /// produce at least one chunk.
    pub async fn new(path: &Path, chunk_size: i64) -> Result<Self, TransferError> {
        if chunk_size < 1 {
            return Err(TransferError::InvalidChunkSize);
        }
        let meta = tokio::fs::metadata(path).await?;
        let file_size = meta.len() as i64;
        let num_chunks = if file_size == 0 {
            1
        } else {
            (file_size + chunk_size - 1) / chunk_size
        };
        Ok(Self {
            path: path.to_path_buf(),
            chunk_size,
            file_size,
            num_chunks,
        })
    }

    /// Total file size in bytes.
    pub fn file_size(&self) -> i64 {
        self.file_size
    }

    /// Number of chunks the file splits into (at least one).
    pub fn num_chunks(&self) -> i64 {
        self.num_chunks
    }

    /// Size of chunk `i` in bytes: the nominal chunk size for all but the
    /// last chunk, the remainder for the last.
    pub fn chunk_len(&self, i: i64) -> i64 {
        if i >= 0 && i < self.num_chunks - 1 {
            return self.chunk_size;
        }
        self.file_size - i * self.chunk_size
    }

    /// Returns a reader over chunk `i`, backed by its own file handle.
    pub async fn chunk_reader(&self, i: i64) -> Result<ChunkReader, TransferError> {
        let mut file = File::open(&self.path).await?;
        file.seek(SeekFrom::Start((i * self.chunk_size) as u64))
            .await?;
        Ok(ChunkReader {
            inner: file.take(self.chunk_len(i).max(0) as u64),
        })
    }
}

/// Reader over a single chunk, yielding exactly the chunk's length.
pub struct ChunkReader {
    inner: tokio::io::Take<File>,
}

impl AsyncRead for ChunkReader {
    fn poll_read(
        mut self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        std::pin::Pin::new(&mut self.inner).poll_read(cx, buf)
    }
}
