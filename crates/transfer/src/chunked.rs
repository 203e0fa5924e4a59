use std::io::SeekFrom;
use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::{DEFAULT_CHUNK_SIZE, TransferError};

/// One slice of a chunked upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub session_id: String,
    /// Zero-based chunk index.
    pub index: u32,
    pub offset: u64,
    pub len: u64,
}

/// Splits a file of `size` bytes into fixed-size chunks.
///
/// Only the last chunk may be shorter. A file no larger than one chunk is a
/// single chunk, including empty files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    size: u64,
    chunk_size: u64,
}

impl ChunkPlan {
    /// If `chunk_size` is 0, [`DEFAULT_CHUNK_SIZE`] is used.
    pub fn new(size: u64, chunk_size: u64) -> Self {
        let chunk_size = if chunk_size == 0 {
            DEFAULT_CHUNK_SIZE
        } else {
            chunk_size
        };
        Self { size, chunk_size }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn chunk_count(&self) -> u32 {
        if self.size <= self.chunk_size {
            1
        } else {
            self.size.div_ceil(self.chunk_size) as u32
        }
    }

    /// Byte offset where chunk `index` starts.
    pub fn offset_of(&self, index: u32) -> u64 {
        (index as u64).saturating_mul(self.chunk_size).min(self.size)
    }

    pub fn descriptor(&self, session_id: &str, index: u32) -> Result<ChunkDescriptor, TransferError> {
        let total = self.chunk_count();
        if index >= total {
            return Err(TransferError::ChunkOutOfRange { index, total });
        }
        let offset = self.offset_of(index);
        let len = self.chunk_size.min(self.size - offset);
        Ok(ChunkDescriptor {
            session_id: session_id.to_string(),
            index,
            offset,
            len,
        })
    }

    /// Descriptors for chunks `from..chunk_count()`, in order.
    pub fn descriptors(&self, session_id: &str, from: u32) -> Vec<ChunkDescriptor> {
        (from..self.chunk_count())
            .filter_map(|i| self.descriptor(session_id, i).ok())
            .collect()
    }
}

/// Reads chunk payloads from a local file.
pub struct ChunkReader {
    file: File,
    file_size: u64,
}

impl ChunkReader {
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path).await?;
        let file_size = file.metadata().await?.len();
        Ok(Self { file, file_size })
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Reads exactly the bytes described by `desc`.
    pub async fn read(&mut self, desc: &ChunkDescriptor) -> Result<Vec<u8>, TransferError> {
        self.file.seek(SeekFrom::Start(desc.offset)).await?;
        let mut buf = vec![0u8; desc.len as usize];
        self.file.read_exact(&mut buf).await?;
        Ok(buf)
    }
}
