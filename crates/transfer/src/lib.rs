//! Transfer primitives shared by uploads and downloads: chunk planning,
//! chunked file reads, progress accounting and retry policy.

mod chunked;
mod progress;
mod retry;
mod validation;

pub use chunked::{ChunkDescriptor, ChunkPlan, ChunkReader};
pub use progress::{ProgressSnapshot, TransferProgress};
pub use retry::RetryPolicy;
pub use validation::validate_file_name;

/// Default chunk size: 30 MiB.
///
/// Matches the server's default. The server reports the size it actually
/// uses in `chunk_info.chunk_size`, which takes precedence.
pub const DEFAULT_CHUNK_SIZE: u64 = 30 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chunk index {index} out of range (total {total})")]
    ChunkOutOfRange { index: u32, total: u32 },

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
