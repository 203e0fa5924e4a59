//! Wire protocol for the Lanyue storage API.
//!
//! Every non-streaming endpoint answers with an [`Envelope`]; its `code` is
//! interpreted by [`classify`] into an [`Outcome`].

pub mod classify;
pub mod codes;
pub mod envelope;
pub mod error;
pub mod types;

// Re-export primary types for convenience.
pub use classify::{Notice, NoticeLevel, Outcome, Suppressed, UnclassifiedCode, classify};
pub use envelope::Envelope;
pub use error::{ApiError, ApiFuture, Rejection};
pub use types::{
    ChunkInfo, DirectoryEntry, NewUploadTask, SessionIdRequest, ShareQuery, UploadMode,
    UploadStatus, UploadTask,
};
