//! Upload error types.

use lanyue_protocol::{ApiError, UploadStatus};

/// Errors produced while uploading.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] lanyue_transfer::TransferError),

    /// The server did not report the task as finished after the last byte.
    #[error("upload incomplete: server reports {0:?}")]
    Incomplete(UploadStatus),

    #[error("cancelled")]
    Cancelled,

    #[error("invalid upload metadata: {0}")]
    InvalidMeta(String),
}

impl UploadError {
    /// Text for the user-facing notification, if any.
    ///
    /// Suppressed server codes produce no message.
    pub fn user_message(&self) -> Option<String> {
        match self {
            UploadError::Api(ApiError::Rejected(r)) => r.notice().map(|n| n.message),
            other => Some(other.to_string()),
        }
    }
}
