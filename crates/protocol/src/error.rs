//! Errors shared by every API seam.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use crate::classify::{Notice, Outcome, Suppressed, UnclassifiedCode, classify};

/// Boxed future returned by the API seam traits.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// A non-success envelope returned by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: i64,
    pub message: String,
    /// `Err` when the code is outside the known table.
    pub outcome: Result<Outcome, UnclassifiedCode>,
}

impl Rejection {
    /// Builds a rejection, classifying `code`.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            outcome: classify(code),
        }
    }

    /// Returns the suppressed kind, if the code is one.
    pub fn suppressed(&self) -> Option<Suppressed> {
        self.outcome.ok().and_then(|o| o.suppressed())
    }

    /// Notice for the generic notification path.
    ///
    /// Unclassified codes are reported as errors with the server message.
    pub fn notice(&self) -> Option<Notice> {
        match self.outcome {
            Ok(outcome) => outcome.notice(&self.message),
            Err(_) => Some(Notice {
                level: crate::classify::NoticeLevel::Error,
                message: self.message.clone(),
            }),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "server rejected request with code {}", self.code)
        } else {
            write!(f, "{} (code {})", self.message, self.code)
        }
    }
}

/// Errors produced while talking to the storage API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Network, DNS or connection failure.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("request timed out")]
    Timeout,

    /// Non-success HTTP status line.
    #[error("HTTP status {0}")]
    Status(u16),

    /// The server answered with a non-success envelope.
    #[error("rejected: {0}")]
    Rejected(Rejection),

    /// Unexpected content type, missing data or malformed envelope.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a local request body failed.
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ApiError {
    /// Returns `true` for failures worth retrying (transport level only).
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Transport(_) | ApiError::Timeout => true,
            ApiError::Status(status) => *status >= 500,
            ApiError::Rejected(_)
            | ApiError::Protocol(_)
            | ApiError::Json(_)
            | ApiError::Io(_) => false,
        }
    }

    /// Returns the server rejection, if this is one.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ApiError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}
