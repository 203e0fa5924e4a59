use lanyue_protocol::{ApiFuture, ShareQuery};
use serde::{Deserialize, Serialize};

/// Identifies a file inside a share and the byte offset to start from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRequest {
    pub mark: String,
    /// Full path of the file inside the share.
    pub path: String,
    #[serde(default)]
    pub password: String,
    /// Sent as `Range: bytes=N-` when non-zero.
    #[serde(skip)]
    pub range_start: u64,
}

impl SourceRequest {
    pub fn new(mark: impl Into<String>, path: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mark: mark.into(),
            path: path.into(),
            password: password.into(),
            range_start: 0,
        }
    }

    /// Query/body parameters sent to the source endpoint.
    pub fn query(&self) -> ShareQuery {
        ShareQuery {
            mark: self.mark.clone(),
            path: self.path.clone(),
            password: self.password.clone(),
        }
    }
}

/// Pull-based response body.
pub trait ByteStream: Send {
    /// Next chunk of the body, `None` at end of data.
    fn next_chunk(&mut self) -> ApiFuture<'_, Option<Vec<u8>>>;
}

/// An opened file body.
pub struct SourceStream {
    /// Bytes remaining in this response, if the server said.
    pub content_length: Option<u64>,
    /// Offset of the first body byte within the file. Zero when the server
    /// ignored the requested range.
    pub start_offset: u64,
    pub body: Box<dyn ByteStream>,
}

impl SourceStream {
    /// Full file size, when known.
    pub fn total_size(&self) -> Option<u64> {
        self.content_length.map(|len| len + self.start_offset)
    }
}

impl std::fmt::Debug for SourceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceStream")
            .field("content_length", &self.content_length)
            .field("start_offset", &self.start_offset)
            .finish_non_exhaustive()
    }
}

/// Opens a shared file for download.
///
/// A JSON envelope instead of a byte stream is returned as
/// `ApiError::Rejected`, without ever yielding a body.
pub trait SourceApi: Send + Sync {
    fn open(&self, request: &SourceRequest) -> ApiFuture<'_, SourceStream>;
}
