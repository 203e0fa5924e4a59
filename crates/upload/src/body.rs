//! Request bodies for the stream and chunk endpoints.

use std::io::{self, Cursor};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};

/// Reader handed to the transport.
pub type BodyReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

/// Payload of one upload request.
///
/// Cloning is cheap, so a failed request can be sent again. File bodies are
/// read while the request goes out and never sit in memory as a whole.
#[derive(Debug, Clone)]
pub enum UploadBody {
    Memory(Arc<[u8]>),
    /// The first `len` bytes of a local file.
    File { path: PathBuf, len: u64 },
}

impl UploadBody {
    pub fn len(&self) -> u64 {
        match self {
            UploadBody::Memory(bytes) => bytes.len() as u64,
            UploadBody::File { len, .. } => *len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Opens a reader positioned at the start of the body.
    pub async fn open(&self) -> io::Result<BodyReader> {
        match self {
            UploadBody::Memory(bytes) => Ok(Box::new(Cursor::new(Arc::clone(bytes)))),
            UploadBody::File { path, len } => {
                let file = tokio::fs::File::open(path).await?;
                Ok(Box::new(file.take(*len)))
            }
        }
    }

    /// Reads the whole body into memory.
    pub async fn to_vec(&self) -> io::Result<Vec<u8>> {
        let mut reader = self.open().await?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data).await?;
        Ok(data)
    }
}

impl From<Vec<u8>> for UploadBody {
    fn from(data: Vec<u8>) -> Self {
        UploadBody::Memory(data.into())
    }
}
