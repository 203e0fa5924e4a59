use lanyue_protocol::{ApiError, NewUploadTask, UploadTask};
use lanyue_transfer::RetryPolicy;
use tracing::{debug, info, warn};

use crate::api::{ProgressCallback, UploadApi};
use crate::body::UploadBody;
use crate::error::UploadError;

/// Thin operation layer over the upload-task endpoints.
///
/// Chunk ordering is the caller's responsibility: indices must be submitted
/// in increasing, gap-free order starting at the server's cursor. The server
/// rejects anything else with code 52001.
pub struct UploadSessionManager<'a> {
    api: &'a dyn UploadApi,
    retry: RetryPolicy,
}

impl<'a> UploadSessionManager<'a> {
    pub fn new(api: &'a dyn UploadApi) -> Self {
        Self {
            api,
            retry: RetryPolicy::default(),
        }
    }

    /// Replaces the per-chunk retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Registers a new upload task and returns it with its session id.
    pub async fn create_session(&self, meta: &NewUploadTask) -> Result<UploadTask, UploadError> {
        if meta.name.is_empty() {
            return Err(UploadError::InvalidMeta("empty file name".into()));
        }
        let task = self.api.create(meta).await?;
        info!(
            session = %task.session_id,
            name = %task.name,
            size = task.size,
            mode = ?task.mode,
            "upload session created"
        );
        Ok(task)
    }

    /// Sends the whole payload of a stream-mode task in one request.
    pub async fn upload_stream(
        &self,
        session_id: &str,
        body: UploadBody,
        on_progress: ProgressCallback,
    ) -> Result<UploadTask, UploadError> {
        debug!(session = %session_id, bytes = body.len(), "streaming upload body");
        Ok(self.api.stream(session_id, body, on_progress).await?)
    }

    /// Sends one chunk, retrying transient transport failures.
    ///
    /// Server rejections are returned immediately.
    pub async fn upload_chunk(
        &self,
        session_id: &str,
        index: u32,
        body: UploadBody,
        on_progress: ProgressCallback,
    ) -> Result<UploadTask, UploadError> {
        debug!(session = %session_id, index, bytes = body.len(), "uploading chunk");
        let task = self
            .retry
            .run("upload chunk", ApiError::is_transient, |_| {
                self.api
                    .chunk(session_id, index, body.clone(), on_progress.clone())
            })
            .await?;
        Ok(task)
    }

    /// Deletes a session. Best effort: failures are logged and swallowed.
    pub async fn delete_session(&self, session_id: &str) {
        match self.api.delete(session_id).await {
            Ok(()) => debug!(session = %session_id, "upload session deleted"),
            Err(e) => warn!(session = %session_id, error = %e, "failed to delete upload session"),
        }
    }

    /// Lists the caller's upload tasks.
    pub async fn list_sessions(&self) -> Result<Vec<UploadTask>, UploadError> {
        Ok(self.api.list().await?)
    }
}
