//! Upload endpoint seam.
//!
//! Implemented over HTTP by `lanyue-api-client`; tests use an in-memory
//! double.

use std::sync::Arc;

use lanyue_protocol::{ApiFuture, NewUploadTask, UploadTask};

use crate::body::UploadBody;

/// Transport progress callback: `(bytes_sent, total)` for the current request.
pub type ProgressCallback = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// The upload-task endpoints.
pub trait UploadApi: Send + Sync {
    /// `POST /upload_task/create`.
    fn create(&self, meta: &NewUploadTask) -> ApiFuture<'_, UploadTask>;

    /// `POST /upload_task/stream/{session_id}/` with the whole file.
    fn stream(
        &self,
        session_id: &str,
        body: UploadBody,
        on_progress: ProgressCallback,
    ) -> ApiFuture<'_, UploadTask>;

    /// `POST /upload_task/chunk/{session_id}/{index}` with one slice.
    fn chunk(
        &self,
        session_id: &str,
        index: u32,
        body: UploadBody,
        on_progress: ProgressCallback,
    ) -> ApiFuture<'_, UploadTask>;

    /// `POST /upload_task/delete`.
    fn delete(&self, session_id: &str) -> ApiFuture<'_, ()>;

    /// `POST /upload_task/list`.
    fn list(&self) -> ApiFuture<'_, Vec<UploadTask>>;
}
