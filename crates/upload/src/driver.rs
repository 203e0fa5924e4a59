//! Whole-file upload on top of [`UploadSessionManager`].

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::UNIX_EPOCH;

use lanyue_protocol::{NewUploadTask, UploadMode, UploadTask};
use lanyue_transfer::{
    ChunkPlan, ChunkReader, DEFAULT_CHUNK_SIZE, ProgressSnapshot, RetryPolicy, TransferProgress,
    validate_file_name,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::{ProgressCallback, UploadApi};
use crate::body::UploadBody;
use crate::error::UploadError;
use crate::manager::UploadSessionManager;

/// Events emitted while a file is uploading.
#[derive(Debug, Clone)]
pub enum UploadEvent {
    Progress {
        name: String,
        snapshot: ProgressSnapshot,
    },
    Completed {
        name: String,
        session_id: String,
    },
    Failed {
        name: String,
        error: String,
    },
}

/// Uploads one local file: creates the session, resumes from the server's
/// cursor and submits the remaining chunks strictly in order.
pub struct UploadDriver<'a> {
    manager: UploadSessionManager<'a>,
    cancel: CancellationToken,
    chunk_size: u64,
}

impl<'a> UploadDriver<'a> {
    pub fn new(api: &'a dyn UploadApi, cancel: CancellationToken) -> Self {
        Self {
            manager: UploadSessionManager::new(api),
            cancel,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.manager = self.manager.with_retry(retry);
        self
    }

    /// Chunk size used when the server does not report one.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn manager(&self) -> &UploadSessionManager<'a> {
        &self.manager
    }

    /// Uploads `local_path` as described by `meta`.
    ///
    /// Emits `Progress` events while sending and exactly one `Completed` or
    /// `Failed` event at the end. On cancellation the server session is
    /// deleted and [`UploadError::Cancelled`] is returned.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        meta: &NewUploadTask,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadTask, UploadError> {
        let result = self.run(local_path, meta, events_tx).await;
        let event = match &result {
            Ok(task) => {
                info!(session = %task.session_id, name = %meta.name, "upload complete");
                UploadEvent::Completed {
                    name: meta.name.clone(),
                    session_id: task.session_id.clone(),
                }
            }
            Err(e) => {
                warn!(name = %meta.name, error = %e, "upload failed");
                UploadEvent::Failed {
                    name: meta.name.clone(),
                    error: e.to_string(),
                }
            }
        };
        if events_tx.try_send(event).is_err() {
            debug!(name = %meta.name, "upload result event dropped, receiver lagging");
        }
        result
    }

    async fn run(
        &self,
        local_path: &Path,
        meta: &NewUploadTask,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadTask, UploadError> {
        self.check_cancelled()?;

        let mut reader = ChunkReader::open(local_path).await?;
        if reader.file_size() != meta.size {
            return Err(UploadError::InvalidMeta(format!(
                "declared size {} but file has {} bytes",
                meta.size,
                reader.file_size()
            )));
        }

        let task = self.manager.create_session(meta).await?;
        if task.is_complete() {
            debug!(session = %task.session_id, "server already holds the file");
            return Ok(task);
        }

        let session_id = task.session_id.clone();
        let progress = Arc::new(Mutex::new(TransferProgress::new()));
        let sent = match task.mode {
            UploadMode::Stream => {
                self.send_stream(local_path, &task, &progress, events_tx)
                    .await
            }
            UploadMode::Chunk => {
                self.send_chunks(&mut reader, task, &progress, events_tx)
                    .await
            }
        };
        lock(&progress).reset();

        match sent {
            Err(UploadError::Cancelled) => {
                self.manager.delete_session(&session_id).await;
                Err(UploadError::Cancelled)
            }
            Err(e) => Err(e),
            Ok(task) if !task.is_complete() => Err(UploadError::Incomplete(task.status)),
            Ok(task) => Ok(task),
        }
    }

    async fn send_stream(
        &self,
        local_path: &Path,
        task: &UploadTask,
        progress: &Arc<Mutex<TransferProgress>>,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadTask, UploadError> {
        let body = UploadBody::File {
            path: local_path.to_path_buf(),
            len: task.size,
        };
        lock(progress).begin(Some(task.size), 0);
        let cb = progress_callback(progress, 0, &task.name, events_tx);

        tokio::select! {
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            r = self.manager.upload_stream(&task.session_id, body, cb) => r,
        }
    }

    async fn send_chunks(
        &self,
        reader: &mut ChunkReader,
        task: UploadTask,
        progress: &Arc<Mutex<TransferProgress>>,
        events_tx: &mpsc::Sender<UploadEvent>,
    ) -> Result<UploadTask, UploadError> {
        let chunk_size = task
            .chunk_info
            .map(|c| c.chunk_size)
            .filter(|&size| size > 0)
            .unwrap_or(self.chunk_size);
        let plan = ChunkPlan::new(task.size, chunk_size);
        let from = task.next_chunk_index();

        if from > 0 {
            info!(
                session = %task.session_id,
                from_chunk = from,
                total_chunks = plan.chunk_count(),
                "resuming upload"
            );
        }
        lock(progress).begin(Some(task.size), plan.offset_of(from));

        let name = task.name.clone();
        let mut last = task;
        for desc in plan.descriptors(&last.session_id, from) {
            self.check_cancelled()?;

            let data = reader.read(&desc).await?;
            let chunk_start = lock(progress).transferred();
            let cb = progress_callback(progress, chunk_start, &name, events_tx);

            last = tokio::select! {
                _ = self.cancel.cancelled() => return Err(UploadError::Cancelled),
                r = self.manager.upload_chunk(&desc.session_id, desc.index, data.into(), cb) => r?,
            };

            let snapshot = {
                let mut p = lock(progress);
                p.advance_to(chunk_start + desc.len);
                p.snapshot()
            };
            let _ = events_tx.try_send(UploadEvent::Progress {
                name: name.clone(),
                snapshot,
            });
        }

        Ok(last)
    }

    fn check_cancelled(&self) -> Result<(), UploadError> {
        if self.cancel.is_cancelled() {
            Err(UploadError::Cancelled)
        } else {
            Ok(())
        }
    }
}

fn lock(progress: &Mutex<TransferProgress>) -> std::sync::MutexGuard<'_, TransferProgress> {
    progress.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Transport callback that folds per-request byte counts into `progress`.
fn progress_callback(
    progress: &Arc<Mutex<TransferProgress>>,
    base: u64,
    name: &str,
    events_tx: &mpsc::Sender<UploadEvent>,
) -> ProgressCallback {
    let progress = Arc::clone(progress);
    let name = name.to_string();
    let events_tx = events_tx.clone();
    Arc::new(move |sent, _total| {
        let snapshot = {
            let mut p = lock(&progress);
            p.advance_to(base + sent);
            p.snapshot()
        };
        // Transport callbacks are synchronous; drop events when the
        // consumer lags.
        let _ = events_tx.try_send(UploadEvent::Progress {
            name: name.clone(),
            snapshot,
        });
    })
}

/// Builds creation metadata for a local file uploaded into `dest_dir`.
///
/// Picks chunked mode when the file is larger than `chunk_size`.
pub async fn describe_file(
    local_path: &Path,
    dest_dir: &str,
    chunk_size: u64,
    wipe: bool,
) -> Result<NewUploadTask, UploadError> {
    let name = local_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| UploadError::InvalidMeta(format!("no file name: {}", local_path.display())))?
        .to_string();
    validate_file_name(&name)?;

    let metadata = tokio::fs::metadata(local_path).await?;
    if !metadata.is_file() {
        return Err(UploadError::InvalidMeta(format!(
            "not a regular file: {}",
            local_path.display()
        )));
    }
    let modified = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);

    Ok(NewUploadTask {
        path: dest_dir.to_string(),
        web_path: name.clone(),
        mime_type: guess_mime_type(&name).to_string(),
        name,
        size: metadata.len(),
        modified,
        mode: UploadMode::for_size(metadata.len(), chunk_size),
        wipe,
    })
}

/// MIME type from the file extension, `application/octet-stream` if unknown.
pub fn guess_mime_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("txt" | "log" | "md") => "text/plain",
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        Some("mp3") => "audio/mpeg",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        _ => "application/octet-stream",
    }
}
