//! In-memory upload server used by the unit tests.
//!
//! Behaves like the real endpoints: chunks must arrive at the server's
//! cursor, otherwise the request is rejected with code 52001.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lanyue_protocol::{
    ApiError, ApiFuture, ChunkInfo, NewUploadTask, Rejection, UploadMode, UploadStatus,
    UploadTask, codes,
};
use lanyue_transfer::ChunkPlan;
use tokio_util::sync::CancellationToken;

use crate::api::{ProgressCallback, UploadApi};
use crate::body::UploadBody;

pub(crate) struct MockUploadServer {
    chunk_size: u64,
    tasks: Mutex<HashMap<String, (UploadTask, Vec<u8>)>>,
    next_id: AtomicU32,
    fail_chunks: AtomicU32,
    calls: AtomicUsize,
    pub(crate) chunk_indices: Mutex<Vec<u32>>,
    pub(crate) deleted: Mutex<Vec<String>>,
    /// Bodies received by the stream endpoint.
    pub(crate) stream_bodies: Mutex<Vec<UploadBody>>,
    cancel_on: Mutex<Option<(u32, CancellationToken)>>,
}

impl MockUploadServer {
    pub(crate) fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size,
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            fail_chunks: AtomicU32::new(0),
            calls: AtomicUsize::new(0),
            chunk_indices: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            stream_bodies: Mutex::new(Vec::new()),
            cancel_on: Mutex::new(None),
        }
    }

    /// Makes the next `n` chunk requests fail at the transport level.
    pub(crate) fn fail_next_chunks(&self, n: u32) {
        self.fail_chunks.store(n, Ordering::SeqCst);
    }

    /// Cancels `token` once chunk `index` has been accepted.
    pub(crate) fn cancel_after_chunk(&self, index: u32, token: CancellationToken) {
        *self.cancel_on.lock().unwrap() = Some((index, token));
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn stored(&self, session_id: &str) -> Vec<u8> {
        self.tasks
            .lock()
            .unwrap()
            .get(session_id)
            .map(|(_, data)| data.clone())
            .unwrap_or_default()
    }

    /// Seeds a session with bytes already received, as after an interrupted
    /// upload.
    pub(crate) fn preload(&self, meta: &NewUploadTask, data: &[u8]) {
        let mut task = self.build_task(meta);
        let info = task.chunk_info.as_mut().unwrap();
        info.chunk_cur = (data.len() as u64 / self.chunk_size) as u32;
        task.uploaded = data.len() as u64;
        let id = task.session_id.clone();
        self.tasks.lock().unwrap().insert(id, (task, data.to_vec()));
    }

    fn build_task(&self, meta: &NewUploadTask) -> UploadTask {
        let id = format!("session-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let chunk_info = (meta.mode == UploadMode::Chunk).then(|| ChunkInfo {
            chunk_size: self.chunk_size,
            chunk_total: ChunkPlan::new(meta.size, self.chunk_size).chunk_count(),
            chunk_cur: 0,
        });
        UploadTask {
            session_id: id,
            path: meta.path.clone(),
            web_path: meta.web_path.clone(),
            name: meta.name.clone(),
            size: meta.size,
            modified: meta.modified,
            mime_type: meta.mime_type.clone(),
            status: UploadStatus::Uploading,
            mode: meta.mode,
            wipe: meta.wipe,
            chunk_info,
            uploaded: 0,
        }
    }

    fn lookup(&self, session_id: &str) -> Result<(), ApiError> {
        if self.tasks.lock().unwrap().contains_key(session_id) {
            Ok(())
        } else {
            Err(ApiError::Rejected(Rejection::new(codes::FAILED, "upload task not found")))
        }
    }
}

impl UploadApi for MockUploadServer {
    fn create(&self, meta: &NewUploadTask) -> ApiFuture<'_, UploadTask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        // A session with the same destination resumes instead of restarting.
        let existing = self
            .tasks
            .lock()
            .unwrap()
            .values()
            .find(|(t, _)| t.path == meta.path && t.name == meta.name)
            .map(|(t, _)| t.clone());
        let task = existing.unwrap_or_else(|| {
            let task = self.build_task(meta);
            self.tasks
                .lock()
                .unwrap()
                .insert(task.session_id.clone(), (task.clone(), Vec::new()));
            task
        });
        Box::pin(async move { Ok(task) })
    }

    fn stream(
        &self,
        session_id: &str,
        body: UploadBody,
        on_progress: ProgressCallback,
    ) -> ApiFuture<'_, UploadTask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let session_id = session_id.to_string();
        Box::pin(async move {
            self.lookup(&session_id)?;
            let data = body.to_vec().await?;
            self.stream_bodies.lock().unwrap().push(body);
            let total = data.len() as u64;
            on_progress(total / 2, Some(total));
            on_progress(total, Some(total));
            let mut tasks = self.tasks.lock().unwrap();
            let (task, stored) = tasks.get_mut(&session_id).unwrap();
            *stored = data;
            task.uploaded = total;
            task.status = UploadStatus::Success;
            Ok(task.clone())
        })
    }

    fn chunk(
        &self,
        session_id: &str,
        index: u32,
        body: UploadBody,
        on_progress: ProgressCallback,
    ) -> ApiFuture<'_, UploadTask> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let session_id = session_id.to_string();
        Box::pin(async move {
            let pending = self.fail_chunks.load(Ordering::SeqCst);
            if pending > 0 {
                self.fail_chunks.store(pending - 1, Ordering::SeqCst);
                return Err(ApiError::Transport("connection reset".into()));
            }
            self.lookup(&session_id)?;
            let data = body.to_vec().await?;
            self.chunk_indices.lock().unwrap().push(index);

            let mut tasks = self.tasks.lock().unwrap();
            let (task, stored) = tasks.get_mut(&session_id).unwrap();
            let info = task.chunk_info.as_mut().unwrap();
            if index != info.chunk_cur {
                return Err(ApiError::Rejected(Rejection::new(
                    codes::UPLOAD_TASK_ERROR,
                    format!("expected chunk {}, got {index}", info.chunk_cur),
                )));
            }
            let len = data.len() as u64;
            on_progress(len, Some(len));
            stored.extend(data);
            info.chunk_cur += 1;
            task.uploaded += len;
            if info.chunk_cur == info.chunk_total {
                task.status = UploadStatus::Success;
            }
            if let Some((at, token)) = self.cancel_on.lock().unwrap().as_ref()
                && *at == index
            {
                token.cancel();
            }
            Ok(task.clone())
        })
    }

    fn delete(&self, session_id: &str) -> ApiFuture<'_, ()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let session_id = session_id.to_string();
        Box::pin(async move {
            self.deleted.lock().unwrap().push(session_id.clone());
            self.tasks.lock().unwrap().remove(&session_id);
            Ok(())
        })
    }

    fn list(&self) -> ApiFuture<'_, Vec<UploadTask>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Ok(self
                .tasks
                .lock()
                .unwrap()
                .values()
                .map(|(t, _)| t.clone())
                .collect())
        })
    }
}

pub(crate) fn new_task(name: &str, size: u64, mode: UploadMode) -> NewUploadTask {
    NewUploadTask {
        path: "/disk/docs/".into(),
        web_path: name.into(),
        name: name.into(),
        size,
        modified: 1_700_000_000,
        mime_type: "application/octet-stream".into(),
        mode,
        wipe: false,
    }
}

pub(crate) fn noop_progress() -> ProgressCallback {
    Arc::new(|_, _| {})
}
