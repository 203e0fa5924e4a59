use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use lanyue_protocol::ApiError;
use lanyue_transfer::{ProgressSnapshot, RetryPolicy, TransferProgress};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::DownloadError;
use crate::sink::{SaveSink, SaveTarget};
use crate::source::{SourceApi, SourceRequest};

/// Default time to wait for the next body chunk before giving up.
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Default time to wait for the source to answer with a body or an envelope.
pub const DEFAULT_OPEN_TIMEOUT: Duration = Duration::from_secs(30);

/// Lifecycle of the pipeline. Always returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Idle,
    Preparing,
    Negotiating,
    Streaming,
    Completed,
    Failed,
}

/// Events for the presentation layer.
///
/// Delivered with `try_send`: a consumer that falls behind loses events but
/// never holds up the transfer. [`DownloadPipeline::state`] and
/// [`DownloadPipeline::progress`] always reflect the latest values.
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadEvent {
    State(DownloadState),
    /// Failure message to show.
    Message(String),
    DialogOpened { name: String },
    Progress(ProgressSnapshot),
    DialogClosed,
}

/// Result of one [`DownloadPipeline::download`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Total bytes on disk, including any resumed prefix.
    Completed { bytes: u64 },
    Failed { message: String },
    /// Another download is in flight; nothing was done.
    Busy,
}

/// A file to download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadItem {
    pub request: SourceRequest,
    /// Suggested local file name.
    pub name: String,
    /// Size from the directory listing, used when the response has no length.
    pub size: Option<u64>,
}

/// At most one download at a time.
#[derive(Debug, Clone, Default)]
pub struct SingleFlight(Arc<AtomicBool>);

impl SingleFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes the flag, or returns `None` if it is already held.
    pub fn try_acquire(&self) -> Option<FlightGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(Arc::clone(&self.0)))
    }

    pub fn is_busy(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Holds the single-flight flag; releases it on drop.
#[derive(Debug)]
pub struct FlightGuard(Arc<AtomicBool>);

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Streams shared files into local sinks.
///
/// Flow: acquire sink, negotiate the source, then pull, write and report
/// chunk by chunk. The sink is always closed and cleanup always runs,
/// whatever the outcome.
pub struct DownloadPipeline<'a> {
    source: &'a dyn SourceApi,
    target: &'a dyn SaveTarget,
    events_tx: mpsc::Sender<DownloadEvent>,
    flight: SingleFlight,
    retry: RetryPolicy,
    open_timeout: Duration,
    stall_timeout: Duration,
    cancel: CancellationToken,
    current: Mutex<CancellationToken>,
    state: Mutex<DownloadState>,
    progress: Mutex<TransferProgress>,
}

impl<'a> DownloadPipeline<'a> {
    pub fn new(
        source: &'a dyn SourceApi,
        target: &'a dyn SaveTarget,
        events_tx: mpsc::Sender<DownloadEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            source,
            target,
            events_tx,
            flight: SingleFlight::new(),
            retry: RetryPolicy::default(),
            open_timeout: DEFAULT_OPEN_TIMEOUT,
            stall_timeout: DEFAULT_STALL_TIMEOUT,
            current: Mutex::new(cancel.child_token()),
            cancel,
            state: Mutex::new(DownloadState::Idle),
            progress: Mutex::new(TransferProgress::new()),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Limit for each attempt to open the source.
    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }

    pub fn with_stall_timeout(mut self, timeout: Duration) -> Self {
        self.stall_timeout = timeout;
        self
    }

    /// Shares the single-flight flag with other pipelines.
    pub fn with_single_flight(mut self, flight: SingleFlight) -> Self {
        self.flight = flight;
        self
    }

    pub fn state(&self) -> DownloadState {
        *lock(&self.state)
    }

    pub fn progress(&self) -> ProgressSnapshot {
        lock(&self.progress).snapshot()
    }

    pub fn is_busy(&self) -> bool {
        self.flight.is_busy()
    }

    /// Cancels the download in flight, if any.
    pub fn cancel_current(&self) {
        lock(&self.current).cancel();
    }

    /// Downloads `item`.
    ///
    /// Returns [`DownloadOutcome::Busy`] without touching the network when
    /// another download holds the single-flight flag.
    pub async fn download(&self, item: &DownloadItem) -> DownloadOutcome {
        let Some(guard) = self.flight.try_acquire() else {
            debug!(name = %item.name, "download already in flight");
            return DownloadOutcome::Busy;
        };

        let cancel = self.cancel.child_token();
        *lock(&self.current) = cancel.clone();

        self.set_state(DownloadState::Preparing);

        let mut sink: Option<Box<dyn SaveSink>> = None;
        let mut result = self.transfer(item, &cancel, &mut sink).await;

        if let Some(mut sink) = sink
            && let Err(e) = sink.close(result.is_ok()).await
        {
            warn!(name = %item.name, error = %e, "failed to close save target");
            if result.is_ok() {
                result = Err(DownloadError::Sink(e));
            }
        }

        let outcome = match result {
            Ok(bytes) => {
                info!(mark = %item.request.mark, name = %item.name, bytes, "download complete");
                self.set_state(DownloadState::Completed);
                DownloadOutcome::Completed { bytes }
            }
            Err(e) => {
                let message = e.user_message();
                warn!(mark = %item.request.mark, name = %item.name, error = %e, "download failed");
                self.set_state(DownloadState::Failed);
                self.emit(DownloadEvent::Message(message.clone()));
                DownloadOutcome::Failed { message }
            }
        };

        self.finish();
        drop(guard);
        outcome
    }

    async fn transfer(
        &self,
        item: &DownloadItem,
        cancel: &CancellationToken,
        slot: &mut Option<Box<dyn SaveSink>>,
    ) -> Result<u64, DownloadError> {
        let sink = self
            .target
            .acquire(&item.name)
            .await
            .map_err(DownloadError::SinkUnavailable)?;
        let sink = slot.insert(sink);
        let resume = sink.resume_offset();

        self.set_state(DownloadState::Negotiating);
        let mut request = item.request.clone();
        request.range_start = resume;

        let (source, open_timeout, request) = (self.source, self.open_timeout, &request);
        let open = move |_| async move {
            match tokio::time::timeout(open_timeout, source.open(request)).await {
                Ok(opened) => opened,
                Err(_) => Err(ApiError::Timeout),
            }
        };
        let stream = tokio::select! {
            _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
            r = self.retry.run("open download", ApiError::is_transient, open) => r?,
        };

        let start = stream.start_offset;
        if start != resume {
            if start != 0 {
                return Err(ApiError::Protocol(format!(
                    "body starts at byte {start}, expected {resume} or 0"
                ))
                .into());
            }
            debug!(name = %item.name, resume, "range not honoured, restarting from zero");
            sink.rewind().await.map_err(DownloadError::Sink)?;
        }
        let declared = stream.total_size();
        let total = declared.or(item.size);

        self.set_state(DownloadState::Streaming);
        self.emit(DownloadEvent::DialogOpened {
            name: item.name.clone(),
        });
        lock(&self.progress).begin(total, start);

        let mut body = stream.body;
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                r = tokio::time::timeout(self.stall_timeout, body.next_chunk()) => {
                    r.map_err(|_| DownloadError::Stalled(self.stall_timeout))??
                }
            };
            let Some(chunk) = next else {
                break;
            };

            tokio::select! {
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                r = sink.write(&chunk) => r.map_err(DownloadError::Sink)?,
            }

            let snapshot = {
                let mut p = lock(&self.progress);
                p.record(chunk.len() as u64);
                p.snapshot()
            };
            self.emit(DownloadEvent::Progress(snapshot));
        }

        let completed = lock(&self.progress).completed();
        if let Some(expected) = declared
            && completed < expected
        {
            return Err(DownloadError::Truncated {
                received: completed,
                expected,
            });
        }
        Ok(completed)
    }

    /// Terminal cleanup: progress reset, dialog closed, back to idle.
    fn finish(&self) {
        lock(&self.progress).reset();
        self.emit(DownloadEvent::DialogClosed);
        self.set_state(DownloadState::Idle);
    }

    fn set_state(&self, state: DownloadState) {
        *lock(&self.state) = state;
        self.emit(DownloadEvent::State(state));
    }

    fn emit(&self, event: DownloadEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.events_tx.try_send(event) {
            debug!(?event, "download event dropped, receiver lagging");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
