//! Test doubles for the source and save-target seams.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use lanyue_protocol::{ApiError, ApiFuture};
use tokio::sync::Notify;

use crate::sink::{SaveSink, SaveTarget, SinkFuture};
use crate::source::{ByteStream, SourceApi, SourceRequest, SourceStream};

pub(crate) enum Reply {
    Body {
        chunks: Vec<Vec<u8>>,
        content_length: Option<u64>,
        honour_range: bool,
    },
    /// Body whose first byte sits at `start_offset`, whatever was asked.
    Offset {
        chunks: Vec<Vec<u8>>,
        start_offset: u64,
    },
    Fail(ApiError),
    /// Opens a body that never yields.
    Stall,
}

impl Reply {
    pub(crate) fn body(chunks: Vec<Vec<u8>>) -> Self {
        let len = chunks.iter().map(|c| c.len() as u64).sum();
        Reply::Body {
            chunks,
            content_length: Some(len),
            honour_range: true,
        }
    }
}

pub(crate) struct MockSource {
    replies: Mutex<VecDeque<Reply>>,
    pub(crate) requests: Mutex<Vec<SourceRequest>>,
    gate: Option<Arc<Notify>>,
}

impl MockSource {
    pub(crate) fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    /// Holds every `open` until the gate is notified.
    pub(crate) fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub(crate) fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl SourceApi for MockSource {
    fn open(&self, request: &SourceRequest) -> ApiFuture<'_, SourceStream> {
        self.requests.lock().unwrap().push(request.clone());
        let reply = self.replies.lock().unwrap().pop_front();
        let gate = self.gate.clone();
        let range_start = request.range_start;
        Box::pin(async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            match reply {
                Some(Reply::Body {
                    chunks,
                    content_length,
                    honour_range,
                }) => Ok(SourceStream {
                    content_length,
                    start_offset: if honour_range { range_start } else { 0 },
                    body: Box::new(VecBody(chunks.into())),
                }),
                Some(Reply::Offset {
                    chunks,
                    start_offset,
                }) => Ok(SourceStream {
                    content_length: Some(chunks.iter().map(|c| c.len() as u64).sum()),
                    start_offset,
                    body: Box::new(VecBody(chunks.into())),
                }),
                Some(Reply::Fail(e)) => Err(e),
                Some(Reply::Stall) => Ok(SourceStream {
                    content_length: None,
                    start_offset: 0,
                    body: Box::new(StalledBody),
                }),
                None => Err(ApiError::Protocol("no reply queued".into())),
            }
        })
    }
}

struct VecBody(VecDeque<Vec<u8>>);

impl ByteStream for VecBody {
    fn next_chunk(&mut self) -> ApiFuture<'_, Option<Vec<u8>>> {
        let next = self.0.pop_front();
        Box::pin(async move { Ok(next) })
    }
}

struct StalledBody;

impl ByteStream for StalledBody {
    fn next_chunk(&mut self) -> ApiFuture<'_, Option<Vec<u8>>> {
        Box::pin(std::future::pending())
    }
}

#[derive(Default)]
pub(crate) struct MemoryTarget {
    pub(crate) data: Arc<Mutex<Vec<u8>>>,
    pub(crate) closed: Arc<AtomicUsize>,
    /// `completed` flag of the last close.
    pub(crate) last_close: Arc<Mutex<Option<bool>>>,
    fail: bool,
    resume: bool,
}

impl MemoryTarget {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Starts with `partial` already saved and resumes after it.
    pub(crate) fn resuming(partial: &[u8]) -> Self {
        let target = Self {
            resume: true,
            ..Self::default()
        };
        target.data.lock().unwrap().extend_from_slice(partial);
        target
    }

    pub(crate) fn contents(&self) -> Vec<u8> {
        self.data.lock().unwrap().clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn closed_as_completed(&self) -> Option<bool> {
        *self.last_close.lock().unwrap()
    }
}

impl SaveTarget for MemoryTarget {
    fn acquire(&self, _name: &str) -> SinkFuture<'_, Box<dyn SaveSink>> {
        Box::pin(async move {
            if self.fail {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
            }
            let offset = if self.resume {
                self.data.lock().unwrap().len() as u64
            } else {
                self.data.lock().unwrap().clear();
                0
            };
            Ok(Box::new(MemorySink {
                data: Arc::clone(&self.data),
                closed: Arc::clone(&self.closed),
                last_close: Arc::clone(&self.last_close),
                offset,
            }) as Box<dyn SaveSink>)
        })
    }
}

struct MemorySink {
    data: Arc<Mutex<Vec<u8>>>,
    closed: Arc<AtomicUsize>,
    last_close: Arc<Mutex<Option<bool>>>,
    offset: u64,
}

impl SaveSink for MemorySink {
    fn resume_offset(&self) -> u64 {
        self.offset
    }

    fn write<'a>(&'a mut self, data: &'a [u8]) -> SinkFuture<'a, ()> {
        Box::pin(async move {
            self.data.lock().unwrap().extend_from_slice(data);
            Ok(())
        })
    }

    fn rewind(&mut self) -> SinkFuture<'_, ()> {
        Box::pin(async move {
            self.data.lock().unwrap().clear();
            self.offset = 0;
            Ok(())
        })
    }

    fn close(&mut self, completed: bool) -> SinkFuture<'_, ()> {
        Box::pin(async move {
            self.closed.fetch_add(1, Ordering::SeqCst);
            *self.last_close.lock().unwrap() = Some(completed);
            Ok(())
        })
    }
}
