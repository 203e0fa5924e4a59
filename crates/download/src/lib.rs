//! Download pipeline: negotiates access to a shared file, then streams the
//! response body chunk by chunk into a local sink.

mod error;
mod pipeline;
mod sink;
mod source;

pub use error::DownloadError;
pub use pipeline::{
    DownloadEvent, DownloadItem, DownloadOutcome, DownloadPipeline, DownloadState, FlightGuard,
    SingleFlight,
};
pub use sink::{DirectorySaveTarget, SaveSink, SaveTarget, SinkFuture};
pub use source::{ByteStream, SourceApi, SourceRequest, SourceStream};

#[cfg(test)]
pub(crate) mod testing;
