//! Lanyue API client.
//!
//! Async HTTP client using `reqwest`. Every JSON endpoint answers with an
//! [`Envelope`]; the source endpoint answers with either a file body or an
//! envelope, told apart by content type.

use lanyue_download::{ByteStream, SourceApi, SourceRequest, SourceStream};
use lanyue_protocol::{
    ApiError, ApiFuture, DirectoryEntry, Envelope, NewUploadTask, SessionIdRequest, ShareQuery,
    UploadTask,
};
use lanyue_share::ShareApi;
use futures_util::TryStreamExt;
use lanyue_upload::{BodyReader, ProgressCallback, UploadApi, UploadBody};
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, HeaderMap, HeaderValue, RANGE};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::config::{ClientConfig, TransportMode};

const CSRF_HEADER: &str = "X-CSRF-Token";

/// Read buffer size for upload bodies; progress is reported per piece.
const UPLOAD_PIECE: usize = 64 * 1024;

/// Errors building an [`ApiClient`].
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid CSRF token")]
    InvalidToken,
}

/// Lanyue API client.
pub struct ApiClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.csrf_token {
            headers.insert(
                CSRF_HEADER,
                HeaderValue::from_str(token).map_err(|_| ClientError::InvalidToken)?,
            );
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(config.connect_timeout())
            .build()?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// POSTs `body` as JSON and returns the envelope payload, if any.
    async fn post_json<B, T>(&self, endpoint: &str, body: Option<&B>) -> Result<Option<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut req = self
            .http
            .post(self.url(endpoint))
            .timeout(self.config.request_timeout());
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(map_reqwest)?;
        read_envelope(resp).await
    }

    async fn post_body(
        &self,
        endpoint: &str,
        body: UploadBody,
        on_progress: ProgressCallback,
    ) -> Result<UploadTask, ApiError> {
        let len = body.len();
        let reader = body.open().await?;
        let resp = self
            .http
            .post(self.url(endpoint))
            .timeout(self.config.upload_timeout())
            .header(CONTENT_TYPE, "application/octet-stream")
            .header(CONTENT_LENGTH, len)
            .body(progress_body(reader, len, on_progress))
            .send()
            .await
            .map_err(map_reqwest)?;
        debug!(endpoint, bytes = len, status = %resp.status(), "upload body sent");
        require(read_envelope(resp).await?)
    }
}

impl UploadApi for ApiClient {
    fn create(&self, meta: &NewUploadTask) -> ApiFuture<'_, UploadTask> {
        let meta = meta.clone();
        Box::pin(async move { require(self.post_json("/upload_task/create", Some(&meta)).await?) })
    }

    fn stream(
        &self,
        session_id: &str,
        body: UploadBody,
        on_progress: ProgressCallback,
    ) -> ApiFuture<'_, UploadTask> {
        let endpoint = format!("/upload_task/stream/{}/", encode(session_id));
        Box::pin(async move { self.post_body(&endpoint, body, on_progress).await })
    }

    fn chunk(
        &self,
        session_id: &str,
        index: u32,
        body: UploadBody,
        on_progress: ProgressCallback,
    ) -> ApiFuture<'_, UploadTask> {
        let endpoint = format!("/upload_task/chunk/{}/{index}", encode(session_id));
        Box::pin(async move { self.post_body(&endpoint, body, on_progress).await })
    }

    fn delete(&self, session_id: &str) -> ApiFuture<'_, ()> {
        let body = SessionIdRequest {
            session_id: session_id.to_string(),
        };
        Box::pin(async move {
            self.post_json::<_, serde_json::Value>("/upload_task/delete", Some(&body))
                .await?;
            Ok(())
        })
    }

    fn list(&self) -> ApiFuture<'_, Vec<UploadTask>> {
        Box::pin(async move {
            let tasks = self
                .post_json::<(), Vec<UploadTask>>("/upload_task/list", None)
                .await?;
            Ok(tasks.unwrap_or_default())
        })
    }
}

impl ShareApi for ApiClient {
    fn view(&self, query: &ShareQuery) -> ApiFuture<'_, Vec<DirectoryEntry>> {
        let query = query.clone();
        Box::pin(async move { require(self.post_json("/share/view", Some(&query)).await?) })
    }
}

impl SourceApi for ApiClient {
    fn open(&self, request: &SourceRequest) -> ApiFuture<'_, SourceStream> {
        let query = request.query();
        let range_start = request.range_start;
        Box::pin(async move {
            let url = self.url("/share/source");
            let mut req = match self.config.source_transport {
                TransportMode::Get => self.http.get(url).query(&query),
                TransportMode::Post => self.http.post(url).json(&query),
            };
            if range_start > 0 {
                req = req.header(RANGE, format!("bytes={range_start}-"));
            }

            let resp = req.send().await.map_err(map_reqwest)?;
            let status = resp.status();

            if is_json(resp.headers()) {
                // Access failures come back as an envelope, never as a body.
                let env: Envelope = parse_envelope(resp).await?;
                env.accept()?;
                return Err(ApiError::Protocol(
                    "JSON response where a file was expected".into(),
                ));
            }
            if !status.is_success() {
                return Err(ApiError::Status(status.as_u16()));
            }

            let start_offset = if status == StatusCode::PARTIAL_CONTENT {
                content_range_start(resp.headers()).unwrap_or(range_start)
            } else {
                0
            };
            let content_length = resp.content_length();
            debug!(
                mark = %query.mark,
                path = %query.path,
                start_offset,
                content_length = ?content_length,
                "download stream opened"
            );

            Ok(SourceStream {
                content_length,
                start_offset,
                body: Box::new(HttpByteStream(resp)),
            })
        })
    }
}

/// Response body read chunk by chunk.
struct HttpByteStream(reqwest::Response);

impl ByteStream for HttpByteStream {
    fn next_chunk(&mut self) -> ApiFuture<'_, Option<Vec<u8>>> {
        Box::pin(async move {
            let chunk = self.0.chunk().await.map_err(map_reqwest)?;
            Ok(chunk.map(|b| b.to_vec()))
        })
    }
}

/// Streams `reader` as the request body, reporting bytes handed to the
/// transport.
fn progress_body(reader: BodyReader, total: u64, on_progress: ProgressCallback) -> reqwest::Body {
    let mut sent = 0u64;
    let stream = ReaderStream::with_capacity(reader, UPLOAD_PIECE).inspect_ok(move |piece| {
        sent += piece.len() as u64;
        on_progress(sent, Some(total));
    });
    reqwest::Body::wrap_stream(stream)
}

async fn read_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Option<T>, ApiError> {
    let status = resp.status();
    if !status.is_success() && !is_json(resp.headers()) {
        return Err(ApiError::Status(status.as_u16()));
    }
    let env: Envelope<T> = parse_envelope(resp).await?;
    env.accept()
}

async fn parse_envelope<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Envelope<T>, ApiError> {
    let bytes = resp.bytes().await.map_err(map_reqwest)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn require<T>(data: Option<T>) -> Result<T, ApiError> {
    data.ok_or_else(|| ApiError::Protocol("success envelope without data".into()))
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/json"))
}

/// Start offset from `Content-Range: bytes <start>-<end>/<size>`.
fn content_range_start(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(CONTENT_RANGE)?.to_str().ok()?;
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, NON_ALPHANUMERIC).to_string()
}

fn map_reqwest(e: reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else if let Some(status) = e.status() {
        ApiError::Status(status.as_u16())
    } else {
        ApiError::Transport(e.to_string())
    }
}
