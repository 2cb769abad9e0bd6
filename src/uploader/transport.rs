//! Chunk transmission over HTTP

use crate::uploader::UploaderConfig;
use crate::uploader::error::{UploadError, UploadResult};
use bytes::Bytes;
use futures::Stream;
use reqwest::{Body, Client as HttpClient};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Frame size for streaming request bodies (64KB)
const STREAM_FRAME_SIZE: usize = 64 * 1024;

/// Callback invoked with `(loaded, total)` as chunk bytes go out on the wire
pub type ProgressSink = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// One chunk send: the three synchronization headers plus the payload
#[derive(Debug, Clone)]
pub struct ChunkRequest {
    /// Original file name (`X-File-Name`)
    pub file_name: String,
    /// Declared chunk count (`X-Chunk-Count`)
    pub chunk_count: u64,
    /// Zero-based index of this send (`X-Chunk-Current`)
    pub chunk_index: u64,
    /// Raw bytes of the chunk's range; may be empty on the final send
    pub payload: Bytes,
}

/// Sends one chunk per call and reports completion or failure. The upload
/// state machine is generic over this so tests can swap the network out.
pub trait ChunkTransport: Send + Sync {
    /// Transmit one chunk, invoking `progress` as bytes are sent
    fn send_chunk(
        &self,
        request: ChunkRequest,
        progress: ProgressSink,
    ) -> impl Future<Output = UploadResult<()>> + Send;
}

impl<T: ChunkTransport> ChunkTransport for Arc<T> {
    async fn send_chunk(&self, request: ChunkRequest, progress: ProgressSink) -> UploadResult<()> {
        (**self).send_chunk(request, progress).await
    }
}

/// A stream that yields the payload in fixed-size frames, counting bytes
/// into the progress sink as each frame is handed to the HTTP client.
struct ProgressStream {
    payload: Bytes,
    offset: usize,
    progress: ProgressSink,
}

impl ProgressStream {
    fn new(payload: Bytes, progress: ProgressSink) -> Self {
        Self {
            payload,
            offset: 0,
            progress,
        }
    }
}

impl Stream for ProgressStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.offset >= self.payload.len() {
            return Poll::Ready(None);
        }

        let end = (self.offset + STREAM_FRAME_SIZE).min(self.payload.len());
        let frame = self.payload.slice(self.offset..end);
        self.offset = end;
        (self.progress)(self.offset as u64, self.payload.len() as u64);
        Poll::Ready(Some(Ok(frame)))
    }
}

/// HTTP transport speaking the chunk wire protocol against the
/// reassembly endpoint
pub struct HttpTransport {
    client: HttpClient,
    config: UploaderConfig,
}

impl HttpTransport {
    /// Create a transport from an existing reqwest client and config
    pub fn new(client: HttpClient, config: UploaderConfig) -> Self {
        Self { client, config }
    }

    /// Create a transport with a default reqwest client
    pub fn from_config(config: UploaderConfig) -> Self {
        Self::new(HttpClient::new(), config)
    }

    async fn send_once(&self, request: &ChunkRequest, progress: ProgressSink) -> UploadResult<()> {
        debug!(
            target: "uploader::transport",
            file = %request.file_name,
            chunk = request.chunk_index,
            count = request.chunk_count,
            size = request.payload.len(),
            "Sending chunk"
        );

        let stream = ProgressStream::new(request.payload.clone(), progress);

        let mut builder = self
            .client
            .post(self.config.url.clone())
            .header("Cache-Control", "no-cache")
            .header("X-File-Name", request.file_name.as_str())
            .header("X-Chunk-Count", request.chunk_count)
            .header("X-Chunk-Current", request.chunk_index)
            .header("Content-Length", request.payload.len() as u64)
            .body(Body::wrap_stream(stream));

        if let Some(timeout) = self.config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(
                target: "uploader::transport",
                file = %request.file_name,
                chunk = request.chunk_index,
                status = status.as_u16(),
                message = %message,
                "Server rejected chunk"
            );
            return Err(UploadError::ServerRejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }

    /// Retry delay with exponential backoff, capped at the configured maximum
    fn retry_delay(&self, attempt: u32) -> Duration {
        let base = self.config.retry_base_delay.as_millis() as u64;
        let delay = Duration::from_millis(base.saturating_mul(1 << attempt.min(10)));
        delay.min(self.config.retry_max_delay)
    }
}

impl ChunkTransport for HttpTransport {
    async fn send_chunk(&self, request: ChunkRequest, progress: ProgressSink) -> UploadResult<()> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.retry_delay(attempt);
                debug!(
                    target: "uploader::transport",
                    chunk = request.chunk_index,
                    attempt,
                    delay_ms = delay.as_millis(),
                    "Retrying chunk send"
                );
                tokio::time::sleep(delay).await;
            }

            match self.send_once(&request, progress.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if !e.is_retryable() || attempt == self.config.max_retries {
                        error!(
                            target: "uploader::transport",
                            chunk = request.chunk_index,
                            error = %e,
                            attempt,
                            "Chunk send failed"
                        );
                        return Err(e);
                    }
                    warn!(
                        target: "uploader::transport",
                        chunk = request.chunk_index,
                        error = %e,
                        attempt,
                        "Chunk send failed, will retry"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(UploadError::MaxRetriesExceeded {
            chunk_index: request.chunk_index,
            max_retries: self.config.max_retries,
        }))
    }
}
