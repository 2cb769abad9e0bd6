//! Asynchronous whole-file loading with progress events

use crate::uploader::error::{UploadError, UploadResult};
use crate::uploader::progress::UploadObserver;
use bytes::{Bytes, BytesMut};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Read buffer size for incremental loads (64KB)
const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Loads a whole file into memory, reporting parse progress along the way.
/// One load per call; cancellation is observed between buffer reads and
/// surfaces as a parse abort.
pub struct FileReader {
    buffer_size: usize,
}

impl Default for FileReader {
    fn default() -> Self {
        Self {
            buffer_size: READ_BUFFER_SIZE,
        }
    }
}

impl FileReader {
    /// Create a reader with a custom read-buffer size
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self { buffer_size }
    }

    /// Load the file at `path` into memory, emitting parse events on the
    /// observer as the read progresses.
    pub async fn load<O: UploadObserver>(
        &self,
        path: &Path,
        observer: &O,
        cancel: &CancellationToken,
    ) -> UploadResult<Bytes> {
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) => {
                warn!(target: "uploader::reader", path = %path.display(), error = %e, "Failed to open file");
                observer.on_parse_error(&e.to_string());
                return Err(UploadError::FileReadError(e.to_string()));
            }
        };

        let total = match file.metadata().await {
            Ok(meta) => meta.len(),
            Err(e) => {
                observer.on_parse_error(&e.to_string());
                return Err(UploadError::FileReadError(e.to_string()));
            }
        };

        observer.on_parse_start();
        debug!(
            target: "uploader::reader",
            path = %path.display(),
            total,
            "Loading file content"
        );

        let mut content = BytesMut::with_capacity(total as usize);
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            if cancel.is_cancelled() {
                debug!(target: "uploader::reader", path = %path.display(), "File load aborted");
                observer.on_parse_abort();
                return Err(UploadError::ParseAborted);
            }

            match file.read(&mut buffer).await {
                Ok(0) => break,
                Ok(n) => {
                    content.extend_from_slice(&buffer[..n]);
                    observer.on_parse_progress(content.len() as u64, total);
                }
                Err(e) => {
                    warn!(target: "uploader::reader", path = %path.display(), error = %e, "File read failed");
                    observer.on_parse_error(&e.to_string());
                    return Err(UploadError::FileReadError(e.to_string()));
                }
            }
        }

        debug!(
            target: "uploader::reader",
            path = %path.display(),
            loaded = content.len(),
            "File content loaded"
        );

        Ok(content.freeze())
    }
}
