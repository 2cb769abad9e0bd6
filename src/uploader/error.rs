//! Error types for the uploader module

use thiserror::Error;

/// Result type for upload operations
pub type UploadResult<T> = Result<T, UploadError>;

/// Upload error types
#[derive(Debug, Error)]
pub enum UploadError {
    /// Upload was cancelled
    #[error("Upload cancelled")]
    Cancelled,

    /// Chunk size must be a positive integer
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    /// Operation attempted from the wrong state
    #[error("Invalid state for {operation}: {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// Failed to read the local file
    #[error("Failed to read local file: {0}")]
    FileReadError(String),

    /// File read was aborted before completing
    #[error("File read aborted")]
    ParseAborted,

    /// Chunk transmission failed
    #[error("Chunk {chunk_index} upload failed: {message}")]
    ChunkUploadFailed { chunk_index: u64, message: String },

    /// Server refused the chunk
    #[error("Server rejected chunk with status {status}: {message}")]
    ServerRejected { status: u16, message: String },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpError(String),

    /// Maximum retries exceeded
    #[error("Maximum retries ({max_retries}) exceeded for chunk {chunk_index}")]
    MaxRetriesExceeded { chunk_index: u64, max_retries: u32 },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl UploadError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            UploadError::HttpError(_) | UploadError::ChunkUploadFailed { .. }
        )
    }

    /// Check if this error is due to cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, UploadError::Cancelled)
    }

    /// Create a chunk upload error
    pub fn chunk_failed(chunk_index: u64, message: impl Into<String>) -> Self {
        UploadError::ChunkUploadFailed {
            chunk_index,
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::FileReadError(err.to_string())
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::HttpError(err.to_string())
    }
}

impl From<anyhow::Error> for UploadError {
    fn from(err: anyhow::Error) -> Self {
        UploadError::Other(err.to_string())
    }
}
