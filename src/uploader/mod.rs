//! Chunked upload client: plans a file into ordered chunks, loads its
//! content into memory, and transmits the chunks sequentially with
//! pause/resume/cancel control and aggregate progress reporting.

pub mod error;
pub mod machine;
pub mod plan;
pub mod progress;
pub mod reader;
pub mod transport;

pub use error::{UploadError, UploadResult};
pub use machine::{UploadControl, UploadState, UploadStateMachine};
pub use plan::ChunkPlan;
pub use progress::{NoOpObserver, ProgressUpdate, UploadObserver};
pub use reader::FileReader;
pub use transport::{ChunkRequest, ChunkTransport, HttpTransport};

use std::time::Duration;
use url::Url;

/// Default chunk size in bytes (1MB)
pub const DEFAULT_CHUNK_SIZE: u64 = 1_048_576;

/// Client-side uploader configuration
#[derive(Debug, Clone)]
pub struct UploaderConfig {
    /// Reassembly endpoint to POST chunks to
    pub url: Url,
    /// Size of each transmitted segment, in bytes
    pub chunk_size: u64,
    /// Per-chunk retry attempts on retryable failures. Default 0: the
    /// protocol itself has no retry, this is an opt-in extension.
    pub max_retries: u32,
    /// Base delay for exponential retry backoff
    pub retry_base_delay: Duration,
    /// Ceiling on the retry backoff delay
    pub retry_max_delay: Duration,
    /// Per-request timeout; None means no timeout, so a stalled send
    /// blocks its session until the connection dies
    pub request_timeout: Option<Duration>,
}

impl UploaderConfig {
    /// Configuration for the given endpoint with default tuning
    pub fn new(url: Url) -> Self {
        Self {
            url,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_retries: 0,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            request_timeout: None,
        }
    }
}

impl Default for UploaderConfig {
    fn default() -> Self {
        let url = Url::parse("http://127.0.0.1:8080/upload").expect("static default url");
        Self::new(url)
    }
}
