pub mod config;
pub mod dropzone;
pub mod logging;
pub mod server;
pub mod uploader;

// Re-export commonly used types
pub use config::{DropConfig, ServerConfig};
pub use dropzone::{DropFilter, FileCandidate};
pub use logging::{LogConfig, LogGuard, init_logging};
pub use server::{ServerState, create_router};
pub use uploader::{
    HttpTransport, UploadObserver, UploadStateMachine, UploaderConfig,
};
