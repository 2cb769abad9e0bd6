//! Configuration types with serde loading and full defaults

use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Default maximum file size in bytes (~444MB), shared by the drop filter
/// and the server-side size check
pub const DEFAULT_MAX_FILE_SIZE: u64 = 466_022_295;

/// Default ceiling below which an image preview is generated (4MB)
pub const DEFAULT_MAX_IMAGE_PREVIEW_FILE_SIZE: u64 = 4_194_304;

/// Drop-filter configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DropConfig {
    /// Ceiling on draggable/uploadable size, in bytes
    pub max_file_size: u64,
    /// Ceiling below which an image preview is generated, in bytes
    pub max_image_preview_file_size: u64,
    /// Cap on files accepted from one drop
    pub max_files: usize,
    /// Glob patterns a file must match at least one of to be accepted
    pub allowed_extensions: Vec<String>,
    /// Glob patterns identifying image files
    pub image_extensions: Vec<String>,
}

impl Default for DropConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            max_image_preview_file_size: DEFAULT_MAX_IMAGE_PREVIEW_FILE_SIZE,
            max_files: 3,
            allowed_extensions: vec!["*.jpg".to_string(), "*.txt".to_string()],
            image_extensions: vec!["*.jpg".to_string()],
        }
    }
}

/// Reassembly server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the HTTP server to
    pub listen_addr: SocketAddr,
    /// Directory completed files are renamed into
    pub upload_dir: PathBuf,
    /// Directory temporary files accumulate in; defaults to `upload_dir`
    pub tmp_dir: Option<PathBuf>,
    /// Maximum accepted payload per chunk, in bytes
    pub chunk_size: u64,
    /// Maximum accumulated file size, in bytes
    pub max_file_size: u64,
    /// Extensions (without dot) a file name must end with
    pub allowed_extensions: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([127, 0, 0, 1], 8080).into(),
            upload_dir: PathBuf::from("./uploads"),
            tmp_dir: None,
            chunk_size: crate::uploader::DEFAULT_CHUNK_SIZE,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: ["jpeg", "jpg", "png", "txt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from a JSON file, falling back to defaults for
    /// missing keys
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Directory temporary files accumulate in
    pub fn tmp_dir(&self) -> &Path {
        self.tmp_dir.as_deref().unwrap_or(&self.upload_dir)
    }
}
