//! Drop filtering and image previews
//!
//! Applies the extension/size allow-lists to a batch of dropped files
//! before they enter the upload pipeline, and generates base64 data-URL
//! previews for small images. Rejected files are silently dropped from
//! the accepted list; filtering is not an error.

use crate::config::DropConfig;
use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// One file offered by a drop, identified by its on-disk path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    /// Original file name, as sent on the wire
    pub name: String,
    /// Local path to the file content
    pub path: PathBuf,
    /// File size in bytes
    pub size: u64,
}

impl FileCandidate {
    /// Build a candidate from a path, reading its size from disk
    pub async fn from_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let size = tokio::fs::metadata(&path)
            .await
            .with_context(|| format!("Failed to stat {}", path.display()))?
            .len();
        Ok(Self { name, path, size })
    }
}

/// Extension/size allow-list applied to dropped files
pub struct DropFilter {
    config: DropConfig,
    allowed: GlobSet,
    images: GlobSet,
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid file pattern: {pattern}"))?;
        builder.add(glob);
    }
    builder.build().context("Failed to build pattern set")
}

impl DropFilter {
    /// Compile the configured pattern lists
    pub fn new(config: DropConfig) -> Result<Self> {
        let allowed = build_globset(&config.allowed_extensions)?;
        let images = build_globset(&config.image_extensions)?;
        Ok(Self {
            config,
            allowed,
            images,
        })
    }

    /// Keep at most `max_files` candidates that fit the size ceiling and
    /// match at least one allowed pattern. Order is preserved; rejects are
    /// logged and dropped without error.
    pub fn accept(&self, candidates: &[FileCandidate]) -> Vec<FileCandidate> {
        let mut accepted = Vec::new();
        for candidate in candidates {
            if accepted.len() >= self.config.max_files {
                debug!(target: "dropzone", file = %candidate.name, "Dropped: file cap reached");
                continue;
            }
            if candidate.size > self.config.max_file_size {
                debug!(
                    target: "dropzone",
                    file = %candidate.name,
                    size = candidate.size,
                    "Dropped: exceeds maximum file size"
                );
                continue;
            }
            if !self.allowed.is_match(&candidate.name) {
                debug!(target: "dropzone", file = %candidate.name, "Dropped: extension not allowed");
                continue;
            }
            accepted.push(candidate.clone());
        }
        accepted
    }

    /// Whether a file name matches the image pattern list
    pub fn is_image(&self, name: &str) -> bool {
        self.images.is_match(name)
    }

    /// Generate data-URL previews for image candidates strictly below the
    /// preview size ceiling, keyed by file name. Unreadable files are
    /// skipped with a warning.
    pub async fn generate_previews(
        &self,
        candidates: &[FileCandidate],
    ) -> HashMap<String, String> {
        let mut previews = HashMap::new();
        for candidate in candidates {
            if !self.is_image(&candidate.name)
                || candidate.size >= self.config.max_image_preview_file_size
            {
                continue;
            }
            match tokio::fs::read(&candidate.path).await {
                Ok(content) => {
                    let mime = sniff_image_mime(&content);
                    let encoded = BASE64.encode(&content);
                    previews.insert(
                        candidate.name.clone(),
                        format!("data:{mime};base64,{encoded}"),
                    );
                }
                Err(e) => {
                    warn!(
                        target: "dropzone",
                        file = %candidate.name,
                        error = %e,
                        "Failed to read image for preview"
                    );
                }
            }
        }
        previews
    }
}

/// Mime type from magic bytes; falls back to a generic type when the
/// content is not a recognized image format
fn sniff_image_mime(content: &[u8]) -> &'static str {
    use image::ImageFormat;

    match image::guess_format(content) {
        Ok(ImageFormat::Png) => "image/png",
        Ok(ImageFormat::Jpeg) => "image/jpeg",
        Ok(ImageFormat::Gif) => "image/gif",
        Ok(ImageFormat::WebP) => "image/webp",
        Ok(ImageFormat::Bmp) => "image/bmp",
        Ok(ImageFormat::Tiff) => "image/tiff",
        Ok(ImageFormat::Ico) => "image/x-icon",
        _ => "application/octet-stream",
    }
}
