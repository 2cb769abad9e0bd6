//! Chunk planning: byte ranges and the wire chunk-count convention

use crate::uploader::error::{UploadError, UploadResult};
use std::ops::Range;

/// Ordered, zero-indexed plan of chunk byte ranges for one file.
///
/// The chunk count follows the wire convention shared with the reassembly
/// endpoint: `chunk_count = floor(byte_length / chunk_size)`, and sends run
/// while `current <= chunk_count`, i.e. `chunk_count + 1` sends in total.
/// A file smaller than one chunk has `chunk_count = 0` and a single send
/// carrying the whole file; a file whose length is an exact multiple of
/// `chunk_size` gets a final empty send. Both sides of the protocol count
/// this way, so the convention must not be changed on one side only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    byte_length: u64,
    chunk_size: u64,
    chunk_count: u64,
}

impl ChunkPlan {
    /// Build a plan for a file of `byte_length` bytes split into
    /// `chunk_size`-byte chunks. `chunk_size` must be positive.
    pub fn new(byte_length: u64, chunk_size: u64) -> UploadResult<Self> {
        if chunk_size == 0 {
            return Err(UploadError::InvalidChunkSize(chunk_size));
        }

        Ok(Self {
            byte_length,
            chunk_size,
            chunk_count: byte_length / chunk_size,
        })
    }

    /// Total file length in bytes
    pub fn byte_length(&self) -> u64 {
        self.byte_length
    }

    /// Configured chunk size in bytes
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Chunk count as declared on the wire (`X-Chunk-Count`)
    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    /// Number of sends required to complete the upload
    pub fn total_sends(&self) -> u64 {
        self.chunk_count + 1
    }

    /// Whether `index` is a valid send index (`0..=chunk_count`)
    pub fn contains(&self, index: u64) -> bool {
        index <= self.chunk_count
    }

    /// Byte range `[start, end)` for send `index`, clipped to the file length.
    /// The last range may be shorter than `chunk_size`, or empty when the
    /// file length is an exact multiple of the chunk size.
    pub fn range_of(&self, index: u64) -> Range<u64> {
        let start = (index * self.chunk_size).min(self.byte_length);
        let end = (start + self.chunk_size).min(self.byte_length);
        start..end
    }
}
