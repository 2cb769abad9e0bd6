//! Progress reporting for uploads

use crate::uploader::error::UploadError;
use std::sync::Arc;

/// Progress update information
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    /// Aggregate progress percentage (0.0 - 100.0)
    pub percentage: f64,
    /// Send index currently in flight
    pub current_chunk: u64,
    /// Total chunk count as declared on the wire
    pub chunk_count: u64,
    /// Bytes transmitted for the in-flight chunk
    pub loaded: u64,
    /// Total bytes of the in-flight chunk
    pub total: u64,
}

/// Aggregate percentage for one in-flight send. The index-0 header send
/// never contributes a percentage, the final send reports exactly 100, and
/// intermediate sends interpolate between chunk boundaries with a small
/// in-flight adjustment of `loaded / total / 100`.
pub fn percentage(current_chunk: u64, chunk_count: u64, loaded: u64, total: u64) -> Option<f64> {
    if current_chunk == 0 {
        return None;
    }
    if current_chunk >= chunk_count {
        return Some(100.0);
    }

    // current_chunk is in 1..chunk_count here, so chunk_count >= 2
    let base = 100.0 / (chunk_count - 1) as f64 * (current_chunk - 1) as f64;
    let in_flight = if total > 0 {
        loaded as f64 / total as f64 / 100.0
    } else {
        0.0
    };
    Some(base + in_flight)
}

/// Receiver for upload lifecycle events. All methods default to no-ops so
/// callers implement only what they care about.
pub trait UploadObserver: Send + Sync {
    /// File read started
    fn on_parse_start(&self) {}
    /// File read progressed
    fn on_parse_progress(&self, _loaded: u64, _total: u64) {}
    /// File fully loaded and chunk plan computed
    fn on_parse_load(&self, _byte_length: u64, _chunk_count: u64) {}
    /// File read aborted
    fn on_parse_abort(&self) {}
    /// File read failed
    fn on_parse_error(&self, _message: &str) {}
    /// Upload started
    fn on_upload_start(&self) {}
    /// All chunks transmitted
    fn on_upload_end(&self) {}
    /// A chunk transmission failed
    fn on_upload_error(&self, _error: &UploadError) {}
    /// A chunk completed successfully
    fn on_chunk_sent(&self, _chunk_index: u64) {}
    /// Aggregate progress changed
    fn on_progress_change(&self, _update: ProgressUpdate) {}
}

/// No-op observer implementation
pub struct NoOpObserver;

impl UploadObserver for NoOpObserver {}

impl<T: UploadObserver> UploadObserver for Arc<T> {
    fn on_parse_start(&self) {
        (**self).on_parse_start()
    }
    fn on_parse_progress(&self, loaded: u64, total: u64) {
        (**self).on_parse_progress(loaded, total)
    }
    fn on_parse_load(&self, byte_length: u64, chunk_count: u64) {
        (**self).on_parse_load(byte_length, chunk_count)
    }
    fn on_parse_abort(&self) {
        (**self).on_parse_abort()
    }
    fn on_parse_error(&self, message: &str) {
        (**self).on_parse_error(message)
    }
    fn on_upload_start(&self) {
        (**self).on_upload_start()
    }
    fn on_upload_end(&self) {
        (**self).on_upload_end()
    }
    fn on_upload_error(&self, error: &UploadError) {
        (**self).on_upload_error(error)
    }
    fn on_chunk_sent(&self, chunk_index: u64) {
        (**self).on_chunk_sent(chunk_index)
    }
    fn on_progress_change(&self, update: ProgressUpdate) {
        (**self).on_progress_change(update)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_send_reports_no_percentage() {
        assert_eq!(percentage(0, 5, 100, 200), None);
        assert_eq!(percentage(0, 0, 0, 0), None);
    }

    #[test]
    fn final_send_reports_exactly_100() {
        assert_eq!(percentage(5, 5, 0, 1000), Some(100.0));
        assert_eq!(percentage(6, 5, 0, 1000), Some(100.0));
        // a single-chunk file jumps straight to 100 on its only data send
        assert_eq!(percentage(1, 1, 0, 1000), Some(100.0));
    }

    #[test]
    fn intermediate_sends_interpolate_between_boundaries() {
        let p = percentage(1, 3, 0, 1000).unwrap();
        assert!((p - 0.0).abs() < f64::EPSILON);

        let p = percentage(2, 3, 0, 1000).unwrap();
        assert!((p - 50.0).abs() < f64::EPSILON);

        // in-flight adjustment is loaded/total/100
        let p = percentage(2, 3, 500, 1000).unwrap();
        assert!((p - 50.005).abs() < 1e-9);
    }

    #[test]
    fn percentage_is_monotonic_over_a_full_upload() {
        let chunk_count = 7;
        let total = 1000;
        let mut last = f64::MIN;
        for current in 1..=chunk_count {
            for loaded in [0, 250, 500, 750, 1000] {
                let p = percentage(current, chunk_count, loaded, total).unwrap();
                assert!(p >= last, "progress went backwards at {current}/{loaded}");
                last = p;
            }
        }
        assert_eq!(last, 100.0);
    }
}
