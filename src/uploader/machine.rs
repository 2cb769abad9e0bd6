//! The chunked upload state machine
//!
//! Chunks go out strictly in increasing index order, one in flight at a
//! time: the next send is only dispatched after the previous one completes,
//! so reordering and overlap are impossible by construction. Pause and
//! cancel requests arrive through a cloneable [`UploadControl`] handle and
//! take effect at the next chunk boundary, never mid-flight.

use crate::uploader::UploaderConfig;
use crate::uploader::error::{UploadError, UploadResult};
use crate::uploader::plan::ChunkPlan;
use crate::uploader::progress::{self, ProgressUpdate, UploadObserver};
use crate::uploader::reader::FileReader;
use crate::uploader::transport::{ChunkRequest, ChunkTransport, ProgressSink};
use bytes::Bytes;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Upload lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    /// No bytes loaded yet
    Idle,
    /// File content is being read into memory
    Parsing,
    /// Content loaded, chunk plan computed, ready to send
    Ready,
    /// Chunks are being transmitted
    Sending,
    /// Suspended at a chunk boundary; resumable
    Paused,
    /// All sends completed
    Completed,
    /// Upload cancelled; terminal for this upload
    Cancelled,
}

impl UploadState {
    fn name(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::Parsing => "parsing",
            UploadState::Ready => "ready",
            UploadState::Sending => "sending",
            UploadState::Paused => "paused",
            UploadState::Completed => "completed",
            UploadState::Cancelled => "cancelled",
        }
    }
}

/// Mutable per-upload state, owned exclusively by one state machine
#[derive(Debug, Default)]
struct UploadSession {
    /// Index of the next send (0 means the header/first chunk)
    current_chunk: u64,
    /// Loaded file content; None until parse completes and after cancel
    content: Option<Bytes>,
}

impl UploadSession {
    fn reset(&mut self) {
        self.current_chunk = 0;
        self.content = None;
    }
}

/// Cloneable pause/cancel handle, safe to use from another task while a
/// send is in flight. Both signals are observed at chunk boundaries only;
/// an in-flight request is never aborted.
#[derive(Clone)]
pub struct UploadControl {
    paused: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl UploadControl {
    fn new() -> Self {
        Self {
            paused: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    /// Request a pause at the next chunk boundary. Idempotent.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    /// Clear a pending pause request
    pub fn clear_pause(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    /// Whether a pause has been requested
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Request cancellation at the next boundary
    pub fn cancel(&self) {
        self.pause();
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Token observed by the file reader while parsing
    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }
}

/// What to do after a chunk completes
enum Advance {
    SendNext,
    EnterPaused,
    Complete,
    Abort,
}

/// One upload of one file: owns the loaded bytes, the chunk plan and the
/// session cursor, and drives the transport sequentially.
pub struct UploadStateMachine<T, O> {
    file_name: String,
    path: PathBuf,
    config: UploaderConfig,
    transport: T,
    observer: Arc<O>,
    reader: FileReader,
    state: UploadState,
    session: UploadSession,
    plan: Option<ChunkPlan>,
    control: UploadControl,
}

impl<T: ChunkTransport, O: UploadObserver + 'static> UploadStateMachine<T, O> {
    /// Create a machine for the file at `path`. The wire file name is the
    /// path's final component.
    pub fn new(path: impl Into<PathBuf>, config: UploaderConfig, transport: T, observer: O) -> Self {
        let path = path.into();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        Self {
            file_name,
            path,
            config,
            transport,
            observer: Arc::new(observer),
            reader: FileReader::default(),
            state: UploadState::Idle,
            session: UploadSession::default(),
            plan: None,
            control: UploadControl::new(),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Wire file name for this upload
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Index of the next send
    pub fn current_chunk(&self) -> u64 {
        self.session.current_chunk
    }

    /// Chunk count as declared on the wire, once parsed
    pub fn chunk_count(&self) -> Option<u64> {
        self.plan.map(|p| p.chunk_count())
    }

    /// Whether the loaded content has been cleared (never loaded, or cancelled)
    pub fn content_cleared(&self) -> bool {
        self.session.content.is_none()
    }

    /// Pause/cancel handle, cloneable into other tasks
    pub fn control(&self) -> UploadControl {
        self.control.clone()
    }

    /// Load the file content into memory and compute the chunk plan.
    /// Transitions `Idle -> Parsing -> Ready`; a cancelled machine may be
    /// reused for a fresh upload of the same file.
    pub async fn parse_content(&mut self) -> UploadResult<()> {
        match self.state {
            UploadState::Idle | UploadState::Cancelled => {}
            other => {
                return Err(UploadError::InvalidState {
                    operation: "parse_content",
                    state: other.name(),
                });
            }
        }

        self.control = UploadControl::new();
        self.state = UploadState::Parsing;

        let content = match self
            .reader
            .load(&self.path, self.observer.as_ref(), self.control.cancel_token())
            .await
        {
            Ok(content) => content,
            Err(e) => {
                self.state = UploadState::Idle;
                return Err(e);
            }
        };

        let plan = ChunkPlan::new(content.len() as u64, self.config.chunk_size)?;
        info!(
            target: "uploader::machine",
            file = %self.file_name,
            byte_length = plan.byte_length(),
            chunk_count = plan.chunk_count(),
            "File parsed"
        );

        self.observer.on_parse_load(plan.byte_length(), plan.chunk_count());
        self.session.current_chunk = 0;
        self.session.content = Some(content);
        self.plan = Some(plan);
        self.state = UploadState::Ready;
        Ok(())
    }

    /// Start transmitting chunks from index 0. Valid only from `Ready`.
    /// Returns when the upload completes, pauses, fails, or is cancelled.
    pub async fn upload_file(&mut self) -> UploadResult<()> {
        if self.state != UploadState::Ready {
            return Err(UploadError::InvalidState {
                operation: "upload_file",
                state: self.state.name(),
            });
        }

        self.observer.on_upload_start();
        self.state = UploadState::Sending;
        self.send_loop().await
    }

    /// Request a pause; takes effect once the in-flight chunk completes.
    /// Idempotent.
    pub fn pause_upload(&self) {
        self.control.pause();
    }

    /// Resume a paused upload at the saved chunk cursor. No-op unless a
    /// pause is pending; if the pause landed after the final send, the
    /// upload completes without transmitting anything further.
    pub async fn resume_upload(&mut self) -> UploadResult<()> {
        if !self.control.is_paused() {
            return Ok(());
        }
        self.control.clear_pause();

        if self.state != UploadState::Paused {
            return Ok(());
        }

        debug!(
            target: "uploader::machine",
            file = %self.file_name,
            chunk = self.session.current_chunk,
            "Resuming upload"
        );
        self.state = UploadState::Sending;
        self.send_loop().await
    }

    /// Cancel the upload and discard all progress: the chunk cursor returns
    /// to 0 and the loaded content is dropped. An in-flight request is not
    /// aborted; its completion will be ignored.
    pub fn cancel_upload(&mut self) {
        self.control.cancel();
        self.discard();
    }

    fn discard(&mut self) {
        warn!(
            target: "uploader::machine",
            file = %self.file_name,
            "Upload cancelled, discarding session"
        );
        self.session.reset();
        self.plan = None;
        self.state = UploadState::Cancelled;
    }

    /// The single advance point: decide what happens after the chunk at
    /// the current cursor completed successfully.
    fn advance(&mut self, chunk_count: u64) -> Advance {
        if self.control.is_cancelled() || self.session.content.is_none() {
            // late completion after cancel is a no-op
            return Advance::Abort;
        }

        self.observer.on_chunk_sent(self.session.current_chunk);
        self.session.current_chunk += 1;

        if self.control.is_cancelled() {
            Advance::Abort
        } else if self.control.is_paused() {
            Advance::EnterPaused
        } else if self.session.current_chunk <= chunk_count {
            Advance::SendNext
        } else {
            Advance::Complete
        }
    }

    async fn send_loop(&mut self) -> UploadResult<()> {
        loop {
            let (plan, content) = match (self.plan, self.session.content.as_ref()) {
                (Some(plan), Some(content)) => (plan, content.clone()),
                // cancelled while idle between boundaries
                _ => return Ok(()),
            };

            if self.control.is_cancelled() {
                self.discard();
                return Err(UploadError::Cancelled);
            }

            let index = self.session.current_chunk;
            if !plan.contains(index) {
                // a pause can land on the final chunk boundary, leaving the
                // cursor one past chunk_count; there is nothing left to send
                info!(
                    target: "uploader::machine",
                    file = %self.file_name,
                    sends = plan.total_sends(),
                    "Upload completed"
                );
                self.state = UploadState::Completed;
                self.observer.on_upload_end();
                return Ok(());
            }

            let range = plan.range_of(index);
            let payload = content.slice(range.start as usize..range.end as usize);

            let request = ChunkRequest {
                file_name: self.file_name.clone(),
                chunk_count: plan.chunk_count(),
                chunk_index: index,
                payload,
            };

            let progress = self.progress_sink(index, plan.chunk_count());
            match self.transport.send_chunk(request, progress).await {
                Ok(()) => match self.advance(plan.chunk_count()) {
                    Advance::SendNext => continue,
                    Advance::EnterPaused => {
                        debug!(
                            target: "uploader::machine",
                            file = %self.file_name,
                            chunk = self.session.current_chunk,
                            "Upload paused at chunk boundary"
                        );
                        self.state = UploadState::Paused;
                        return Ok(());
                    }
                    Advance::Complete => {
                        info!(
                            target: "uploader::machine",
                            file = %self.file_name,
                            sends = plan.total_sends(),
                            "Upload completed"
                        );
                        self.state = UploadState::Completed;
                        self.observer.on_upload_end();
                        return Ok(());
                    }
                    Advance::Abort => {
                        self.discard();
                        return Err(UploadError::Cancelled);
                    }
                },
                Err(e) => {
                    warn!(
                        target: "uploader::machine",
                        file = %self.file_name,
                        chunk = index,
                        error = %e,
                        "Chunk transmission failed"
                    );
                    self.observer.on_upload_error(&e);
                    return Err(e);
                }
            }
        }
    }

    /// Progress sink for one in-flight chunk, mapping transport byte counts
    /// onto the aggregate percentage. The header send never contributes.
    fn progress_sink(&self, current_chunk: u64, chunk_count: u64) -> ProgressSink {
        let observer = self.observer.clone();
        Arc::new(move |loaded, total| {
            if let Some(percentage) = progress::percentage(current_chunk, chunk_count, loaded, total)
            {
                observer.on_progress_change(ProgressUpdate {
                    percentage,
                    current_chunk,
                    chunk_count,
                    loaded,
                    total,
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Transport that records every request and can trigger control actions
    /// from inside a send, mimicking callbacks landing mid-flight.
    struct MockTransport {
        sent: Arc<Mutex<Vec<ChunkRequest>>>,
        pause_during: Option<u64>,
        cancel_during: Option<u64>,
        fail_at: Option<u64>,
        control: Mutex<Option<UploadControl>>,
    }

    impl MockTransport {
        fn new() -> Self {
            Self {
                sent: Arc::new(Mutex::new(Vec::new())),
                pause_during: None,
                cancel_during: None,
                fail_at: None,
                control: Mutex::new(None),
            }
        }

        fn attach(&self, control: UploadControl) {
            *self.control.lock().unwrap() = Some(control);
        }

        fn indices(&self) -> Vec<u64> {
            self.sent.lock().unwrap().iter().map(|r| r.chunk_index).collect()
        }
    }

    impl ChunkTransport for MockTransport {
        async fn send_chunk(
            &self,
            request: ChunkRequest,
            progress: ProgressSink,
        ) -> UploadResult<()> {
            if self.fail_at == Some(request.chunk_index) {
                return Err(UploadError::chunk_failed(request.chunk_index, "boom"));
            }
            let total = request.payload.len() as u64;
            progress(total / 2, total);
            progress(total, total);
            if self.pause_during == Some(request.chunk_index) {
                if let Some(control) = self.control.lock().unwrap().as_ref() {
                    control.pause();
                }
            }
            if self.cancel_during == Some(request.chunk_index) {
                if let Some(control) = self.control.lock().unwrap().as_ref() {
                    control.cancel();
                }
            }
            self.sent.lock().unwrap().push(request);
            Ok(())
        }
    }

    #[derive(Default)]
    struct EventLog {
        chunks: Mutex<Vec<u64>>,
        started: Mutex<bool>,
        ended: Mutex<bool>,
        errors: Mutex<Vec<String>>,
        percentages: Mutex<Vec<f64>>,
    }

    impl UploadObserver for EventLog {
        fn on_upload_start(&self) {
            *self.started.lock().unwrap() = true;
        }
        fn on_upload_end(&self) {
            *self.ended.lock().unwrap() = true;
        }
        fn on_upload_error(&self, error: &UploadError) {
            self.errors.lock().unwrap().push(error.to_string());
        }
        fn on_chunk_sent(&self, chunk_index: u64) {
            self.chunks.lock().unwrap().push(chunk_index);
        }
        fn on_progress_change(&self, update: ProgressUpdate) {
            self.percentages.lock().unwrap().push(update.percentage);
        }
    }

    async fn machine_for(
        payload: &[u8],
        chunk_size: u64,
        transport: Arc<MockTransport>,
    ) -> (UploadStateMachine<Arc<MockTransport>, EventLog>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        tokio::fs::write(&path, payload).await.unwrap();

        let config = UploaderConfig {
            chunk_size,
            ..UploaderConfig::default()
        };
        let mut machine =
            UploadStateMachine::new(path, config, transport.clone(), EventLog::default());
        machine.parse_content().await.unwrap();
        transport.attach(machine.control());
        (machine, dir)
    }

    #[tokio::test]
    async fn sends_every_index_in_order_and_completes() {
        let transport = Arc::new(MockTransport::new());
        let (mut machine, _dir) = machine_for(&[9u8; 2500], 1000, transport.clone()).await;
        assert_eq!(machine.state(), UploadState::Ready);
        assert_eq!(machine.chunk_count(), Some(2));

        machine.upload_file().await.unwrap();
        assert_eq!(machine.state(), UploadState::Completed);

        assert_eq!(transport.indices(), vec![0, 1, 2]);
        let sent = transport.sent.lock().unwrap();
        assert!(sent.iter().all(|r| r.chunk_count == 2));
        assert_eq!(sent[0].payload.len(), 1000);
        assert_eq!(sent[1].payload.len(), 1000);
        assert_eq!(sent[2].payload.len(), 500);
        drop(sent);

        assert!(*machine.observer.started.lock().unwrap());
        assert!(*machine.observer.ended.lock().unwrap());
        assert_eq!(*machine.observer.chunks.lock().unwrap(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn small_file_is_one_send_of_the_whole_content() {
        let transport = Arc::new(MockTransport::new());
        let (mut machine, _dir) = machine_for(&[1u8; 300], 1000, transport.clone()).await;
        assert_eq!(machine.chunk_count(), Some(0));

        machine.upload_file().await.unwrap();
        assert_eq!(machine.state(), UploadState::Completed);

        let sent = transport.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].chunk_index, 0);
        assert_eq!(sent[0].payload.len(), 300);
    }

    #[tokio::test]
    async fn pause_takes_effect_at_the_boundary_and_resume_continues() {
        let mut transport = MockTransport::new();
        transport.pause_during = Some(1);
        let transport = Arc::new(transport);
        let (mut machine, _dir) = machine_for(&[2u8; 3500], 1000, transport.clone()).await;

        machine.upload_file().await.unwrap();
        assert_eq!(machine.state(), UploadState::Paused);
        assert_eq!(machine.current_chunk(), 2);
        assert_eq!(transport.indices(), vec![0, 1]);

        machine.resume_upload().await.unwrap();
        assert_eq!(machine.state(), UploadState::Completed);
        // resumed exactly at the paused cursor: nothing repeated, nothing skipped
        assert_eq!(transport.indices(), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn pause_during_the_final_send_resumes_straight_to_completed() {
        let mut transport = MockTransport::new();
        transport.pause_during = Some(2);
        let transport = Arc::new(transport);
        let (mut machine, _dir) = machine_for(&[8u8; 2500], 1000, transport.clone()).await;

        machine.upload_file().await.unwrap();
        assert_eq!(machine.state(), UploadState::Paused);
        // the pause won at the boundary, so the cursor sits past the count
        assert_eq!(machine.current_chunk(), 3);
        assert!(!*machine.observer.ended.lock().unwrap());

        machine.resume_upload().await.unwrap();
        assert_eq!(machine.state(), UploadState::Completed);
        assert!(*machine.observer.ended.lock().unwrap());
        // no index beyond the declared chunk count ever goes out
        assert_eq!(transport.indices(), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn resume_without_pause_is_a_no_op() {
        let transport = Arc::new(MockTransport::new());
        let (mut machine, _dir) = machine_for(&[0u8; 100], 1000, transport.clone()).await;
        machine.resume_upload().await.unwrap();
        assert!(transport.sent.lock().unwrap().is_empty());
        assert_eq!(machine.state(), UploadState::Ready);
    }

    #[tokio::test]
    async fn pause_is_idempotent() {
        let transport = Arc::new(MockTransport::new());
        let (machine, _dir) = machine_for(&[0u8; 100], 1000, transport).await;
        machine.pause_upload();
        machine.pause_upload();
        assert!(machine.control().is_paused());
    }

    #[tokio::test]
    async fn cancel_mid_flight_resets_and_ignores_the_late_completion() {
        let mut transport = MockTransport::new();
        transport.cancel_during = Some(1);
        let transport = Arc::new(transport);
        let (mut machine, _dir) = machine_for(&[3u8; 3500], 1000, transport.clone()).await;

        let err = machine.upload_file().await.unwrap_err();
        assert!(err.is_cancelled());
        assert_eq!(machine.state(), UploadState::Cancelled);
        assert_eq!(machine.current_chunk(), 0);
        assert!(machine.content_cleared());

        // chunk 1 physically went out before the cancel, but its completion
        // was ignored: no on_chunk_sent, no further sends
        assert_eq!(*machine.observer.chunks.lock().unwrap(), vec![0]);
        assert_eq!(transport.indices(), vec![0, 1]);
    }

    #[tokio::test]
    async fn cancelled_machine_can_be_reused_for_a_fresh_upload() {
        let transport = Arc::new(MockTransport::new());
        let (mut machine, _dir) = machine_for(&[4u8; 1500], 1000, transport.clone()).await;
        machine.cancel_upload();
        assert_eq!(machine.state(), UploadState::Cancelled);

        machine.parse_content().await.unwrap();
        transport.attach(machine.control());
        machine.upload_file().await.unwrap();
        assert_eq!(machine.state(), UploadState::Completed);
    }

    #[tokio::test]
    async fn transmission_error_stops_without_advancing() {
        let mut transport = MockTransport::new();
        transport.fail_at = Some(1);
        let transport = Arc::new(transport);
        let (mut machine, _dir) = machine_for(&[5u8; 3500], 1000, transport.clone()).await;

        let err = machine.upload_file().await.unwrap_err();
        assert!(matches!(err, UploadError::ChunkUploadFailed { chunk_index: 1, .. }));
        // cursor still points at the failed chunk
        assert_eq!(machine.current_chunk(), 1);
        assert_eq!(machine.observer.errors.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn upload_file_requires_ready_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        tokio::fs::write(&path, b"x").await.unwrap();
        let mut machine = UploadStateMachine::new(
            path,
            UploaderConfig::default(),
            Arc::new(MockTransport::new()),
            EventLog::default(),
        );

        let err = machine.upload_file().await.unwrap_err();
        assert!(matches!(err, UploadError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn progress_reaches_exactly_100_and_never_decreases() {
        let transport = Arc::new(MockTransport::new());
        let (mut machine, _dir) = machine_for(&[6u8; 4500], 1000, transport).await;
        machine.upload_file().await.unwrap();

        let percentages = machine.observer.percentages.lock().unwrap();
        assert!(!percentages.is_empty());
        assert!(percentages.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*percentages.last().unwrap(), 100.0);
    }
}
