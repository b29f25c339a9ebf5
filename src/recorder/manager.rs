//! Recording session manager
//!
//! Owns the camera stream, the active recorder and the segment ledger, and
//! arbitrates every mutating command. All state sits behind one async mutex
//! that a command holds across its await points, so commands queue instead
//! of interleaving. The status is mirrored in a separate lock so observers can
//! read `Initializing` while an acquisition is still pending.

use super::config::SessionConfig;
use super::events::SessionEvent;
use super::ledger::SegmentLedger;
use super::preview::{PreviewCursor, PreviewItem};
use super::state::{
    FlipOutcome, Ineligible, RecordingInterval, Segment, SegmentId, SegmentSummary,
    SessionSnapshot, SessionStatus, StartOutcome, StopReason,
};
use crate::capture::{EncoderHandle, Facing, SegmentEncoder, StreamHandle, StreamProvider, StreamRequest};
use crate::utils::error::{CaptureError, SessionError};
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

type SessionResult<T> = Result<T, SessionError>;

/// Progress events are emitted once per elapsed second, not every tick
const PROGRESS_EVERY_MS: u64 = 1_000;

struct ActiveRecording {
    interval: RecordingInterval,
    encoder: EncoderHandle,
}

struct SessionCore {
    config: SessionConfig,
    provider: Arc<dyn StreamProvider>,
    encoder: Arc<dyn SegmentEncoder>,
    events: broadcast::Sender<SessionEvent>,
    status: Arc<RwLock<SessionStatus>>,
    facing: Facing,
    stream: Option<StreamHandle>,
    suspended: bool,
    recording: Option<ActiveRecording>,
    ledger: SegmentLedger,
    preview: Option<PreviewCursor>,
    ticker: Option<JoinHandle<()>>,
}

/// Cloneable handle to one capture session
#[derive(Clone)]
pub struct SessionManager {
    session_id: Uuid,
    core: Arc<Mutex<SessionCore>>,
    status: Arc<RwLock<SessionStatus>>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(
        config: SessionConfig,
        provider: Arc<dyn StreamProvider>,
        encoder: Arc<dyn SegmentEncoder>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let status = Arc::new(RwLock::new(SessionStatus::Initializing));
        let session_id = Uuid::new_v4();
        tracing::info!(%session_id, "Creating capture session (budget {}ms)", config.budget_ms);

        let core = SessionCore {
            facing: config.default_facing,
            ledger: SegmentLedger::new(config.budget_ms),
            config,
            provider,
            encoder,
            events: events.clone(),
            status: status.clone(),
            stream: None,
            suspended: false,
            recording: None,
            preview: None,
            ticker: None,
        };

        Self {
            session_id,
            core: Arc::new(Mutex::new(core)),
            status,
            events,
        }
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Subscribe to session events
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Current status, readable while a command is in flight
    pub fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.core.lock().await.snapshot(self.session_id)
    }

    /// Acquire a stream for `facing`, replacing any current stream
    pub async fn initialize(&self, facing: Facing) -> SessionResult<()> {
        self.core.lock().await.initialize(facing).await
    }

    /// Re-run initialization with the last camera that worked
    pub async fn retry(&self) -> SessionResult<()> {
        let mut core = self.core.lock().await;
        let facing = core.facing;
        core.initialize(facing).await
    }

    pub async fn flip(&self) -> SessionResult<FlipOutcome> {
        self.core.lock().await.flip().await
    }

    pub async fn start_recording(&self) -> SessionResult<StartOutcome> {
        let mut core = self.core.lock().await;
        let outcome = core.begin_recording().await?;
        if let StartOutcome::Started { interval_id } = outcome {
            let period = core.config.tick_interval();
            core.ticker = Some(self.spawn_ticker(interval_id, period));
        }
        Ok(outcome)
    }

    /// Recompute the live elapsed time, auto-stopping at the budget.
    ///
    /// Returns the segment if this tick stopped the recording.
    pub async fn tick(&self) -> SessionResult<Option<SegmentSummary>> {
        let mut core = self.core.lock().await;
        let result = core.tick().await;
        if core.recording.is_none() {
            core.halt_ticker();
        }
        result
    }

    pub async fn stop_recording(&self) -> SessionResult<Option<SegmentSummary>> {
        self.core.lock().await.stop_active(StopReason::User).await
    }

    /// Delete a segment. Returns false if `id` was not in the ledger.
    pub async fn delete_segment(&self, id: SegmentId) -> bool {
        self.core.lock().await.delete_segment(id).await
    }

    /// Returns false (and changes nothing) when there is nothing to preview
    pub async fn enter_preview(&self) -> SessionResult<bool> {
        self.core.lock().await.enter_preview().await
    }

    pub async fn exit_preview(&self) -> SessionResult<bool> {
        self.core.lock().await.exit_preview().await
    }

    pub async fn preview_current(&self) -> SessionResult<PreviewItem> {
        self.core.lock().await.preview_item()
    }

    /// Called when the current segment finished playing
    pub async fn advance_preview(&self) -> SessionResult<PreviewItem> {
        self.core.lock().await.advance_preview()
    }

    /// App hidden: pause the stream and close any recording
    pub async fn suspend(&self) -> SessionResult<()> {
        self.core.lock().await.suspend().await
    }

    /// App visible again
    pub async fn resume(&self) {
        self.core.lock().await.resume();
    }

    /// Hand off the recorded segments in order and release the camera
    pub async fn finish(&self) -> Vec<Segment> {
        self.core.lock().await.finish().await
    }

    /// Tear down: discard any recording, release the camera and all payloads
    pub async fn shutdown(&self) {
        self.core.lock().await.shutdown().await;
    }

    fn spawn_ticker(&self, interval_id: Uuid, period: Duration) -> JoinHandle<()> {
        // Weak so a dropped session is torn down instead of kept alive here
        let core = Arc::downgrade(&self.core);

        tokio::spawn(async move {
            let mut interval = time::interval(period);
            loop {
                interval.tick().await;

                let Some(core) = core.upgrade() else {
                    break;
                };
                let mut guard = core.lock().await;
                if guard.recording_id() != Some(interval_id) {
                    break;
                }
                if let Err(e) = guard.tick().await {
                    tracing::warn!(%interval_id, "Auto-stop failed: {}", e);
                }
                if guard.recording.is_none() {
                    // Our own handle; dropping it detaches this task
                    guard.ticker.take();
                    break;
                }
            }
        })
    }
}

impl SessionCore {
    fn emit(&self, event: SessionEvent) {
        let _ = self.events.send(event);
    }

    fn status(&self) -> SessionStatus {
        self.status.read().clone()
    }

    fn set_status(&mut self, status: SessionStatus) {
        if *self.status.read() == status {
            return;
        }
        tracing::debug!("Session status -> {:?}", status);
        *self.status.write() = status.clone();
        self.emit(SessionEvent::StatusChanged { status });
    }

    fn fail(&mut self, error: CaptureError) {
        tracing::error!("Capture session error: {}", error);
        self.emit(SessionEvent::Error {
            error: error.clone(),
        });
        self.set_status(SessionStatus::Error(error));
    }

    fn recording_id(&self) -> Option<Uuid> {
        self.recording.as_ref().map(|active| active.interval.id)
    }

    fn snapshot(&self, session_id: Uuid) -> SessionSnapshot {
        SessionSnapshot {
            session_id,
            status: self.status(),
            facing: self.facing,
            suspended: self.suspended,
            recording: self.recording.is_some(),
            live_elapsed_ms: self
                .recording
                .as_ref()
                .map(|active| active.interval.elapsed_ms()),
            total_recorded_ms: self.ledger.total_recorded_ms(),
            budget_ms: self.ledger.budget_ms(),
            remaining_ms: self.ledger.remaining_ms(),
            segments: self.ledger.summaries(),
            preview_index: self.preview.map(|cursor| cursor.index()),
        }
    }

    async fn try_acquire(&self, request: &StreamRequest) -> Result<StreamHandle, CaptureError> {
        let timeout = self.config.acquire_timeout();
        match time::timeout(timeout, self.provider.acquire(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("{} camera did not become ready within {:?}", request.facing, timeout);
                Err(CaptureError::timeout(timeout))
            }
        }
    }

    /// Primary constraints first, then one unconstrained attempt if the
    /// device rejected them
    async fn acquire(&self, facing: Facing) -> Result<StreamHandle, CaptureError> {
        let request = StreamRequest::new(facing, self.config.video.clone(), self.config.audio_enabled);

        match self.try_acquire(&request).await {
            Err(CaptureError::UnsupportedConstraints(reason)) if !request.video.is_unconstrained() => {
                tracing::warn!(
                    "{} camera rejected {:?} ({}), retrying unconstrained",
                    facing,
                    request.video,
                    reason
                );
                self.emit(SessionEvent::ConstraintFallback { facing });
                self.try_acquire(&request.relaxed()).await
            }
            result => result,
        }
    }

    async fn release_stream(&mut self) {
        if let Some(stream) = self.stream.take() {
            tracing::debug!("Releasing {} camera stream {}", stream.facing(), stream.id());
            self.provider.release(stream).await;
        }
    }

    fn go_live(&mut self, facing: Facing, stream: StreamHandle) {
        let settings = stream.settings();
        tracing::info!(
            "{} camera live: {}x{} @ {}fps ({})",
            facing,
            settings.width,
            settings.height,
            settings.fps,
            settings.pixel_format
        );
        if self.suspended {
            stream.set_paused(true);
        }
        self.facing = facing;
        self.stream = Some(stream);
        self.set_status(SessionStatus::Live);
    }

    async fn initialize(&mut self, facing: Facing) -> SessionResult<()> {
        if let Err(e) = self.stop_active(StopReason::Reinitialize).await {
            tracing::warn!("Recording lost while re-initializing: {}", e);
        }
        self.release_stream().await;
        self.preview = None;
        self.set_status(SessionStatus::Initializing);

        tracing::info!("Acquiring {} camera", facing);
        match self.acquire(facing).await {
            Ok(stream) => {
                self.go_live(facing, stream);
                Ok(())
            }
            Err(e) => {
                self.fail(e.clone());
                Err(e.into())
            }
        }
    }

    async fn flip(&mut self) -> SessionResult<FlipOutcome> {
        if self.status() == SessionStatus::PreviewActive {
            return Ok(FlipOutcome::NotEligible);
        }

        let previous = self.facing;
        let requested = previous.opposite();
        tracing::info!("Flipping camera {} -> {}", previous, requested);

        if let Err(e) = self.stop_active(StopReason::Flip).await {
            tracing::warn!("Recording lost while flipping: {}", e);
        }
        self.release_stream().await;
        self.set_status(SessionStatus::Initializing);

        let cause = match self.acquire(requested).await {
            Ok(stream) => {
                self.go_live(requested, stream);
                return Ok(FlipOutcome::Switched { facing: requested });
            }
            Err(e) => e,
        };

        tracing::warn!("{} camera unavailable ({}), restoring {}", requested, cause, previous);
        match self.acquire(previous).await {
            Ok(stream) => {
                self.go_live(previous, stream);
                self.emit(SessionEvent::FlipReverted {
                    requested,
                    restored: previous,
                });
                Ok(FlipOutcome::Reverted { requested, cause })
            }
            Err(restore_error) => {
                self.fail(restore_error);
                Err(SessionError::FlipFailed { requested, cause })
            }
        }
    }

    fn ineligibility(&self) -> Option<Ineligible> {
        if self.recording.is_some() {
            Some(Ineligible::AlreadyRecording)
        } else if self.stream.is_none() || self.status() != SessionStatus::Live {
            Some(Ineligible::NoLiveStream)
        } else if self.suspended {
            Some(Ineligible::Suspended)
        } else if self.ledger.is_exhausted() {
            Some(Ineligible::BudgetExhausted)
        } else {
            None
        }
    }

    async fn begin_recording(&mut self) -> SessionResult<StartOutcome> {
        if let Some(reason) = self.ineligibility() {
            tracing::debug!("Not starting recording: {:?}", reason);
            return Ok(StartOutcome::NotEligible { reason });
        }
        let stream = match self.stream.as_ref() {
            Some(stream) => stream,
            None => {
                return Ok(StartOutcome::NotEligible {
                    reason: Ineligible::NoLiveStream,
                })
            }
        };

        match self.encoder.begin(stream).await {
            Ok(encoder) => {
                let interval = RecordingInterval::begin();
                let interval_id = interval.id;
                tracing::info!(
                    %interval_id,
                    "Recording started ({}ms of budget left)",
                    self.ledger.remaining_ms()
                );
                self.emit(SessionEvent::RecordingStarted {
                    interval_id,
                    facing: self.facing,
                    started_at: interval.started_at_utc,
                });
                self.recording = Some(ActiveRecording { interval, encoder });
                Ok(StartOutcome::Started { interval_id })
            }
            Err(e) => {
                let e = match e {
                    CaptureError::EncoderInitFailed(_) => e,
                    other => CaptureError::EncoderInitFailed(other.to_string()),
                };
                self.release_stream().await;
                self.fail(e.clone());
                Err(e.into())
            }
        }
    }

    async fn tick(&mut self) -> SessionResult<Option<SegmentSummary>> {
        let total = self.ledger.total_recorded_ms();
        let budget = self.ledger.budget_ms();

        let (previous, live) = match self.recording.as_mut() {
            Some(active) => {
                let previous = active.interval.live_elapsed_ms;
                (previous, active.interval.refresh())
            }
            None => return Ok(None),
        };

        if live / PROGRESS_EVERY_MS != previous / PROGRESS_EVERY_MS {
            self.emit(SessionEvent::Progress {
                live_elapsed_ms: live,
                total_recorded_ms: total,
            });
        }

        if total + live < budget {
            return Ok(None);
        }

        tracing::info!(
            "Recording budget reached ({}ms + {}ms >= {}ms), stopping",
            total,
            live,
            budget
        );
        self.finish_recording(StopReason::BudgetExhausted).await
    }

    fn halt_ticker(&mut self) {
        if let Some(handle) = self.ticker.take() {
            handle.abort();
        }
    }

    /// Stop from any command path other than the ticker itself
    async fn stop_active(&mut self, reason: StopReason) -> SessionResult<Option<SegmentSummary>> {
        self.halt_ticker();
        self.finish_recording(reason).await
    }

    async fn finish_recording(&mut self, reason: StopReason) -> SessionResult<Option<SegmentSummary>> {
        let Some(ActiveRecording { interval, encoder }) = self.recording.take() else {
            return Ok(None);
        };
        // Measured before finalization so encoder latency is not counted
        let elapsed_ms = interval.elapsed_ms();
        if let Some(stream) = &self.stream {
            stream.detach_sink();
        }

        let payload = match encoder.finish().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(interval_id = %interval.id, "Failed to finalize segment: {}", e);
                self.emit(SessionEvent::RecordingDiscarded {
                    interval_id: interval.id,
                });
                self.emit(SessionEvent::Error { error: e.clone() });
                return Err(e.into());
            }
        };

        if let Some(encoded_ms) = payload.encoded_duration_ms() {
            if encoded_ms.abs_diff(elapsed_ms) > self.config.tick_interval_ms {
                tracing::debug!(
                    "Encoder reported {}ms for a {}ms interval, keeping wall clock",
                    encoded_ms,
                    elapsed_ms
                );
            }
        }

        let facing = self.facing;
        let segment = self
            .ledger
            .append(payload, elapsed_ms, Utc::now(), facing)
            .summary();

        tracing::info!(
            interval_id = %interval.id,
            "Recording stopped ({:?}): {} is {}ms, total {}ms of {}ms",
            reason,
            segment.id,
            segment.duration_ms,
            self.ledger.total_recorded_ms(),
            self.ledger.budget_ms()
        );
        self.emit(SessionEvent::RecordingStopped {
            interval_id: interval.id,
            reason,
            segment: segment.clone(),
        });
        Ok(Some(segment))
    }

    async fn delete_segment(&mut self, id: SegmentId) -> bool {
        let Some((index, segment)) = self.ledger.remove(id) else {
            tracing::debug!("Ignoring delete of unknown {}", id);
            return false;
        };
        let total = self.ledger.total_recorded_ms();
        tracing::info!("Deleted {} ({}ms), total now {}ms", id, segment.duration_ms, total);
        drop(segment);
        self.emit(SessionEvent::SegmentDeleted {
            id,
            total_recorded_ms: total,
        });

        let remaining = self.ledger.len();
        let preview_emptied = match self.preview.as_mut() {
            Some(cursor) => cursor.on_removed(index, remaining).is_none(),
            None => false,
        };
        if preview_emptied {
            tracing::info!("Last segment deleted during preview, returning to camera");
            if let Err(e) = self.exit_preview().await {
                tracing::warn!("Could not restart camera after preview: {}", e);
            }
        }
        true
    }

    async fn enter_preview(&mut self) -> SessionResult<bool> {
        if self.preview.is_some() {
            return Ok(false);
        }

        let stopped = self.stop_active(StopReason::Preview).await;
        if self.ledger.is_empty() {
            tracing::debug!("Nothing to preview");
            return stopped.map(|_| false);
        }
        if let Err(e) = stopped {
            tracing::warn!("Entering preview without the interrupted recording: {}", e);
        }

        self.release_stream().await;
        self.preview = Some(PreviewCursor::default());
        self.set_status(SessionStatus::PreviewActive);
        tracing::info!("Previewing {} segments", self.ledger.len());
        self.emit(SessionEvent::PreviewEntered);
        Ok(true)
    }

    async fn exit_preview(&mut self) -> SessionResult<bool> {
        if self.preview.take().is_none() {
            return Ok(false);
        }
        self.emit(SessionEvent::PreviewExited);
        let facing = self.facing;
        self.initialize(facing).await?;
        Ok(true)
    }

    fn preview_item(&self) -> SessionResult<PreviewItem> {
        let cursor = self.preview.ok_or(SessionError::PreviewInactive)?;
        let segment = cursor.current(&self.ledger)?;
        Ok(PreviewItem::new(cursor.index(), self.ledger.len(), segment))
    }

    fn advance_preview(&mut self) -> SessionResult<PreviewItem> {
        let len = self.ledger.len();
        let cursor = self.preview.as_mut().ok_or(SessionError::PreviewInactive)?;
        let index = cursor.advance(len)?;
        self.emit(SessionEvent::PreviewAdvanced { index });
        self.preview_item()
    }

    async fn suspend(&mut self) -> SessionResult<()> {
        if self.suspended {
            return Ok(());
        }
        let stopped = self.stop_active(StopReason::Suspended).await;

        self.suspended = true;
        if let Some(stream) = &self.stream {
            stream.set_paused(true);
        }
        tracing::info!("Session suspended");
        self.emit(SessionEvent::Suspended);
        stopped.map(|_| ())
    }

    fn resume(&mut self) {
        if !self.suspended {
            return;
        }
        self.suspended = false;
        if let Some(stream) = &self.stream {
            stream.set_paused(false);
        }
        tracing::info!("Session resumed");
        self.emit(SessionEvent::Resumed);
    }

    async fn finish(&mut self) -> Vec<Segment> {
        if let Err(e) = self.stop_active(StopReason::Finish).await {
            tracing::warn!("Final recording lost: {}", e);
        }
        self.release_stream().await;
        self.preview = None;
        self.set_status(SessionStatus::Initializing);

        let segments = self.ledger.take_all();
        tracing::info!("Handing off {} segments", segments.len());
        segments
    }

    async fn shutdown(&mut self) {
        self.halt_ticker();
        if let Some(active) = self.recording.take() {
            tracing::info!(interval_id = %active.interval.id, "Discarding active recording");
            active.encoder.discard();
            self.emit(SessionEvent::RecordingDiscarded {
                interval_id: active.interval.id,
            });
        }
        self.release_stream().await;
        self.preview = None;
        let released = self.ledger.take_all().len();
        self.set_status(SessionStatus::Initializing);
        tracing::info!("Session shut down, released {} segments", released);
    }
}

impl Drop for SessionCore {
    fn drop(&mut self) {
        self.halt_ticker();
        if let Some(active) = self.recording.take() {
            tracing::warn!(interval_id = %active.interval.id, "Session dropped while recording");
            active.encoder.discard();
        }
        // The stream handle stops its source when dropped
        self.stream.take();
    }
}
