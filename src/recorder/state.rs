//! Recording state management
//!
//! Defines the session status machine, segments and the transient recording
//! interval.

use crate::capture::{EncodedPayload, Facing};
use crate::utils::error::CaptureError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

/// Current state of the capture session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "error", rename_all = "camelCase")]
pub enum SessionStatus {
    /// Waiting for a camera stream
    Initializing,
    /// A stream is held and shown
    Live,
    /// Acquisition or encoder start failed; retry re-initializes
    Error(CaptureError),
    /// Recorded segments are being played back, no stream held
    PreviewActive,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self::Initializing
    }
}

/// Creation-ordered segment identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(pub u64);

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "segment-{}", self.0)
    }
}

/// One finalized recording interval
#[derive(Debug)]
pub struct Segment {
    pub id: SegmentId,
    pub payload: EncodedPayload,
    /// Wall-clock length of the interval, clipped to the budget
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    pub facing: Facing,
}

impl Segment {
    pub fn summary(&self) -> SegmentSummary {
        SegmentSummary {
            id: self.id,
            duration_ms: self.duration_ms,
            created_at: self.created_at,
            facing: self.facing,
        }
    }
}

/// Segment metadata exposed to the view (no payload)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SegmentSummary {
    pub id: SegmentId,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
    pub facing: Facing,
}

/// The active recording, at most one at a time
#[derive(Debug, Clone)]
pub struct RecordingInterval {
    /// Correlates logs and events for this interval
    pub id: Uuid,
    pub started_at: Instant,
    pub started_at_utc: DateTime<Utc>,
    pub live_elapsed_ms: u64,
}

impl RecordingInterval {
    /// Create an interval starting now
    pub fn begin() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
            live_elapsed_ms: 0,
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }

    /// Recompute `live_elapsed_ms` from the clock
    pub fn refresh(&mut self) -> u64 {
        self.live_elapsed_ms = self.elapsed_ms();
        self.live_elapsed_ms
    }
}

/// Why a recording interval ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StopReason {
    User,
    /// Auto-stop at budget exhaustion
    BudgetExhausted,
    /// App moved to the background
    Suspended,
    Flip,
    Preview,
    Reinitialize,
    Finish,
}

/// Why `start_recording` did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Ineligible {
    NoLiveStream,
    AlreadyRecording,
    BudgetExhausted,
    Suspended,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum StartOutcome {
    Started { interval_id: Uuid },
    NotEligible { reason: Ineligible },
}

impl StartOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, Self::Started { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum FlipOutcome {
    /// Now streaming from the requested camera
    Switched { facing: Facing },
    /// The requested camera failed; the previous one was restored
    Reverted { requested: Facing, cause: CaptureError },
    /// Flip is not available in the current status
    NotEligible,
}

/// Read-only view of the session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub status: SessionStatus,
    pub facing: Facing,
    pub suspended: bool,
    pub recording: bool,
    /// Present only while recording
    pub live_elapsed_ms: Option<u64>,
    pub total_recorded_ms: u64,
    pub budget_ms: u64,
    pub remaining_ms: u64,
    pub segments: Vec<SegmentSummary>,
    /// Present only while previewing
    pub preview_index: Option<usize>,
}

impl SessionSnapshot {
    pub fn can_record(&self) -> bool {
        self.status == SessionStatus::Live
            && !self.recording
            && !self.suspended
            && self.total_recorded_ms < self.budget_ms
    }

    pub fn can_preview(&self) -> bool {
        !self.segments.is_empty() && self.status != SessionStatus::PreviewActive
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serialization() {
        let live = serde_json::to_value(SessionStatus::Live).unwrap();
        assert_eq!(live["state"], "live");

        let error = serde_json::to_value(SessionStatus::Error(CaptureError::DeviceBusy(
            "in use".into(),
        )))
        .unwrap();
        assert_eq!(error["state"], "error");
        assert_eq!(error["error"]["kind"], "deviceBusy");
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_refresh_tracks_clock() {
        let mut interval = RecordingInterval::begin();
        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        assert_eq!(interval.refresh(), 250);
        assert_eq!(interval.live_elapsed_ms, 250);
    }
}
