//! Session events
//!
//! Every observable transition is published on a broadcast channel so the
//! shell (and tests) can react without polling.

use super::state::{SegmentId, SegmentSummary, SessionStatus, StopReason};
use crate::capture::Facing;
use crate::utils::error::CaptureError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionEvent {
    StatusChanged {
        status: SessionStatus,
    },
    /// Primary constraints were rejected, retrying unconstrained
    ConstraintFallback {
        facing: Facing,
    },
    RecordingStarted {
        interval_id: Uuid,
        facing: Facing,
        started_at: DateTime<Utc>,
    },
    Progress {
        live_elapsed_ms: u64,
        total_recorded_ms: u64,
    },
    RecordingStopped {
        interval_id: Uuid,
        reason: StopReason,
        segment: SegmentSummary,
    },
    /// The interval ended without a segment
    RecordingDiscarded {
        interval_id: Uuid,
    },
    SegmentDeleted {
        id: SegmentId,
        total_recorded_ms: u64,
    },
    PreviewEntered,
    PreviewAdvanced {
        index: usize,
    },
    PreviewExited,
    FlipReverted {
        requested: Facing,
        restored: Facing,
    },
    Suspended,
    Resumed,
    Error {
        error: CaptureError,
    },
}
