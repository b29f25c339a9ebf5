//! Render state for the frontend
//!
//! The shell picks one of four screens from the session snapshot. Nothing
//! here mutates the session.

use super::state::{SegmentSummary, SessionSnapshot, SessionStatus};
use crate::capture::Facing;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SessionView {
    /// Waiting for the camera
    Loading,
    Error {
        code: String,
        message: String,
        can_retry: bool,
    },
    Live {
        facing: Facing,
        recording: bool,
        suspended: bool,
        live_elapsed_ms: u64,
        total_recorded_ms: u64,
        remaining_ms: u64,
        segments: Vec<SegmentSummary>,
        can_record: bool,
        can_preview: bool,
    },
    Preview {
        index: usize,
        segments: Vec<SegmentSummary>,
    },
}

impl From<SessionSnapshot> for SessionView {
    fn from(snapshot: SessionSnapshot) -> Self {
        let can_record = snapshot.can_record();
        let can_preview = snapshot.can_preview();

        match snapshot.status {
            SessionStatus::Initializing => Self::Loading,
            SessionStatus::Error(error) => Self::Error {
                code: error.code().to_string(),
                message: error.to_string(),
                // Every capture error is recoverable by re-initializing
                can_retry: true,
            },
            SessionStatus::Live => Self::Live {
                facing: snapshot.facing,
                recording: snapshot.recording,
                suspended: snapshot.suspended,
                live_elapsed_ms: snapshot.live_elapsed_ms.unwrap_or(0),
                total_recorded_ms: snapshot.total_recorded_ms,
                remaining_ms: snapshot.remaining_ms,
                segments: snapshot.segments,
                can_record,
                can_preview,
            },
            SessionStatus::PreviewActive => Self::Preview {
                index: snapshot.preview_index.unwrap_or(0),
                segments: snapshot.segments,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::state::SegmentId;
    use crate::utils::error::CaptureError;
    use chrono::Utc;
    use uuid::Uuid;

    fn snapshot(status: SessionStatus) -> SessionSnapshot {
        SessionSnapshot {
            session_id: Uuid::new_v4(),
            status,
            facing: Facing::Back,
            suspended: false,
            recording: false,
            live_elapsed_ms: None,
            total_recorded_ms: 20_000,
            budget_ms: 60_000,
            remaining_ms: 40_000,
            segments: vec![SegmentSummary {
                id: SegmentId(1),
                duration_ms: 20_000,
                created_at: Utc::now(),
                facing: Facing::Back,
            }],
            preview_index: None,
        }
    }

    #[test]
    fn test_live_view_flags() {
        let view = SessionView::from(snapshot(SessionStatus::Live));
        match view {
            SessionView::Live {
                can_record,
                can_preview,
                remaining_ms,
                ..
            } => {
                assert!(can_record);
                assert!(can_preview);
                assert_eq!(remaining_ms, 40_000);
            }
            other => panic!("expected live view, got {:?}", other),
        }
    }

    #[test]
    fn test_error_view_offers_retry() {
        let view = SessionView::from(snapshot(SessionStatus::Error(
            CaptureError::PermissionDenied("denied".into()),
        )));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["view"], "error");
        assert_eq!(json["code"], "PERMISSION_DENIED");
        assert_eq!(json["canRetry"], true);
    }

    #[test]
    fn test_preview_and_loading_views() {
        let mut previewing = snapshot(SessionStatus::PreviewActive);
        previewing.preview_index = Some(0);
        let json = serde_json::to_value(SessionView::from(previewing)).unwrap();
        assert_eq!(json["view"], "preview");
        assert_eq!(json["segments"][0]["durationMs"], 20_000);

        assert_eq!(
            SessionView::from(snapshot(SessionStatus::Initializing)),
            SessionView::Loading
        );
    }
}
