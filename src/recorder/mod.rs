//! Segmented recording session
//!
//! - SessionManager owns the stream, the active recorder and the ledger
//! - SegmentLedger tracks segments against the cumulative budget
//! - PreviewCursor loops over finalized segments

pub mod config;
pub mod events;
pub mod ledger;
pub mod manager;
pub mod preview;
pub mod state;
pub mod view;

pub use config::SessionConfig;
pub use events::SessionEvent;
pub use ledger::SegmentLedger;
pub use manager::SessionManager;
pub use preview::{PreviewCursor, PreviewItem};
pub use state::{
    FlipOutcome, Ineligible, Segment, SegmentId, SegmentSummary, SessionSnapshot, SessionStatus,
    StartOutcome, StopReason,
};
pub use view::SessionView;
