//! Preview sequencing
//!
//! Loops over the recorded segments in order. The cursor never mutates the
//! ledger; deletions are reported to it so the index stays in range.

use super::ledger::SegmentLedger;
use super::state::{Segment, SegmentSummary};
use crate::utils::error::SessionError;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreviewCursor {
    index: usize,
}

impl PreviewCursor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn current<'a>(&self, ledger: &'a SegmentLedger) -> Result<&'a Segment, SessionError> {
        if ledger.is_empty() {
            return Err(SessionError::EmptyLedger);
        }
        // The index is kept in range by `advance` and `on_removed`
        ledger.get(self.index.min(ledger.len() - 1)).ok_or(SessionError::EmptyLedger)
    }

    /// Move to the next segment, wrapping to the first after the last
    pub fn advance(&mut self, len: usize) -> Result<usize, SessionError> {
        if len == 0 {
            return Err(SessionError::EmptyLedger);
        }
        self.index = (self.index + 1) % len;
        Ok(self.index)
    }

    /// Keep the cursor valid after the segment at `removed` was deleted.
    ///
    /// Returns `None` once nothing is left to play.
    pub fn on_removed(&mut self, removed: usize, remaining: usize) -> Option<usize> {
        if remaining == 0 {
            self.index = 0;
            return None;
        }
        if removed < self.index {
            self.index -= 1;
        } else if self.index >= remaining {
            self.index = 0;
        }
        Some(self.index)
    }
}

/// What the preview player should show
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewItem {
    pub index: usize,
    pub count: usize,
    pub segment: SegmentSummary,
    pub mime_type: String,
    #[serde(skip)]
    pub data: Arc<[u8]>,
}

impl PreviewItem {
    pub fn new(index: usize, count: usize, segment: &Segment) -> Self {
        Self {
            index,
            count,
            segment: segment.summary(),
            mime_type: segment.payload.mime_type().to_string(),
            data: segment.payload.data().clone(),
        }
    }
}
