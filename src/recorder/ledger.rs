//! Segment ledger
//!
//! Ordered segments plus the running total checked against the budget.

use super::state::{Segment, SegmentId, SegmentSummary};
use crate::capture::{EncodedPayload, Facing};
use chrono::{DateTime, Utc};

#[derive(Debug)]
pub struct SegmentLedger {
    segments: Vec<Segment>,
    total_recorded_ms: u64,
    budget_ms: u64,
    next_id: u64,
}

impl SegmentLedger {
    pub fn new(budget_ms: u64) -> Self {
        Self {
            segments: Vec::new(),
            total_recorded_ms: 0,
            budget_ms,
            next_id: 1,
        }
    }

    pub fn budget_ms(&self) -> u64 {
        self.budget_ms
    }

    pub fn total_recorded_ms(&self) -> u64 {
        self.total_recorded_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.budget_ms.saturating_sub(self.total_recorded_ms)
    }

    pub fn is_exhausted(&self) -> bool {
        self.total_recorded_ms >= self.budget_ms
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Segment> {
        self.segments.get(index)
    }

    pub fn position(&self, id: SegmentId) -> Option<usize> {
        self.segments.iter().position(|segment| segment.id == id)
    }

    pub fn summaries(&self) -> Vec<SegmentSummary> {
        self.segments.iter().map(Segment::summary).collect()
    }

    /// Append a finalized segment.
    ///
    /// The duration is clipped to what is left of the budget, so the total
    /// never passes `budget_ms`.
    pub fn append(
        &mut self,
        payload: EncodedPayload,
        duration_ms: u64,
        created_at: DateTime<Utc>,
        facing: Facing,
    ) -> &Segment {
        let duration_ms = duration_ms.min(self.remaining_ms());
        let id = SegmentId(self.next_id);
        self.next_id += 1;

        self.segments.push(Segment {
            id,
            payload,
            duration_ms,
            created_at,
            facing,
        });
        self.total_recorded_ms += duration_ms;
        self.debug_check_total();

        &self.segments[self.segments.len() - 1]
    }

    /// Remove a segment, returning it with its index. Unknown ids are ignored.
    pub fn remove(&mut self, id: SegmentId) -> Option<(usize, Segment)> {
        let index = self.position(id)?;
        let segment = self.segments.remove(index);
        self.total_recorded_ms -= segment.duration_ms;
        self.debug_check_total();
        Some((index, segment))
    }

    /// Hand off every segment in recording order, leaving the ledger empty
    pub fn take_all(&mut self) -> Vec<Segment> {
        self.total_recorded_ms = 0;
        std::mem::take(&mut self.segments)
    }

    fn debug_check_total(&self) {
        debug_assert_eq!(
            self.total_recorded_ms,
            self.segments.iter().map(|s| s.duration_ms).sum::<u64>()
        );
        debug_assert!(self.total_recorded_ms <= self.budget_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> EncodedPayload {
        EncodedPayload::new(vec![0u8; 4], "video/mp4")
    }

    #[test]
    fn test_append_accumulates_and_orders() {
        let mut ledger = SegmentLedger::new(60_000);
        let a = ledger.append(payload(), 1_200, Utc::now(), Facing::Back).id;
        let b = ledger.append(payload(), 800, Utc::now(), Facing::Front).id;

        assert!(a < b);
        assert_eq!(ledger.total_recorded_ms(), 2_000);
        assert_eq!(ledger.remaining_ms(), 58_000);
        let ids: Vec<_> = ledger.summaries().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_append_clips_to_budget() {
        let mut ledger = SegmentLedger::new(10_000);
        ledger.append(payload(), 7_000, Utc::now(), Facing::Back);
        let clipped = ledger.append(payload(), 3_100, Utc::now(), Facing::Back);

        assert_eq!(clipped.duration_ms, 3_000);
        assert_eq!(ledger.total_recorded_ms(), 10_000);
        assert!(ledger.is_exhausted());
    }

    #[test]
    fn test_remove_updates_total() {
        let mut ledger = SegmentLedger::new(60_000);
        let a = ledger.append(payload(), 5_000, Utc::now(), Facing::Back).id;
        let b = ledger.append(payload(), 2_500, Utc::now(), Facing::Back).id;

        let (index, removed) = ledger.remove(a).unwrap();
        assert_eq!(index, 0);
        assert_eq!(removed.duration_ms, 5_000);
        assert_eq!(ledger.total_recorded_ms(), 2_500);
        assert_eq!(ledger.position(b), Some(0));
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut ledger = SegmentLedger::new(60_000);
        ledger.append(payload(), 5_000, Utc::now(), Facing::Back);

        assert!(ledger.remove(SegmentId(42)).is_none());
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.total_recorded_ms(), 5_000);
    }

    #[test]
    fn test_ids_not_reused_after_delete() {
        let mut ledger = SegmentLedger::new(60_000);
        let a = ledger.append(payload(), 100, Utc::now(), Facing::Back).id;
        ledger.remove(a);
        let b = ledger.append(payload(), 100, Utc::now(), Facing::Back).id;
        assert!(b > a);
    }

    #[test]
    fn test_take_all_empties_ledger() {
        let mut ledger = SegmentLedger::new(60_000);
        ledger.append(payload(), 100, Utc::now(), Facing::Back);
        ledger.append(payload(), 200, Utc::now(), Facing::Back);

        let segments = ledger.take_all();
        assert_eq!(segments.len(), 2);
        assert!(ledger.is_empty());
        assert_eq!(ledger.total_recorded_ms(), 0);
    }
}
