//! Slot range bookkeeping
//!
//! A node serves a small set of disjoint slot ranges; the topology query
//! reports them with inclusive bounds.

use serde::{Deserialize, Serialize};

use crate::slot::{Slot, HASH_SLOTS};

/// A contiguous range of hash slots, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRange {
    /// First slot (inclusive)
    pub start: Slot,
    /// Last slot (inclusive)
    pub end: Slot,
}

impl SlotRange {
    /// Create a new range covering `start..=end`.
    pub fn new(start: Slot, end: Slot) -> Self {
        Self { start, end }
    }

    /// The full slot space, used for single-node fallback.
    pub fn full() -> Self {
        Self {
            start: 0,
            end: HASH_SLOTS - 1,
        }
    }

    /// Check if a slot falls inside this range.
    pub fn contains(&self, slot: Slot) -> bool {
        slot >= self.start && slot <= self.end
    }

    /// Number of slots covered.
    pub fn slot_count(&self) -> u32 {
        u32::from(self.end) - u32::from(self.start) + 1
    }
}

impl std::fmt::Display for SlotRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
