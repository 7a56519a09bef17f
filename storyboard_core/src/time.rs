//! Millisecond time spans. All durations inside the core are integer
//! milliseconds; seconds only appear at the boundary with external
//! callers (LLM prompts, MIDI section tables, host APIs).

use serde::{Deserialize, Serialize};

/// A half-open-by-convention interval `[start_ms, end_ms)` with
/// `start_ms < end_ms` enforced at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeSpan {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl TimeSpan {
    /// Builds a span, panicking if `start_ms >= end_ms`.
    ///
    /// Every span inside this crate is expected to satisfy the
    /// invariant at construction time; callers deriving spans from
    /// untrusted external input (LLM replies, MIDI files) should
    /// validate before calling this.
    #[must_use]
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        assert!(
            start_ms < end_ms,
            "TimeSpan requires start_ms < end_ms, got {start_ms}..{end_ms}"
        );
        Self { start_ms, end_ms }
    }

    /// Fallible constructor for spans derived from untrusted input.
    #[must_use]
    pub fn try_new(start_ms: u64, end_ms: u64) -> Option<Self> {
        (start_ms < end_ms).then_some(Self { start_ms, end_ms })
    }

    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }

    #[must_use]
    pub fn overlaps(&self, other: &TimeSpan) -> bool {
        self.start_ms < other.end_ms && other.start_ms < self.end_ms
    }
}
