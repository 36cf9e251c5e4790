//! Bounded human-readable warning log.
//!
//! Every subsystem keeps one. Capacity is fixed at
//! [`WARNING_LOG_CAPACITY`]; once full, the oldest entry is overwritten.
//! A message identical to the most recent entry is not stored twice, so a
//! condition that persists for many cycles occupies one slot.

use crate::consts::WARNING_LOG_CAPACITY;
use heapless::HistoryBuf as HistoryBuffer;

#[derive(Debug)]
pub struct WarningLog {
    entries: HistoryBuffer<String, WARNING_LOG_CAPACITY>,
    /// Total warnings raised, including suppressed repeats.
    raised: u64,
}

impl WarningLog {
    pub fn new() -> Self {
        Self {
            entries: HistoryBuffer::new(),
            raised: 0,
        }
    }

    /// Record a warning. Returns `false` when it repeated the latest entry.
    pub fn push(&mut self, message: impl Into<String>) -> bool {
        let message = message.into();
        self.raised += 1;
        if self.entries.recent().is_some_and(|last| *last == message) {
            return false;
        }
        self.entries.write(message);
        true
    }

    /// Oldest-first copy of the stored warnings.
    pub fn to_vec(&self) -> Vec<String> {
        self.entries.oldest_ordered().cloned().collect()
    }

    pub fn latest(&self) -> Option<&str> {
        self.entries.recent().map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[inline]
    pub fn raised(&self) -> u64 {
        self.raised
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for WarningLog {
    fn default() -> Self {
        Self::new()
    }
}
