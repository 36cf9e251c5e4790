//! Bounded BIOS error log.
//!
//! Holds the last [`ERROR_LOG_CAPACITY`] entries; the oldest entry is
//! overwritten once full.

use crate::error::ErrorType;
use aero_common::consts::ERROR_LOG_CAPACITY;
use heapless::HistoryBuf as HistoryBuffer;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub kind: ErrorType,
    pub code: u16,
    /// Boot count when the error was logged.
    pub boot: u32,
}

impl ErrorEntry {
    /// Packed `kind << 16 | code` form.
    #[inline]
    pub const fn raw(&self) -> u32 {
        ((self.kind as u32) << 16) | self.code as u32
    }

    pub const fn from_raw(raw: u32, boot: u32) -> Self {
        Self {
            kind: ErrorType::from_raw((raw >> 16) as u16),
            code: (raw & 0xFFFF) as u16,
            boot,
        }
    }
}

#[derive(Debug)]
pub struct ErrorLog {
    entries: HistoryBuffer<ErrorEntry, ERROR_LOG_CAPACITY>,
}

impl ErrorLog {
    pub fn new() -> Self {
        Self {
            entries: HistoryBuffer::new(),
        }
    }

    pub fn push(&mut self, entry: ErrorEntry) {
        self.entries.write(entry);
    }

    pub fn last(&self) -> Option<ErrorEntry> {
        self.entries.recent().copied()
    }

    /// Oldest first.
    pub fn entries(&self) -> Vec<ErrorEntry> {
        self.entries.oldest_ordered().copied().collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(code: u16) -> ErrorEntry {
        ErrorEntry {
            kind: ErrorType::BusTimeout,
            code,
            boot: 1,
        }
    }

    #[test]
    fn overwrites_oldest_when_full() {
        let mut log = ErrorLog::new();
        for code in 0..(ERROR_LOG_CAPACITY as u16 + 5) {
            log.push(entry(code));
        }
        let all = log.entries();
        assert_eq!(all.len(), ERROR_LOG_CAPACITY);
        assert_eq!(all[0].code, 5);
        assert_eq!(log.last().map(|e| e.code), Some(ERROR_LOG_CAPACITY as u16 + 4));
    }

    #[test]
    fn raw_packing() {
        let e = ErrorEntry {
            kind: ErrorType::CrcMismatch,
            code: 0x0102,
            boot: 3,
        };
        assert_eq!(e.raw(), 0x0004_0102);
        assert_eq!(ErrorEntry::from_raw(e.raw(), 3), e);
    }

    #[test]
    fn empty_log_has_no_last() {
        let mut log = ErrorLog::new();
        assert!(log.last().is_none());
        log.push(entry(1));
        log.clear();
        assert!(log.is_empty());
    }
}
