//! Memory segment table and integrity scanning.
//!
//! The table is fixed at build time; only each segment's stored CRC changes
//! at runtime, refreshed whenever the segment is backed up. A stored CRC of
//! zero means the segment has never been backed up.

use crate::crc::crc32;
use crate::memory::{
    BACKUP_RAM_BASE, EEPROM_BASE_ADDR, FLASH_BASE_ADDR, FLASH_ERASED, FLASH_SECTOR_SIZE,
    MemoryMap, RAM_BASE_ADDR,
};
use bitflags::bitflags;
use serde::Serialize;
use static_assertions::const_assert;

/// Bytes inspected for all-0x00 / all-0xFF fill corruption.
pub const FILL_CHECK_LEN: u32 = 1024;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SegmentFlags: u16 {
        const CRITICAL   = 0x0001;
        /// Has a paired backup region.
        const BACKUP     = 0x0002;
        const ENCRYPTED  = 0x0004;
        const READONLY   = 0x0008;
        const EXECUTABLE = 0x0010;
        /// Included in memory-copy healing.
        const HEALABLE   = 0x0020;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySegment {
    pub name: &'static str,
    pub start_addr: u32,
    pub size: u32,
    pub backup_addr: u32,
    pub crc32: u32,
    pub flags: SegmentFlags,
}

impl MemorySegment {
    const fn new(
        name: &'static str,
        start_addr: u32,
        size: u32,
        backup_addr: u32,
        flags: SegmentFlags,
    ) -> Self {
        Self {
            name,
            start_addr,
            size,
            backup_addr,
            crc32: 0,
            flags,
        }
    }

    #[inline]
    pub fn contains(&self, addr: u32) -> bool {
        addr >= self.start_addr && addr - self.start_addr < self.size
    }

    #[inline]
    pub fn has_backup(&self) -> bool {
        self.flags.contains(SegmentFlags::BACKUP)
    }

    #[inline]
    pub fn end_addr(&self) -> u32 {
        self.start_addr + self.size
    }
}

const BOOT_SIZE: u32 = 64 * 1024;
const CONFIG_SIZE: u32 = 4 * 1024;
const RUNTIME_SIZE: u32 = 128 * 1024;
const STACK_SIZE: u32 = 128 * 1024;

const_assert!(CONFIG_SIZE % FLASH_SECTOR_SIZE == 0);
const_assert!(BOOT_SIZE + CONFIG_SIZE <= EEPROM_BASE_ADDR - FLASH_BASE_ADDR);

/// Boot image, flash configuration, runtime data and stack/heap.
pub const DEFAULT_SEGMENTS: [MemorySegment; 4] = [
    MemorySegment::new(
        "boot",
        FLASH_BASE_ADDR,
        BOOT_SIZE,
        EEPROM_BASE_ADDR,
        SegmentFlags::CRITICAL
            .union(SegmentFlags::BACKUP)
            .union(SegmentFlags::EXECUTABLE),
    ),
    MemorySegment::new(
        "config",
        FLASH_BASE_ADDR + BOOT_SIZE,
        CONFIG_SIZE,
        EEPROM_BASE_ADDR + BOOT_SIZE,
        SegmentFlags::BACKUP.union(SegmentFlags::HEALABLE),
    ),
    MemorySegment::new(
        "runtime",
        RAM_BASE_ADDR,
        RUNTIME_SIZE,
        BACKUP_RAM_BASE,
        SegmentFlags::BACKUP.union(SegmentFlags::HEALABLE),
    ),
    MemorySegment::new(
        "stack",
        RAM_BASE_ADDR + RUNTIME_SIZE,
        STACK_SIZE,
        BACKUP_RAM_BASE + RUNTIME_SIZE,
        SegmentFlags::HEALABLE,
    ),
];

// ─── Integrity faults ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FaultKind {
    CrcMismatch,
    /// Data-bearing segment reads all 0x00 or all 0xFF.
    FillPattern,
    /// Fully erased sector inside a data-bearing flash segment.
    ErasedFlash,
}

/// One corruption finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IntegrityFault {
    pub segment: usize,
    pub start_addr: u32,
    pub size: u32,
    pub kind: FaultKind,
    pub expected_crc: u32,
    pub actual_crc: u32,
}

// ─── Table ──────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SegmentTable {
    segments: Vec<MemorySegment>,
}

impl SegmentTable {
    pub fn new(segments: &[MemorySegment]) -> Self {
        Self {
            segments: segments.to_vec(),
        }
    }

    #[inline]
    pub fn segments(&self) -> &[MemorySegment] {
        &self.segments
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&MemorySegment> {
        self.segments.get(index)
    }

    /// Index of the segment containing `addr`.
    pub fn find(&self, addr: u32) -> Option<usize> {
        self.segments.iter().position(|s| s.contains(addr))
    }

    pub fn set_crc(&mut self, index: usize, crc: u32) {
        if let Some(segment) = self.segments.get_mut(index) {
            segment.crc32 = crc;
        }
    }

    /// Indices matching every flag in `flags`.
    pub fn with_flags(&self, flags: SegmentFlags) -> impl Iterator<Item = usize> + '_ {
        self.segments
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.flags.contains(flags))
            .map(|(i, _)| i)
    }

    /// CRC and fill checks for one segment.
    pub fn check_segment(&self, index: usize, memory: &MemoryMap) -> Option<IntegrityFault> {
        let segment = self.segments.get(index)?;
        let Ok(data) = memory.slice(segment.start_addr, segment.size) else {
            return None;
        };
        let fault = |kind, actual_crc| IntegrityFault {
            segment: index,
            start_addr: segment.start_addr,
            size: segment.size,
            kind,
            expected_crc: segment.crc32,
            actual_crc,
        };

        let actual = crc32(data);
        if segment.crc32 != 0 && segment.crc32 != actual {
            return Some(fault(FaultKind::CrcMismatch, actual));
        }
        if segment.has_backup() {
            let head = &data[..data.len().min(FILL_CHECK_LEN as usize)];
            let all_zero = head.iter().all(|&b| b == 0x00);
            let all_ff = head.iter().all(|&b| b == 0xFF);
            if all_zero || all_ff {
                return Some(fault(FaultKind::FillPattern, actual));
            }
        }
        None
    }

    /// Erased sectors inside data-bearing flash segments.
    pub fn scan_flash(&self, memory: &MemoryMap) -> Vec<IntegrityFault> {
        let mut faults = Vec::new();
        for (index, segment) in self.segments.iter().enumerate() {
            if !segment.has_backup() || !memory.is_flash(segment.start_addr, segment.size) {
                continue;
            }
            let mut addr = segment.start_addr;
            while addr < segment.end_addr() {
                let len = FLASH_SECTOR_SIZE.min(segment.end_addr() - addr);
                let erased = memory.slice(addr, len).ok().filter(|sector| {
                    sector.iter().all(|&b| b == FLASH_ERASED)
                });
                if let Some(sector) = erased {
                    faults.push(IntegrityFault {
                        segment: index,
                        start_addr: addr,
                        size: len,
                        kind: FaultKind::ErasedFlash,
                        expected_crc: segment.crc32,
                        actual_crc: crc32(sector),
                    });
                }
                addr += len;
            }
        }
        faults
    }

    /// Every finding across the table.
    pub fn scan(&self, memory: &MemoryMap) -> Vec<IntegrityFault> {
        let mut faults: Vec<_> = (0..self.segments.len())
            .filter_map(|i| self.check_segment(i, memory))
            .collect();
        faults.extend(self.scan_flash(memory));
        faults
    }
}

impl Default for SegmentTable {
    fn default() -> Self {
        Self::new(&DEFAULT_SEGMENTS)
    }
}
