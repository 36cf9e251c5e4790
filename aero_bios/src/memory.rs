//! Simulated memory map.
//!
//! Three backing regions: flash, RAM and backup SRAM. The EEPROM window at
//! [`EEPROM_BASE_ADDR`] lies inside the flash address range, so EEPROM
//! accesses resolve to the upper half of the flash array.
//!
//! Raw byte and word access is bit-exact: a read returns exactly what the
//! last write stored. Words are little-endian. Flash is erased to `0xFF`.

use crate::error::BiosError;
use static_assertions::const_assert;

pub const FLASH_BASE_ADDR: u32 = 0x0800_0000;
pub const RAM_BASE_ADDR: u32 = 0x2000_0000;
pub const BACKUP_RAM_BASE: u32 = 0x4002_4000;
pub const EEPROM_BASE_ADDR: u32 = 0x0808_0000;

pub const FLASH_SIZE: u32 = 1024 * 1024;
pub const RAM_SIZE: u32 = 256 * 1024;
/// Sized to mirror RAM so every RAM segment has room for its copy.
pub const BACKUP_RAM_SIZE: u32 = RAM_SIZE;
pub const EEPROM_SIZE: u32 = 64 * 1024;

pub const FLASH_SECTOR_SIZE: u32 = 4 * 1024;
pub const FLASH_ERASED: u8 = 0xFF;

const_assert!(FLASH_SIZE % FLASH_SECTOR_SIZE == 0);
const_assert!(EEPROM_BASE_ADDR >= FLASH_BASE_ADDR);
const_assert!(EEPROM_BASE_ADDR + EEPROM_SIZE <= FLASH_BASE_ADDR + FLASH_SIZE);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    Flash,
    Ram,
    BackupRam,
}

#[derive(Debug)]
struct Region {
    kind: RegionKind,
    base: u32,
    data: Vec<u8>,
}

impl Region {
    fn offset(&self, addr: u32, len: u32) -> Option<usize> {
        let off = addr.checked_sub(self.base)?;
        let end = u64::from(off) + u64::from(len);
        (end <= self.data.len() as u64).then_some(off as usize)
    }
}

/// Byte-addressable simulated memory.
#[derive(Debug)]
pub struct MemoryMap {
    regions: [Region; 3],
}

impl MemoryMap {
    /// Erased flash, zeroed RAM and backup SRAM.
    pub fn new() -> Self {
        Self {
            regions: [
                Region {
                    kind: RegionKind::Flash,
                    base: FLASH_BASE_ADDR,
                    data: vec![FLASH_ERASED; FLASH_SIZE as usize],
                },
                Region {
                    kind: RegionKind::Ram,
                    base: RAM_BASE_ADDR,
                    data: vec![0; RAM_SIZE as usize],
                },
                Region {
                    kind: RegionKind::BackupRam,
                    base: BACKUP_RAM_BASE,
                    data: vec![0; BACKUP_RAM_SIZE as usize],
                },
            ],
        }
    }

    fn locate(&self, addr: u32, len: u32) -> Result<(usize, usize), BiosError> {
        self.regions
            .iter()
            .enumerate()
            .find_map(|(i, r)| r.offset(addr, len).map(|off| (i, off)))
            .ok_or(BiosError::Memory)
    }

    /// Region holding the whole range.
    pub fn region_of(&self, addr: u32, len: u32) -> Option<RegionKind> {
        self.locate(addr, len).ok().map(|(i, _)| self.regions[i].kind)
    }

    #[inline]
    pub fn is_flash(&self, addr: u32, len: u32) -> bool {
        self.region_of(addr, len) == Some(RegionKind::Flash)
    }

    pub fn slice(&self, addr: u32, len: u32) -> Result<&[u8], BiosError> {
        let (i, off) = self.locate(addr, len)?;
        Ok(&self.regions[i].data[off..off + len as usize])
    }

    pub fn slice_mut(&mut self, addr: u32, len: u32) -> Result<&mut [u8], BiosError> {
        let (i, off) = self.locate(addr, len)?;
        Ok(&mut self.regions[i].data[off..off + len as usize])
    }

    // ─── Raw access ─────────────────────────────────────────────────

    pub fn read_byte(&self, addr: u32) -> Result<u8, BiosError> {
        Ok(self.slice(addr, 1)?[0])
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), BiosError> {
        self.slice_mut(addr, 1)?[0] = value;
        Ok(())
    }

    pub fn read_word(&self, addr: u32) -> Result<u32, BiosError> {
        let bytes = self.slice(addr, 4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn write_word(&mut self, addr: u32, value: u32) -> Result<(), BiosError> {
        self.slice_mut(addr, 4)?.copy_from_slice(&value.to_le_bytes());
        Ok(())
    }

    pub fn fill(&mut self, addr: u32, len: u32, value: u8) -> Result<(), BiosError> {
        self.slice_mut(addr, len)?.fill(value);
        Ok(())
    }

    /// Copy `len` bytes. Ranges may sit in the same region.
    pub fn copy(&mut self, src: u32, dst: u32, len: u32) -> Result<(), BiosError> {
        let (si, soff) = self.locate(src, len)?;
        let (di, doff) = self.locate(dst, len)?;
        let n = len as usize;
        if si == di {
            self.regions[si].data.copy_within(soff..soff + n, doff);
        } else {
            let (a, b) = if si < di {
                let (lo, hi) = self.regions.split_at_mut(di);
                (&lo[si], &mut hi[0])
            } else {
                let (lo, hi) = self.regions.split_at_mut(si);
                (&hi[0], &mut lo[di])
            };
            b.data[doff..doff + n].copy_from_slice(&a.data[soff..soff + n]);
        }
        Ok(())
    }

    // ─── Flash ──────────────────────────────────────────────────────

    /// Erase the sector containing `addr` to `0xFF`.
    pub fn erase_flash_sector(&mut self, addr: u32) -> Result<(), BiosError> {
        if !self.is_flash(addr, 1) {
            return Err(BiosError::Flash);
        }
        let start = addr - (addr - FLASH_BASE_ADDR) % FLASH_SECTOR_SIZE;
        self.fill(start, FLASH_SECTOR_SIZE, FLASH_ERASED)
            .map_err(|_| BiosError::Flash)
    }

    pub fn program_flash(&mut self, addr: u32, data: &[u8]) -> Result<(), BiosError> {
        let len = u32::try_from(data.len()).map_err(|_| BiosError::Flash)?;
        if !self.is_flash(addr, len) {
            return Err(BiosError::Flash);
        }
        self.slice_mut(addr, len)?.copy_from_slice(data);
        Ok(())
    }

    pub fn read_flash(&self, addr: u32, out: &mut [u8]) -> Result<(), BiosError> {
        let len = u32::try_from(out.len()).map_err(|_| BiosError::Flash)?;
        if !self.is_flash(addr, len) {
            return Err(BiosError::Flash);
        }
        out.copy_from_slice(self.slice(addr, len)?);
        Ok(())
    }

    /// Fill a range with a deterministic non-trivial pattern.
    pub fn seed(&mut self, addr: u32, len: u32, seed: u32) -> Result<(), BiosError> {
        let mut x = seed | 1;
        for byte in self.slice_mut(addr, len)? {
            // xorshift32
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            *byte = x as u8;
        }
        Ok(())
    }
}

impl Default for MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}
