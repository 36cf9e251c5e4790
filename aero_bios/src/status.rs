//! BIOS status block.

use crate::crc::calculate_checksum;
use serde::Serialize;

pub const BIOS_MAGIC: u32 = 0xDEAD_BEEF;
pub const BIOS_VERSION: u16 = 0x0100;

/// Serialized size of the block excluding the checksum.
const PAYLOAD_LEN: usize = 4 + 2 + 4 + 4 + 4 + 4 + 2 + 1 + 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BiosStatus {
    pub magic_number: u32,
    pub version: u16,
    pub build_number: u32,
    pub boot_count: u32,
    pub error_count: u32,
    /// Boot count at the last logged error.
    pub last_error_time: u32,
    pub last_error_code: u16,
    pub healing_attempts: u8,
    /// Percentage, 0..=100.
    pub system_health: u8,
    /// Byte sum of the fields above.
    pub checksum: u16,
}

impl BiosStatus {
    pub fn new(build_number: u32) -> Self {
        let mut status = Self {
            magic_number: BIOS_MAGIC,
            version: BIOS_VERSION,
            build_number,
            boot_count: 0,
            error_count: 0,
            last_error_time: 0,
            last_error_code: 0,
            healing_attempts: 0,
            system_health: 100,
            checksum: 0,
        };
        status.seal();
        status
    }

    /// Little-endian field image covered by the checksum.
    pub fn payload(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        let mut at = 0;
        let mut put = |bytes: &[u8]| {
            out[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        };
        put(&self.magic_number.to_le_bytes());
        put(&self.version.to_le_bytes());
        put(&self.build_number.to_le_bytes());
        put(&self.boot_count.to_le_bytes());
        put(&self.error_count.to_le_bytes());
        put(&self.last_error_time.to_le_bytes());
        put(&self.last_error_code.to_le_bytes());
        put(&[self.healing_attempts, self.system_health]);
        out
    }

    /// Recompute the checksum.
    pub fn seal(&mut self) {
        self.checksum = calculate_checksum(&self.payload());
    }

    pub fn is_valid(&self) -> bool {
        self.magic_number == BIOS_MAGIC && self.checksum == calculate_checksum(&self.payload())
    }

    /// Successful repair: move halfway back to 100 %.
    pub fn improve_health(&mut self) {
        self.system_health = ((u16::from(self.system_health) + 100) / 2) as u8;
    }

    /// Unrecovered failure: halve.
    pub fn degrade_health(&mut self) {
        self.system_health /= 2;
    }

    /// Scale by a monitor factor in [0, 1], truncating.
    pub fn scale_health(&mut self, factor: f64) {
        let scaled = f64::from(self.system_health) * factor.clamp(0.0, 1.0);
        self.system_health = scaled as u8;
    }
}
