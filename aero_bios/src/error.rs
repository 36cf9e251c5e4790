//! BIOS result codes and logged error kinds.
//!
//! Every fallible BIOS operation returns `Result<_, BiosError>`. `Ok` is
//! the success code 0; each variant carries the negative code the status
//! block and error log record.

use aero_common::bios::HealingStrategy;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error, Serialize)]
pub enum BiosError {
    /// Unmapped address, missing backup or fill-pattern corruption.
    #[error("memory error")]
    Memory,

    #[error("flash error")]
    Flash,

    /// Restored data failed verification.
    #[error("checksum mismatch")]
    Checksum,

    #[error("CRC mismatch")]
    Crc,

    #[error("bus error")]
    Bus,

    /// Environment out of limits or recovery failed.
    #[error("critical failure")]
    Critical,
}

impl BiosError {
    pub const fn code(self) -> i16 {
        match self {
            Self::Memory => -1,
            Self::Flash => -2,
            Self::Checksum => -3,
            Self::Crc => -4,
            Self::Bus => -5,
            Self::Critical => -6,
        }
    }

    pub const fn from_code(code: i16) -> Option<Self> {
        match code {
            -1 => Some(Self::Memory),
            -2 => Some(Self::Flash),
            -3 => Some(Self::Checksum),
            -4 => Some(Self::Crc),
            -5 => Some(Self::Bus),
            -6 => Some(Self::Critical),
            _ => None,
        }
    }
}

/// Result code of an operation: 0 on success, negative otherwise.
pub fn result_code(result: Result<(), BiosError>) -> i16 {
    result.err().map_or(0, BiosError::code)
}

/// Kind of a logged error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[repr(u16)]
pub enum ErrorType {
    #[default]
    None = 0,
    MemoryCorruption = 1,
    FlashFailure = 2,
    BusTimeout = 3,
    CrcMismatch = 4,
    WatchdogTimeout = 5,
    PowerFluctuation = 6,
    TemperatureHigh = 7,
    RadiationDetected = 8,
    CriticalSystem = 9,
}

impl ErrorType {
    pub const fn from_raw(raw: u16) -> Self {
        match raw {
            1 => Self::MemoryCorruption,
            2 => Self::FlashFailure,
            3 => Self::BusTimeout,
            4 => Self::CrcMismatch,
            5 => Self::WatchdogTimeout,
            6 => Self::PowerFluctuation,
            7 => Self::TemperatureHigh,
            8 => Self::RadiationDetected,
            9 => Self::CriticalSystem,
            _ => Self::None,
        }
    }

    /// Repair for this kind of error. `None` for environmental conditions,
    /// which no repair can fix.
    pub const fn healing_strategy(self) -> Option<HealingStrategy> {
        match self {
            Self::None | Self::MemoryCorruption | Self::CrcMismatch => {
                Some(HealingStrategy::MemoryCopy)
            }
            Self::FlashFailure => Some(HealingStrategy::SectorErase),
            Self::BusTimeout => Some(HealingStrategy::BusReset),
            Self::WatchdogTimeout => Some(HealingStrategy::SystemReset),
            Self::CriticalSystem => Some(HealingStrategy::CriticalRecovery),
            Self::PowerFluctuation | Self::TemperatureHigh | Self::RadiationDetected => None,
        }
    }
}
