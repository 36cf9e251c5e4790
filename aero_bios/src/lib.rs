//! # AERO Self-Healing BIOS
//!
//! Integrity supervisor for the avionics memory map. Memory is simulated
//! as owned byte arrays behind [`memory::MemoryMap`]; every address the
//! engine touches is checked against the map.
//!
//! ## Layers
//!
//! 1. **Primitives**: memory map, CRC-32, segment table, bus controller,
//!    environment monitors, error log, sealed status block.
//! 2. **Engine** ([`engine::BiosContext`]): boot sequence, healing
//!    strategies, backup/restore, critical recovery.
//! 3. **Supervisor**: [`engine::BiosContext::run_periodic_check`], driven
//!    through [`aero_common::subsystem::Subsystem`] once per second.
//!
//! ## Result codes
//!
//! Operations return `Result<_, BiosError>`. [`BiosError::code`] maps each
//! error to the numeric BIOS code (-1 memory .. -6 critical);
//! [`error::result_code`] maps a whole result, with 0 for success.

pub mod bus;
pub mod crc;
pub mod engine;
pub mod error;
pub mod error_log;
pub mod memory;
pub mod monitor;
pub mod segment;
pub mod status;

pub use crc::{calculate_checksum, crc32, verify_data_integrity};
pub use engine::{BiosCheckReport, BiosContext, Detection, HealingOutcome};
pub use error::{BiosError, ErrorType, result_code};
pub use monitor::EnvironmentProbes;
pub use status::BiosStatus;
