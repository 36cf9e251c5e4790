//! Prelude module for common re-exports.
//!
//! ```rust
//! use aero_common::prelude::*;
//! ```

// ─── Configuration ──────────────────────────────────────────────────
pub use crate::config::{AeroConfig, ConfigError, ConfigLoader, LogLevel, SharedConfig};

// ─── Constants ──────────────────────────────────────────────────────
pub use crate::consts::{AIR_DENSITY_SEA_LEVEL, GRAVITY};

// ─── Runtime ────────────────────────────────────────────────────────
pub use crate::cycle::{CycleStats, DeadlineMonitor, PeriodicTask};
pub use crate::snapshot::{SnapshotCell, SnapshotReader};
pub use crate::subsystem::{Subsystem, SubsystemError, SubsystemStatus};
pub use crate::warnings::WarningLog;
