//! AERO Common Library
//!
//! Shared constants, data model, configuration loading and the periodic
//! task machinery used by every AERO crate.
//!
//! # Module Structure
//!
//! - [`consts`] - Physical constants, safety envelopes, task periods
//! - [`config`] - TOML loading (`ConfigLoader`) and the aggregate [`config::AeroConfig`]
//! - [`vrs`] - Vortex-ring-state snapshots, detector output, control commands
//! - [`rotor`] - Blade elements, servo commands, vibration samples
//! - [`bios`] - Healing engine configuration
//! - [`cycle`] - Periodic task runner, cycle statistics, deadline health
//! - [`snapshot`] - Immutable snapshot hand-off between tasks
//! - [`subsystem`] - Lifecycle trait implemented by each supervisor
//! - [`warnings`] - Bounded warning log
//! - [`prelude`] - Common re-exports for convenience

pub mod bios;
pub mod config;
pub mod consts;
pub mod cycle;
pub mod prelude;
pub mod rotor;
pub mod snapshot;
pub mod subsystem;
pub mod vrs;
pub mod warnings;
