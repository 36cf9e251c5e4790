//! # AERO Runtime
//!
//! Supervisor for the AERO control cluster. Spawns one periodic task per
//! subsystem, feeds them a closed-loop simulated flight through immutable
//! snapshots and collects a JSON status report on shutdown.
//!
//! - [`sim`] - Flight model, pilot profile and BIOS fault schedule
//! - [`runtime`] - Task threads, snapshot wiring, stop handling
//! - [`report`] - Final report types

pub mod report;
pub mod runtime;
pub mod sim;

pub use report::{RuntimeReport, TaskReport};
pub use runtime::{RuntimeError, RuntimeOptions, run};
