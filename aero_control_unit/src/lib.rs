//! # AERO Control Unit Library
//!
//! Flight-critical control loops for the AERO cluster. Each subsystem is a
//! plain struct implementing [`aero_common::subsystem::Subsystem`] and is
//! driven by one periodic task.
//!
//! ## Subsystems
//!
//! 1. **VRS protection** ([`vrs`], 10 ms): vortex-ring-state detection,
//!    recovery state machine, cockpit control actuation.
//! 2. **Adaptive rotor** ([`rotor`], 1 ms): vibration and resonance
//!    analysis, per-element servo control, loading optimizer.
//!
//! ## Cycle Discipline
//!
//! Buffers that scale with the rotor (flow grid, blade elements, servo
//! table, spectrum) are sized at construction and reused every cycle.
//! Sensor faults degrade, actuator faults are reported per command, and
//! timing overruns decay health. No cycle returns an error.

pub mod error;
pub mod rotor;
pub mod vrs;

pub use error::{ActuatorError, RotorFault, VrsFault};
