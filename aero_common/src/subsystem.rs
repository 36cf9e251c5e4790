//! Lifecycle contract shared by every periodic subsystem.
//!
//! A subsystem is owned by exactly one periodic task. The task hands it an
//! immutable input snapshot each cycle and collects the command it returns.
//!
//! # Lifecycle
//!
//! 1. `initialize()` once before the first cycle.
//! 2. `update()` once per period, bounded time, never blocks.
//! 3. `shutdown()` between cycles when the task is cancelled. Must leave
//!    actuators in their neutral state.
//!
//! Getters are read-only and may be called between cycles at any time.

use serde::Serialize;
use std::time::Instant;
use thiserror::Error;

/// Errors raised while bringing a subsystem up.
#[derive(Debug, Clone, Error)]
pub enum SubsystemError {
    #[error("{name}: invalid configuration: {reason}")]
    InvalidConfig { name: &'static str, reason: String },

    #[error("{name}: initialization failed: {reason}")]
    InitFailed { name: &'static str, reason: String },

    #[error("{name}: not initialized")]
    NotInitialized { name: &'static str },
}

/// Point-in-time status summary, suitable for a JSON report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubsystemStatus {
    pub name: &'static str,
    pub initialized: bool,
    pub healthy: bool,
    /// Health score in [0, 1].
    pub health: f64,
    /// Current operating mode, free-form.
    pub mode: String,
    /// A detected condition (VRS, resonance, corruption) is currently active.
    pub condition_active: bool,
    pub cycles: u64,
    pub overruns: u64,
    pub warnings: usize,
}

/// Common surface of the VRS, rotor and BIOS supervisors.
pub trait Subsystem {
    /// Snapshot consumed each cycle.
    type Input;
    /// Command produced each cycle.
    type Output;

    fn name(&self) -> &'static str;

    fn initialize(&mut self) -> Result<(), SubsystemError>;

    /// Run one cycle. `now` is the cycle start time.
    fn update(&mut self, input: &Self::Input, now: Instant) -> Self::Output;

    fn shutdown(&mut self);

    fn is_healthy(&self) -> bool;

    fn warnings(&self) -> Vec<String>;

    fn status(&self) -> SubsystemStatus;
}
