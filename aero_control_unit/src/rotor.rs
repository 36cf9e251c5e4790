//! Self-adaptive rotor blades.
//!
//! - [`controller`] - Spectrum analysis, resonance detection, control laws
//! - [`filters`] - Notch + low-pass conditioning of the vibration level
//! - [`optimizer`] - Per-cycle gradient step on blade loading
//! - [`servo`] - Micro-servo array with per-servo health and rate limits
//! - [`system`] - 1 kHz supervisor
//!
//! Servo requests travel in [`CommandBuffer`]s owned by the supervisor, so
//! a cycle never touches the heap.

use aero_common::consts::MAX_SERVO_COMMANDS;
use aero_common::rotor::ServoCommand;

pub mod controller;
pub mod filters;
pub mod optimizer;
pub mod servo;
pub mod system;

/// Fixed-capacity servo request list. Pushes past capacity are dropped.
pub type CommandBuffer = heapless::Vec<ServoCommand, MAX_SERVO_COMMANDS>;

pub use controller::AdaptiveController;
pub use optimizer::RealTimeOptimizer;
pub use servo::{MicroServoArray, ServoPosition};
pub use system::{AdaptiveRotorSystem, RotorDiagnostics, RotorInput, ServoBatch};
