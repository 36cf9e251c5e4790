//! Adaptive rotor blade types and configuration.

pub mod config;
pub mod types;

pub use config::{OptimizationConstraints, RotorConfig};
pub use types::{
    AdaptationMode, BladeElement, OptimizationTarget, ResonanceCondition, RotorState,
    ServoCommand, VibrationData,
};
