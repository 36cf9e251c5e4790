//! Vortex-ring-state protection types and configuration.

pub mod config;
pub mod types;

pub use config::VrsConfig;
pub use types::{
    ControlAxes, ControlCommand, ControlPositions, DetectionFlags, DetectionMethod,
    FlightConditions, PressureSensorData, RecoveryStrategy, RotorState, StrategySelection,
    VortexRingState,
};
