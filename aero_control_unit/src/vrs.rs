//! Vortex-ring-state protection.
//!
//! Pipeline per 10 ms cycle:
//!
//! ```text
//! VrsInput ─► detector ─► recovery ─► blade interface ─► cockpit channels
//!                 │                        ▲
//!                 └──► analyzer (active)   └── rate limit + health
//! ```

pub mod analyzer;
pub mod blade;
pub mod detector;
pub mod recovery;
pub mod system;

pub use analyzer::VortexFlowAnalyzer;
pub use blade::{BladeControlInterface, ExecutionReport};
pub use detector::VortexRingDetector;
pub use recovery::{RecoveryPhase, RecoveryTransition, VortexRecoveryController};
pub use system::{VortexShieldSystem, VrsDiagnostics, VrsInput};
