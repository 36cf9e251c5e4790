//! Actuator errors and per-subsystem fault flags.
//!
//! Actuator errors are returned per command and never abort a cycle.
//! Fault flags are refreshed every cycle by the supervisors, except
//! `VrsFault::RECOVERY_TIMEOUT` which stays latched until emergency mode is
//! cleared. Any CRITICAL flag marks the subsystem unhealthy.

use bitflags::bitflags;
use thiserror::Error;

/// Reason an individual actuator command was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ActuatorError {
    #[error("servo {blade}/{element} does not exist")]
    OutOfRange { blade: u8, element: u8 },

    #[error("servo {blade}/{element} is unhealthy")]
    Unhealthy { blade: u8, element: u8 },

    #[error("command contains a non-finite value")]
    NonFinite,
}

bitflags! {
    /// VRS supervisor fault flags.
    ///
    /// CRITICAL: ACTUATOR_REJECTED, RECOVERY_TIMEOUT.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VrsFault: u8 {
        /// Last cycle overran its period.
        const CYCLE_OVERRUN      = 0x01;
        /// Pressure ring unusable, detection degraded.
        const SENSOR_DEGRADED    = 0x02;
        /// A cockpit channel refused a command. **CRITICAL**.
        const ACTUATOR_REJECTED  = 0x04;
        /// Recovery hit its time cap. **CRITICAL**.
        const RECOVERY_TIMEOUT   = 0x08;
    }
}

impl VrsFault {
    pub const CRITICAL_MASK: Self = Self::from_bits_truncate(
        Self::ACTUATOR_REJECTED.bits() | Self::RECOVERY_TIMEOUT.bits(),
    );

    #[inline]
    pub const fn has_critical(&self) -> bool {
        self.intersects(Self::CRITICAL_MASK)
    }
}

bitflags! {
    /// Adaptive rotor supervisor fault flags.
    ///
    /// CRITICAL: SERVO_FAILURE, EXCESSIVE_VIBRATION.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RotorFault: u8 {
        const CYCLE_OVERRUN        = 0x01;
        /// Resonance with a blade-passing harmonic.
        const RESONANCE            = 0x02;
        /// At least one servo unhealthy or a command rejected. **CRITICAL**.
        const SERVO_FAILURE        = 0x04;
        /// Vibration level above the warning threshold. **CRITICAL**.
        const EXCESSIVE_VIBRATION  = 0x08;
    }
}

impl RotorFault {
    pub const CRITICAL_MASK: Self = Self::from_bits_truncate(
        Self::SERVO_FAILURE.bits() | Self::EXCESSIVE_VIBRATION.bits(),
    );

    #[inline]
    pub const fn has_critical(&self) -> bool {
        self.intersects(Self::CRITICAL_MASK)
    }
}
