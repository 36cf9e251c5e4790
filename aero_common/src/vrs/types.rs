//! VRS data model: flight snapshots, pressure ring samples, detector
//! output and cockpit control commands.

use crate::consts::{
    AIR_DENSITY_SEA_LEVEL, COLLECTIVE_MAX_DEG, COLLECTIVE_MIN_DEG, CYCLIC_LIMIT_DEG,
    PEDAL_LIMIT_DEG, PRESSURE_SENSOR_COUNT,
};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::time::Instant;

// ─── Flight snapshots ───────────────────────────────────────────────

/// Main rotor snapshot as seen by the VRS loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotorState {
    pub main_rotor_rpm: f64,
    pub tail_rotor_rpm: f64,
    /// Collective pitch [deg].
    pub collective_pitch: f64,
    /// Lateral cyclic [deg].
    pub lateral_cyclic: f64,
    /// Longitudinal cyclic [deg].
    pub longitudinal_cyclic: f64,
    /// Pedal position [deg].
    pub pedal_position: f64,
    /// Rotor radius [m].
    pub rotor_radius: f64,
    pub num_blades: u8,
    /// Disc loading ratio (dimensionless thrust coefficient proxy).
    pub disc_loading: f64,
    /// Linear blade twist [deg].
    pub blade_twist: f64,
}

impl Default for RotorState {
    fn default() -> Self {
        Self {
            main_rotor_rpm: 300.0,
            tail_rotor_rpm: 1500.0,
            collective_pitch: 8.0,
            lateral_cyclic: 0.0,
            longitudinal_cyclic: 0.0,
            pedal_position: 0.0,
            rotor_radius: 5.0,
            num_blades: 4,
            disc_loading: 0.1,
            blade_twist: -8.0,
        }
    }
}

/// Air data snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlightConditions {
    /// Horizontal airspeed [m/s].
    pub airspeed: f64,
    /// Vertical speed [m/s], negative when descending.
    pub vertical_speed: f64,
    /// Altitude AGL [m].
    pub altitude: f64,
    /// Air density [kg/m³].
    pub air_density: f64,
    /// Outside air temperature [°C].
    pub temperature: f64,
    pub wind_speed: f64,
    /// Wind direction [deg].
    pub wind_direction: f64,
    /// Turbulence intensity [0, 1].
    pub turbulence_intensity: f64,
    pub pressure_altitude: f64,
}

impl Default for FlightConditions {
    fn default() -> Self {
        Self {
            airspeed: 0.0,
            vertical_speed: 0.0,
            altitude: 100.0,
            air_density: AIR_DENSITY_SEA_LEVEL,
            temperature: 15.0,
            wind_speed: 0.0,
            wind_direction: 0.0,
            turbulence_intensity: 0.0,
            pressure_altitude: 100.0,
        }
    }
}

// ─── Pressure ring ──────────────────────────────────────────────────

/// One sample of the radial pressure ring.
///
/// Index 0 is the sensor nearest the disc centre; indices 1..8 sit on the
/// periphery.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureSensorData {
    /// Readings [Pa].
    pub sensor_readings: [f64; PRESSURE_SENSOR_COUNT],
    pub dynamic_pressure: f64,
    pub static_pressure: f64,
    pub pressure_gradient: f64,
    /// Cleared by the acquisition layer when the ring failed to sample.
    pub valid: bool,
}

impl PressureSensorData {
    /// All sensors reading the same pressure.
    pub fn uniform(pressure: f64) -> Self {
        Self {
            sensor_readings: [pressure; PRESSURE_SENSOR_COUNT],
            dynamic_pressure: 0.0,
            static_pressure: pressure,
            pressure_gradient: 0.0,
            valid: true,
        }
    }

    /// Sample flagged as failed.
    pub fn invalid() -> Self {
        Self {
            valid: false,
            ..Self::uniform(0.0)
        }
    }

    /// Valid flag set and every reading finite.
    pub fn is_usable(&self) -> bool {
        self.valid && self.sensor_readings.iter().all(|p| p.is_finite())
    }

    pub fn mean(&self) -> f64 {
        self.sensor_readings.iter().sum::<f64>() / PRESSURE_SENSOR_COUNT as f64
    }

    /// Population variance [Pa²].
    pub fn variance(&self) -> f64 {
        let mean = self.mean();
        self.sensor_readings
            .iter()
            .map(|p| (p - mean) * (p - mean))
            .sum::<f64>()
            / PRESSURE_SENSOR_COUNT as f64
    }

    pub fn center(&self) -> f64 {
        self.sensor_readings[0]
    }

    pub fn periphery_mean(&self) -> f64 {
        self.sensor_readings[1..].iter().sum::<f64>() / (PRESSURE_SENSOR_COUNT - 1) as f64
    }
}

impl Default for PressureSensorData {
    fn default() -> Self {
        Self::uniform(101_325.0)
    }
}

// ─── Detector output ────────────────────────────────────────────────

bitflags! {
    /// Which detector checks fired in a cycle.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DetectionFlags: u8 {
        const DESCENT_RATE         = 0x01;
        const PRESSURE_ANOMALY     = 0x02;
        const INDUCED_FLOW_DEFICIT = 0x04;
        /// Descent rate inside the warning band below the threshold.
        const IMMINENT             = 0x08;
        /// Pressure ring unusable, descent-rate-only detection.
        const DEGRADED             = 0x10;

        /// Any flag that by itself makes the state active.
        const TRIGGER_MASK = Self::DESCENT_RATE.bits()
            | Self::PRESSURE_ANOMALY.bits()
            | Self::INDUCED_FLOW_DEFICIT.bits();
    }
}

/// Detection algorithm selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMethod {
    PressureAnalysis,
    DescentRateAnalysis,
    InducedFlowCalculation,
    #[default]
    MultiSensorFusion,
}

/// Detector output for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VortexRingState {
    pub is_active: bool,
    /// Severity in [0, 1].
    pub severity: f64,
    /// Confidence in [0, 1].
    pub confidence: f64,
    /// Vertical speed that was evaluated [m/s].
    pub descent_rate: f64,
    /// Induced flow estimate [m/s].
    pub induced_flow_velocity: f64,
    /// Critical descent rate [m/s].
    pub descent_rate_threshold: f64,
    /// Vortex core radius [m].
    pub vortex_core_radius: f64,
    /// Ring circulation [m²/s].
    pub circulation_strength: f64,
    pub triggers: DetectionFlags,
    /// Onset of the current active episode.
    pub detected_at: Option<Instant>,
    /// Seconds since onset, zero when inactive.
    pub time_in_state: f64,
}

impl VortexRingState {
    /// Active only because of the warning band.
    #[inline]
    pub fn is_imminent(&self) -> bool {
        self.is_active && self.triggers.contains(DetectionFlags::IMMINENT)
    }

    #[inline]
    pub fn is_degraded(&self) -> bool {
        self.triggers.contains(DetectionFlags::DEGRADED)
    }
}

// ─── Recovery commands ──────────────────────────────────────────────

/// Recovery maneuver family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    CollectiveReduction,
    ForwardTranslation,
    LateralMotion,
    AltitudeGain,
    EmergencyPower,
    CombinedManeuver,
}

impl RecoveryStrategy {
    /// Severity band mapping used when no fixed strategy is configured.
    pub fn for_severity(severity: f64) -> Self {
        if severity > 0.7 {
            Self::EmergencyPower
        } else if severity > 0.4 {
            Self::CombinedManeuver
        } else {
            Self::ForwardTranslation
        }
    }
}

/// How the recovery controller picks a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategySelection {
    #[default]
    BySeverity,
    Fixed(RecoveryStrategy),
}

/// Cockpit control deltas [deg] requested for one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlCommand {
    pub collective_adjustment: f64,
    pub lateral_cyclic_adjustment: f64,
    pub longitudinal_cyclic_adjustment: f64,
    pub pedal_adjustment: f64,
    pub emergency_action: bool,
    pub strategy: Option<RecoveryStrategy>,
}

impl ControlCommand {
    /// Hold current positions.
    pub const fn hold() -> Self {
        Self {
            collective_adjustment: 0.0,
            lateral_cyclic_adjustment: 0.0,
            longitudinal_cyclic_adjustment: 0.0,
            pedal_adjustment: 0.0,
            emergency_action: false,
            strategy: None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.collective_adjustment == 0.0
            && self.lateral_cyclic_adjustment == 0.0
            && self.longitudinal_cyclic_adjustment == 0.0
            && self.pedal_adjustment == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.collective_adjustment.is_finite()
            && self.lateral_cyclic_adjustment.is_finite()
            && self.longitudinal_cyclic_adjustment.is_finite()
            && self.pedal_adjustment.is_finite()
    }

    /// Every field inside the control envelope.
    pub fn within_envelope(&self) -> bool {
        self.is_finite()
            && (COLLECTIVE_MIN_DEG..=COLLECTIVE_MAX_DEG).contains(&self.collective_adjustment)
            && self.lateral_cyclic_adjustment.abs() <= CYCLIC_LIMIT_DEG
            && self.longitudinal_cyclic_adjustment.abs() <= CYCLIC_LIMIT_DEG
            && self.pedal_adjustment.abs() <= PEDAL_LIMIT_DEG
    }

    /// Clamp to the envelope. Non-finite fields become zero.
    pub fn clamped(self) -> Self {
        Self {
            collective_adjustment: clamp_finite(
                self.collective_adjustment,
                COLLECTIVE_MIN_DEG,
                COLLECTIVE_MAX_DEG,
            ),
            lateral_cyclic_adjustment: clamp_finite(
                self.lateral_cyclic_adjustment,
                -CYCLIC_LIMIT_DEG,
                CYCLIC_LIMIT_DEG,
            ),
            longitudinal_cyclic_adjustment: clamp_finite(
                self.longitudinal_cyclic_adjustment,
                -CYCLIC_LIMIT_DEG,
                CYCLIC_LIMIT_DEG,
            ),
            pedal_adjustment: clamp_finite(self.pedal_adjustment, -PEDAL_LIMIT_DEG, PEDAL_LIMIT_DEG),
            ..self
        }
    }

    /// Delta requested on one channel.
    pub fn delta(&self, axis: ControlAxes) -> f64 {
        if axis == ControlAxes::COLLECTIVE {
            self.collective_adjustment
        } else if axis == ControlAxes::LATERAL {
            self.lateral_cyclic_adjustment
        } else if axis == ControlAxes::LONGITUDINAL {
            self.longitudinal_cyclic_adjustment
        } else if axis == ControlAxes::PEDAL {
            self.pedal_adjustment
        } else {
            0.0
        }
    }

    /// Overwrite the delta of one channel. Composite `axis` values are
    /// ignored.
    pub fn set_delta(&mut self, axis: ControlAxes, value: f64) {
        if axis == ControlAxes::COLLECTIVE {
            self.collective_adjustment = value;
        } else if axis == ControlAxes::LATERAL {
            self.lateral_cyclic_adjustment = value;
        } else if axis == ControlAxes::LONGITUDINAL {
            self.longitudinal_cyclic_adjustment = value;
        } else if axis == ControlAxes::PEDAL {
            self.pedal_adjustment = value;
        }
    }
}

#[inline]
fn clamp_finite(value: f64, min: f64, max: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        0.0
    }
}

bitflags! {
    /// Cockpit actuator channels.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlAxes: u8 {
        const COLLECTIVE   = 0x01;
        const LATERAL      = 0x02;
        const LONGITUDINAL = 0x04;
        const PEDAL        = 0x08;

        const ALL = Self::COLLECTIVE.bits()
            | Self::LATERAL.bits()
            | Self::LONGITUDINAL.bits()
            | Self::PEDAL.bits();
    }
}

/// Cumulative cockpit control positions [deg].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ControlPositions {
    pub collective: f64,
    pub lateral_cyclic: f64,
    pub longitudinal_cyclic: f64,
    pub pedal: f64,
}

impl ControlPositions {
    /// Envelope limits (min, max) for a single channel.
    pub fn limits(axis: ControlAxes) -> (f64, f64) {
        if axis == ControlAxes::COLLECTIVE {
            (COLLECTIVE_MIN_DEG, COLLECTIVE_MAX_DEG)
        } else if axis == ControlAxes::PEDAL {
            (-PEDAL_LIMIT_DEG, PEDAL_LIMIT_DEG)
        } else {
            (-CYCLIC_LIMIT_DEG, CYCLIC_LIMIT_DEG)
        }
    }

    pub fn get(&self, axis: ControlAxes) -> f64 {
        if axis == ControlAxes::COLLECTIVE {
            self.collective
        } else if axis == ControlAxes::LATERAL {
            self.lateral_cyclic
        } else if axis == ControlAxes::LONGITUDINAL {
            self.longitudinal_cyclic
        } else {
            self.pedal
        }
    }

    pub fn set(&mut self, axis: ControlAxes, value: f64) {
        if axis == ControlAxes::COLLECTIVE {
            self.collective = value;
        } else if axis == ControlAxes::LATERAL {
            self.lateral_cyclic = value;
        } else if axis == ControlAxes::LONGITUDINAL {
            self.longitudinal_cyclic = value;
        } else if axis == ControlAxes::PEDAL {
            self.pedal = value;
        }
    }
}
