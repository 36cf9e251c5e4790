//! Adaptive rotor data model.

use crate::consts::AIR_DENSITY_SEA_LEVEL;
use serde::{Deserialize, Serialize};

/// Rotor snapshot for the adaptation loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotorState {
    /// Rotor speed [RPM].
    pub rotor_speed: f64,
    /// Collective [deg].
    pub collective_pitch: f64,
    pub cyclic_pitch_lateral: f64,
    pub cyclic_pitch_longitudinal: f64,
    /// Rotor radius [m].
    pub rotor_radius: f64,
    pub num_blades: u8,
    /// Air density [kg/m³].
    pub air_density: f64,
    /// Forward speed [m/s].
    pub forward_speed: f64,
    /// Vertical speed [m/s], positive up.
    pub vertical_speed: f64,
    pub roll: f64,
    pub pitch: f64,
    pub yaw_rate: f64,
}

impl RotorState {
    /// Blade passing frequency [Hz].
    #[inline]
    pub fn blade_passing_frequency(&self) -> f64 {
        self.rotor_speed / 60.0 * f64::from(self.num_blades)
    }

    /// Angular speed [rad/s].
    #[inline]
    pub fn omega(&self) -> f64 {
        self.rotor_speed * 2.0 * std::f64::consts::PI / 60.0
    }
}

impl Default for RotorState {
    fn default() -> Self {
        Self {
            rotor_speed: 300.0,
            collective_pitch: 8.0,
            cyclic_pitch_lateral: 0.0,
            cyclic_pitch_longitudinal: 0.0,
            rotor_radius: 5.0,
            num_blades: 4,
            air_density: AIR_DENSITY_SEA_LEVEL,
            forward_speed: 0.0,
            vertical_speed: 0.0,
            roll: 0.0,
            pitch: 0.0,
            yaw_rate: 0.0,
        }
    }
}

/// State of one spanwise blade segment.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BladeElement {
    /// Radial station as a fraction of radius (0..1].
    pub radial_position: f64,
    /// Chord [m].
    pub chord: f64,
    /// Built-in twist [deg].
    pub twist: f64,
    /// Active pitch offset [deg].
    pub pitch: f64,
    /// Trailing-edge flap deflection [deg].
    pub flap_deflection: f64,
    /// Active torsion [deg].
    pub torsion: f64,
    pub bending_moment: f64,
    /// Local velocity magnitude [m/s].
    pub local_velocity: f64,
    /// Angle of attack [rad].
    pub angle_of_attack: f64,
    pub lift_coefficient: f64,
    pub drag_coefficient: f64,
    pub moment_coefficient: f64,
}

impl BladeElement {
    /// Element at `index` of `count` spanwise stations.
    pub fn at_station(index: usize, count: usize) -> Self {
        let radial_position = (index as f64 + 1.0) / count.max(1) as f64;
        Self {
            radial_position,
            chord: 0.5,
            twist: 8.0 * (1.0 - radial_position),
            ..Self::default()
        }
    }
}

/// Per-element actuator request [deg].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ServoCommand {
    pub blade_id: u8,
    pub element_id: u8,
    pub pitch_adjustment: f64,
    pub flap_deflection: f64,
    pub torsion_adjustment: f64,
}

impl ServoCommand {
    /// Zero-delta command for one servo.
    pub const fn neutral(blade_id: u8, element_id: u8) -> Self {
        Self {
            blade_id,
            element_id,
            pitch_adjustment: 0.0,
            flap_deflection: 0.0,
            torsion_adjustment: 0.0,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.pitch_adjustment == 0.0 && self.flap_deflection == 0.0 && self.torsion_adjustment == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.pitch_adjustment.is_finite()
            && self.flap_deflection.is_finite()
            && self.torsion_adjustment.is_finite()
    }
}

/// One accelerometer spectral peak.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VibrationData {
    /// [Hz]
    pub frequency: f64,
    /// [g]
    pub amplitude: f64,
    /// [rad]
    pub phase: f64,
    pub blade_id: u8,
    pub sensor_id: u8,
}

/// Adaptation law currently applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationMode {
    Passive,
    #[default]
    ActiveVibrationSuppression,
    PerformanceOptimization,
    ResonanceAvoidance,
    EmergencyAdaptation,
}

/// Optimizer objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationTarget {
    #[default]
    Efficiency,
    Vibration,
    StructuralLoad,
}

/// Resonance detector output.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ResonanceCondition {
    pub active: bool,
    /// Dominant spectral frequency [Hz].
    pub frequency: f64,
    /// Aggregate amplitude at that frequency [g].
    pub amplitude: f64,
    /// Matched blade-passing harmonic, 0 when none.
    pub harmonic: u8,
    /// Severity in [0, 1].
    pub severity: f64,
}
