//! Adaptive rotor loop configuration.

use super::types::{AdaptationMode, OptimizationTarget};
use crate::consts::{
    MAX_BLADES, MAX_ELEMENTS_PER_BLADE, ROTOR_CYCLE_TIME_US, SERVO_MAX_DEFLECTION_DEG,
    SERVO_MAX_RATE_DEG_S,
};
use serde::{Deserialize, Serialize};

/// Limits the optimizer must respect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OptimizationConstraints {
    /// RMS vibration ceiling [g].
    #[serde(default = "default_max_vibration")]
    pub max_vibration_g: f64,
    #[serde(default = "default_max_load_factor")]
    pub max_load_factor: f64,
    /// [MPa]
    #[serde(default = "default_max_stress")]
    pub max_blade_stress_mpa: f64,
}

fn default_max_vibration() -> f64 {
    2.0
}
fn default_max_load_factor() -> f64 {
    2.5
}
fn default_max_stress() -> f64 {
    100.0
}

impl Default for OptimizationConstraints {
    fn default() -> Self {
        Self {
            max_vibration_g: default_max_vibration(),
            max_load_factor: default_max_load_factor(),
            max_blade_stress_mpa: default_max_stress(),
        }
    }
}

/// `[rotor]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RotorConfig {
    #[serde(default = "default_num_blades")]
    pub num_blades: u8,

    #[serde(default = "default_elements")]
    pub elements_per_blade: u8,

    #[serde(default)]
    pub mode: AdaptationMode,

    #[serde(default)]
    pub automatic_optimization: bool,

    /// Amplitude that triggers suppression [g].
    #[serde(default = "default_suppression_threshold")]
    pub suppression_threshold_g: f64,

    /// Pitch correction per g of vibration [deg/g].
    #[serde(default = "default_suppression_gain")]
    pub suppression_gain: f64,

    /// Spectral peak amplitude that declares resonance [g].
    #[serde(default = "default_resonance_threshold")]
    pub resonance_threshold_g: f64,

    /// Match window around a blade-passing harmonic [Hz].
    #[serde(default = "default_harmonic_tolerance")]
    pub harmonic_tolerance_hz: f64,

    /// Vibration level that raises a warning [g].
    #[serde(default = "default_vibration_warning")]
    pub vibration_warning_g: f64,

    #[serde(default = "default_max_deflection")]
    pub servo_max_deflection_deg: f64,

    #[serde(default = "default_max_rate")]
    pub servo_max_rate_deg_s: f64,

    #[serde(default)]
    pub optimization_target: OptimizationTarget,

    #[serde(default)]
    pub constraints: OptimizationConstraints,

    /// Pitch step applied by the optimizer [deg].
    #[serde(default = "default_step")]
    pub optimizer_step_deg: f64,

    #[serde(default = "default_convergence")]
    pub convergence_threshold: f64,

    /// Low-pass corner for the vibration level monitor [Hz].
    #[serde(default = "default_lowpass")]
    pub vibration_lowpass_hz: f64,

    /// Notch bandwidth around the blade-passing frequency [Hz].
    #[serde(default = "default_notch_bw")]
    pub notch_bandwidth_hz: f64,

    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u64,
}

fn default_num_blades() -> u8 {
    4
}
fn default_elements() -> u8 {
    20
}
fn default_suppression_threshold() -> f64 {
    0.5
}
fn default_suppression_gain() -> f64 {
    0.1
}
fn default_resonance_threshold() -> f64 {
    2.0
}
fn default_harmonic_tolerance() -> f64 {
    2.0
}
fn default_vibration_warning() -> f64 {
    5.0
}
fn default_max_deflection() -> f64 {
    SERVO_MAX_DEFLECTION_DEG
}
fn default_max_rate() -> f64 {
    SERVO_MAX_RATE_DEG_S
}
fn default_step() -> f64 {
    0.5
}
fn default_convergence() -> f64 {
    1e-3
}
fn default_lowpass() -> f64 {
    5.0
}
fn default_notch_bw() -> f64 {
    4.0
}
fn default_cycle_time_us() -> u64 {
    ROTOR_CYCLE_TIME_US
}

impl Default for RotorConfig {
    fn default() -> Self {
        Self {
            num_blades: default_num_blades(),
            elements_per_blade: default_elements(),
            mode: AdaptationMode::default(),
            automatic_optimization: false,
            suppression_threshold_g: default_suppression_threshold(),
            suppression_gain: default_suppression_gain(),
            resonance_threshold_g: default_resonance_threshold(),
            harmonic_tolerance_hz: default_harmonic_tolerance(),
            vibration_warning_g: default_vibration_warning(),
            servo_max_deflection_deg: default_max_deflection(),
            servo_max_rate_deg_s: default_max_rate(),
            optimization_target: OptimizationTarget::default(),
            constraints: OptimizationConstraints::default(),
            optimizer_step_deg: default_step(),
            convergence_threshold: default_convergence(),
            vibration_lowpass_hz: default_lowpass(),
            notch_bandwidth_hz: default_notch_bw(),
            cycle_time_us: default_cycle_time_us(),
        }
    }
}

impl RotorConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.num_blades == 0 || self.num_blades > MAX_BLADES {
            return Err(format!(
                "num_blades {} outside [1, {MAX_BLADES}]",
                self.num_blades
            ));
        }
        if self.elements_per_blade == 0 || self.elements_per_blade > MAX_ELEMENTS_PER_BLADE {
            return Err(format!(
                "elements_per_blade {} outside [1, {MAX_ELEMENTS_PER_BLADE}]",
                self.elements_per_blade
            ));
        }
        if !(self.servo_max_deflection_deg > 0.0
            && self.servo_max_deflection_deg <= SERVO_MAX_DEFLECTION_DEG)
        {
            return Err(format!(
                "servo_max_deflection_deg must be in (0, {SERVO_MAX_DEFLECTION_DEG}]"
            ));
        }
        if !(self.servo_max_rate_deg_s > 0.0 && self.servo_max_rate_deg_s <= SERVO_MAX_RATE_DEG_S)
        {
            return Err(format!(
                "servo_max_rate_deg_s must be in (0, {SERVO_MAX_RATE_DEG_S}]"
            ));
        }
        if !(self.suppression_threshold_g >= 0.0) || !(self.resonance_threshold_g > 0.0) {
            return Err("vibration thresholds must be non-negative".to_string());
        }
        if !(self.convergence_threshold > 0.0) {
            return Err("convergence_threshold must be positive".to_string());
        }
        if self.cycle_time_us == 0 {
            return Err("cycle_time_us must be > 0".to_string());
        }
        Ok(())
    }

    /// Total number of blade element servos.
    #[inline]
    pub fn servo_count(&self) -> usize {
        usize::from(self.num_blades) * usize::from(self.elements_per_blade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let cfg = RotorConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.servo_count(), 80);
    }

    #[test]
    fn deflection_cannot_exceed_envelope() {
        let cfg = RotorConfig {
            servo_max_deflection_deg: 20.0,
            ..RotorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn zero_blades_rejected() {
        let cfg = RotorConfig {
            num_blades: 0,
            ..RotorConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
