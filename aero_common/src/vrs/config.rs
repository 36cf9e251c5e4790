//! VRS protection loop configuration.

use super::types::{DetectionMethod, StrategySelection};
use crate::consts::VRS_CYCLE_TIME_US;
use serde::{Deserialize, Serialize};

/// `[vrs]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VrsConfig {
    #[serde(default)]
    pub detection_method: DetectionMethod,

    /// Detector sensitivity in [0, 1]. Widens the imminent-warning band.
    #[serde(default = "default_protection_level")]
    pub protection_level: f64,

    /// Recovery aggression in [0, 1].
    #[serde(default = "default_aggression")]
    pub aggression: f64,

    #[serde(default)]
    pub strategy: StrategySelection,

    #[serde(default = "default_true")]
    pub automatic_recovery: bool,

    /// Inactive dwell before leaving recovery [s].
    #[serde(default = "default_debounce_s")]
    pub debounce_s: f64,

    /// Nominal recovery duration used for progress reporting [s].
    #[serde(default = "default_nominal_recovery_s")]
    pub nominal_recovery_s: f64,

    /// Hard cap on time spent recovering [s].
    #[serde(default = "default_max_recovery_s")]
    pub max_recovery_s: f64,

    /// Cockpit actuator slew limit [deg/s].
    #[serde(default = "default_actuator_rate")]
    pub actuator_max_rate_deg_s: f64,

    /// Consecutive cycles with rejected channels before emergency mode.
    #[serde(default = "default_escalate_after")]
    pub escalate_after_rejections: u32,

    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u64,
}

fn default_protection_level() -> f64 {
    0.7
}
fn default_aggression() -> f64 {
    0.5
}
fn default_true() -> bool {
    true
}
fn default_debounce_s() -> f64 {
    0.75
}
fn default_nominal_recovery_s() -> f64 {
    5.0
}
fn default_max_recovery_s() -> f64 {
    10.0
}
fn default_actuator_rate() -> f64 {
    50.0
}
fn default_escalate_after() -> u32 {
    3
}
fn default_cycle_time_us() -> u64 {
    VRS_CYCLE_TIME_US
}

impl Default for VrsConfig {
    fn default() -> Self {
        Self {
            detection_method: DetectionMethod::default(),
            protection_level: default_protection_level(),
            aggression: default_aggression(),
            strategy: StrategySelection::default(),
            automatic_recovery: true,
            debounce_s: default_debounce_s(),
            nominal_recovery_s: default_nominal_recovery_s(),
            max_recovery_s: default_max_recovery_s(),
            actuator_max_rate_deg_s: default_actuator_rate(),
            escalate_after_rejections: default_escalate_after(),
            cycle_time_us: default_cycle_time_us(),
        }
    }
}

impl VrsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=1.0).contains(&self.protection_level) {
            return Err(format!(
                "protection_level {} outside [0, 1]",
                self.protection_level
            ));
        }
        if !(0.0..=1.0).contains(&self.aggression) {
            return Err(format!("aggression {} outside [0, 1]", self.aggression));
        }
        if !(self.debounce_s >= 0.0) {
            return Err("debounce_s must be non-negative".to_string());
        }
        if !(self.nominal_recovery_s > 0.0) {
            return Err("nominal_recovery_s must be positive".to_string());
        }
        if self.max_recovery_s < self.debounce_s || self.max_recovery_s <= 0.0 {
            return Err(format!(
                "max_recovery_s {} must be positive and >= debounce_s",
                self.max_recovery_s
            ));
        }
        if !(self.actuator_max_rate_deg_s > 0.0) {
            return Err("actuator_max_rate_deg_s must be positive".to_string());
        }
        if self.cycle_time_us == 0 {
            return Err("cycle_time_us must be > 0".to_string());
        }
        Ok(())
    }
}
