//! Environment monitors.
//!
//! The acquisition layer supplies an [`EnvironmentProbes`] snapshot; each
//! monitor compares one reading against the configured limits and reports
//! the error to log plus the health multiplier to apply.

use crate::error::ErrorType;
use aero_common::bios::BiosConfig;
use serde::Serialize;
use std::time::Duration;

/// Health multipliers per monitor.
pub const TEMPERATURE_HEALTH_FACTOR: f64 = 0.8;
pub const POWER_HEALTH_FACTOR: f64 = 0.9;
pub const RADIATION_HEALTH_FACTOR: f64 = 0.7;
pub const WATCHDOG_HEALTH_FACTOR: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EnvironmentProbes {
    /// Board temperature [°C].
    pub temperature_c: f64,
    /// Supply rail [V].
    pub supply_voltage: f64,
    /// Single-event upsets since the last check.
    pub radiation_events: u32,
    /// Time since the watchdog was last serviced.
    pub since_watchdog_kick: Duration,
}

impl Default for EnvironmentProbes {
    fn default() -> Self {
        Self {
            temperature_c: 40.0,
            supply_voltage: 3.3,
            radiation_events: 0,
            since_watchdog_kick: Duration::ZERO,
        }
    }
}

/// An out-of-limit reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonitorFinding {
    pub kind: ErrorType,
    pub code: u16,
    pub health_factor: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonitorLimits {
    pub max_temperature_c: f64,
    pub supply_min: f64,
    pub supply_max: f64,
    pub radiation_event_limit: u32,
    pub watchdog_timeout: Duration,
}

impl From<&BiosConfig> for MonitorLimits {
    fn from(config: &BiosConfig) -> Self {
        Self {
            max_temperature_c: config.max_temperature_c,
            supply_min: config.supply_voltage_min,
            supply_max: config.supply_voltage_max,
            radiation_event_limit: config.radiation_event_limit,
            watchdog_timeout: Duration::from_millis(config.watchdog_timeout_ms),
        }
    }
}

impl MonitorLimits {
    pub fn temperature(&self, probes: &EnvironmentProbes) -> Option<MonitorFinding> {
        let t = probes.temperature_c;
        (!t.is_finite() || t > self.max_temperature_c).then(|| MonitorFinding {
            kind: ErrorType::TemperatureHigh,
            code: if t.is_finite() { t.clamp(0.0, 65_535.0) as u16 } else { u16::MAX },
            health_factor: TEMPERATURE_HEALTH_FACTOR,
        })
    }

    pub fn power_supply(&self, probes: &EnvironmentProbes) -> Option<MonitorFinding> {
        let v = probes.supply_voltage;
        let in_window = (self.supply_min..=self.supply_max).contains(&v);
        (!in_window).then(|| MonitorFinding {
            kind: ErrorType::PowerFluctuation,
            // Millivolts; 0 for non-finite or negative readings
            code: if v.is_finite() { (v * 1000.0).clamp(0.0, 65_535.0) as u16 } else { 0 },
            health_factor: POWER_HEALTH_FACTOR,
        })
    }

    pub fn radiation(&self, probes: &EnvironmentProbes) -> Option<MonitorFinding> {
        (probes.radiation_events > self.radiation_event_limit).then(|| MonitorFinding {
            kind: ErrorType::RadiationDetected,
            code: probes.radiation_events.min(u32::from(u16::MAX)) as u16,
            health_factor: RADIATION_HEALTH_FACTOR,
        })
    }

    pub fn watchdog(&self, probes: &EnvironmentProbes) -> Option<MonitorFinding> {
        (probes.since_watchdog_kick > self.watchdog_timeout).then(|| MonitorFinding {
            kind: ErrorType::WatchdogTimeout,
            code: probes
                .since_watchdog_kick
                .as_millis()
                .min(u128::from(u16::MAX)) as u16,
            health_factor: WATCHDOG_HEALTH_FACTOR,
        })
    }
}
