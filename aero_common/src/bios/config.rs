//! BIOS engine configuration.

use crate::consts::BIOS_CYCLE_TIME_US;
use serde::{Deserialize, Serialize};

/// Repair action applied by the healing engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealingStrategy {
    None,
    /// Restore healable segments from their backup copies.
    MemoryCopy,
    /// Erase and reprogram flash sectors from backup.
    SectorErase,
    /// Reset faulted buses.
    BusReset,
    SystemReset,
    /// Restore critical segments and boot the backup image.
    CriticalRecovery,
}

/// `[bios]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiosConfig {
    /// Fixed strategy; absent selects one from the last logged error.
    #[serde(default)]
    pub healing_strategy: Option<HealingStrategy>,

    /// Heal automatically when the periodic check finds faults.
    #[serde(default = "default_true")]
    pub auto_heal: bool,

    #[serde(default = "default_build")]
    pub firmware_build: u32,

    /// [°C]
    #[serde(default = "default_max_temperature")]
    pub max_temperature_c: f64,

    /// [V]
    #[serde(default = "default_supply_min")]
    pub supply_voltage_min: f64,

    /// [V]
    #[serde(default = "default_supply_max")]
    pub supply_voltage_max: f64,

    /// Single-event upsets tolerated per check.
    #[serde(default)]
    pub radiation_event_limit: u32,

    /// Longest gap between watchdog kicks [ms].
    #[serde(default = "default_watchdog_ms")]
    pub watchdog_timeout_ms: u64,

    #[serde(default = "default_cycle_time_us")]
    pub cycle_time_us: u64,
}

fn default_true() -> bool {
    true
}
fn default_build() -> u32 {
    1
}
fn default_max_temperature() -> f64 {
    85.0
}
fn default_supply_min() -> f64 {
    3.0
}
fn default_supply_max() -> f64 {
    3.6
}
fn default_watchdog_ms() -> u64 {
    1000
}
fn default_cycle_time_us() -> u64 {
    BIOS_CYCLE_TIME_US
}

impl Default for BiosConfig {
    fn default() -> Self {
        Self {
            healing_strategy: None,
            auto_heal: true,
            firmware_build: default_build(),
            max_temperature_c: default_max_temperature(),
            supply_voltage_min: default_supply_min(),
            supply_voltage_max: default_supply_max(),
            radiation_event_limit: 0,
            watchdog_timeout_ms: default_watchdog_ms(),
            cycle_time_us: default_cycle_time_us(),
        }
    }
}

impl BiosConfig {
    pub fn validate(&self) -> Result<(), String> {
        if !(self.supply_voltage_min < self.supply_voltage_max) {
            return Err(format!(
                "supply window [{}, {}] is empty",
                self.supply_voltage_min, self.supply_voltage_max
            ));
        }
        if !self.max_temperature_c.is_finite() {
            return Err("max_temperature_c must be finite".to_string());
        }
        if self.watchdog_timeout_ms == 0 {
            return Err("watchdog_timeout_ms must be > 0".to_string());
        }
        if self.cycle_time_us == 0 {
            return Err("cycle_time_us must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate_and_auto_select() {
        let cfg = BiosConfig::default();
        assert!(cfg.validate().is_ok());
        assert!(cfg.healing_strategy.is_none());
    }

    #[test]
    fn inverted_supply_window_rejected() {
        let cfg = BiosConfig {
            supply_voltage_min: 3.6,
            supply_voltage_max: 3.0,
            ..BiosConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn strategy_parses_snake_case() {
        let cfg: BiosConfig = toml::from_str("healing_strategy = \"sector_erase\"").unwrap();
        assert_eq!(cfg.healing_strategy, Some(HealingStrategy::SectorErase));
    }
}
