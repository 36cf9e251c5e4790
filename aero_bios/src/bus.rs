//! Avionics bus controller.
//!
//! Buses are simulated: a fault is injected from outside and persists until
//! the bus is reset or switched to its redundant channel.

use crate::error::BiosError;
use bitflags::bitflags;
use serde::Serialize;
use tracing::{info, warn};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct BusFlags: u16 {
        /// Has a backup channel.
        const REDUNDANT    = 0x0001;
        const AUTO_RECOVER = 0x0002;
        const CRITICAL     = 0x0004;
        const MONITORED    = 0x0008;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    pub bus_id: u32,
    pub speed_hz: u32,
    pub timeout_ms: u32,
    pub priority: u8,
    pub redundancy_level: u8,
    pub flags: BusFlags,
}

/// I2C, SPI and UART.
pub const DEFAULT_BUSES: [BusConfig; 3] = [
    BusConfig {
        bus_id: 0,
        speed_hz: 400_000,
        timeout_ms: 100,
        priority: 1,
        redundancy_level: 2,
        flags: BusFlags::REDUNDANT
            .union(BusFlags::AUTO_RECOVER)
            .union(BusFlags::CRITICAL),
    },
    BusConfig {
        bus_id: 1,
        speed_hz: 1_000_000,
        timeout_ms: 50,
        priority: 2,
        redundancy_level: 1,
        flags: BusFlags::REDUNDANT.union(BusFlags::MONITORED),
    },
    BusConfig {
        bus_id: 2,
        speed_hz: 115_200,
        timeout_ms: 200,
        priority: 3,
        redundancy_level: 0,
        flags: BusFlags::CRITICAL,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BusState {
    pub bus_id: u32,
    pub faulted: bool,
    pub on_backup: bool,
    pub resets: u32,
}

#[derive(Debug, Clone)]
pub struct BusController {
    configs: Vec<BusConfig>,
    states: Vec<BusState>,
}

impl BusController {
    pub fn new(configs: &[BusConfig]) -> Self {
        Self {
            configs: configs.to_vec(),
            states: configs
                .iter()
                .map(|c| BusState {
                    bus_id: c.bus_id,
                    faulted: false,
                    on_backup: false,
                    resets: 0,
                })
                .collect(),
        }
    }

    fn index(&self, bus_id: u32) -> Result<usize, BiosError> {
        self.configs
            .iter()
            .position(|c| c.bus_id == bus_id)
            .ok_or(BiosError::Bus)
    }

    /// Replace the configuration of an existing bus.
    pub fn configure_bus(&mut self, config: BusConfig) -> Result<(), BiosError> {
        let i = self.index(config.bus_id)?;
        self.configs[i] = config;
        Ok(())
    }

    pub fn reset_bus(&mut self, bus_id: u32) -> Result<(), BiosError> {
        let i = self.index(bus_id)?;
        let state = &mut self.states[i];
        state.faulted = false;
        state.resets += 1;
        info!(bus_id, "bus reset");
        Ok(())
    }

    /// `Err(Bus)` for an unknown or faulted bus.
    pub fn test_bus_communication(&self, bus_id: u32) -> Result<(), BiosError> {
        let i = self.index(bus_id)?;
        if self.states[i].faulted {
            return Err(BiosError::Bus);
        }
        Ok(())
    }

    /// Fail over to the redundant channel. Only for `REDUNDANT` buses.
    pub fn switch_to_backup_bus(&mut self, bus_id: u32) -> Result<(), BiosError> {
        let i = self.index(bus_id)?;
        if !self.configs[i].flags.contains(BusFlags::REDUNDANT) {
            warn!(bus_id, "bus has no redundant channel");
            return Err(BiosError::Bus);
        }
        let state = &mut self.states[i];
        state.on_backup = !state.on_backup;
        state.faulted = false;
        info!(bus_id, on_backup = state.on_backup, "switched bus channel");
        Ok(())
    }

    pub fn inject_fault(&mut self, bus_id: u32) -> Result<(), BiosError> {
        let i = self.index(bus_id)?;
        self.states[i].faulted = true;
        Ok(())
    }

    pub fn faulted(&self) -> impl Iterator<Item = u32> + '_ {
        self.states.iter().filter(|s| s.faulted).map(|s| s.bus_id)
    }

    pub fn bus_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.configs.iter().map(|c| c.bus_id)
    }

    pub fn config(&self, bus_id: u32) -> Option<&BusConfig> {
        self.index(bus_id).ok().map(|i| &self.configs[i])
    }

    #[inline]
    pub fn states(&self) -> &[BusState] {
        &self.states
    }

    pub fn clear_faults(&mut self) {
        self.states.iter_mut().for_each(|s| s.faulted = false);
    }
}

impl Default for BusController {
    fn default() -> Self {
        Self::new(&DEFAULT_BUSES)
    }
}
