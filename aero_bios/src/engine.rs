//! BIOS context: boot sequence, integrity checks, healing engine and the
//! periodic supervisor.
//!
//! All state lives in one [`BiosContext`]; every operation returns a
//! `Result` whose [`BiosError::code`] is the numeric BIOS result code.
//!
//! # Health law
//!
//! `system_health` is a percentage. A heal that repairs anything moves it
//! halfway to 100, a heal that repairs nothing halves it, and each
//! out-of-limit environment reading multiplies it by the monitor's factor.

use crate::bus::{BusConfig, BusController, DEFAULT_BUSES};
use crate::crc::crc32;
use crate::error::{BiosError, ErrorType};
use crate::error_log::{ErrorEntry, ErrorLog};
use crate::memory::{FLASH_SECTOR_SIZE, MemoryMap};
use crate::monitor::{EnvironmentProbes, MonitorFinding, MonitorLimits};
use crate::segment::{FaultKind, IntegrityFault, SegmentFlags, SegmentTable};
use crate::status::BiosStatus;
use aero_common::bios::{BiosConfig, HealingStrategy};
use aero_common::cycle::DeadlineMonitor;
use aero_common::subsystem::{Subsystem, SubsystemError, SubsystemStatus};
use aero_common::warnings::WarningLog;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

const NAME: &str = "bios";

/// Below this percentage the BIOS reports itself unhealthy.
pub const HEALTHY_THRESHOLD: u8 = 50;

/// Image seeds for the segments that carry data at power-on.
const BOOT_SEED: u32 = 0xB007_0001;
const CONFIG_SEED: u32 = 0xC0F1_6002;
const RUNTIME_SEED: u32 = 0x5EED_0003;

fn code_of(value: impl TryInto<u16>) -> u16 {
    value.try_into().unwrap_or(u16::MAX)
}

// ─── Reports ────────────────────────────────────────────────────────

/// Everything one detection pass found.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Detection {
    pub integrity: Vec<IntegrityFault>,
    pub bus_faults: Vec<u32>,
    pub environment: Vec<MonitorFinding>,
}

impl Detection {
    pub fn count(&self) -> usize {
        self.integrity.len() + self.bus_faults.len() + self.environment.len()
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.count() == 0
    }

    /// Something a repair could fix.
    pub fn needs_healing(&self) -> bool {
        !self.integrity.is_empty()
            || !self.bus_faults.is_empty()
            || self
                .environment
                .iter()
                .any(|f| f.kind.healing_strategy().is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealingOutcome {
    pub strategy: HealingStrategy,
    pub success: bool,
}

/// Output of one periodic check.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BiosCheckReport {
    pub detection: Detection,
    pub healing: Option<HealingOutcome>,
    pub system_health: u8,
    /// Every segment passed its checks after healing.
    pub integrity_ok: bool,
}

// ─── Context ────────────────────────────────────────────────────────

pub struct BiosContext {
    config: BiosConfig,
    memory: MemoryMap,
    segments: SegmentTable,
    buses: BusController,
    limits: MonitorLimits,
    probes: EnvironmentProbes,
    status: BiosStatus,
    errors: ErrorLog,
    strategy: Option<HealingStrategy>,
    critical_depth: u32,
    running_backup_image: bool,
    initialized: bool,
    integrity_ok: bool,
    deadline: DeadlineMonitor,
    warnings: WarningLog,
    cycles: u64,
}

impl BiosContext {
    /// Power-on state: firmware images present, backups not yet provisioned.
    pub fn new(config: BiosConfig) -> Self {
        let mut memory = MemoryMap::new();
        let segments = SegmentTable::default();
        for (index, seed) in [(0, BOOT_SEED), (1, CONFIG_SEED), (2, RUNTIME_SEED)] {
            if let Some(s) = segments.get(index) {
                let seed = seed ^ config.firmware_build;
                if let Err(e) = memory.seed(s.start_addr, s.size, seed) {
                    warn!(segment = s.name, error = %e, "could not load image");
                }
            }
        }
        Self {
            limits: MonitorLimits::from(&config),
            memory,
            segments,
            buses: BusController::new(&DEFAULT_BUSES),
            probes: EnvironmentProbes::default(),
            status: BiosStatus::new(config.firmware_build),
            errors: ErrorLog::new(),
            strategy: config.healing_strategy,
            critical_depth: 0,
            running_backup_image: false,
            initialized: false,
            integrity_ok: false,
            deadline: DeadlineMonitor::new(Duration::from_micros(config.cycle_time_us)),
            warnings: WarningLog::new(),
            cycles: 0,
            config,
        }
    }

    // ─── Boot ───────────────────────────────────────────────────────

    /// Boot sequence: provision missing backups, self-test, heal on
    /// failure, fall back to critical recovery when healing leaves a
    /// segment faulted, and refresh the critical backups once integrity is
    /// verified.
    pub fn init(&mut self) -> Result<(), BiosError> {
        let boot_count = self.status.boot_count.wrapping_add(1);
        self.status = BiosStatus::new(self.config.firmware_build);
        self.status.boot_count = boot_count;
        self.errors.clear();
        self.critical_depth = 0;

        self.provision_backups()?;

        if let Err(e) = self.self_test() {
            warn!(error = %e, "self-test failed, healing");
            let healed = self.heal_system().is_ok() && self.scan_memory().is_empty();
            if !healed {
                self.log_error(ErrorType::CriticalSystem, e.code().unsigned_abs());
                if let Err(recovery) = self.perform_critical_recovery() {
                    error!(error = %recovery, "critical recovery failed");
                    self.integrity_ok = false;
                    self.status.seal();
                    return Err(BiosError::Critical);
                }
            }
        }

        self.integrity_ok = self.segments.scan(&self.memory).is_empty();
        if self.integrity_ok {
            self.backup_critical_data()?;
        } else {
            self.warnings.push("Integrity not verified, critical backups left untouched");
        }
        self.initialized = true;
        self.status.seal();
        info!(
            boot = self.status.boot_count,
            health = self.status.system_health,
            integrity = self.integrity_ok,
            "BIOS initialized"
        );
        Ok(())
    }

    /// First-boot copy of every backed-up segment that has no stored CRC.
    fn provision_backups(&mut self) -> Result<(), BiosError> {
        let pending: Vec<usize> = self
            .segments
            .with_flags(SegmentFlags::BACKUP)
            .filter(|&i| self.segments.get(i).is_some_and(|s| s.crc32 == 0))
            .collect();
        for index in pending {
            if let Some(s) = self.segments.get(index).copied() {
                self.backup_memory_segment(s.start_addr, s.size)?;
                debug!(segment = s.name, "backup provisioned");
            }
        }
        Ok(())
    }

    /// Memory, flash, every bus, then the environment monitors. Stops at
    /// the first failure.
    pub fn self_test(&mut self) -> Result<(), BiosError> {
        self.check_memory_integrity()?;
        self.verify_flash_integrity()?;
        let ids: Vec<u32> = self.buses.bus_ids().collect();
        for id in ids {
            self.test_bus_communication(id)?;
        }
        self.monitor_system()
    }

    // ─── Integrity ──────────────────────────────────────────────────

    /// CRC and fill checks over the segment table. Logs the first fault.
    pub fn check_memory_integrity(&mut self) -> Result<(), BiosError> {
        let fault = (0..self.segments.segments().len())
            .find_map(|i| self.segments.check_segment(i, &self.memory));
        match fault {
            None => Ok(()),
            Some(fault) => {
                self.log_integrity_fault(&fault);
                Err(match fault.kind {
                    FaultKind::CrcMismatch => BiosError::Crc,
                    FaultKind::FillPattern | FaultKind::ErasedFlash => BiosError::Memory,
                })
            }
        }
    }

    /// Read-only scan. Nothing is logged.
    pub fn scan_memory(&self) -> Vec<IntegrityFault> {
        self.segments.scan(&self.memory)
    }

    pub fn verify_flash_integrity(&mut self) -> Result<(), BiosError> {
        match self.segments.scan_flash(&self.memory).first() {
            None => Ok(()),
            Some(fault) => {
                let fault = *fault;
                self.log_integrity_fault(&fault);
                Err(BiosError::Flash)
            }
        }
    }

    fn log_integrity_fault(&mut self, fault: &IntegrityFault) {
        let kind = match fault.kind {
            FaultKind::CrcMismatch => ErrorType::CrcMismatch,
            FaultKind::FillPattern => ErrorType::MemoryCorruption,
            FaultKind::ErasedFlash => ErrorType::FlashFailure,
        };
        self.log_error(kind, code_of(fault.segment));
    }

    fn backup_intact(&self, index: usize) -> bool {
        self.segments.get(index).is_some_and(|s| {
            s.crc32 != 0
                && self
                    .memory
                    .slice(s.backup_addr, s.size)
                    .is_ok_and(|backup| crc32(backup) == s.crc32)
        })
    }

    /// Every provisioned backup still matches its stored CRC.
    pub fn verify_backup_integrity(&mut self) -> Result<(), BiosError> {
        let provisioned: Vec<usize> = self
            .segments
            .with_flags(SegmentFlags::BACKUP)
            .filter(|&i| self.segments.get(i).is_some_and(|s| s.crc32 != 0))
            .collect();
        match provisioned.into_iter().find(|&i| !self.backup_intact(i)) {
            None => Ok(()),
            Some(index) => {
                self.log_error(ErrorType::CrcMismatch, code_of(index));
                Err(BiosError::Checksum)
            }
        }
    }

    // ─── Segment repair ─────────────────────────────────────────────

    /// Locate the backed-up segment holding `[addr, addr + len)` and the
    /// matching backup address.
    fn backed_range(&self, addr: u32, len: u32) -> Result<(usize, u32), BiosError> {
        let index = self.segments.find(addr).ok_or(BiosError::Memory)?;
        let segment = self.segments.get(index).ok_or(BiosError::Memory)?;
        if !segment.has_backup() || len == 0 {
            return Err(BiosError::Memory);
        }
        let offset = addr - segment.start_addr;
        match offset.checked_add(len) {
            Some(end) if end <= segment.size => Ok((index, segment.backup_addr + offset)),
            _ => Err(BiosError::Memory),
        }
    }

    /// Restore `[addr, addr + len)` from its backup copy. The backup must
    /// match its stored CRC and the restored bytes must match the backup.
    pub fn heal_memory_segment(&mut self, addr: u32, len: u32) -> Result<(), BiosError> {
        let (index, backup) = self.backed_range(addr, len)?;
        if !self.backup_intact(index) {
            warn!("backup failed verification");
            return Err(BiosError::Checksum);
        }
        self.memory.copy(backup, addr, len)?;
        let restored = crc32(self.memory.slice(addr, len)?);
        if restored != crc32(self.memory.slice(backup, len)?) {
            return Err(BiosError::Checksum);
        }
        debug!(len, "segment healed");
        Ok(())
    }

    /// Copy `[addr, addr + len)` into the backup area and store the CRC of
    /// the whole backup copy.
    pub fn backup_memory_segment(&mut self, addr: u32, len: u32) -> Result<(), BiosError> {
        let (index, backup) = self.backed_range(addr, len)?;
        self.memory.copy(addr, backup, len)?;
        let segment = self.segments.get(index).copied().ok_or(BiosError::Memory)?;
        let crc = crc32(self.memory.slice(segment.backup_addr, segment.size)?);
        self.segments.set_crc(index, crc);
        Ok(())
    }

    /// Refresh the backups of every critical segment. A segment that fails
    /// its own check keeps its old backup.
    pub fn backup_critical_data(&mut self) -> Result<(), BiosError> {
        let critical: Vec<usize> = self
            .segments
            .with_flags(SegmentFlags::CRITICAL | SegmentFlags::BACKUP)
            .collect();
        for index in critical {
            if self.segments.check_segment(index, &self.memory).is_some() {
                warn!(segment = index, "critical segment failed its check, backup kept");
                return Err(BiosError::Crc);
            }
            if let Some(s) = self.segments.get(index).copied() {
                self.backup_memory_segment(s.start_addr, s.size)?;
            }
        }
        Ok(())
    }

    /// Restore every critical segment. Tries all of them; returns the
    /// first failure.
    pub fn restore_from_backup(&mut self) -> Result<(), BiosError> {
        let critical: Vec<usize> = self
            .segments
            .with_flags(SegmentFlags::CRITICAL | SegmentFlags::BACKUP)
            .collect();
        let mut result = Ok(());
        for index in critical {
            if let Some(s) = self.segments.get(index).copied() {
                let healed = self.heal_memory_segment(s.start_addr, s.size);
                if result.is_ok() {
                    result = healed;
                }
            }
        }
        result
    }

    // ─── Healing engine ─────────────────────────────────────────────

    /// Configured strategy, or the one implied by the newest logged error
    /// that has a repair. Defaults to a memory copy.
    pub fn healing_strategy(&self) -> HealingStrategy {
        self.strategy.unwrap_or_else(|| {
            self.errors
                .entries()
                .iter()
                .rev()
                .find_map(|e| e.kind.healing_strategy())
                .unwrap_or(HealingStrategy::MemoryCopy)
        })
    }

    /// Fix the strategy; `None` returns to automatic selection.
    pub fn set_healing_strategy(&mut self, strategy: Option<HealingStrategy>) {
        self.strategy = strategy;
        info!(?strategy, "healing strategy set");
    }

    /// Apply one healing strategy inside a critical section. `Ok` when at
    /// least one repair succeeded.
    pub fn heal_system(&mut self) -> Result<(), BiosError> {
        self.enter_critical_section();
        self.status.healing_attempts = self.status.healing_attempts.saturating_add(1);
        let strategy = self.healing_strategy();

        let (mut repaired, verify_failed) = match strategy {
            HealingStrategy::None => (0, false),
            HealingStrategy::MemoryCopy => self.heal_by_memory_copy(),
            HealingStrategy::SectorErase => self.heal_by_sector_erase(),
            HealingStrategy::BusReset => (self.heal_by_bus_reset(), false),
            HealingStrategy::SystemReset => {
                self.system_reset();
                (1, false)
            }
            HealingStrategy::CriticalRecovery => match self.perform_critical_recovery() {
                Ok(()) => (1, false),
                Err(_) => (0, true),
            },
        };

        if verify_failed && strategy != HealingStrategy::CriticalRecovery {
            warn!(?strategy, "heal verification failed, escalating");
            if self.perform_critical_recovery().is_ok() {
                repaired += 1;
            }
        }

        let result = if repaired > 0 {
            self.status.improve_health();
            info!(?strategy, repaired, health = self.status.system_health, "system healed");
            Ok(())
        } else {
            self.status.degrade_health();
            self.warnings.push(format!("Healing with {strategy:?} repaired nothing"));
            warn!(?strategy, health = self.status.system_health, "healing failed");
            Err(BiosError::Critical)
        };
        self.status.seal();
        self.exit_critical_section();
        result
    }

    /// Returns (repaired, any verification failed).
    fn heal_by_memory_copy(&mut self) -> (u32, bool) {
        let targets: Vec<usize> = self
            .segments
            .with_flags(SegmentFlags::HEALABLE | SegmentFlags::BACKUP)
            .collect();
        let mut repaired = 0;
        let mut verify_failed = false;
        for index in targets {
            let Some(s) = self.segments.get(index).copied() else {
                continue;
            };
            match self.heal_memory_segment(s.start_addr, s.size) {
                Ok(()) => repaired += 1,
                Err(BiosError::Checksum) => verify_failed = true,
                Err(e) => debug!(segment = s.name, error = %e, "segment not healed"),
            }
        }
        (repaired, verify_failed)
    }

    /// Erase and reprogram each faulted flash segment whose backup is intact.
    fn heal_by_sector_erase(&mut self) -> (u32, bool) {
        let faults = self.scan_memory();
        let mut targets: Vec<usize> = faults
            .iter()
            .map(|f| f.segment)
            .filter(|&i| {
                self.segments
                    .get(i)
                    .is_some_and(|s| s.has_backup() && self.memory.is_flash(s.start_addr, s.size))
            })
            .collect();
        targets.dedup();

        let mut repaired = 0;
        let mut verify_failed = false;
        for index in targets {
            let Some(s) = self.segments.get(index).copied() else {
                continue;
            };
            if !self.backup_intact(index) {
                verify_failed = true;
                continue;
            }
            let erased = (s.start_addr..s.end_addr())
                .step_by(FLASH_SECTOR_SIZE as usize)
                .try_for_each(|addr| self.memory.erase_flash_sector(addr));
            let healed = erased.and_then(|()| self.heal_memory_segment(s.start_addr, s.size));
            match healed {
                Ok(()) => repaired += 1,
                Err(e) => {
                    warn!(segment = s.name, error = %e, "sector reprogram failed");
                    verify_failed = true;
                }
            }
        }
        (repaired, verify_failed)
    }

    fn heal_by_bus_reset(&mut self) -> u32 {
        let ids: Vec<u32> = self.buses.bus_ids().collect();
        ids.into_iter()
            .filter(|&id| self.buses.reset_bus(id).is_ok())
            .count() as u32
    }

    // ─── Recovery ───────────────────────────────────────────────────

    pub fn system_reset(&mut self) {
        self.status.boot_count = self.status.boot_count.wrapping_add(1);
        self.buses.clear_faults();
        self.critical_depth = 0;
        self.running_backup_image = false;
        self.status.seal();
        warn!(boot = self.status.boot_count, "system reset");
    }

    pub fn jump_to_backup_firmware(&mut self) {
        self.status.boot_count = self.status.boot_count.wrapping_add(1);
        self.running_backup_image = true;
        self.status.seal();
        warn!(boot = self.status.boot_count, "running backup firmware image");
    }

    /// Restore critical segments, then boot the backup image.
    pub fn perform_critical_recovery(&mut self) -> Result<(), BiosError> {
        warn!("critical recovery");
        let restored = self.restore_from_backup();
        self.jump_to_backup_firmware();
        restored.map_err(|e| {
            error!(error = %e, "critical segments could not be restored");
            BiosError::Critical
        })
    }

    #[inline]
    pub fn is_running_backup_image(&self) -> bool {
        self.running_backup_image
    }

    // ─── Buses ──────────────────────────────────────────────────────

    pub fn configure_bus(&mut self, config: BusConfig) -> Result<(), BiosError> {
        self.buses.configure_bus(config)
    }

    pub fn reset_bus(&mut self, bus_id: u32) -> Result<(), BiosError> {
        self.buses.reset_bus(bus_id)
    }

    /// Probe one bus. A timeout is logged.
    pub fn test_bus_communication(&mut self, bus_id: u32) -> Result<(), BiosError> {
        let result = self.buses.test_bus_communication(bus_id);
        if result.is_err() {
            self.log_error(ErrorType::BusTimeout, code_of(bus_id));
        }
        result
    }

    pub fn switch_to_backup_bus(&mut self, bus_id: u32) -> Result<(), BiosError> {
        self.buses.switch_to_backup_bus(bus_id)
    }

    pub fn buses(&self) -> &BusController {
        &self.buses
    }

    // ─── Environment monitors ───────────────────────────────────────

    pub fn set_probes(&mut self, probes: EnvironmentProbes) {
        self.probes = probes;
    }

    #[inline]
    pub fn probes(&self) -> &EnvironmentProbes {
        &self.probes
    }

    fn apply_finding(&mut self, finding: &MonitorFinding) {
        self.log_error(finding.kind, finding.code);
        self.status.scale_health(finding.health_factor);
        self.status.seal();
    }

    fn check_monitor(&mut self, finding: Option<MonitorFinding>) -> Result<(), BiosError> {
        match finding {
            None => Ok(()),
            Some(f) => {
                self.apply_finding(&f);
                Err(BiosError::Critical)
            }
        }
    }

    pub fn monitor_temperature(&mut self) -> Result<(), BiosError> {
        self.check_monitor(self.limits.temperature(&self.probes))
    }

    pub fn monitor_power_supply(&mut self) -> Result<(), BiosError> {
        self.check_monitor(self.limits.power_supply(&self.probes))
    }

    pub fn monitor_radiation(&mut self) -> Result<(), BiosError> {
        self.check_monitor(self.limits.radiation(&self.probes))
    }

    pub fn check_watchdog(&mut self) -> Result<(), BiosError> {
        self.check_monitor(self.limits.watchdog(&self.probes))
    }

    /// Temperature, power, radiation, watchdog. Stops at the first failure.
    pub fn monitor_system(&mut self) -> Result<(), BiosError> {
        self.monitor_temperature()?;
        self.monitor_power_supply()?;
        self.monitor_radiation()?;
        self.check_watchdog()
    }

    // ─── Detection ──────────────────────────────────────────────────

    /// Run every check without stopping and log each finding. Integrity
    /// faults are logged last so they drive automatic strategy selection.
    pub fn detect_errors(&mut self) -> Detection {
        let environment: Vec<MonitorFinding> = [
            self.limits.temperature(&self.probes),
            self.limits.power_supply(&self.probes),
            self.limits.radiation(&self.probes),
            self.limits.watchdog(&self.probes),
        ]
        .into_iter()
        .flatten()
        .collect();
        for finding in &environment {
            self.apply_finding(finding);
        }

        let bus_faults: Vec<u32> = self.buses.faulted().collect();
        for &id in &bus_faults {
            self.log_error(ErrorType::BusTimeout, code_of(id));
        }

        let integrity = self.scan_memory();
        for fault in &integrity {
            self.log_integrity_fault(fault);
        }

        Detection {
            integrity,
            bus_faults,
            environment,
        }
    }

    // ─── Error log ──────────────────────────────────────────────────

    pub fn log_error(&mut self, kind: ErrorType, code: u16) {
        let boot = self.status.boot_count;
        self.errors.push(ErrorEntry { kind, code, boot });
        self.status.error_count = self.status.error_count.saturating_add(1);
        self.status.last_error_code = code;
        self.status.last_error_time = boot;
        self.status.seal();
        warn!(?kind, code, "BIOS error");
    }

    pub fn last_error(&self) -> Option<ErrorEntry> {
        self.errors.last()
    }

    pub fn clear_error_log(&mut self) {
        self.errors.clear();
        self.status.error_count = 0;
        self.status.last_error_code = 0;
        self.status.seal();
    }

    /// Oldest first.
    pub fn error_entries(&self) -> Vec<ErrorEntry> {
        self.errors.entries()
    }

    // ─── Critical section ───────────────────────────────────────────

    pub fn enter_critical_section(&mut self) {
        self.critical_depth += 1;
    }

    pub fn exit_critical_section(&mut self) {
        self.critical_depth = self.critical_depth.saturating_sub(1);
    }

    #[inline]
    pub fn in_critical_section(&self) -> bool {
        self.critical_depth > 0
    }

    // ─── Memory access ──────────────────────────────────────────────

    pub fn read_byte(&self, addr: u32) -> Result<u8, BiosError> {
        self.memory.read_byte(addr)
    }

    pub fn write_byte(&mut self, addr: u32, value: u8) -> Result<(), BiosError> {
        self.memory.write_byte(addr, value)
    }

    pub fn read_word(&self, addr: u32) -> Result<u32, BiosError> {
        self.memory.read_word(addr)
    }

    pub fn write_word(&mut self, addr: u32, value: u32) -> Result<(), BiosError> {
        self.memory.write_word(addr, value)
    }

    pub fn erase_flash_sector(&mut self, addr: u32) -> Result<(), BiosError> {
        self.memory.erase_flash_sector(addr)
    }

    pub fn program_flash(&mut self, addr: u32, data: &[u8]) -> Result<(), BiosError> {
        self.memory.program_flash(addr, data)
    }

    pub fn read_flash(&self, addr: u32, out: &mut [u8]) -> Result<(), BiosError> {
        self.memory.read_flash(addr, out)
    }

    pub fn memory(&self) -> &MemoryMap {
        &self.memory
    }

    pub fn segments(&self) -> &SegmentTable {
        &self.segments
    }

    // ─── Fault injection ────────────────────────────────────────────

    /// Overwrite `[addr, addr + len)` with `value`, bypassing all checks.
    pub fn inject_corruption(&mut self, addr: u32, len: u32, value: u8) -> Result<(), BiosError> {
        warn!(len, value, "corruption injected");
        self.memory.fill(addr, len, value)
    }

    pub fn inject_bus_fault(&mut self, bus_id: u32) -> Result<(), BiosError> {
        self.buses.inject_fault(bus_id)
    }

    // ─── Status ─────────────────────────────────────────────────────

    /// Sealed copy of the persistent status block.
    pub fn bios_status(&self) -> BiosStatus {
        let mut status = self.status;
        status.seal();
        status
    }

    pub fn config(&self) -> &BiosConfig {
        &self.config
    }

    // ─── Periodic supervisor ────────────────────────────────────────

    /// One supervisor pass: detect, heal when something repairable was
    /// found and auto-heal is on, then re-verify integrity.
    pub fn run_periodic_check(&mut self, probes: &EnvironmentProbes, _now: Instant) -> BiosCheckReport {
        if !self.initialized {
            self.warnings.push("BIOS check before init");
            return BiosCheckReport {
                system_health: self.status.system_health,
                ..BiosCheckReport::default()
            };
        }
        let started = Instant::now();
        self.probes = *probes;
        self.cycles += 1;

        let detection = self.detect_errors();
        let healing = (self.config.auto_heal && detection.needs_healing()).then(|| {
            let strategy = self.healing_strategy();
            HealingOutcome {
                strategy,
                success: self.heal_system().is_ok(),
            }
        });

        let integrity_ok = self.scan_memory().is_empty();
        if integrity_ok != self.integrity_ok {
            if integrity_ok {
                info!("memory integrity restored");
            } else {
                self.warnings.push("Memory integrity lost");
            }
        }
        self.integrity_ok = integrity_ok;
        self.record_cycle_time(started.elapsed());

        BiosCheckReport {
            detection,
            healing,
            system_health: self.status.system_health,
            integrity_ok,
        }
    }

    pub fn record_cycle_time(&mut self, elapsed: Duration) {
        if self.deadline.record(elapsed) {
            debug!(elapsed_us = elapsed.as_micros() as u64, "bios cycle overrun");
            self.warnings.push("BIOS cycle overrun");
        }
    }

    /// Health in [0, 1], scaled by the timing factor.
    pub fn system_health(&self) -> f64 {
        if !self.initialized {
            return 0.0;
        }
        (f64::from(self.status.system_health) / 100.0 * self.deadline.health_factor())
            .clamp(0.0, 1.0)
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}

impl Subsystem for BiosContext {
    type Input = EnvironmentProbes;
    type Output = BiosCheckReport;

    fn name(&self) -> &'static str {
        NAME
    }

    fn initialize(&mut self) -> Result<(), SubsystemError> {
        self.config
            .validate()
            .map_err(|reason| SubsystemError::InvalidConfig { name: NAME, reason })?;
        self.init().map_err(|e| SubsystemError::InitFailed {
            name: NAME,
            reason: e.to_string(),
        })
    }

    fn update(&mut self, input: &EnvironmentProbes, now: Instant) -> BiosCheckReport {
        self.run_periodic_check(input, now)
    }

    fn shutdown(&mut self) {
        self.critical_depth = 0;
        if self.integrity_ok {
            if let Err(e) = self.backup_critical_data() {
                warn!(error = %e, "critical backup skipped at shutdown");
            }
        }
        self.initialized = false;
        info!(cycles = self.cycles, errors = self.status.error_count, "BIOS shut down");
    }

    fn is_healthy(&self) -> bool {
        self.initialized && self.integrity_ok && self.status.system_health >= HEALTHY_THRESHOLD
    }

    fn warnings(&self) -> Vec<String> {
        self.warnings.to_vec()
    }

    fn status(&self) -> SubsystemStatus {
        let mode = if self.running_backup_image {
            "backup-image".to_string()
        } else {
            match self.strategy {
                Some(strategy) => format!("fixed:{strategy:?}"),
                None => "auto".to_string(),
            }
        };
        SubsystemStatus {
            name: NAME,
            initialized: self.initialized,
            healthy: self.is_healthy(),
            health: self.system_health(),
            mode,
            condition_active: self.initialized && !self.integrity_ok,
            cycles: self.cycles,
            overruns: self.deadline.total_overruns(),
            warnings: self.warnings.len(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{EEPROM_BASE_ADDR, FLASH_BASE_ADDR, RAM_BASE_ADDR};

    const RUNTIME: usize = 2;

    fn booted() -> BiosContext {
        let mut bios = BiosContext::new(BiosConfig::default());
        bios.init().expect("clean boot");
        bios
    }

    #[test]
    fn clean_boot_provisions_backups() {
        let bios = booted();
        assert!(bios.is_initialized());
        assert!(bios.is_healthy());
        let s = bios.bios_status();
        assert!(s.is_valid());
        assert_eq!(s.boot_count, 1);
        assert_eq!(s.system_health, 100);
        assert_eq!(s.error_count, 0);
        for i in bios.segments().with_flags(SegmentFlags::BACKUP) {
            assert_ne!(bios.segments().get(i).map(|s| s.crc32), Some(0));
        }
        assert!(bios.scan_memory().is_empty());
    }

    #[test]
    fn corrupted_ram_heals_by_memory_copy() {
        let mut bios = booted();
        bios.inject_corruption(RAM_BASE_ADDR + 0x1000, 256, 0xAA).unwrap();
        assert_eq!(bios.check_memory_integrity(), Err(BiosError::Crc));
        assert_eq!(bios.last_error().map(|e| e.kind), Some(ErrorType::CrcMismatch));

        bios.set_healing_strategy(Some(HealingStrategy::MemoryCopy));
        assert_eq!(bios.heal_system(), Ok(()));
        assert_eq!(bios.check_memory_integrity(), Ok(()));
        assert_eq!(bios.bios_status().healing_attempts, 1);
        assert!(!bios.in_critical_section());
    }

    #[test]
    fn corrupted_backup_is_never_copied() {
        let mut bios = booted();
        let runtime = *bios.segments().get(RUNTIME).unwrap();
        bios.inject_corruption(runtime.backup_addr, 16, 0x00).unwrap();
        bios.inject_corruption(runtime.start_addr, 16, 0x55).unwrap();
        assert_eq!(
            bios.heal_memory_segment(runtime.start_addr, runtime.size),
            Err(BiosError::Checksum)
        );
        assert_eq!(bios.verify_backup_integrity(), Err(BiosError::Checksum));
        assert_eq!(bios.read_byte(runtime.start_addr), Ok(0x55));
    }

    #[test]
    fn automatic_strategy_follows_newest_repairable_error() {
        let mut bios = booted();
        assert_eq!(bios.healing_strategy(), HealingStrategy::MemoryCopy);
        bios.log_error(ErrorType::BusTimeout, 1);
        bios.log_error(ErrorType::TemperatureHigh, 90);
        assert_eq!(bios.healing_strategy(), HealingStrategy::BusReset);
        bios.log_error(ErrorType::FlashFailure, 1);
        assert_eq!(bios.healing_strategy(), HealingStrategy::SectorErase);
        bios.set_healing_strategy(Some(HealingStrategy::SystemReset));
        assert_eq!(bios.healing_strategy(), HealingStrategy::SystemReset);
    }

    #[test]
    fn erased_config_sector_reprogrammed() {
        let mut bios = booted();
        let config = *bios.segments().get(1).unwrap();
        bios.erase_flash_sector(config.start_addr).unwrap();
        assert_eq!(bios.verify_flash_integrity(), Err(BiosError::Flash));
        assert_eq!(bios.healing_strategy(), HealingStrategy::SectorErase);
        assert_eq!(bios.heal_system(), Ok(()));
        assert!(bios.scan_memory().is_empty());
    }

    #[test]
    fn bus_fault_found_in_self_test_and_reset() {
        let mut bios = booted();
        bios.inject_bus_fault(1).unwrap();
        assert_eq!(bios.self_test(), Err(BiosError::Bus));
        assert_eq!(bios.healing_strategy(), HealingStrategy::BusReset);
        assert_eq!(bios.heal_system(), Ok(()));
        assert_eq!(bios.self_test(), Ok(()));
    }

    #[test]
    fn health_law_across_failed_and_successful_heals() {
        let mut bios = booted();
        bios.set_healing_strategy(Some(HealingStrategy::None));
        assert_eq!(bios.heal_system(), Err(BiosError::Critical));
        assert_eq!(bios.bios_status().system_health, 50);
        bios.set_healing_strategy(Some(HealingStrategy::MemoryCopy));
        assert_eq!(bios.heal_system(), Ok(()));
        assert_eq!(bios.bios_status().system_health, 75);
    }

    #[test]
    fn monitors_log_and_scale_health() {
        let mut bios = booted();
        bios.set_probes(EnvironmentProbes {
            temperature_c: 95.0,
            ..EnvironmentProbes::default()
        });
        assert_eq!(bios.monitor_system(), Err(BiosError::Critical));
        assert_eq!(bios.bios_status().system_health, 80);
        let last = bios.last_error().unwrap();
        assert_eq!((last.kind, last.code), (ErrorType::TemperatureHigh, 95));
    }

    #[test]
    fn critical_recovery_restores_boot_and_switches_image() {
        let mut bios = booted();
        bios.inject_corruption(FLASH_BASE_ADDR + 0x200, 64, 0x00).unwrap();
        assert_eq!(bios.perform_critical_recovery(), Ok(()));
        assert!(bios.is_running_backup_image());
        assert!(bios.scan_memory().is_empty());
        assert_eq!(bios.bios_status().boot_count, 2);
    }

    #[test]
    fn critical_recovery_fails_with_bad_boot_backup() {
        let mut bios = booted();
        bios.inject_corruption(EEPROM_BASE_ADDR, 64, 0x00).unwrap();
        assert_eq!(bios.perform_critical_recovery(), Err(BiosError::Critical));
        assert!(bios.is_running_backup_image());
    }

    #[test]
    fn critical_backup_refused_for_corrupt_segment() {
        let mut bios = booted();
        bios.inject_corruption(FLASH_BASE_ADDR, 8, 0x11).unwrap();
        assert_eq!(bios.backup_critical_data(), Err(BiosError::Crc));
        assert_eq!(bios.restore_from_backup(), Ok(()));
        assert_eq!(bios.backup_critical_data(), Ok(()));
    }

    #[test]
    fn out_of_range_heal_and_backup_rejected() {
        let mut bios = booted();
        let stack = *bios.segments().get(3).unwrap();
        assert_eq!(bios.heal_memory_segment(stack.start_addr, 16), Err(BiosError::Memory));
        assert_eq!(bios.backup_memory_segment(0x1000_0000, 16), Err(BiosError::Memory));
        assert_eq!(
            bios.heal_memory_segment(RAM_BASE_ADDR, 256 * 1024),
            Err(BiosError::Memory)
        );
        assert_eq!(bios.heal_memory_segment(RAM_BASE_ADDR, 0), Err(BiosError::Memory));
    }

    #[test]
    fn periodic_check_heals_and_reports() {
        let mut bios = booted();
        bios.inject_corruption(RAM_BASE_ADDR + 0x40, 32, 0xAA).unwrap();
        let report = bios.run_periodic_check(&EnvironmentProbes::default(), Instant::now());
        assert_eq!(report.detection.integrity.len(), 1);
        assert_eq!(
            report.healing,
            Some(HealingOutcome {
                strategy: HealingStrategy::MemoryCopy,
                success: true
            })
        );
        assert!(report.integrity_ok);

        let clean = bios.run_periodic_check(&EnvironmentProbes::default(), Instant::now());
        assert!(clean.detection.is_clean());
        assert!(clean.healing.is_none());
        assert_eq!(bios.status().cycles, 2);
    }

    #[test]
    fn environmental_findings_do_not_trigger_healing() {
        let mut bios = booted();
        let probes = EnvironmentProbes {
            supply_voltage: 2.5,
            ..EnvironmentProbes::default()
        };
        let report = bios.run_periodic_check(&probes, Instant::now());
        assert_eq!(report.detection.environment.len(), 1);
        assert!(report.healing.is_none());
        assert_eq!(report.system_health, 90);
    }

    #[test]
    fn periodic_check_before_init_is_inert() {
        let mut bios = BiosContext::new(BiosConfig::default());
        let report = bios.update(&EnvironmentProbes::default(), Instant::now());
        assert!(report.detection.is_clean());
        assert!(!bios.is_healthy());
        assert_eq!(bios.status().cycles, 0);
    }

    #[test]
    fn boot_with_corrupt_runtime_after_reset_heals() {
        let mut bios = booted();
        bios.inject_corruption(RAM_BASE_ADDR, 1024, 0x00).unwrap();
        bios.init().expect("heals on boot");
        assert_eq!(bios.bios_status().boot_count, 2);
        assert!(bios.scan_memory().is_empty());
        assert!(bios.is_healthy());
    }

    #[test]
    fn error_log_clears() {
        let mut bios = booted();
        bios.log_error(ErrorType::RadiationDetected, 3);
        assert_eq!(bios.error_entries().len(), 1);
        assert_eq!(bios.bios_status().last_error_code, 3);
        bios.clear_error_log();
        assert!(bios.last_error().is_none());
        assert_eq!(bios.bios_status().error_count, 0);
    }

    #[test]
    fn subsystem_lifecycle() {
        let mut bios = BiosContext::new(BiosConfig::default());
        bios.initialize().expect("valid config");
        assert_eq!(bios.name(), "bios");
        assert_eq!(bios.status().mode, "auto");
        bios.shutdown();
        assert!(!bios.is_healthy());

        let bad = BiosConfig {
            watchdog_timeout_ms: 0,
            ..BiosConfig::default()
        };
        assert!(matches!(
            BiosContext::new(bad).initialize(),
            Err(SubsystemError::InvalidConfig { .. })
        ));
    }
}
