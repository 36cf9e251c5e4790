//! Boot, corruption and repair flows across the whole BIOS context.

use std::time::{Duration, Instant};

use aero_bios::memory::{EEPROM_BASE_ADDR, FLASH_BASE_ADDR, RAM_BASE_ADDR};
use aero_bios::{
    BiosContext, BiosError, EnvironmentProbes, ErrorType, HealingOutcome, result_code,
};
use aero_common::bios::{BiosConfig, HealingStrategy};
use aero_common::consts::ERROR_LOG_CAPACITY;
use aero_common::subsystem::Subsystem;

// ── Helpers ──

fn booted(config: BiosConfig) -> BiosContext {
    let mut bios = BiosContext::new(config);
    bios.initialize().expect("clean boot");
    bios
}

// ── Tests ──

#[test]
fn corrupted_ram_segment_heals_by_memory_copy() {
    let mut bios = booted(BiosConfig::default());
    bios.inject_corruption(RAM_BASE_ADDR + 0x1000, 0x100, 0xAA)
        .expect("address is mapped");
    assert_ne!(result_code(bios.check_memory_integrity()), 0);

    bios.set_healing_strategy(Some(HealingStrategy::MemoryCopy));
    assert_eq!(result_code(bios.heal_system()), 0);
    assert_eq!(result_code(bios.check_memory_integrity()), 0);
}

#[test]
fn result_codes_match_bios_numbering() {
    let mut bios = booted(BiosConfig::default());
    assert_eq!(result_code(bios.read_byte(0x0000_0010).map(|_| ())), -1);
    assert_eq!(result_code(bios.program_flash(RAM_BASE_ADDR, &[1, 2])), -2);
    bios.inject_bus_fault(2).expect("bus exists");
    assert_eq!(result_code(bios.test_bus_communication(2)), -5);
    assert_eq!(BiosError::from_code(-4), Some(BiosError::Crc));
}

#[test]
fn corrupted_boot_image_at_power_on_recovers_from_backup() {
    let mut bios = booted(BiosConfig::default());
    bios.shutdown();
    bios.inject_corruption(FLASH_BASE_ADDR + 0x800, 0x40, 0x00)
        .expect("address is mapped");

    bios.init().expect("recovers");
    assert!(bios.is_running_backup_image());
    assert!(bios.scan_memory().is_empty());
    assert!(
        bios.error_entries()
            .iter()
            .any(|e| e.kind == ErrorType::CriticalSystem)
    );
    assert_eq!(bios.status().mode, "backup-image");
}

#[test]
fn unrecoverable_boot_image_fails_init() {
    let mut bios = booted(BiosConfig::default());
    bios.shutdown();
    bios.inject_corruption(FLASH_BASE_ADDR, 0x40, 0x00).unwrap();
    bios.inject_corruption(EEPROM_BASE_ADDR, 0x40, 0x00).unwrap();
    assert_eq!(bios.init(), Err(BiosError::Critical));
    assert!(!bios.is_healthy());
}

#[test]
fn supervisor_repairs_each_fault_kind_over_successive_checks() {
    let mut bios = booted(BiosConfig::default());
    let probes = EnvironmentProbes::default();
    let mut now = Instant::now();

    bios.inject_bus_fault(0).unwrap();
    bios.inject_corruption(RAM_BASE_ADDR + 0x10, 8, 0x3C).unwrap();

    // Integrity faults are logged last, so memory is repaired first
    let first = bios.run_periodic_check(&probes, now);
    assert_eq!(
        first.healing,
        Some(HealingOutcome {
            strategy: HealingStrategy::MemoryCopy,
            success: true
        })
    );
    assert!(first.integrity_ok);
    assert_eq!(first.detection.bus_faults, vec![0]);

    now += Duration::from_secs(1);
    let second = bios.run_periodic_check(&probes, now);
    assert_eq!(second.healing.map(|h| h.strategy), Some(HealingStrategy::BusReset));
    assert!(bios.buses().faulted().next().is_none());

    now += Duration::from_secs(1);
    let third = bios.run_periodic_check(&probes, now);
    assert!(third.detection.is_clean());
    assert!(bios.is_healthy());
}

#[test]
fn watchdog_expiry_resets_the_system() {
    let mut bios = booted(BiosConfig::default());
    let probes = EnvironmentProbes {
        since_watchdog_kick: Duration::from_millis(1500),
        ..EnvironmentProbes::default()
    };
    let report = bios.run_periodic_check(&probes, Instant::now());
    assert_eq!(
        report.healing.map(|h| h.strategy),
        Some(HealingStrategy::SystemReset)
    );
    assert_eq!(bios.bios_status().boot_count, 2);
}

#[test]
fn auto_heal_off_only_detects() {
    let mut bios = booted(BiosConfig {
        auto_heal: false,
        ..BiosConfig::default()
    });
    bios.inject_corruption(RAM_BASE_ADDR, 4, 0x77).unwrap();
    let report = bios.run_periodic_check(&EnvironmentProbes::default(), Instant::now());
    assert!(report.healing.is_none());
    assert!(!report.integrity_ok);
    assert!(!bios.is_healthy());
    assert!(bios.status().condition_active);
}

#[test]
fn sustained_overheat_drives_health_down_without_repairs() {
    let mut bios = booted(BiosConfig::default());
    let hot = EnvironmentProbes {
        temperature_c: 100.0,
        ..EnvironmentProbes::default()
    };
    let mut now = Instant::now();
    for _ in 0..4 {
        let report = bios.run_periodic_check(&hot, now);
        assert!(report.healing.is_none());
        now += Duration::from_secs(1);
    }
    // 100 -> 80 -> 64 -> 51 -> 40
    assert_eq!(bios.bios_status().system_health, 40);
    assert!(!bios.is_healthy());
}

#[test]
fn error_log_keeps_the_newest_entries() {
    let mut bios = booted(BiosConfig::default());
    for code in 0..(ERROR_LOG_CAPACITY as u16 + 20) {
        bios.log_error(ErrorType::BusTimeout, code);
    }
    let entries = bios.error_entries();
    assert_eq!(entries.len(), ERROR_LOG_CAPACITY);
    assert_eq!(entries.first().map(|e| e.code), Some(20));
    assert_eq!(bios.last_error().map(|e| e.code), Some(ERROR_LOG_CAPACITY as u16 + 19));
    assert_eq!(bios.bios_status().error_count, ERROR_LOG_CAPACITY as u32 + 20);
}

#[test]
fn status_block_stays_sealed_through_healing() {
    let mut bios = booted(BiosConfig::default());
    bios.inject_corruption(RAM_BASE_ADDR + 0x2000, 16, 0xEE).unwrap();
    let _ = bios.run_periodic_check(&EnvironmentProbes::default(), Instant::now());
    let status = bios.bios_status();
    assert!(status.is_valid());
    assert_eq!(status.healing_attempts, 1);
    assert!(status.error_count >= 1);
}
