//! End-to-end VRS supervisor flows: entry, rate-limited recovery, exit,
//! timeout escalation and operator mode switches.

use std::time::{Duration, Instant};

use aero_common::subsystem::Subsystem;
use aero_common::vrs::{
    ControlAxes, ControlPositions, FlightConditions, PressureSensorData, RecoveryStrategy,
    StrategySelection, VrsConfig,
};
use aero_control_unit::VrsFault;
use aero_control_unit::vrs::recovery::execute_recovery_maneuver;
use aero_control_unit::vrs::{RecoveryTransition, VortexShieldSystem, VrsInput};

const PERIOD: Duration = Duration::from_millis(10);

// ── Helpers ──

fn started_system(config: VrsConfig) -> VortexShieldSystem {
    let mut sys = VortexShieldSystem::new(config);
    sys.initialize().expect("config is valid");
    sys
}

fn input(vertical_speed: f64, airspeed: f64) -> VrsInput {
    VrsInput {
        flight: FlightConditions {
            vertical_speed,
            airspeed,
            ..FlightConditions::default()
        },
        pressure: PressureSensorData::uniform(101_325.0),
        ..VrsInput::default()
    }
}

fn within_envelope(p: &ControlPositions) -> bool {
    [
        ControlAxes::COLLECTIVE,
        ControlAxes::LATERAL,
        ControlAxes::LONGITUDINAL,
        ControlAxes::PEDAL,
    ]
    .into_iter()
    .all(|axis| {
        let (min, max) = ControlPositions::limits(axis);
        (min..=max).contains(&p.get(axis))
    })
}

// ── Tests ──

#[test]
fn descent_recovery_and_exit() {
    let mut sys = started_system(VrsConfig::default());
    let max_step = VrsConfig::default().actuator_max_rate_deg_s * PERIOD.as_secs_f64();
    let mut now = Instant::now();

    // First cycle adopts the aircraft's collective of 8 deg
    sys.update(&input(-15.0, 0.0), now);
    now += PERIOD;
    let mut prev = *sys.blade_interface().positions();
    assert!(prev.collective > 8.0);

    // 1 s in the ring
    for _ in 0..99 {
        sys.update(&input(-15.0, 0.0), now);
        let pos = *sys.blade_interface().positions();
        assert!((pos.collective - prev.collective).abs() <= max_step + 1e-9);
        assert!(within_envelope(&pos));
        prev = pos;
        now += PERIOD;
    }
    assert!(sys.is_recovery_in_progress());
    assert_eq!(
        sys.recovery_controller().current_strategy(),
        Some(RecoveryStrategy::EmergencyPower)
    );
    assert!(sys.blade_interface().positions().collective > 8.0);
    assert!(sys.vortex_state().time_in_state > 0.9);

    // Back to forward flight, recovery completes after the debounce
    let mut completed = false;
    for _ in 0..100 {
        sys.update(&input(0.0, 50.0), now);
        completed |= sys.recovery_controller().last_transition() == Some(RecoveryTransition::Completed);
        now += PERIOD;
    }
    assert!(completed);
    assert!(!sys.is_recovery_in_progress());
    assert!(!sys.is_vortex_ring_detected());
    assert!(sys.is_healthy());
    assert_eq!(sys.recovery_controller().episodes(), 1);
    assert_eq!(sys.recovery_controller().timeouts(), 0);
}

#[test]
fn sustained_ring_times_out_into_emergency() {
    let mut sys = started_system(VrsConfig::default());
    let t0 = Instant::now();
    let mut now = t0;
    while now.duration_since(t0) < Duration::from_secs(11) {
        sys.update(&input(-15.0, 0.0), now);
        now += Duration::from_millis(50);
    }
    assert!(sys.faults().contains(VrsFault::RECOVERY_TIMEOUT));
    assert!(sys.is_emergency_mode());
    assert!(!sys.is_healthy());
    assert_eq!(sys.status().mode, "emergency");

    // Clearing emergency releases the latch
    sys.set_emergency_mode(false);
    assert!(!sys.faults().contains(VrsFault::RECOVERY_TIMEOUT));
    assert!(!sys.is_emergency_mode());
}

#[test]
fn fixed_strategy_is_honored() {
    let config = VrsConfig {
        strategy: StrategySelection::Fixed(RecoveryStrategy::ForwardTranslation),
        ..VrsConfig::default()
    };
    let mut sys = started_system(config);
    let cmd = sys.update(&input(-15.0, 0.0), Instant::now());
    assert_eq!(cmd.strategy, Some(RecoveryStrategy::ForwardTranslation));
    assert!(!cmd.emergency_action);
}

#[test]
fn maneuvers_stay_in_envelope_at_full_severity() {
    let strategies = [
        RecoveryStrategy::CollectiveReduction,
        RecoveryStrategy::ForwardTranslation,
        RecoveryStrategy::LateralMotion,
        RecoveryStrategy::AltitudeGain,
        RecoveryStrategy::EmergencyPower,
        RecoveryStrategy::CombinedManeuver,
    ];
    for strategy in strategies {
        let cmd = execute_recovery_maneuver(strategy, 1.0, 1.0);
        assert!(cmd.within_envelope(), "{strategy:?} left the envelope");
        assert_eq!(cmd.strategy, Some(strategy));
    }
}

#[test]
fn held_controls_do_not_move() {
    let mut sys = started_system(VrsConfig::default());
    let mut now = Instant::now();
    sys.update(&input(0.0, 50.0), now);
    let synced = *sys.blade_interface().positions();
    assert_eq!(synced.collective, 8.0);
    for _ in 0..50 {
        now += PERIOD;
        let cmd = sys.update(&input(0.0, 50.0), now);
        assert!(cmd.is_zero());
    }
    assert_eq!(*sys.blade_interface().positions(), synced);
}

#[test]
fn status_report_tracks_cycles_and_warnings() {
    let mut sys = started_system(VrsConfig::default());
    let mut now = Instant::now();
    for _ in 0..10 {
        sys.update(&input(-15.0, 0.0), now);
        now += PERIOD;
    }
    let status = sys.status();
    assert_eq!(status.name, "vrs");
    assert_eq!(status.cycles, 10);
    assert!(status.condition_active);
    assert!(
        sys.warnings()
            .iter()
            .filter(|w| w.starts_with("VORTEX RING STATE DETECTED"))
            .count()
            == 1
    );
}
