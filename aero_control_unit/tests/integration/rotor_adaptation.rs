//! Adaptive rotor flows: partial servo failure, resonance avoidance and
//! long-running suppression against the deflection envelope.

use std::time::{Duration, Instant};

use aero_common::rotor::{AdaptationMode, RotorConfig, RotorState, VibrationData};
use aero_common::subsystem::Subsystem;
use aero_control_unit::RotorFault;
use aero_control_unit::rotor::{AdaptiveRotorSystem, RotorInput};

const PERIOD: Duration = Duration::from_millis(1);

// ── Helpers ──

fn started_system(config: RotorConfig) -> AdaptiveRotorSystem {
    let mut sys = AdaptiveRotorSystem::new(config);
    sys.initialize().expect("config is valid");
    sys
}

fn sample(frequency: f64, amplitude: f64, blade_id: u8, sensor_id: u8) -> VibrationData {
    VibrationData {
        frequency,
        amplitude,
        blade_id,
        sensor_id,
        ..VibrationData::default()
    }
}

// ── Tests ──

#[test]
fn one_failed_servo_does_not_block_the_rest() {
    let mut sys = started_system(RotorConfig::default());
    assert!(sys.set_servo_health(2, 6, false));
    sys.set_emergency_mode(true);

    let applied = sys.update_rotor_control(&RotorState::default(), &[], Instant::now());
    // 4 blades x 7 strided stations, one of them failed
    assert_eq!(applied.len(), 27);
    assert!(applied.iter().all(|c| (c.blade_id, c.element_id) != (2, 6)));
    assert_eq!(sys.servo_array().servo_position(2, 6), Some(Default::default()));
    assert!(sys.servo_array().servo_position(2, 3).is_some_and(|p| p.pitch < 0.0));

    assert!(sys.faults().contains(RotorFault::SERVO_FAILURE));
    assert_eq!(sys.servo_array().failed_servos(), vec![(2, 6)]);
    assert_eq!(sys.run_system_diagnostics().healthy_servos, 79);
}

#[test]
fn resonance_avoidance_detunes_blades_while_active() {
    let config = RotorConfig {
        mode: AdaptationMode::ResonanceAvoidance,
        ..RotorConfig::default()
    };
    let mut sys = started_system(config);
    let rotor = RotorState::default();
    let mut now = Instant::now();

    // Second harmonic of the 20 Hz blade passing frequency
    let applied = sys.update_rotor_control(&rotor, &[sample(40.0, 3.0, 0, 0)], now);
    assert!(!applied.is_empty());
    assert!(sys.resonance().active);
    assert_eq!(sys.resonance().harmonic, 2);
    assert!(sys.servo_array().servo_position(1, 0).is_some_and(|p| p.pitch > 0.0));
    assert!(sys.servo_array().servo_position(3, 0).is_some_and(|p| p.pitch < 0.0));

    now += PERIOD;
    let applied = sys.update_rotor_control(&rotor, &[sample(40.0, 0.2, 0, 0)], now);
    assert!(applied.is_empty());
    assert!(!sys.resonance().active);
    assert!(!sys.faults().contains(RotorFault::RESONANCE));
}

#[test]
fn sustained_suppression_stays_in_deflection_envelope() {
    let config = RotorConfig::default();
    let limit = config.servo_max_deflection_deg;
    let max_rate = config.servo_max_rate_deg_s;
    let mut sys = started_system(config);
    let rotor = RotorState::default();
    let mut now = Instant::now();
    let input = RotorInput {
        rotor,
        vibrations: vec![sample(33.0, 4.0, 1, 3)],
    };

    for _ in 0..2000 {
        let batch = sys.update(&input, now);
        assert_eq!(batch.applied, batch.requested);
        let rate = sys.servo_array().servo_rate(1, 3).unwrap_or_default();
        assert!(rate <= max_rate + 1e-6, "rate {rate}");
        now += PERIOD;
    }
    let pos = sys.servo_array().servo_position(1, 3).unwrap_or_default();
    assert!(pos.pitch.abs() <= limit && pos.flap.abs() <= limit);
    assert!(pos.pitch < 0.0 && pos.flap > 0.0);
    assert_eq!(sys.status().cycles, 2000);
}

#[test]
fn passive_mode_issues_nothing() {
    let config = RotorConfig {
        mode: AdaptationMode::Passive,
        ..RotorConfig::default()
    };
    let mut sys = started_system(config);
    let applied = sys.update_rotor_control(
        &RotorState::default(),
        &[sample(33.0, 4.0, 0, 0)],
        Instant::now(),
    );
    assert!(applied.is_empty());
    assert_eq!(sys.servo_array().applied_count(), 0);
    assert!(sys.filtered_vibration_level() > 0.0);
}

#[test]
fn shutdown_then_restart() {
    let mut sys = started_system(RotorConfig::default());
    let rotor = RotorState::default();
    sys.update_rotor_control(&rotor, &[sample(33.0, 1.0, 0, 0)], Instant::now());
    sys.shutdown();
    assert!(!sys.status().initialized);
    assert!(
        sys.update_rotor_control(&rotor, &[sample(33.0, 1.0, 0, 0)], Instant::now())
            .is_empty()
    );

    sys.initialize().expect("restart");
    assert!(sys.is_healthy());
}
