//! Detector scenarios on reference flight conditions.
//!
//! Reference rotor: 5 m radius, disc loading 0.1, sea-level density.

use std::time::Instant;

use aero_common::vrs::{
    DetectionMethod, FlightConditions, PressureSensorData, RecoveryStrategy, RotorState,
};
use aero_control_unit::vrs::VortexRingDetector;
use aero_control_unit::vrs::detector::{
    calculate_descent_rate_threshold, calculate_induced_flow_velocity,
};

// ── Helpers ──

fn reference_rotor() -> RotorState {
    RotorState {
        rotor_radius: 5.0,
        disc_loading: 0.1,
        ..RotorState::default()
    }
}

fn flight(vertical_speed: f64, airspeed: f64) -> FlightConditions {
    FlightConditions {
        vertical_speed,
        airspeed,
        air_density: 1.225,
        ..FlightConditions::default()
    }
}

// ── Tests ──

#[test]
fn steep_vertical_descent_is_vortex_ring_state() {
    let mut detector = VortexRingDetector::new(DetectionMethod::MultiSensorFusion);
    let state = detector.detect_vortex_ring_state(
        &reference_rotor(),
        &flight(-15.0, 0.0),
        &PressureSensorData::uniform(101_325.0),
        Instant::now(),
    );
    assert!(state.is_active);
    assert!(state.severity > 0.6, "severity {}", state.severity);
    assert_eq!(
        RecoveryStrategy::for_severity(state.severity),
        RecoveryStrategy::EmergencyPower
    );
    assert!(state.confidence > 0.0);
}

#[test]
fn level_cruise_with_uniform_ring_is_clear() {
    let mut detector = VortexRingDetector::new(DetectionMethod::MultiSensorFusion);
    let state = detector.detect_vortex_ring_state(
        &reference_rotor(),
        &flight(0.0, 50.0),
        &PressureSensorData::uniform(101_325.0),
        Instant::now(),
    );
    assert!(!state.is_active);
    assert!(!state.is_degraded());
    assert!(state.detected_at.is_none());
}

#[test]
fn every_method_agrees_on_the_reference_cases() {
    let methods = [
        DetectionMethod::DescentRateAnalysis,
        DetectionMethod::MultiSensorFusion,
    ];
    for method in methods {
        let mut detector = VortexRingDetector::new(method);
        let now = Instant::now();
        let steep = detector.detect_vortex_ring_state(
            &reference_rotor(),
            &flight(-15.0, 0.0),
            &PressureSensorData::default(),
            now,
        );
        assert!(steep.is_active, "{method:?} missed the steep descent");

        let mut detector = VortexRingDetector::new(method);
        let cruise = detector.detect_vortex_ring_state(
            &reference_rotor(),
            &flight(0.0, 50.0),
            &PressureSensorData::default(),
            now,
        );
        assert!(!cruise.is_active, "{method:?} flagged level cruise");
    }
}

#[test]
fn threshold_scales_with_disc_loading_and_density() {
    let light = reference_rotor();
    let heavy = RotorState {
        disc_loading: 0.4,
        ..light
    };
    let sea = flight(0.0, 0.0);
    let high = FlightConditions {
        air_density: 0.9,
        ..sea
    };

    assert!(calculate_induced_flow_velocity(&heavy, &sea) > calculate_induced_flow_velocity(&light, &sea));
    assert!(
        calculate_descent_rate_threshold(&heavy, &sea) > calculate_descent_rate_threshold(&light, &sea)
    );
    assert!(
        calculate_descent_rate_threshold(&light, &high) < calculate_descent_rate_threshold(&light, &sea)
    );
}

#[test]
fn history_follows_the_descent_profile() {
    let mut detector = VortexRingDetector::new(DetectionMethod::MultiSensorFusion);
    let rotor = reference_rotor();
    let mut now = Instant::now();
    for step in 0..20 {
        let vs = -0.5 * f64::from(step);
        detector.detect_vortex_ring_state(&rotor, &flight(vs, 0.0), &PressureSensorData::default(), now);
        now += std::time::Duration::from_millis(10);
    }
    let history = detector.descent_history();
    assert_eq!(history.len(), 20);
    assert_eq!(history.last().copied(), Some(-9.5));
    assert!(detector.descent_rate_trend().is_some_and(|t| t < 0.0));
    assert!(detector.last_state().is_active);
}
