//! Vortex-ring-state detector.
//!
//! Once per cycle turns the flight snapshot and pressure ring sample into a
//! [`VortexRingState`]. Three independent checks:
//!
//! 1. **Descent rate**: `|vs|` above the critical descent rate
//!    `2·V_ind·sqrt(ρ/ρ₀)`.
//! 2. **Pressure anomaly**: ring variance above 100 Pa² and periphery mean
//!    more than 50 Pa above the centre sensor.
//! 3. **Induced-flow deficit**: `V_ind` below 70 % of the flow needed to
//!    carry the disc.
//!
//! Fusion ORs the checks. A missed vortex ring is fatal and a spurious one
//! only costs a recovery maneuver.
//!
//! Below the threshold but inside the warning band the state is reported
//! active with the IMMINENT flag, severity 0.3 and reduced confidence.
//!
//! The detector never fails. An unusable pressure ring drops detection to
//! descent-rate only and sets the DEGRADED flag.

use aero_common::consts::{AIR_DENSITY_SEA_LEVEL, GRAVITY, SENSOR_HISTORY_LEN};
use aero_common::vrs::{
    DetectionFlags, DetectionMethod, FlightConditions, PressureSensorData, RotorState,
    VortexRingState,
};
use aero_common::warnings::WarningLog;
use heapless::HistoryBuf as HistoryBuffer;
use std::f64::consts::PI;
use std::time::Instant;
use tracing::{info, warn};

/// Ring variance above which the pressure field counts as disturbed [Pa²].
pub const PRESSURE_VARIANCE_THRESHOLD: f64 = 100.0;

/// Periphery-over-centre pressure margin [Pa].
pub const PRESSURE_MARGIN: f64 = 50.0;

/// Induced flow below this fraction of the required value is a deficit.
pub const INDUCED_FLOW_DEFICIT_RATIO: f64 = 0.7;

/// Severity reported inside the imminent band.
pub const IMMINENT_SEVERITY: f64 = 0.3;

pub const CONFIDENCE_ACTIVE: f64 = 0.85;
pub const CONFIDENCE_IMMINENT: f64 = 0.6;
pub const CONFIDENCE_DEGRADED: f64 = 0.5;
pub const CONFIDENCE_DEGRADED_IMMINENT: f64 = 0.4;

/// Sensitivity at which the imminent band starts at 80 % of the threshold.
pub const DEFAULT_SENSITIVITY: f64 = 0.7;

/// Vortex core radius as a fraction of rotor radius.
const CORE_RADIUS_RATIO: f64 = 0.3;

// ─── Physics ────────────────────────────────────────────────────────

/// Momentum-theory induced velocity [m/s].
///
/// `A = π·r²`, `T = DL·A·ρ·g`, `V = sqrt(T / (2·ρ·A))`.
///
/// Returns 0 for a non-positive radius or density. Negative disc loading is
/// treated as zero. The result is always finite and non-negative.
pub fn calculate_induced_flow_velocity(rotor: &RotorState, flight: &FlightConditions) -> f64 {
    let r = rotor.rotor_radius;
    let rho = flight.air_density;
    if !(r > 0.0 && r.is_finite() && rho > 0.0 && rho.is_finite()) {
        return 0.0;
    }
    let disc_loading = if rotor.disc_loading > 0.0 {
        rotor.disc_loading
    } else {
        0.0
    };

    let area = PI * r * r;
    let thrust = disc_loading * area * rho * GRAVITY;
    let v = (thrust / (2.0 * rho * area)).sqrt();
    if v.is_finite() { v } else { 0.0 }
}

/// Critical descent rate [m/s]: `2·V_ind·sqrt(ρ/ρ₀)`.
pub fn calculate_descent_rate_threshold(rotor: &RotorState, flight: &FlightConditions) -> f64 {
    let v_induced = calculate_induced_flow_velocity(rotor, flight);
    let density_ratio = (flight.air_density / AIR_DENSITY_SEA_LEVEL).max(0.0);
    if !density_ratio.is_finite() {
        return 0.0;
    }
    2.0 * v_induced * density_ratio.sqrt()
}

/// Induced flow needed to support the disc [m/s].
pub fn required_induced_flow(rotor: &RotorState, flight: &FlightConditions) -> f64 {
    let r = rotor.rotor_radius;
    let rho = flight.air_density;
    if !(r > 0.0 && rho > 0.0) {
        return 0.0;
    }
    (2.0 * GRAVITY * rho / (PI * r * r)).sqrt()
}

/// Mean of `|vs|/10`, `V_ind/20` and `|vs|/threshold`, clamped to [0, 1].
pub fn calculate_severity(descent_rate: f64, induced_flow: f64, threshold: f64) -> f64 {
    let descent = descent_rate.abs();
    let threshold_factor = if threshold > f64::EPSILON {
        descent / threshold
    } else if descent > 0.0 {
        1.0
    } else {
        0.0
    };
    let severity = (descent / 10.0 + induced_flow / 20.0 + threshold_factor) / 3.0;
    if severity.is_finite() {
        severity.clamp(0.0, 1.0)
    } else {
        1.0
    }
}

// ─── Detector ───────────────────────────────────────────────────────

pub struct VortexRingDetector {
    method: DetectionMethod,
    sensitivity: f64,
    last_state: VortexRingState,
    onset: Option<Instant>,
    was_degraded: bool,
    pressure_history: HistoryBuffer<f64, SENSOR_HISTORY_LEN>,
    descent_history: HistoryBuffer<f64, SENSOR_HISTORY_LEN>,
    warnings: WarningLog,
}

impl VortexRingDetector {
    pub fn new(method: DetectionMethod) -> Self {
        Self {
            method,
            sensitivity: DEFAULT_SENSITIVITY,
            last_state: VortexRingState::default(),
            onset: None,
            was_degraded: false,
            pressure_history: HistoryBuffer::new(),
            descent_history: HistoryBuffer::new(),
            warnings: WarningLog::new(),
        }
    }

    pub fn set_detection_method(&mut self, method: DetectionMethod) {
        self.method = method;
    }

    #[inline]
    pub fn detection_method(&self) -> DetectionMethod {
        self.method
    }

    /// Sensitivity in [0, 1]. Higher values widen the imminent band.
    pub fn set_sensitivity(&mut self, sensitivity: f64) {
        if sensitivity.is_finite() {
            self.sensitivity = sensitivity.clamp(0.0, 1.0);
        }
    }

    #[inline]
    pub fn sensitivity(&self) -> f64 {
        self.sensitivity
    }

    /// Fraction of the threshold where the imminent band starts.
    ///
    /// 0.8 at the default sensitivity, about 0.71 at full sensitivity, 1.0
    /// (band disabled) at zero.
    pub fn imminent_ratio(&self) -> f64 {
        1.0 - 0.2 * (self.sensitivity / DEFAULT_SENSITIVITY)
    }

    // ── Individual checks ──

    pub fn detect_from_descent_rate(&self, flight: &FlightConditions, threshold: f64) -> bool {
        flight.vertical_speed.abs() > threshold
    }

    /// Ring shows a low-pressure core. Always false for unusable samples.
    pub fn detect_from_pressure(&self, pressure: &PressureSensorData) -> bool {
        if !pressure.is_usable() {
            return false;
        }
        pressure.variance() > PRESSURE_VARIANCE_THRESHOLD
            && pressure.periphery_mean() - pressure.center() > PRESSURE_MARGIN
    }

    pub fn detect_from_induced_flow(&self, rotor: &RotorState, flight: &FlightConditions) -> bool {
        let actual = calculate_induced_flow_velocity(rotor, flight);
        actual < INDUCED_FLOW_DEFICIT_RATIO * required_induced_flow(rotor, flight)
    }

    // ── Cycle entry point ──

    /// Evaluate one cycle. Never fails.
    pub fn detect_vortex_ring_state(
        &mut self,
        rotor: &RotorState,
        flight: &FlightConditions,
        pressure: &PressureSensorData,
        now: Instant,
    ) -> VortexRingState {
        let induced = calculate_induced_flow_velocity(rotor, flight);
        let threshold = calculate_descent_rate_threshold(rotor, flight);

        let mut flight = *flight;
        let mut triggers = DetectionFlags::empty();
        if !flight.vertical_speed.is_finite() {
            flight.vertical_speed = 0.0;
            triggers |= DetectionFlags::DEGRADED;
        }
        let descent = flight.vertical_speed;

        let pressure_usable = pressure.is_usable();
        let uses_pressure = matches!(
            self.method,
            DetectionMethod::PressureAnalysis | DetectionMethod::MultiSensorFusion
        );
        if uses_pressure && !pressure_usable {
            triggers |= DetectionFlags::DEGRADED;
        }
        let degraded = triggers.contains(DetectionFlags::DEGRADED);

        let descent_flag = self.detect_from_descent_rate(&flight, threshold);
        match self.method {
            DetectionMethod::DescentRateAnalysis => {
                triggers.set(DetectionFlags::DESCENT_RATE, descent_flag);
            }
            DetectionMethod::PressureAnalysis => {
                if pressure_usable {
                    triggers.set(
                        DetectionFlags::PRESSURE_ANOMALY,
                        self.detect_from_pressure(pressure),
                    );
                } else {
                    triggers.set(DetectionFlags::DESCENT_RATE, descent_flag);
                }
            }
            DetectionMethod::InducedFlowCalculation => {
                triggers.set(
                    DetectionFlags::INDUCED_FLOW_DEFICIT,
                    self.detect_from_induced_flow(rotor, &flight),
                );
            }
            DetectionMethod::MultiSensorFusion => {
                triggers.set(DetectionFlags::DESCENT_RATE, descent_flag);
                if pressure_usable {
                    triggers.set(
                        DetectionFlags::PRESSURE_ANOMALY,
                        self.detect_from_pressure(pressure),
                    );
                    triggers.set(
                        DetectionFlags::INDUCED_FLOW_DEFICIT,
                        self.detect_from_induced_flow(rotor, &flight),
                    );
                }
            }
        }

        let mut is_active = triggers.intersects(DetectionFlags::TRIGGER_MASK);
        let (severity, confidence) = if is_active {
            let confidence = if degraded {
                CONFIDENCE_DEGRADED
            } else {
                CONFIDENCE_ACTIVE
            };
            (calculate_severity(descent, induced, threshold), confidence)
        } else if descent.abs() > self.imminent_ratio() * threshold {
            is_active = true;
            triggers |= DetectionFlags::IMMINENT;
            let confidence = if degraded {
                CONFIDENCE_DEGRADED_IMMINENT
            } else {
                CONFIDENCE_IMMINENT
            };
            (IMMINENT_SEVERITY, confidence)
        } else {
            let confidence = if degraded {
                CONFIDENCE_DEGRADED
            } else {
                CONFIDENCE_ACTIVE
            };
            (0.0, confidence)
        };

        if is_active {
            if self.onset.is_none() {
                self.onset = Some(now);
            }
        } else {
            self.onset = None;
        }

        let core_radius = CORE_RADIUS_RATIO * rotor.rotor_radius.max(0.0);
        let state = VortexRingState {
            is_active,
            severity,
            confidence,
            descent_rate: descent,
            induced_flow_velocity: induced,
            descent_rate_threshold: threshold,
            vortex_core_radius: core_radius,
            circulation_strength: induced * 2.0 * PI * core_radius,
            triggers,
            detected_at: self.onset,
            time_in_state: self
                .onset
                .map_or(0.0, |t| now.saturating_duration_since(t).as_secs_f64()),
        };

        self.record_history(&flight, pressure, pressure_usable);
        self.report_transitions(&state);
        self.last_state = state;
        state
    }

    fn record_history(
        &mut self,
        flight: &FlightConditions,
        pressure: &PressureSensorData,
        pressure_usable: bool,
    ) {
        self.descent_history.write(flight.vertical_speed);
        if pressure_usable {
            self.pressure_history.write(pressure.mean());
        }
    }

    /// Edge-triggered warnings so a persisting condition logs once.
    fn report_transitions(&mut self, state: &VortexRingState) {
        let prev = &self.last_state;
        let became_active = state.is_active && !state.is_imminent();
        let was_active = prev.is_active && !prev.is_imminent();

        if became_active && !was_active {
            warn!(
                severity = state.severity,
                descent_rate = state.descent_rate,
                threshold = state.descent_rate_threshold,
                "vortex ring state detected"
            );
            self.warnings.push(format!(
                "VORTEX RING STATE DETECTED: severity {:.2}, descent {:.1} m/s",
                state.severity, state.descent_rate
            ));
        } else if state.is_imminent() && !prev.is_active {
            warn!(descent_rate = state.descent_rate, "vortex ring imminent");
            self.warnings.push(format!(
                "VORTEX RING IMMINENT: descent {:.1} m/s ({:.0}% of threshold)",
                state.descent_rate,
                100.0 * state.descent_rate.abs() / state.descent_rate_threshold.max(f64::EPSILON)
            ));
        } else if !state.is_active && prev.is_active {
            info!("vortex ring condition cleared");
        }

        let degraded = state.is_degraded();
        if degraded && !self.was_degraded {
            warn!("pressure ring unusable, descent-rate-only detection");
            self.warnings
                .push("Pressure data invalid: descent-rate-only detection (low confidence)");
        }
        self.was_degraded = degraded;
    }

    // ── Accessors ──

    #[inline]
    pub fn last_state(&self) -> &VortexRingState {
        &self.last_state
    }

    #[inline]
    pub fn confidence(&self) -> f64 {
        self.last_state.confidence
    }

    pub fn warnings(&self) -> &WarningLog {
        &self.warnings
    }

    /// Oldest-first descent rate history.
    pub fn descent_history(&self) -> Vec<f64> {
        self.descent_history.oldest_ordered().copied().collect()
    }

    /// Oldest-first mean ring pressure history.
    pub fn pressure_history(&self) -> Vec<f64> {
        self.pressure_history.oldest_ordered().copied().collect()
    }

    /// Average change in vertical speed per sample over the history.
    ///
    /// Negative when the descent is steepening. `None` with fewer than two
    /// samples.
    pub fn descent_rate_trend(&self) -> Option<f64> {
        let n = self.descent_history.len();
        if n < 2 {
            return None;
        }
        let oldest = *self.descent_history.oldest_ordered().next()?;
        let newest = *self.descent_history.recent()?;
        Some((newest - oldest) / (n - 1) as f64)
    }

    pub fn reset(&mut self) {
        self.last_state = VortexRingState::default();
        self.onset = None;
        self.was_degraded = false;
        self.pressure_history.clear();
        self.descent_history.clear();
        self.warnings.clear();
    }
}

impl Default for VortexRingDetector {
    fn default() -> Self {
        Self::new(DetectionMethod::MultiSensorFusion)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
