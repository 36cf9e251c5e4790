//! Adaptive rotor supervisor.
//!
//! 1 ms cycle: element aerodynamics → resonance detection → control law →
//! optional optimizer step → servo batch → health accounting. Blade
//! elements, the servo table and both command buffers are allocated once
//! at construction.
//!
//! The excessive-vibration fault follows the filtered vibration level, so
//! a single spike does not trip it. Warnings are logged when a fault is
//! raised, not on every cycle it persists.

use super::CommandBuffer;
use super::controller::{AdaptiveController, calculate_blade_efficiency};
use super::filters::VibrationFilter;
use super::optimizer::RealTimeOptimizer;
use super::servo::MicroServoArray;
use crate::error::RotorFault;
use aero_common::cycle::DeadlineMonitor;
use aero_common::rotor::{
    AdaptationMode, BladeElement, ResonanceCondition, RotorConfig, RotorState, ServoCommand,
    VibrationData,
};
use aero_common::subsystem::{Subsystem, SubsystemError, SubsystemStatus};
use aero_common::warnings::WarningLog;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{info, warn};

const NAME: &str = "rotor";

/// Resonance scan sweep [Hz].
const SCAN_START_HZ: u32 = 10;
const SCAN_END_HZ: u32 = 200;
const SCAN_STEP_HZ: usize = 10;

/// Per-cycle sensor snapshot.
#[derive(Debug, PartialEq, Default)]
pub struct RotorInput {
    pub rotor: RotorState,
    pub vibrations: Vec<VibrationData>,
}

impl Clone for RotorInput {
    fn clone(&self) -> Self {
        Self {
            rotor: self.rotor,
            vibrations: self.vibrations.clone(),
        }
    }

    /// Keeps the existing vibration allocation when it is large enough.
    fn clone_from(&mut self, source: &Self) {
        self.rotor = source.rotor;
        self.vibrations.clone_from(&source.vibrations);
    }
}

/// Servo accounting of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ServoBatch {
    pub requested: usize,
    pub applied: usize,
}

/// One point of `perform_resonance_scan`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ResonanceScanPoint {
    pub frequency: f64,
    /// Nearest blade-passing harmonic (1..=5).
    pub nearest_harmonic: u8,
    /// Distance to that harmonic [Hz].
    pub margin_hz: f64,
    /// Inside the resonance tolerance band.
    pub at_risk: bool,
}

/// Result of `run_system_diagnostics`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RotorDiagnostics {
    pub healthy_servos: usize,
    pub total_servos: usize,
    pub resonance_active: bool,
    pub efficiency: f64,
    pub optimizer_converged: bool,
}

pub struct AdaptiveRotorSystem {
    config: RotorConfig,
    controller: AdaptiveController,
    servos: MicroServoArray,
    optimizer: RealTimeOptimizer,
    elements: Vec<BladeElement>,
    vibrations: Vec<VibrationData>,
    filter: VibrationFilter,
    requests: CommandBuffer,
    applied: CommandBuffer,

    resonance: ResonanceCondition,
    efficiency: f64,
    peak_vibration: f64,
    reported_failed: usize,

    initialized: bool,
    automatic_optimization: bool,
    emergency: bool,
    faults: RotorFault,
    deadline: DeadlineMonitor,
    warnings: WarningLog,
    cycles: u64,
}

impl AdaptiveRotorSystem {
    pub fn new(config: RotorConfig) -> Self {
        let per_blade = usize::from(config.elements_per_blade);
        let elements = (0..config.servo_count())
            .map(|i| BladeElement::at_station(i % per_blade.max(1), per_blade))
            .collect();
        let period = Duration::from_micros(config.cycle_time_us);
        let sample_rate = 1.0e6 / config.cycle_time_us.max(1) as f64;

        Self {
            controller: AdaptiveController::new(&config),
            servos: MicroServoArray::new(
                config.num_blades,
                config.elements_per_blade,
                config.servo_max_deflection_deg,
                config.servo_max_rate_deg_s,
                period,
            ),
            optimizer: RealTimeOptimizer::new(&config),
            elements,
            vibrations: Vec::with_capacity(64),
            filter: VibrationFilter::new(
                config.notch_bandwidth_hz,
                config.vibration_lowpass_hz,
                sample_rate,
            ),
            requests: CommandBuffer::new(),
            applied: CommandBuffer::new(),
            resonance: ResonanceCondition::default(),
            efficiency: 0.0,
            peak_vibration: 0.0,
            reported_failed: 0,
            initialized: false,
            automatic_optimization: config.automatic_optimization,
            emergency: config.mode == AdaptationMode::EmergencyAdaptation,
            faults: RotorFault::empty(),
            deadline: DeadlineMonitor::new(period),
            warnings: WarningLog::new(),
            cycles: 0,
            config,
        }
    }

    // ─── Cycle ──────────────────────────────────────────────────────

    /// Run one adaptation cycle. Returns the servo deltas that were
    /// actually applied.
    pub fn update_rotor_control(
        &mut self,
        rotor: &RotorState,
        vibrations: &[VibrationData],
        now: Instant,
    ) -> &[ServoCommand] {
        if !self.initialized {
            self.warnings.push("update called before initialize");
            self.requests.clear();
            self.applied.clear();
            return &self.applied;
        }
        let started = Instant::now();

        self.vibrations.clear();
        self.vibrations.extend_from_slice(vibrations);
        self.update_blade_elements(rotor);

        self.peak_vibration = vibrations
            .iter()
            .map(|v| v.amplitude.abs())
            .filter(|a| a.is_finite())
            .fold(0.0, f64::max);
        self.filter.retune(rotor.blade_passing_frequency());
        self.filter
            .apply(self.peak_vibration, self.deadline.budget().as_secs_f64());

        self.resonance = self.controller.detect_resonance(vibrations, rotor);
        self.controller
            .compute_adaptive_commands(&self.elements, vibrations, &mut self.requests);
        if self.automatic_optimization && !self.emergency {
            self.optimizer.optimize_blade_configuration(
                &self.elements,
                vibrations,
                &mut self.requests,
            );
        }

        self.servos
            .execute_batch_commands(&self.requests, now, &mut self.applied);
        self.efficiency = calculate_blade_efficiency(&self.elements);

        self.monitor_system_health();
        self.record_cycle_time(started.elapsed());
        self.cycles += 1;
        &self.applied
    }

    /// Element kinematics and thin-airfoil coefficients from rotor state
    /// plus current servo positions.
    fn update_blade_elements(&mut self, rotor: &RotorState) {
        let per_blade = usize::from(self.config.elements_per_blade.max(1));
        let omega = rotor.omega();
        for (i, element) in self.elements.iter_mut().enumerate() {
            let servo = self
                .servos
                .servo_position((i / per_blade) as u8, (i % per_blade) as u8)
                .unwrap_or_default();
            element.pitch = servo.pitch;
            element.flap_deflection = servo.flap;
            element.torsion = servo.torsion;

            let radius = element.radial_position * rotor.rotor_radius;
            let tangential = omega * radius;
            element.local_velocity = tangential.hypot(rotor.forward_speed);

            let inflow = rotor.vertical_speed.atan2(tangential);
            let aoa = (rotor.collective_pitch + element.twist + element.pitch + element.torsion)
                .to_radians()
                - inflow;
            element.angle_of_attack = if aoa.is_finite() { aoa } else { 0.0 };
            element.lift_coefficient = 2.0 * std::f64::consts::PI * element.angle_of_attack;
            element.drag_coefficient = 0.01 + 0.05 * element.angle_of_attack.powi(2);
            element.moment_coefficient = -0.1 * element.angle_of_attack;
            element.bending_moment = 0.5
                * rotor.air_density
                * element.local_velocity.powi(2)
                * element.chord
                * element.lift_coefficient
                * radius;
        }
    }

    fn monitor_system_health(&mut self) {
        let previous = self.faults;
        let failed = self.servos.servo_count() - self.servos.healthy_servo_count();
        self.faults.set(
            RotorFault::SERVO_FAILURE,
            failed > 0 || self.applied.len() < self.requests.len(),
        );
        self.faults.set(
            RotorFault::EXCESSIVE_VIBRATION,
            self.filter.output() > self.config.vibration_warning_g,
        );
        self.faults.set(RotorFault::RESONANCE, self.resonance.active);
        self.report_transitions(previous, failed);
    }

    /// Edge-triggered warnings so a persisting fault logs once. A servo
    /// failure is reported again only when more servos drop out.
    fn report_transitions(&mut self, previous: RotorFault, failed: usize) {
        let raised = self.faults.difference(previous);
        let cleared = previous.difference(self.faults);

        let more_failed = failed > self.reported_failed;
        self.reported_failed = failed;
        if raised.contains(RotorFault::SERVO_FAILURE) || more_failed {
            let total = self.servos.servo_count();
            warn!(failed, total, "servo failure");
            self.warnings.push(format!(
                "Servo failure: {} of {} servos unhealthy, {} of {} commands applied",
                failed,
                total,
                self.applied.len(),
                self.requests.len()
            ));
        }
        if raised.contains(RotorFault::EXCESSIVE_VIBRATION) {
            let level = self.filter.output();
            warn!(level_g = level, peak_g = self.peak_vibration, "excessive vibration");
            self.warnings
                .push(format!("Excessive vibration detected: {level:.2} g"));
        }
        if raised.contains(RotorFault::RESONANCE) {
            self.warnings.push(format!(
                "Resonance condition at {:.1} Hz (harmonic {})",
                self.resonance.frequency, self.resonance.harmonic
            ));
        }
        if !cleared.is_empty() {
            info!(cleared = ?cleared, "rotor faults cleared");
        }
    }

    /// Feed one measured cycle duration into the deadline monitor.
    pub fn record_cycle_time(&mut self, elapsed: Duration) {
        let overrun = self.deadline.record(elapsed);
        if overrun && !self.faults.contains(RotorFault::CYCLE_OVERRUN) {
            warn!(elapsed_us = elapsed.as_micros() as u64, "rotor cycle overrun");
            self.warnings.push(format!(
                "Update time exceeded target: {} us",
                elapsed.as_micros()
            ));
        }
        self.faults.set(RotorFault::CYCLE_OVERRUN, overrun);
    }

    // ─── Mode switches ──────────────────────────────────────────────

    pub fn set_adaptation_mode(&mut self, mode: AdaptationMode) {
        self.controller.set_adaptation_mode(mode);
        self.emergency = mode == AdaptationMode::EmergencyAdaptation;
    }

    #[inline]
    pub fn adaptation_mode(&self) -> AdaptationMode {
        self.controller.adaptation_mode()
    }

    pub fn set_automatic_optimization(&mut self, enable: bool) {
        self.automatic_optimization = enable;
        if enable {
            self.optimizer.reset();
        }
        info!(enable, "automatic optimization");
    }

    /// Emergency adaptation unloads the blades and suspends the optimizer.
    /// Leaving it returns to the configured mode, or to vibration
    /// suppression if emergency was configured.
    pub fn set_emergency_mode(&mut self, emergency: bool) {
        if emergency {
            warn!("rotor emergency adaptation activated");
            self.set_adaptation_mode(AdaptationMode::EmergencyAdaptation);
        } else {
            let mode = match self.config.mode {
                AdaptationMode::EmergencyAdaptation => AdaptationMode::ActiveVibrationSuppression,
                configured => configured,
            };
            self.set_adaptation_mode(mode);
            info!(?mode, "rotor emergency adaptation deactivated");
        }
    }

    /// Fault injection / maintenance hook.
    pub fn set_servo_health(&mut self, blade: u8, element: u8, healthy: bool) -> bool {
        self.servos.set_servo_health(blade, element, healthy).is_ok()
    }

    // ─── Monitoring ─────────────────────────────────────────────────

    #[inline]
    pub fn is_emergency_mode(&self) -> bool {
        self.emergency
    }

    #[inline]
    pub fn faults(&self) -> RotorFault {
        self.faults
    }

    #[inline]
    pub fn system_efficiency(&self) -> f64 {
        self.efficiency
    }

    /// Samples from the last cycle.
    pub fn vibration_levels(&self) -> &[VibrationData] {
        &self.vibrations
    }

    /// Servo deltas applied in the last cycle.
    pub fn last_applied(&self) -> &[ServoCommand] {
        &self.applied
    }

    /// Peak level after the notch + low-pass chain [g]. Drives the
    /// excessive-vibration fault.
    #[inline]
    pub fn filtered_vibration_level(&self) -> f64 {
        self.filter.output()
    }

    #[inline]
    pub fn resonance(&self) -> &ResonanceCondition {
        &self.resonance
    }

    pub fn blade_elements(&self) -> &[BladeElement] {
        &self.elements
    }

    pub fn servo_array(&self) -> &MicroServoArray {
        &self.servos
    }

    pub fn optimizer(&self) -> &RealTimeOptimizer {
        &self.optimizer
    }

    /// Healthy servo share, halved under resonance, scaled by timing.
    pub fn system_health(&self) -> f64 {
        if !self.initialized {
            return 0.0;
        }
        let total = self.servos.servo_count().max(1) as f64;
        let servo = self.servos.healthy_servo_count() as f64 / total;
        let resonance = if self.resonance.active { 0.5 } else { 1.0 };
        let vibration = if self.faults.contains(RotorFault::EXCESSIVE_VIBRATION) {
            0.5
        } else {
            1.0
        };
        (servo * resonance * vibration * self.deadline.health_factor()).clamp(0.0, 1.0)
    }

    // ─── Diagnostics ────────────────────────────────────────────────

    pub fn run_system_diagnostics(&self) -> RotorDiagnostics {
        let report = RotorDiagnostics {
            healthy_servos: self.servos.healthy_servo_count(),
            total_servos: self.servos.servo_count(),
            resonance_active: self.resonance.active,
            efficiency: self.efficiency,
            optimizer_converged: self.optimizer.is_optimization_converged(),
        };
        info!(
            healthy = report.healthy_servos,
            total = report.total_servos,
            resonance = report.resonance_active,
            efficiency = report.efficiency,
            "rotor diagnostics"
        );
        report
    }

    /// Reset the vibration conditioning chain and the last samples.
    pub fn calibrate_sensors(&mut self) {
        self.filter.reset();
        self.vibrations.clear();
        self.peak_vibration = 0.0;
        info!("vibration sensors calibrated");
    }

    pub fn calibrate_servos(&mut self, now: Instant) {
        self.servos.calibrate_servos(now);
    }

    /// Sweep 10..=200 Hz in 10 Hz steps against the blade-passing
    /// harmonics of `rotor`.
    pub fn perform_resonance_scan(&self, rotor: &RotorState) -> Vec<ResonanceScanPoint> {
        let bpf = rotor.blade_passing_frequency();
        (SCAN_START_HZ..=SCAN_END_HZ)
            .step_by(SCAN_STEP_HZ)
            .map(|hz| {
                let frequency = f64::from(hz);
                let (nearest_harmonic, margin_hz) = (1..=super::controller::MAX_HARMONIC)
                    .map(|h| (h, (f64::from(h) * bpf - frequency).abs()))
                    .fold((1, f64::INFINITY), |best, cur| {
                        if cur.1 < best.1 { cur } else { best }
                    });
                ResonanceScanPoint {
                    frequency,
                    nearest_harmonic,
                    margin_hz,
                    at_risk: margin_hz < self.config.harmonic_tolerance_hz,
                }
            })
            .collect()
    }
}

impl Subsystem for AdaptiveRotorSystem {
    type Input = RotorInput;
    type Output = ServoBatch;

    fn name(&self) -> &'static str {
        NAME
    }

    fn initialize(&mut self) -> Result<(), SubsystemError> {
        self.config
            .validate()
            .map_err(|reason| SubsystemError::InvalidConfig { name: NAME, reason })?;
        self.optimizer.reset();
        self.filter.reset();
        self.faults = RotorFault::empty();
        self.reported_failed = 0;
        self.initialized = true;
        info!(
            blades = self.config.num_blades,
            elements = self.config.elements_per_blade,
            mode = ?self.controller.adaptation_mode(),
            "adaptive rotor initialized"
        );
        Ok(())
    }

    fn update(&mut self, input: &RotorInput, now: Instant) -> ServoBatch {
        let applied = self
            .update_rotor_control(&input.rotor, &input.vibrations, now)
            .len();
        ServoBatch {
            requested: self.requests.len(),
            applied,
        }
    }

    fn shutdown(&mut self) {
        let neutral = self.servos.command_neutral();
        let failed = self.servos.servo_count() - neutral;
        if failed > 0 {
            warn!(failed, "servos left out of neutral at shutdown");
        }
        self.initialized = false;
        info!(cycles = self.cycles, "adaptive rotor shut down");
    }

    fn is_healthy(&self) -> bool {
        self.initialized && !self.faults.has_critical()
    }

    fn warnings(&self) -> Vec<String> {
        self.warnings.to_vec()
    }

    fn status(&self) -> SubsystemStatus {
        SubsystemStatus {
            name: NAME,
            initialized: self.initialized,
            healthy: self.is_healthy(),
            health: self.system_health(),
            mode: format!("{:?}", self.controller.adaptation_mode()),
            condition_active: self.resonance.active,
            cycles: self.cycles,
            overruns: self.deadline.total_overruns(),
            warnings: self.warnings.len(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
