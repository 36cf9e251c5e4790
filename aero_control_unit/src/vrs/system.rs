//! VRS protection supervisor.
//!
//! One cycle = detect → recover → actuate → account. Runs at 10 ms.
//! Timing overruns decay the health score. Repeated actuator rejections
//! and recovery timeouts escalate to emergency mode. Nothing here fails
//! the cycle.

use super::analyzer::VortexFlowAnalyzer;
use super::blade::BladeControlInterface;
use super::detector::VortexRingDetector;
use super::recovery::{
    RecoveryTiming, RecoveryTransition, VortexRecoveryController, execute_recovery_maneuver,
};
use crate::error::VrsFault;
use aero_common::cycle::DeadlineMonitor;
use aero_common::subsystem::{Subsystem, SubsystemError, SubsystemStatus};
use aero_common::vrs::{
    ControlAxes, ControlCommand, DetectionMethod, FlightConditions, PressureSensorData,
    RecoveryStrategy, RotorState, StrategySelection, VortexRingState, VrsConfig,
};
use aero_common::warnings::WarningLog;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const NAME: &str = "vrs";

/// Severity used when exercising the recovery table in diagnostics.
const TEST_SEVERITY: f64 = 0.5;

/// Per-cycle sensor snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VrsInput {
    pub rotor: RotorState,
    pub flight: FlightConditions,
    pub pressure: PressureSensorData,
}

/// Result of `run_system_diagnostics`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VrsDiagnostics {
    pub detector_ok: bool,
    pub analyzer_ok: bool,
    pub controller_ok: bool,
    pub interface_ok: bool,
}

impl VrsDiagnostics {
    pub fn all_ok(&self) -> bool {
        self.detector_ok && self.analyzer_ok && self.controller_ok && self.interface_ok
    }
}

pub struct VortexShieldSystem {
    config: VrsConfig,
    detector: VortexRingDetector,
    analyzer: VortexFlowAnalyzer,
    recovery: VortexRecoveryController,
    blade: BladeControlInterface,

    state: VortexRingState,
    last_rotor: RotorState,
    last_update: Option<Instant>,
    growth_rate: f64,

    initialized: bool,
    synced: bool,
    automatic_recovery: bool,
    emergency: bool,
    protection_level: f64,
    faults: VrsFault,
    consecutive_rejections: u32,

    deadline: DeadlineMonitor,
    warnings: WarningLog,
    cycles: u64,
}

fn secs(value: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(fallback)
}

impl VortexShieldSystem {
    pub fn new(config: VrsConfig) -> Self {
        let defaults = RecoveryTiming::default();
        let timing = RecoveryTiming {
            debounce: secs(config.debounce_s, defaults.debounce),
            nominal: secs(config.nominal_recovery_s, defaults.nominal),
            cap: secs(config.max_recovery_s, defaults.cap),
        };
        let period = Duration::from_micros(config.cycle_time_us);
        let rotor = RotorState::default();

        let mut detector = VortexRingDetector::new(config.detection_method);
        detector.set_sensitivity(config.protection_level);

        Self {
            detector,
            analyzer: VortexFlowAnalyzer::new(rotor.rotor_radius, rotor.num_blades),
            recovery: VortexRecoveryController::new(config.strategy, config.aggression, timing),
            blade: BladeControlInterface::new(
                rotor.num_blades,
                config.actuator_max_rate_deg_s,
                period,
            ),
            state: VortexRingState::default(),
            last_rotor: rotor,
            last_update: None,
            growth_rate: 0.0,
            initialized: false,
            synced: false,
            automatic_recovery: config.automatic_recovery,
            emergency: false,
            protection_level: config.protection_level.clamp(0.0, 1.0),
            faults: VrsFault::empty(),
            consecutive_rejections: 0,
            deadline: DeadlineMonitor::new(period),
            warnings: WarningLog::new(),
            cycles: 0,
            config,
        }
    }

    // ─── Cycle ──────────────────────────────────────────────────────

    /// Run one protection cycle and return the deltas the cockpit
    /// actuators actually applied, after envelope and rate limiting.
    pub fn update_vortex_protection(
        &mut self,
        rotor: &RotorState,
        flight: &FlightConditions,
        pressure: &PressureSensorData,
        now: Instant,
    ) -> ControlCommand {
        if !self.initialized {
            self.warnings.push("update called before initialize");
            return ControlCommand::hold();
        }
        let started = Instant::now();

        if !self.synced {
            self.blade.sync_from_rotor(rotor);
            self.synced = true;
        }
        self.last_rotor = *rotor;

        self.state = self
            .detector
            .detect_vortex_ring_state(rotor, flight, pressure, now);
        self.faults
            .set(VrsFault::SENSOR_DEGRADED, self.state.is_degraded());

        let command = if self.automatic_recovery {
            let command = self.recovery.update(&self.state, now);
            if self.recovery.last_transition() == Some(RecoveryTransition::TimedOut) {
                self.handle_recovery_timeout();
            }
            command
        } else {
            ControlCommand::hold()
        };

        if self.state.is_active {
            self.analyzer.calculate_vortex_field(rotor);
            self.growth_rate = self.analyzer.predict_vortex_growth_rate(&self.state, now);
        } else {
            self.growth_rate = 0.0;
        }

        let applied = self.apply(&command, now);

        self.record_cycle_time(started.elapsed());
        self.last_update = Some(now);
        self.cycles += 1;
        applied
    }

    fn apply(&mut self, command: &ControlCommand, now: Instant) -> ControlCommand {
        let accepted = self.blade.execute_control_command(command, now);
        let applied = self.blade.last_report().moved;
        if accepted {
            self.consecutive_rejections = 0;
            self.faults.remove(VrsFault::ACTUATOR_REJECTED);
            return applied;
        }
        self.consecutive_rejections += 1;
        self.faults.insert(VrsFault::ACTUATOR_REJECTED);
        let rejected = self.blade.last_report().rejected;
        self.warnings
            .push(format!("Control channels rejected command: {rejected:?}"));

        let limit = self.config.escalate_after_rejections.max(1);
        if !self.emergency && self.consecutive_rejections >= limit {
            warn!(
                cycles = self.consecutive_rejections,
                "repeated actuator rejections, escalating"
            );
            self.set_emergency_mode(true);
        }
        applied
    }

    fn handle_recovery_timeout(&mut self) {
        self.faults.insert(VrsFault::RECOVERY_TIMEOUT);
        self.warnings.push(format!(
            "Recovery exceeded {:.1} s cap, forced to standby",
            self.config.max_recovery_s
        ));
        if !self.emergency {
            self.set_emergency_mode(true);
        }
    }

    /// Feed one measured cycle duration into the deadline monitor.
    pub fn record_cycle_time(&mut self, elapsed: Duration) {
        let overrun = self.deadline.record(elapsed);
        self.faults.set(VrsFault::CYCLE_OVERRUN, overrun);
        if overrun {
            debug!(elapsed_us = elapsed.as_micros() as u64, "vrs cycle overrun");
            self.warnings.push("VRS cycle overrun");
        }
    }

    // ─── Mode switches ──────────────────────────────────────────────

    pub fn enable_automatic_recovery(&mut self, enable: bool) {
        if !enable {
            self.recovery.reset();
        }
        self.automatic_recovery = enable;
        info!(enable, "automatic recovery");
    }

    /// Detector sensitivity in [0, 1]. Non-finite values are ignored.
    pub fn set_protection_level(&mut self, level: f64) {
        if !level.is_finite() {
            return;
        }
        self.protection_level = level.clamp(0.0, 1.0);
        if !self.emergency {
            self.detector.set_sensitivity(self.protection_level);
        }
        info!(level = self.protection_level, "protection level set");
    }

    /// Emergency mode runs the detector and recovery at full sensitivity
    /// and aggression. Leaving it restores the configured values and clears
    /// latched faults.
    pub fn set_emergency_mode(&mut self, emergency: bool) {
        self.emergency = emergency;
        if emergency {
            self.detector.set_sensitivity(1.0);
            self.recovery.set_aggression_level(1.0);
            warn!("VRS emergency mode activated");
        } else {
            self.detector.set_sensitivity(self.protection_level);
            self.recovery.set_aggression_level(self.config.aggression);
            self.faults.remove(VrsFault::RECOVERY_TIMEOUT);
            self.consecutive_rejections = 0;
            info!("VRS emergency mode deactivated");
        }
    }

    pub fn set_recovery_strategy(&mut self, selection: StrategySelection) {
        self.recovery.set_recovery_strategy(selection);
    }

    pub fn set_detection_method(&mut self, method: DetectionMethod) {
        self.detector.set_detection_method(method);
    }

    /// Fault injection / maintenance hook for the cockpit channels.
    pub fn set_actuator_health(&mut self, axes: ControlAxes, healthy: bool) {
        self.blade.set_actuator_health(axes, healthy);
        if !healthy {
            warn!(?axes, "control channel marked unhealthy");
        }
    }

    // ─── Monitoring ─────────────────────────────────────────────────

    #[inline]
    pub fn is_vortex_ring_detected(&self) -> bool {
        self.state.is_active
    }

    #[inline]
    pub fn vortex_state(&self) -> &VortexRingState {
        &self.state
    }

    #[inline]
    pub fn is_recovery_in_progress(&self) -> bool {
        self.recovery.is_recovery_active()
    }

    #[inline]
    pub fn is_emergency_mode(&self) -> bool {
        self.emergency
    }

    #[inline]
    pub fn protection_level(&self) -> f64 {
        self.protection_level
    }

    #[inline]
    pub fn faults(&self) -> VrsFault {
        self.faults
    }

    /// Circulation growth rate from the last active cycle [m²/s²].
    #[inline]
    pub fn vortex_growth_rate(&self) -> f64 {
        self.growth_rate
    }

    /// Weighted health in [0, 1]: 0.4 detection confidence, 0.3 recovery
    /// progress headroom, 0.3 healthy channel share, scaled by the timing
    /// factor. Zero while a critical fault is latched.
    pub fn system_health(&self) -> f64 {
        if !self.initialized || self.faults.has_critical() {
            return 0.0;
        }
        let detection = self.detector.confidence();
        let recovery = match self.last_update {
            Some(now) if self.recovery.is_recovery_active() => {
                1.0 - self.recovery.recovery_progress(now)
            }
            _ => 1.0,
        };
        let channels = self.blade.healthy_channels().bits().count_ones() as f64
            / ControlAxes::ALL.bits().count_ones() as f64;
        let health = 0.4 * detection + 0.3 * recovery + 0.3 * channels;
        (health * self.deadline.health_factor()).clamp(0.0, 1.0)
    }

    pub fn detector(&self) -> &VortexRingDetector {
        &self.detector
    }

    pub fn analyzer(&self) -> &VortexFlowAnalyzer {
        &self.analyzer
    }

    pub fn recovery_controller(&self) -> &VortexRecoveryController {
        &self.recovery
    }

    pub fn blade_interface(&self) -> &BladeControlInterface {
        &self.blade
    }

    // ─── Diagnostics ────────────────────────────────────────────────

    pub fn run_system_diagnostics(&mut self) -> VrsDiagnostics {
        let field = self.analyzer.calculate_vortex_field(&self.last_rotor);
        let analyzer_ok = !field.is_empty() && field.iter().all(|v| v.norm().is_finite());
        let controller_ok = match self.last_update {
            Some(now) if self.recovery.is_recovery_active() => {
                self.recovery.recovery_progress(now) > 0.0
            }
            _ => true,
        };
        let report = VrsDiagnostics {
            detector_ok: self.detector.confidence() > 0.0,
            analyzer_ok,
            controller_ok,
            interface_ok: self.blade.is_healthy(),
        };
        if report.all_ok() {
            info!("VRS diagnostics passed");
        } else {
            warn!(?report, "VRS diagnostics degraded");
            self.warnings.push(format!("Diagnostics degraded: {report:?}"));
        }
        report
    }

    /// Clear detector histories so trends restart from fresh samples.
    pub fn calibrate_sensors(&mut self) {
        self.detector.reset();
        self.state = VortexRingState::default();
        info!("pressure sensor histories cleared");
    }

    /// Command each strategy would produce at moderate severity with the
    /// current aggression. Does not touch the actuators.
    pub fn test_recovery_procedures(&self) -> Vec<(RecoveryStrategy, ControlCommand)> {
        const ALL: [RecoveryStrategy; 6] = [
            RecoveryStrategy::CollectiveReduction,
            RecoveryStrategy::ForwardTranslation,
            RecoveryStrategy::LateralMotion,
            RecoveryStrategy::AltitudeGain,
            RecoveryStrategy::EmergencyPower,
            RecoveryStrategy::CombinedManeuver,
        ];
        let aggression = self.recovery.aggression_level();
        ALL.iter()
            .map(|&s| (s, execute_recovery_maneuver(s, TEST_SEVERITY, aggression)))
            .collect()
    }
}

impl Subsystem for VortexShieldSystem {
    type Input = VrsInput;
    type Output = ControlCommand;

    fn name(&self) -> &'static str {
        NAME
    }

    fn initialize(&mut self) -> Result<(), SubsystemError> {
        self.config
            .validate()
            .map_err(|reason| SubsystemError::InvalidConfig { name: NAME, reason })?;
        self.detector.set_detection_method(self.config.detection_method);
        self.detector.set_sensitivity(self.protection_level);
        self.recovery.reset();
        self.synced = false;
        self.initialized = true;
        info!(
            method = ?self.config.detection_method,
            protection = self.protection_level,
            aggression = self.config.aggression,
            "VRS protection initialized"
        );
        Ok(())
    }

    fn update(&mut self, input: &VrsInput, now: Instant) -> ControlCommand {
        self.update_vortex_protection(&input.rotor, &input.flight, &input.pressure, now)
    }

    fn shutdown(&mut self) {
        self.recovery.reset();
        if !self.blade.command_neutral() {
            warn!(
                unhealthy = ?(ControlAxes::ALL - self.blade.healthy_channels()),
                "could not neutralize every control channel"
            );
        }
        self.emergency = false;
        self.initialized = false;
        info!(cycles = self.cycles, "VRS protection shut down");
    }

    fn is_healthy(&self) -> bool {
        self.initialized && !self.faults.has_critical() && self.blade.is_healthy()
    }

    fn warnings(&self) -> Vec<String> {
        let mut all = self.detector.warnings().to_vec();
        all.extend(self.warnings.to_vec());
        all
    }

    fn status(&self) -> SubsystemStatus {
        let mode = match (self.emergency, self.recovery.current_strategy()) {
            (true, _) => "emergency".to_string(),
            (false, Some(strategy)) => format!("recovering:{strategy:?}"),
            (false, None) => "normal".to_string(),
        };
        SubsystemStatus {
            name: NAME,
            initialized: self.initialized,
            healthy: self.is_healthy(),
            health: self.system_health(),
            mode,
            condition_active: self.state.is_active,
            cycles: self.cycles,
            overruns: self.deadline.total_overruns(),
            warnings: self.detector.warnings().len() + self.warnings.len(),
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD: Duration = Duration::from_millis(10);

    fn system() -> VortexShieldSystem {
        let mut sys = VortexShieldSystem::new(VrsConfig::default());
        sys.initialize().expect("default config is valid");
        sys
    }

    fn descending(vs: f64) -> VrsInput {
        VrsInput {
            flight: FlightConditions {
                vertical_speed: vs,
                airspeed: 0.0,
                ..FlightConditions::default()
            },
            ..VrsInput::default()
        }
    }

    fn cruise() -> VrsInput {
        VrsInput {
            flight: FlightConditions {
                vertical_speed: 0.0,
                airspeed: 50.0,
                ..FlightConditions::default()
            },
            ..VrsInput::default()
        }
    }

    #[test]
    fn update_before_initialize_holds() {
        let mut sys = VortexShieldSystem::new(VrsConfig::default());
        let cmd = sys.update(&descending(-15.0), Instant::now());
        assert!(cmd.is_zero());
        assert!(!sys.is_healthy());
        assert_eq!(sys.status().cycles, 0);
    }

    #[test]
    fn invalid_config_rejected() {
        let config = VrsConfig {
            aggression: 2.0,
            ..VrsConfig::default()
        };
        let mut sys = VortexShieldSystem::new(config);
        assert!(matches!(
            sys.initialize(),
            Err(SubsystemError::InvalidConfig { name: "vrs", .. })
        ));
    }

    #[test]
    fn steep_descent_commands_emergency_power() {
        let mut sys = system();
        let cmd = sys.update(&descending(-15.0), Instant::now());
        assert!(sys.is_vortex_ring_detected());
        assert!(sys.is_recovery_in_progress());
        assert_eq!(cmd.strategy, Some(RecoveryStrategy::EmergencyPower));
        assert!(cmd.emergency_action);
        assert!(cmd.collective_adjustment > 0.0);
        assert!(sys.blade_interface().positions().collective > 0.0);
        assert!(sys.status().mode.starts_with("recovering"));
    }

    #[test]
    fn returned_command_is_the_rate_limited_one() {
        let mut sys = system();
        let cmd = sys.update(&descending(-15.0), Instant::now());
        let max_step = VrsConfig::default().actuator_max_rate_deg_s * PERIOD.as_secs_f64();
        for delta in [
            cmd.collective_adjustment,
            cmd.lateral_cyclic_adjustment,
            cmd.longitudinal_cyclic_adjustment,
            cmd.pedal_adjustment,
        ] {
            assert!(delta.abs() <= max_step + 1e-12, "delta {delta}");
        }
        // Emergency power asks for several degrees of collective.
        assert!((cmd.collective_adjustment - max_step).abs() < 1e-9);
        let synced = RotorState::default().collective_pitch;
        let collective = sys.blade_interface().positions().collective;
        assert!((collective - synced - cmd.collective_adjustment).abs() < 1e-12);
    }

    #[test]
    fn cruise_stays_in_standby() {
        let mut sys = system();
        let mut now = Instant::now();
        for _ in 0..10 {
            let cmd = sys.update(&cruise(), now);
            assert!(cmd.is_zero());
            now += PERIOD;
        }
        assert!(!sys.is_recovery_in_progress());
        assert!(sys.is_healthy());
        assert!(sys.system_health() > 0.9);
    }

    #[test]
    fn automatic_recovery_disabled_holds() {
        let mut sys = system();
        sys.enable_automatic_recovery(false);
        let cmd = sys.update(&descending(-15.0), Instant::now());
        assert!(sys.is_vortex_ring_detected());
        assert!(cmd.is_zero());
        assert!(!sys.is_recovery_in_progress());
    }

    #[test]
    fn recovery_exits_after_debounce() {
        let mut sys = system();
        let t0 = Instant::now();
        sys.update(&descending(-15.0), t0);
        let mut now = t0;
        for _ in 0..74 {
            now += PERIOD;
            sys.update(&cruise(), now);
        }
        assert!(sys.is_recovery_in_progress(), "still debouncing");
        now += Duration::from_millis(20);
        sys.update(&cruise(), now);
        assert!(!sys.is_recovery_in_progress());
        assert!(!sys.is_emergency_mode());
    }

    #[test]
    fn recovery_timeout_escalates() {
        let mut sys = system();
        let t0 = Instant::now();
        let mut now = t0;
        while now.duration_since(t0) <= Duration::from_secs(10) {
            sys.update(&descending(-15.0), now);
            now += Duration::from_millis(100);
        }
        assert!(sys.faults().contains(VrsFault::RECOVERY_TIMEOUT));
        assert!(sys.is_emergency_mode());
        assert!(!sys.is_healthy());
        assert_eq!(sys.system_health(), 0.0);
        assert_eq!(sys.recovery_controller().timeouts(), 1);

        sys.set_emergency_mode(false);
        assert!(!sys.faults().contains(VrsFault::RECOVERY_TIMEOUT));
        assert_eq!(sys.detector().sensitivity(), 0.7);
    }

    #[test]
    fn repeated_rejections_escalate() {
        let mut sys = system();
        sys.set_actuator_health(ControlAxes::PEDAL, false);
        let mut now = Instant::now();
        for _ in 0..3 {
            sys.update(&descending(-15.0), now);
            now += PERIOD;
        }
        assert!(sys.faults().contains(VrsFault::ACTUATOR_REJECTED));
        assert!(sys.is_emergency_mode());
        assert!(sys.recovery_controller().aggression_level() == 1.0);
        assert!(sys.blade_interface().positions().collective > 0.0);
        assert!(
            sys.warnings()
                .iter()
                .any(|w| w.starts_with("Control channels rejected"))
        );
    }

    #[test]
    fn emergency_mode_maxes_sensitivity() {
        let mut sys = system();
        sys.set_emergency_mode(true);
        assert_eq!(sys.detector().sensitivity(), 1.0);
        assert_eq!(sys.recovery_controller().aggression_level(), 1.0);
        sys.set_protection_level(0.2);
        assert_eq!(sys.detector().sensitivity(), 1.0);
        sys.set_emergency_mode(false);
        assert!((sys.detector().sensitivity() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn overruns_decay_health() {
        let mut sys = system();
        sys.update(&cruise(), Instant::now());
        let before = sys.system_health();
        for _ in 0..5 {
            sys.record_cycle_time(Duration::from_millis(50));
        }
        assert!(sys.faults().contains(VrsFault::CYCLE_OVERRUN));
        assert!(sys.system_health() < before);
        assert_eq!(sys.status().overruns, 5);
        assert!(sys.is_healthy(), "overruns alone are not critical");
    }

    #[test]
    fn shutdown_neutralizes_controls() {
        let mut sys = system();
        sys.update(&descending(-15.0), Instant::now());
        assert!(sys.blade_interface().positions().collective != 0.0);
        sys.shutdown();
        assert_eq!(sys.blade_interface().positions().collective, 0.0);
        assert!(!sys.is_recovery_in_progress());
        assert!(!sys.status().initialized);
    }

    #[test]
    fn diagnostics_and_procedures() {
        let mut sys = system();
        sys.update(&cruise(), Instant::now());
        assert!(sys.run_system_diagnostics().all_ok());

        let table = sys.test_recovery_procedures();
        assert_eq!(table.len(), 6);
        assert!(table.iter().all(|(s, c)| c.strategy == Some(*s)));
        assert!(table.iter().all(|(_, c)| c.within_envelope()));

        sys.set_actuator_health(ControlAxes::COLLECTIVE, false);
        assert!(!sys.run_system_diagnostics().interface_ok);
    }

    #[test]
    fn degraded_pressure_sets_fault_and_warns_once() {
        let mut sys = system();
        let mut input = cruise();
        input.pressure = PressureSensorData::invalid();
        let mut now = Instant::now();
        for _ in 0..5 {
            sys.update(&input, now);
            now += PERIOD;
        }
        assert!(sys.faults().contains(VrsFault::SENSOR_DEGRADED));
        let degraded = sys
            .warnings()
            .iter()
            .filter(|w| w.starts_with("Pressure data invalid"))
            .count();
        assert_eq!(degraded, 1);
    }
}
