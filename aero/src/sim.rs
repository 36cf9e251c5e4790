//! Simulated sensor producers.
//!
//! [`FlightSimulator`] closes the loop around the VRS task: it integrates a
//! first-order vertical/forward speed model driven by a scripted pilot and
//! by the control deltas the VRS task publishes. [`SimulatedBios`] wraps the
//! BIOS context and corrupts it on a fixed schedule so the healing path is
//! exercised while the cluster runs.

use aero_bios::memory::RAM_BASE_ADDR;
use aero_bios::{BiosCheckReport, BiosContext, EnvironmentProbes};
use aero_common::consts::AIR_DENSITY_SEA_LEVEL;
use aero_common::rotor::{RotorState as BladeRotorState, VibrationData};
use aero_common::subsystem::{Subsystem, SubsystemError, SubsystemStatus};
use aero_common::vrs::{ControlCommand, FlightConditions, PressureSensorData, RotorState};
use aero_control_unit::rotor::RotorInput;
use aero_control_unit::vrs::VrsInput;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Time constant of the speed response [s].
const SPEED_TAU_S: f64 = 1.0;
/// Vertical speed gained per degree of collective above trim [m/s].
const VS_PER_COLLECTIVE: f64 = 1.5;
/// Airspeed gained per degree of forward cyclic [m/s].
const AIRSPEED_PER_CYCLIC: f64 = 1.0;
/// Pilot trims collective back over this time constant [s].
const PILOT_TRIM_TAU_S: f64 = 5.0;
const TRIM_COLLECTIVE_DEG: f64 = 8.0;
const COLLECTIVE_RANGE_DEG: (f64, f64) = (0.0, 20.0);
/// Pressure lapse near sea level [Pa/m].
const PRESSURE_LAPSE_PA_M: f64 = 12.0;
const SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;

// ─── Flight sample ──────────────────────────────────────────────────

/// Everything the sensor layer publishes each cycle.
#[derive(Debug, Clone, Default)]
pub struct FlightSample {
    pub vrs: VrsInput,
    pub rotor: RotorInput,
    pub probes: EnvironmentProbes,
}

/// Scripted pilot: cruise, a steep low-speed descent, then level flight.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlightProfile {
    pub cruise_s: f64,
    pub descent_s: f64,
    pub cruise_airspeed: f64,
    pub descent_airspeed: f64,
    /// Commanded vertical speed during the descent [m/s], negative.
    pub descent_rate: f64,
    pub start_altitude: f64,
}

impl Default for FlightProfile {
    fn default() -> Self {
        Self {
            cruise_s: 5.0,
            descent_s: 20.0,
            cruise_airspeed: 25.0,
            descent_airspeed: 2.0,
            descent_rate: -14.0,
            start_altitude: 600.0,
        }
    }
}

impl FlightProfile {
    /// Pilot (vertical speed, airspeed) targets at `t` seconds.
    pub fn targets(&self, t: f64) -> (f64, f64) {
        if t < self.cruise_s {
            (0.0, self.cruise_airspeed)
        } else if t < self.cruise_s + self.descent_s {
            (self.descent_rate, self.descent_airspeed)
        } else {
            (0.0, self.cruise_airspeed)
        }
    }
}

// ─── Flight simulator ───────────────────────────────────────────────

/// Closed-loop flight model. Input is the newest VRS command (or a hold),
/// output is the next sensor sample.
pub struct FlightSimulator {
    profile: FlightProfile,
    dt: f64,
    t: f64,
    flight: FlightConditions,
    rotor: RotorState,
    initialized: bool,
    cycles: u64,
}

impl FlightSimulator {
    pub fn new(profile: FlightProfile, period: Duration) -> Self {
        Self {
            dt: period.as_secs_f64(),
            t: 0.0,
            flight: FlightConditions {
                airspeed: profile.cruise_airspeed,
                altitude: profile.start_altitude,
                pressure_altitude: profile.start_altitude,
                ..FlightConditions::default()
            },
            rotor: RotorState::default(),
            profile,
            initialized: false,
            cycles: 0,
        }
    }

    /// Advance one period under `command` and return the new sample.
    pub fn step(&mut self, command: &ControlCommand) -> FlightSample {
        let dt = self.dt;
        let (lo, hi) = COLLECTIVE_RANGE_DEG;
        let r = &mut self.rotor;
        r.collective_pitch = (r.collective_pitch + command.collective_adjustment).clamp(lo, hi);
        r.lateral_cyclic += command.lateral_cyclic_adjustment;
        r.longitudinal_cyclic += command.longitudinal_cyclic_adjustment;
        r.pedal_position += command.pedal_adjustment;

        let (pilot_vs, pilot_airspeed) = self.profile.targets(self.t);
        let vs_target = pilot_vs + VS_PER_COLLECTIVE * (r.collective_pitch - TRIM_COLLECTIVE_DEG);
        let airspeed_target = pilot_airspeed + AIRSPEED_PER_CYCLIC * r.longitudinal_cyclic;

        let f = &mut self.flight;
        f.vertical_speed += (vs_target - f.vertical_speed) * dt / SPEED_TAU_S;
        f.airspeed = (f.airspeed + (airspeed_target - f.airspeed) * dt / SPEED_TAU_S).max(0.0);
        f.altitude = (f.altitude + f.vertical_speed * dt).max(0.0);
        f.pressure_altitude = f.altitude;

        // Pilot centres the controls once the aircraft is flying again
        if command.is_zero() {
            let relax = dt / PILOT_TRIM_TAU_S;
            r.collective_pitch += (TRIM_COLLECTIVE_DEG - r.collective_pitch) * relax;
            r.lateral_cyclic -= r.lateral_cyclic * relax;
            r.longitudinal_cyclic -= r.longitudinal_cyclic * relax;
            r.pedal_position -= r.pedal_position * relax;
        }

        self.t += dt;
        self.cycles += 1;
        self.sample()
    }

    /// Rotor buffet in [0, 1]: high sink at low airspeed.
    pub fn buffet(&self) -> f64 {
        let sink = ((-self.flight.vertical_speed - 5.0) / 10.0).clamp(0.0, 1.0);
        let slow = (1.0 - self.flight.airspeed / 10.0).clamp(0.0, 1.0);
        sink * slow
    }

    fn sample(&self) -> FlightSample {
        let static_pressure = SEA_LEVEL_PRESSURE_PA - PRESSURE_LAPSE_PA_M * self.flight.altitude;
        let buffet = self.buffet();

        // Recirculation lowers the periphery relative to the disc centre
        let mut pressure = PressureSensorData::uniform(static_pressure);
        for (i, reading) in pressure.sensor_readings.iter_mut().enumerate().skip(1) {
            let phase = self.t * 7.0 + i as f64;
            *reading -= buffet * (400.0 + 150.0 * phase.sin());
        }
        pressure.dynamic_pressure = 0.5 * AIR_DENSITY_SEA_LEVEL * self.flight.airspeed.powi(2);

        let blades = BladeRotorState {
            collective_pitch: self.rotor.collective_pitch,
            cyclic_pitch_lateral: self.rotor.lateral_cyclic,
            cyclic_pitch_longitudinal: self.rotor.longitudinal_cyclic,
            forward_speed: self.flight.airspeed,
            vertical_speed: self.flight.vertical_speed,
            air_density: self.flight.air_density,
            ..BladeRotorState::default()
        };
        let bpf = blades.blade_passing_frequency();
        let vibrations = (0..blades.num_blades)
            .map(|b| VibrationData {
                frequency: bpf,
                amplitude: 0.6 + 1.2 * buffet + 0.05 * (self.t * 3.0 + f64::from(b)).sin(),
                phase: f64::from(b) * std::f64::consts::FRAC_PI_2,
                blade_id: b,
                sensor_id: b,
            })
            .collect();

        FlightSample {
            vrs: VrsInput {
                rotor: self.rotor,
                flight: self.flight,
                pressure,
            },
            rotor: RotorInput {
                rotor: blades,
                vibrations,
            },
            probes: EnvironmentProbes {
                temperature_c: 45.0 + 2.0 * (self.t / 30.0).sin(),
                ..EnvironmentProbes::default()
            },
        }
    }

    #[inline]
    pub fn flight(&self) -> &FlightConditions {
        &self.flight
    }

    #[inline]
    pub fn rotor(&self) -> &RotorState {
        &self.rotor
    }

    /// Simulated time [s].
    #[inline]
    pub fn time(&self) -> f64 {
        self.t
    }
}

impl Subsystem for FlightSimulator {
    type Input = ControlCommand;
    type Output = FlightSample;

    fn name(&self) -> &'static str {
        "sensors"
    }

    fn initialize(&mut self) -> Result<(), SubsystemError> {
        if !(self.dt > 0.0) {
            return Err(SubsystemError::InvalidConfig {
                name: "sensors",
                reason: "period must be positive".to_string(),
            });
        }
        self.initialized = true;
        info!(profile = ?self.profile, "flight simulator started");
        Ok(())
    }

    fn update(&mut self, input: &ControlCommand, _now: Instant) -> FlightSample {
        self.step(input)
    }

    fn shutdown(&mut self) {
        self.initialized = false;
        info!(
            t = self.t,
            altitude = self.flight.altitude,
            "flight simulator stopped"
        );
    }

    fn is_healthy(&self) -> bool {
        self.initialized
    }

    fn warnings(&self) -> Vec<String> {
        Vec::new()
    }

    fn status(&self) -> SubsystemStatus {
        SubsystemStatus {
            name: "sensors",
            initialized: self.initialized,
            healthy: self.initialized,
            health: if self.initialized { 1.0 } else { 0.0 },
            mode: format!("t={:.1}s", self.t),
            condition_active: self.buffet() > 0.0,
            cycles: self.cycles,
            overruns: 0,
            warnings: 0,
        }
    }
}

// ─── BIOS fault injection ───────────────────────────────────────────

/// One scheduled fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedFault {
    Corruption { addr: u32, len: u32, value: u8 },
    Bus(u32),
}

/// Deterministic fault schedule: one fault every `every` checks, every
/// third one a bus fault, the rest runtime-RAM corruption.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    every: u64,
    state: u32,
    checks: u64,
    injected: u64,
}

/// Corruption stays inside the first 64 KiB of runtime RAM.
const CORRUPTION_WINDOW: u32 = 64 * 1024;
const CORRUPTION_LEN: u32 = 64;
const BUS_COUNT: u32 = 3;

impl FaultInjector {
    /// `every == 0` never injects.
    pub fn new(every: u64, seed: u32) -> Self {
        Self {
            every,
            state: seed.max(1),
            checks: 0,
            injected: 0,
        }
    }

    fn next_random(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Fault due at this check, if any.
    pub fn next_fault(&mut self) -> Option<InjectedFault> {
        self.checks += 1;
        if self.every == 0 || self.checks % self.every != 0 {
            return None;
        }
        self.injected += 1;
        let r = self.next_random();
        Some(if self.injected % 3 == 0 {
            InjectedFault::Bus(r % BUS_COUNT)
        } else {
            let offset = r % (CORRUPTION_WINDOW - CORRUPTION_LEN);
            InjectedFault::Corruption {
                addr: RAM_BASE_ADDR + offset,
                len: CORRUPTION_LEN,
                value: (r >> 24) as u8,
            }
        })
    }

    #[inline]
    pub fn injected(&self) -> u64 {
        self.injected
    }
}

/// BIOS context plus its fault schedule.
pub struct SimulatedBios {
    bios: BiosContext,
    injector: FaultInjector,
}

impl SimulatedBios {
    pub fn new(bios: BiosContext, injector: FaultInjector) -> Self {
        Self { bios, injector }
    }

    pub fn bios(&self) -> &BiosContext {
        &self.bios
    }

    pub fn injected(&self) -> u64 {
        self.injector.injected()
    }

    pub fn into_inner(self) -> BiosContext {
        self.bios
    }
}

impl Subsystem for SimulatedBios {
    type Input = EnvironmentProbes;
    type Output = BiosCheckReport;

    fn name(&self) -> &'static str {
        self.bios.name()
    }

    fn initialize(&mut self) -> Result<(), SubsystemError> {
        self.bios.initialize()
    }

    fn update(&mut self, input: &EnvironmentProbes, now: Instant) -> BiosCheckReport {
        if let Some(fault) = self.injector.next_fault() {
            debug!(?fault, "injecting BIOS fault");
            let injected = match fault {
                InjectedFault::Corruption { addr, len, value } => {
                    self.bios.inject_corruption(addr, len, value)
                }
                InjectedFault::Bus(id) => self.bios.inject_bus_fault(id),
            };
            if let Err(e) = injected {
                debug!(error = %e, "fault injection rejected");
            }
        }
        self.bios.update(input, now)
    }

    fn shutdown(&mut self) {
        self.bios.shutdown();
    }

    fn is_healthy(&self) -> bool {
        self.bios.is_healthy()
    }

    fn warnings(&self) -> Vec<String> {
        self.bios.warnings()
    }

    fn status(&self) -> SubsystemStatus {
        self.bios.status()
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
