//! System-wide constants for the AERO workspace.
//!
//! Physical constants, safety envelopes and default task periods.
//! Every crate imports limits from here so the actuator layer and the
//! controllers always agree on the envelope.

// ─── Physics ────────────────────────────────────────────────────────

/// ISA sea-level air density [kg/m³].
pub const AIR_DENSITY_SEA_LEVEL: f64 = 1.225;

/// Standard gravity [m/s²].
pub const GRAVITY: f64 = 9.80665;

// ─── Task periods ───────────────────────────────────────────────────

/// VRS protection loop period [µs] (100 Hz).
pub const VRS_CYCLE_TIME_US: u64 = 10_000;

/// Adaptive rotor loop period [µs] (1 kHz).
pub const ROTOR_CYCLE_TIME_US: u64 = 1_000;

/// BIOS background check period [µs] (1 Hz).
pub const BIOS_CYCLE_TIME_US: u64 = 1_000_000;

// ─── Sensors ────────────────────────────────────────────────────────

/// Number of radial pressure sensors around the rotor disc.
pub const PRESSURE_SENSOR_COUNT: usize = 8;

/// Capacity of the detector's rolling sensor history.
pub const SENSOR_HISTORY_LEN: usize = 100;

// ─── Cockpit control envelope [deg] ─────────────────────────────────

/// Minimum cumulative collective pitch.
pub const COLLECTIVE_MIN_DEG: f64 = -10.0;

/// Maximum cumulative collective pitch.
pub const COLLECTIVE_MAX_DEG: f64 = 20.0;

/// Cyclic authority (lateral and longitudinal), symmetric.
pub const CYCLIC_LIMIT_DEG: f64 = 15.0;

/// Pedal authority, symmetric.
pub const PEDAL_LIMIT_DEG: f64 = 25.0;

/// Resulting per-blade pitch range.
pub const BLADE_PITCH_MIN_DEG: f64 = 0.0;
pub const BLADE_PITCH_MAX_DEG: f64 = 30.0;

// ─── Blade element servos ───────────────────────────────────────────

/// Largest rotor the adaptive loop accepts.
pub const MAX_BLADES: u8 = 8;
pub const MAX_ELEMENTS_PER_BLADE: u8 = 64;

/// Servo requests one rotor cycle can carry: one control-law pass plus one
/// optimizer pass over a full-size array.
pub const MAX_SERVO_COMMANDS: usize = 2 * MAX_BLADES as usize * MAX_ELEMENTS_PER_BLADE as usize;

/// Maximum absolute servo deflection [deg].
pub const SERVO_MAX_DEFLECTION_DEG: f64 = 15.0;

/// Maximum servo slew rate [deg/s].
pub const SERVO_MAX_RATE_DEG_S: f64 = 90.0;

/// Longest gap credited to a rate limiter [s]. A servo idle for longer
/// than this is still limited to one gap's worth of motion.
pub const RATE_LIMIT_MAX_DT_S: f64 = 0.1;

// ─── Logs ───────────────────────────────────────────────────────────

/// Capacity of every subsystem warning log.
pub const WARNING_LOG_CAPACITY: usize = 50;

/// Capacity of the BIOS circular error log.
pub const ERROR_LOG_CAPACITY: usize = 100;

/// Default configuration file path.
pub const DEFAULT_CONFIG_PATH: &str = "config/aero.toml";

// The pressure detector splits the ring into one centre sensor + periphery.
static_assertions::const_assert!(PRESSURE_SENSOR_COUNT >= 2);
static_assertions::const_assert!(SENSOR_HISTORY_LEN <= 100);
static_assertions::const_assert!(WARNING_LOG_CAPACITY > 0 && ERROR_LOG_CAPACITY > 0);
static_assertions::const_assert!(MAX_SERVO_COMMANDS >= MAX_BLADES as usize * MAX_ELEMENTS_PER_BLADE as usize);
