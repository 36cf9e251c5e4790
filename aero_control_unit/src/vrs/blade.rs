//! Cockpit control actuator interface.
//!
//! Last line of defense between the recovery controller and the flight
//! controls. Every command is re-validated here:
//!
//! 1. Non-finite commands are rejected outright.
//! 2. Deltas are clamped to the control envelope.
//! 3. Each channel moves at most `max_rate · dt`, with `dt` the time since
//!    the previous command (capped; `dt = 0` allows no motion).
//! 4. Cumulative positions are clamped to the envelope.
//!
//! Channels fail independently. A nonzero delta on an unhealthy channel is
//! rejected and reported while the other channels still apply.

use aero_common::consts::{BLADE_PITCH_MAX_DEG, BLADE_PITCH_MIN_DEG, RATE_LIMIT_MAX_DT_S};
use aero_common::vrs::{ControlAxes, ControlCommand, ControlPositions, RotorState};
use std::f64::consts::PI;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Outcome of the last `execute_control_command`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ExecutionReport {
    /// Position change each channel actually made, after the envelope and
    /// rate limit. Mode flags are copied from the request.
    pub moved: ControlCommand,
    /// Channels that moved (or were asked to and could).
    pub applied: ControlAxes,
    /// Channels refused because they are unhealthy.
    pub rejected: ControlAxes,
    /// Channels whose delta was cut by the rate limit.
    pub rate_limited: ControlAxes,
}

pub struct BladeControlInterface {
    positions: ControlPositions,
    healthy: ControlAxes,
    max_rate_deg_s: f64,
    nominal_dt: Duration,
    last_command_at: Option<Instant>,
    blade_pitches: Vec<f64>,
    last_report: ExecutionReport,
    commands: u64,
    rejections: u64,
}

impl BladeControlInterface {
    /// `nominal_dt` is the rate-limit window credited to the very first
    /// command.
    pub fn new(num_blades: u8, max_rate_deg_s: f64, nominal_dt: Duration) -> Self {
        let mut iface = Self {
            positions: ControlPositions::default(),
            healthy: ControlAxes::ALL,
            max_rate_deg_s: max_rate_deg_s.max(0.0),
            nominal_dt,
            last_command_at: None,
            blade_pitches: vec![0.0; usize::from(num_blades)],
            last_report: ExecutionReport::default(),
            commands: 0,
            rejections: 0,
        };
        iface.update_blade_pitches();
        iface
    }

    /// Adopt the aircraft's current control positions.
    pub fn sync_from_rotor(&mut self, rotor: &RotorState) {
        self.set_positions(ControlPositions {
            collective: rotor.collective_pitch,
            lateral_cyclic: rotor.lateral_cyclic,
            longitudinal_cyclic: rotor.longitudinal_cyclic,
            pedal: rotor.pedal_position,
        });
    }

    /// Overwrite positions, clamped to the envelope. Non-finite values
    /// leave the channel unchanged.
    pub fn set_positions(&mut self, positions: ControlPositions) {
        for axis in ControlAxes::ALL.iter() {
            let value = positions.get(axis);
            if value.is_finite() {
                let (min, max) = ControlPositions::limits(axis);
                self.positions.set(axis, value.clamp(min, max));
            }
        }
        self.update_blade_pitches();
    }

    /// Apply one command. Returns `true` when no channel was rejected.
    pub fn execute_control_command(&mut self, command: &ControlCommand, now: Instant) -> bool {
        self.commands += 1;
        let mut report = ExecutionReport::default();

        if !command.is_finite() {
            report.rejected = ControlAxes::ALL;
            self.last_report = report;
            self.rejections += 1;
            warn!("non-finite control command rejected");
            return false;
        }

        let command = command.clamped();
        let max_step = self.max_rate_deg_s * self.elapsed_since_last(now).as_secs_f64();
        self.last_command_at = Some(now);
        report.moved = ControlCommand {
            emergency_action: command.emergency_action,
            strategy: command.strategy,
            ..ControlCommand::hold()
        };

        for axis in ControlAxes::ALL.iter() {
            let delta = command.delta(axis);
            if delta == 0.0 {
                continue;
            }
            if !self.healthy.contains(axis) {
                report.rejected |= axis;
                continue;
            }
            let step = delta.clamp(-max_step, max_step);
            if step != delta {
                report.rate_limited |= axis;
            }
            let (min, max) = ControlPositions::limits(axis);
            let current = self.positions.get(axis);
            let next = (current + step).clamp(min, max);
            report.moved.set_delta(axis, next - current);
            self.positions.set(axis, next);
            report.applied |= axis;
        }

        if !report.applied.is_empty() {
            self.update_blade_pitches();
        }
        if !report.rejected.is_empty() {
            self.rejections += 1;
            warn!(rejected = ?report.rejected, "control channels rejected command");
        }
        if !report.rate_limited.is_empty() {
            debug!(limited = ?report.rate_limited, max_step, "rate limit active");
        }
        self.last_report = report;
        report.rejected.is_empty()
    }

    fn elapsed_since_last(&self, now: Instant) -> Duration {
        match self.last_command_at {
            Some(prev) => now
                .saturating_duration_since(prev)
                .min(Duration::from_secs_f64(RATE_LIMIT_MAX_DT_S)),
            None => self.nominal_dt,
        }
    }

    fn update_blade_pitches(&mut self) {
        let n = self.blade_pitches.len();
        let p = self.positions;
        for (b, pitch) in self.blade_pitches.iter_mut().enumerate() {
            let azimuth = 2.0 * PI * b as f64 / n as f64;
            let raw = p.collective + p.lateral_cyclic * azimuth.sin()
                + p.longitudinal_cyclic * azimuth.cos();
            *pitch = raw.clamp(BLADE_PITCH_MIN_DEG, BLADE_PITCH_MAX_DEG);
        }
    }

    /// Drive every healthy channel to zero, bypassing the rate limit.
    ///
    /// Shutdown path only. Returns `false` if an unhealthy channel could not
    /// be neutralized.
    pub fn command_neutral(&mut self) -> bool {
        for axis in self.healthy.iter() {
            self.positions.set(axis, 0.0);
        }
        self.update_blade_pitches();
        self.last_command_at = None;
        self.healthy == ControlAxes::ALL
    }

    pub fn set_actuator_health(&mut self, axes: ControlAxes, healthy: bool) {
        self.healthy.set(axes, healthy);
    }

    #[inline]
    pub fn healthy_channels(&self) -> ControlAxes {
        self.healthy
    }

    #[inline]
    pub fn is_healthy(&self) -> bool {
        self.healthy == ControlAxes::ALL
    }

    #[inline]
    pub fn positions(&self) -> &ControlPositions {
        &self.positions
    }

    pub fn blade_pitches(&self) -> &[f64] {
        &self.blade_pitches
    }

    #[inline]
    pub fn last_report(&self) -> ExecutionReport {
        self.last_report
    }

    /// Fraction of commands with no rejection.
    pub fn success_rate(&self) -> f64 {
        if self.commands == 0 {
            1.0
        } else {
            1.0 - self.rejections as f64 / self.commands as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aero_common::consts::{COLLECTIVE_MAX_DEG, CYCLIC_LIMIT_DEG};
    use proptest::prelude::*;

    const DT: Duration = Duration::from_millis(10);

    fn iface() -> BladeControlInterface {
        // 50 deg/s over 10 ms = 0.5 deg per command.
        BladeControlInterface::new(4, 50.0, DT)
    }

    fn cmd(collective: f64, lateral: f64, longitudinal: f64, pedal: f64) -> ControlCommand {
        ControlCommand {
            collective_adjustment: collective,
            lateral_cyclic_adjustment: lateral,
            longitudinal_cyclic_adjustment: longitudinal,
            pedal_adjustment: pedal,
            ..ControlCommand::hold()
        }
    }

    #[test]
    fn zero_delta_twice_changes_nothing() {
        let mut bi = iface();
        bi.set_positions(ControlPositions {
            collective: 7.0,
            lateral_cyclic: -2.0,
            longitudinal_cyclic: 3.0,
            pedal: 1.0,
        });
        let before = *bi.positions();
        let pitches = bi.blade_pitches().to_vec();
        let now = Instant::now();
        assert!(bi.execute_control_command(&ControlCommand::hold(), now));
        assert_eq!(*bi.positions(), before);
        assert!(bi.execute_control_command(&ControlCommand::hold(), now));
        assert_eq!(*bi.positions(), before);
        assert_eq!(bi.blade_pitches(), pitches.as_slice());
    }

    #[test]
    fn first_command_uses_nominal_window() {
        let mut bi = iface();
        bi.execute_control_command(&cmd(2.0, 0.0, 0.0, 0.0), Instant::now());
        assert!((bi.positions().collective - 0.5).abs() < 1e-12);
        assert!(bi.last_report().rate_limited.contains(ControlAxes::COLLECTIVE));
    }

    #[test]
    fn report_carries_the_applied_deltas() {
        let mut bi = iface();
        bi.set_positions(ControlPositions {
            collective: 19.8,
            ..ControlPositions::default()
        });
        bi.set_actuator_health(ControlAxes::PEDAL, false);
        let request = ControlCommand {
            emergency_action: true,
            ..cmd(2.0, -0.2, 9.0, 1.0)
        };
        bi.execute_control_command(&request, Instant::now());
        let moved = bi.last_report().moved;
        // Envelope stops collective at 20, rate limit cuts longitudinal to 0.5.
        assert!((moved.collective_adjustment - 0.2).abs() < 1e-9);
        assert!((moved.lateral_cyclic_adjustment + 0.2).abs() < 1e-12);
        assert!((moved.longitudinal_cyclic_adjustment - 0.5).abs() < 1e-12);
        assert_eq!(moved.pedal_adjustment, 0.0);
        assert!(moved.emergency_action);
    }

    #[test]
    fn rate_limit_scales_with_elapsed_time() {
        let mut bi = iface();
        let t0 = Instant::now();
        bi.execute_control_command(&ControlCommand::hold(), t0);
        bi.execute_control_command(&cmd(5.0, 0.0, 0.0, 0.0), t0 + Duration::from_millis(40));
        assert!((bi.positions().collective - 2.0).abs() < 1e-9);
    }

    #[test]
    fn same_instant_allows_no_motion() {
        let mut bi = iface();
        let t0 = Instant::now();
        bi.execute_control_command(&ControlCommand::hold(), t0);
        assert!(bi.execute_control_command(&cmd(5.0, 5.0, 5.0, 5.0), t0));
        assert_eq!(*bi.positions(), ControlPositions::default());
    }

    #[test]
    fn long_gap_is_capped() {
        let mut bi = iface();
        let t0 = Instant::now();
        bi.execute_control_command(&ControlCommand::hold(), t0);
        bi.execute_control_command(&cmd(20.0, 0.0, 0.0, 0.0), t0 + Duration::from_secs(60));
        let cap = 50.0 * RATE_LIMIT_MAX_DT_S;
        assert!((bi.positions().collective - cap).abs() < 1e-9);
    }

    #[test]
    fn cumulative_positions_stay_in_envelope() {
        let mut bi = BladeControlInterface::new(4, 1_000.0, DT);
        let mut t = Instant::now();
        for _ in 0..100 {
            t += Duration::from_millis(100);
            bi.execute_control_command(&cmd(20.0, 15.0, -15.0, 25.0), t);
        }
        let p = bi.positions();
        assert_eq!(p.collective, COLLECTIVE_MAX_DEG);
        assert_eq!(p.lateral_cyclic, CYCLIC_LIMIT_DEG);
        assert_eq!(p.longitudinal_cyclic, -CYCLIC_LIMIT_DEG);
        assert!(bi.blade_pitches().iter().all(|b| (0.0..=30.0).contains(b)));
    }

    #[test]
    fn unhealthy_channel_rejected_others_apply() {
        let mut bi = iface();
        bi.set_actuator_health(ControlAxes::PEDAL, false);
        let ok = bi.execute_control_command(&cmd(0.2, 0.2, 0.2, 0.2), Instant::now());
        assert!(!ok);
        let report = bi.last_report();
        assert_eq!(report.rejected, ControlAxes::PEDAL);
        assert_eq!(
            report.applied,
            ControlAxes::COLLECTIVE | ControlAxes::LATERAL | ControlAxes::LONGITUDINAL
        );
        assert_eq!(bi.positions().pedal, 0.0);
        assert!((bi.positions().collective - 0.2).abs() < 1e-12);
        assert!(!bi.is_healthy());
    }

    #[test]
    fn zero_delta_on_unhealthy_channel_is_not_rejected() {
        let mut bi = iface();
        bi.set_actuator_health(ControlAxes::PEDAL, false);
        assert!(bi.execute_control_command(&cmd(0.1, 0.0, 0.0, 0.0), Instant::now()));
    }

    #[test]
    fn non_finite_command_rejected_without_motion() {
        let mut bi = iface();
        assert!(!bi.execute_control_command(&cmd(f64::NAN, 1.0, 0.0, 0.0), Instant::now()));
        assert_eq!(*bi.positions(), ControlPositions::default());
        assert_eq!(bi.last_report().rejected, ControlAxes::ALL);
    }

    #[test]
    fn blade_pitch_follows_azimuth() {
        let mut bi = iface();
        bi.set_positions(ControlPositions {
            collective: 10.0,
            lateral_cyclic: 2.0,
            longitudinal_cyclic: 3.0,
            pedal: 0.0,
        });
        let p = bi.blade_pitches();
        assert!((p[0] - 13.0).abs() < 1e-9); // cos 0
        assert!((p[1] - 12.0).abs() < 1e-9); // sin 90
        assert!((p[2] - 7.0).abs() < 1e-9); // cos 180
        assert!((p[3] - 8.0).abs() < 1e-9); // sin 270
    }

    #[test]
    fn neutral_skips_unhealthy_channels() {
        let mut bi = iface();
        bi.set_positions(ControlPositions {
            collective: 5.0,
            lateral_cyclic: 1.0,
            longitudinal_cyclic: 1.0,
            pedal: 4.0,
        });
        bi.set_actuator_health(ControlAxes::PEDAL, false);
        assert!(!bi.command_neutral());
        assert_eq!(bi.positions().collective, 0.0);
        assert_eq!(bi.positions().pedal, 4.0);
    }

    proptest! {
        #[test]
        fn zero_delta_is_idempotent(
            collective in -10.0f64..20.0,
            lateral in -15.0f64..15.0,
            longitudinal in -15.0f64..15.0,
            pedal in -25.0f64..25.0,
            gap_ms in 0u64..500,
        ) {
            let mut bi = iface();
            bi.set_positions(ControlPositions { collective, lateral_cyclic: lateral, longitudinal_cyclic: longitudinal, pedal });
            let before = *bi.positions();
            let t0 = Instant::now();
            bi.execute_control_command(&ControlCommand::hold(), t0);
            prop_assert_eq!(*bi.positions(), before);
            bi.execute_control_command(&ControlCommand::hold(), t0 + Duration::from_millis(gap_ms));
            prop_assert_eq!(*bi.positions(), before);
        }
    }
}
