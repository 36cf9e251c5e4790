//! Micro-servo array driving the active blade elements.
//!
//! One servo per (blade, element). Each servo has three axes (pitch, flap,
//! torsion) bounded to ±max deflection. The summed change of one command is
//! bounded by `max_rate · dt`, with `dt` measured per servo since its last
//! command. Commands exceeding that budget are scaled down, not refused.
//!
//! Servos fail independently: a command to an unhealthy servo is rejected
//! and the rest of a batch still applies.

use super::CommandBuffer;
use crate::error::ActuatorError;
use aero_common::consts::RATE_LIMIT_MAX_DT_S;
use aero_common::rotor::ServoCommand;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Absolute servo position [deg].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ServoPosition {
    pub pitch: f64,
    pub flap: f64,
    pub torsion: f64,
}

#[derive(Debug, Clone, Copy)]
struct Servo {
    position: ServoPosition,
    healthy: bool,
    last_command_at: Option<Instant>,
    /// Last observed slew [deg/s].
    rate: f64,
}

impl Default for Servo {
    fn default() -> Self {
        Self {
            position: ServoPosition::default(),
            healthy: true,
            last_command_at: None,
            rate: 0.0,
        }
    }
}

pub struct MicroServoArray {
    num_blades: u8,
    elements_per_blade: u8,
    servos: Vec<Servo>,
    max_deflection: f64,
    max_rate: f64,
    nominal_dt: Duration,
    applied: u64,
    rejected: u64,
}

impl MicroServoArray {
    pub fn new(
        num_blades: u8,
        elements_per_blade: u8,
        max_deflection: f64,
        max_rate: f64,
        nominal_dt: Duration,
    ) -> Self {
        let count = usize::from(num_blades) * usize::from(elements_per_blade);
        Self {
            num_blades,
            elements_per_blade,
            servos: vec![Servo::default(); count],
            max_deflection: max_deflection.abs(),
            max_rate: max_rate.abs(),
            nominal_dt,
            applied: 0,
            rejected: 0,
        }
    }

    fn index(&self, blade: u8, element: u8) -> Option<usize> {
        (blade < self.num_blades && element < self.elements_per_blade).then(|| {
            usize::from(blade) * usize::from(self.elements_per_blade) + usize::from(element)
        })
    }

    /// Apply one command. On success returns the deltas actually applied,
    /// after deflection and rate limiting.
    pub fn execute_command(
        &mut self,
        command: &ServoCommand,
        now: Instant,
    ) -> Result<ServoCommand, ActuatorError> {
        let result = self.try_execute(command, now);
        match result {
            Ok(_) => self.applied += 1,
            Err(_) => self.rejected += 1,
        }
        result
    }

    fn try_execute(
        &mut self,
        command: &ServoCommand,
        now: Instant,
    ) -> Result<ServoCommand, ActuatorError> {
        let (blade, element) = (command.blade_id, command.element_id);
        let idx = self
            .index(blade, element)
            .ok_or(ActuatorError::OutOfRange { blade, element })?;
        if !self.servos[idx].healthy {
            return Err(ActuatorError::Unhealthy { blade, element });
        }
        if !command.is_finite() {
            return Err(ActuatorError::NonFinite);
        }
        if command.is_zero() {
            return Ok(*command);
        }

        let max_deflection = self.max_deflection;
        let servo = &mut self.servos[idx];
        let dt = match servo.last_command_at {
            Some(prev) => now
                .saturating_duration_since(prev)
                .min(Duration::from_secs_f64(RATE_LIMIT_MAX_DT_S)),
            None => self.nominal_dt,
        }
        .as_secs_f64();

        let mut delta = [
            command.pitch_adjustment.clamp(-max_deflection, max_deflection),
            command.flap_deflection.clamp(-max_deflection, max_deflection),
            command.torsion_adjustment.clamp(-max_deflection, max_deflection),
        ];
        let total: f64 = delta.iter().map(|d| d.abs()).sum();
        let budget = self.max_rate * dt;
        if total > budget {
            let scale = if total > 0.0 { budget / total } else { 0.0 };
            delta.iter_mut().for_each(|d| *d *= scale);
        }

        let before = servo.position;
        let p = &mut servo.position;
        p.pitch = (p.pitch + delta[0]).clamp(-max_deflection, max_deflection);
        p.flap = (p.flap + delta[1]).clamp(-max_deflection, max_deflection);
        p.torsion = (p.torsion + delta[2]).clamp(-max_deflection, max_deflection);

        let applied = ServoCommand {
            blade_id: blade,
            element_id: element,
            pitch_adjustment: p.pitch - before.pitch,
            flap_deflection: p.flap - before.flap,
            torsion_adjustment: p.torsion - before.torsion,
        };
        let moved = applied.pitch_adjustment.abs()
            + applied.flap_deflection.abs()
            + applied.torsion_adjustment.abs();
        servo.rate = if dt > 0.0 { moved / dt } else { 0.0 };
        servo.last_command_at = Some(now);
        Ok(applied)
    }

    /// Apply each command independently. `applied` is refilled with the
    /// deltas that took effect; returns their count.
    pub fn execute_batch_commands(
        &mut self,
        commands: &[ServoCommand],
        now: Instant,
        applied: &mut CommandBuffer,
    ) -> usize {
        applied.clear();
        for command in commands {
            match self.execute_command(command, now) {
                Ok(done) => {
                    let _ = applied.push(done);
                }
                Err(e) => debug!(error = %e, "servo command rejected"),
            }
        }
        applied.len()
    }

    pub fn servo_position(&self, blade: u8, element: u8) -> Option<ServoPosition> {
        self.index(blade, element).map(|i| self.servos[i].position)
    }

    /// Last observed slew [deg/s].
    pub fn servo_rate(&self, blade: u8, element: u8) -> Option<f64> {
        self.index(blade, element).map(|i| self.servos[i].rate)
    }

    pub fn set_servo_health(
        &mut self,
        blade: u8,
        element: u8,
        healthy: bool,
    ) -> Result<(), ActuatorError> {
        let idx = self
            .index(blade, element)
            .ok_or(ActuatorError::OutOfRange { blade, element })?;
        if self.servos[idx].healthy && !healthy {
            warn!(blade, element, "servo marked unhealthy");
        }
        self.servos[idx].healthy = healthy;
        Ok(())
    }

    /// `false` for indices outside the array.
    pub fn is_servo_healthy(&self, blade: u8, element: u8) -> bool {
        self.index(blade, element)
            .is_some_and(|i| self.servos[i].healthy)
    }

    pub fn healthy_servo_count(&self) -> usize {
        self.servos.iter().filter(|s| s.healthy).count()
    }

    #[inline]
    pub fn servo_count(&self) -> usize {
        self.servos.len()
    }

    /// (blade, element) of every unhealthy servo.
    pub fn failed_servos(&self) -> Vec<(u8, u8)> {
        let per_blade = usize::from(self.elements_per_blade.max(1));
        self.servos
            .iter()
            .enumerate()
            .filter(|(_, s)| !s.healthy)
            .map(|(i, _)| ((i / per_blade) as u8, (i % per_blade) as u8))
            .collect()
    }

    /// Return every healthy servo to zero, bypassing the rate limit.
    /// Returns how many servos were neutralised.
    pub fn command_neutral(&mut self) -> usize {
        let mut count = 0;
        for servo in self.servos.iter_mut().filter(|s| s.healthy) {
            servo.position = ServoPosition::default();
            servo.rate = 0.0;
            count += 1;
        }
        count
    }

    /// Zero healthy servos and restart every rate-limit window at `now`.
    pub fn calibrate_servos(&mut self, now: Instant) {
        let neutral = self.command_neutral();
        for servo in &mut self.servos {
            servo.last_command_at = Some(now);
        }
        info!(
            neutral,
            total = self.servos.len(),
            "servo array calibrated"
        );
    }

    #[inline]
    pub fn applied_count(&self) -> u64 {
        self.applied
    }

    #[inline]
    pub fn rejected_count(&self) -> u64 {
        self.rejected
    }
}
