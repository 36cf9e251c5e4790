//! Vortex flow field analysis.
//!
//! Coarse estimate of the rotor wake for diagnostics and trend prediction.
//! The grid is sized once at construction and refilled in place each call.

use aero_common::vrs::{RotorState, VortexRingState};
use std::f64::consts::PI;
use std::time::Instant;

pub const GRID_NX: usize = 20;
pub const GRID_NY: usize = 20;
pub const GRID_NZ: usize = 5;

/// Radial station of the tip vortex core, fraction of radius.
const CORE_STATION: f64 = 0.7;
/// Height of the modelled vortex plane below the disc [m].
const CORE_PLANE_Z: f64 = -2.0;
/// Points closer than this to a core are left at zero [m].
const CORE_CUTOFF: f64 = 0.1;
/// Fraction of tip speed × radius carried as core circulation.
const CORE_STRENGTH_RATIO: f64 = 0.1;

/// Cartesian vector [m] or [m/s].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }
}

/// Single tip vortex core.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VortexCore {
    pub position: Vec3,
    /// Circulation [m²/s].
    pub strength: f64,
}

pub struct VortexFlowAnalyzer {
    rotor_radius: f64,
    cores: Vec<VortexCore>,
    /// Grid velocities, x-major: `index = (ix * NY + iy) * NZ + iz`.
    field: Vec<Vec3>,
    last_circulation: Option<(f64, Instant)>,
}

impl VortexFlowAnalyzer {
    /// Pre-size the grid and one core slot per blade.
    pub fn new(rotor_radius: f64, num_blades: u8) -> Self {
        Self {
            rotor_radius: rotor_radius.max(0.0),
            cores: Vec::with_capacity(usize::from(num_blades)),
            field: vec![Vec3::default(); GRID_NX * GRID_NY * GRID_NZ],
            last_circulation: None,
        }
    }

    /// Grid point position [m]. Covers ±1.5 r horizontally, 0..-4 m vertically.
    pub fn grid_point(&self, ix: usize, iy: usize, iz: usize) -> Vec3 {
        let span = 3.0 * self.rotor_radius;
        Vec3::new(
            -0.5 * span + span * ix as f64 / (GRID_NX - 1) as f64,
            -0.5 * span + span * iy as f64 / (GRID_NY - 1) as f64,
            -4.0 * iz as f64 / (GRID_NZ - 1) as f64,
        )
    }

    /// Recompute cores and the induced velocity at every grid point.
    pub fn calculate_vortex_field(&mut self, rotor: &RotorState) -> &[Vec3] {
        if rotor.rotor_radius > 0.0 {
            self.rotor_radius = rotor.rotor_radius;
        }
        let r = self.rotor_radius;
        let tip_speed = rotor.main_rotor_rpm * 2.0 * PI / 60.0 * r;
        let blades = usize::from(rotor.num_blades).min(self.cores.capacity().max(1));

        self.cores.clear();
        for b in 0..blades {
            let azimuth = 2.0 * PI * b as f64 / blades as f64;
            self.cores.push(VortexCore {
                position: Vec3::new(
                    CORE_STATION * r * azimuth.cos(),
                    CORE_STATION * r * azimuth.sin(),
                    CORE_PLANE_Z,
                ),
                strength: tip_speed * r * CORE_STRENGTH_RATIO,
            });
        }

        for ix in 0..GRID_NX {
            for iy in 0..GRID_NY {
                for iz in 0..GRID_NZ {
                    let p = self.grid_point(ix, iy, iz);
                    let mut v = Vec3::default();
                    for core in &self.cores {
                        let d = Vec3::new(
                            p.x - core.position.x,
                            p.y - core.position.y,
                            p.z - core.position.z,
                        );
                        let dist = d.norm();
                        if dist > CORE_CUTOFF {
                            // Swirl about the core's vertical axis.
                            let factor = core.strength / (2.0 * PI * dist * dist);
                            v.x += -d.y * factor;
                            v.y += d.x * factor;
                        }
                    }
                    self.field[(ix * GRID_NY + iy) * GRID_NZ + iz] = v;
                }
            }
        }
        &self.field
    }

    pub fn field(&self) -> &[Vec3] {
        &self.field
    }

    pub fn cores(&self) -> &[VortexCore] {
        &self.cores
    }

    /// Ring circulation from the detector state [m²/s].
    pub fn calculate_circulation_strength(&self, state: &VortexRingState) -> f64 {
        state.induced_flow_velocity * 2.0 * PI * state.vortex_core_radius
    }

    /// Rate of change of circulation since the previous call [m²/s²].
    ///
    /// Returns 0 on the first call or when no time has passed.
    pub fn predict_vortex_growth_rate(&mut self, state: &VortexRingState, now: Instant) -> f64 {
        let circulation = self.calculate_circulation_strength(state);
        let rate = match self.last_circulation {
            Some((prev, at)) => {
                let dt = now.saturating_duration_since(at).as_secs_f64();
                if dt > 0.0 {
                    (circulation - prev) / dt
                } else {
                    0.0
                }
            }
            None => 0.0,
        };
        self.last_circulation = Some((circulation, now));
        rate
    }

    /// Ring centre positions over `horizon` seconds, `steps` samples.
    ///
    /// The ring convects away from the disc at `V_ind − |vs|`. When the
    /// descent rate matches the induced flow the ring stays at the disc.
    pub fn predict_vortex_trajectory(
        &self,
        state: &VortexRingState,
        horizon: f64,
        steps: usize,
    ) -> Vec<Vec3> {
        if steps == 0 || !(horizon > 0.0) {
            return Vec::new();
        }
        let relative = state.induced_flow_velocity - state.descent_rate.abs();
        (1..=steps)
            .map(|i| {
                let t = horizon * i as f64 / steps as f64;
                Vec3::new(0.0, 0.0, CORE_PLANE_Z - relative * t)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn state(induced: f64, descent: f64) -> VortexRingState {
        VortexRingState {
            is_active: true,
            induced_flow_velocity: induced,
            descent_rate: descent,
            vortex_core_radius: 1.5,
            ..VortexRingState::default()
        }
    }

    #[test]
    fn field_is_presized_and_stable() {
        let mut analyzer = VortexFlowAnalyzer::new(5.0, 4);
        let ptr_before = analyzer.field().as_ptr();
        let len = analyzer.calculate_vortex_field(&RotorState::default()).len();
        assert_eq!(len, GRID_NX * GRID_NY * GRID_NZ);
        assert_eq!(analyzer.field().as_ptr(), ptr_before);
        assert_eq!(analyzer.cores().len(), 4);
    }

    #[test]
    fn field_values_are_finite_and_nonzero() {
        let mut analyzer = VortexFlowAnalyzer::new(5.0, 4);
        let field = analyzer.calculate_vortex_field(&RotorState::default());
        assert!(field.iter().all(|v| v.norm().is_finite()));
        assert!(field.iter().any(|v| v.norm() > 0.0));
    }

    #[test]
    fn cores_sit_at_seventy_percent_radius() {
        let mut analyzer = VortexFlowAnalyzer::new(5.0, 4);
        analyzer.calculate_vortex_field(&RotorState::default());
        for core in analyzer.cores() {
            let radial = (core.position.x.powi(2) + core.position.y.powi(2)).sqrt();
            assert!((radial - 3.5).abs() < 1e-9);
            assert_eq!(core.position.z, CORE_PLANE_Z);
        }
    }

    #[test]
    fn growth_rate_is_finite_difference() {
        let mut analyzer = VortexFlowAnalyzer::new(5.0, 4);
        let t0 = Instant::now();
        assert_eq!(analyzer.predict_vortex_growth_rate(&state(1.0, 0.0), t0), 0.0);
        let rate = analyzer.predict_vortex_growth_rate(&state(2.0, 0.0), t0 + Duration::from_secs(1));
        let expected = 2.0 * PI * 1.5;
        assert!((rate - expected).abs() < 1e-9);
    }

    #[test]
    fn matched_descent_parks_ring_at_disc() {
        let analyzer = VortexFlowAnalyzer::new(5.0, 4);
        let path = analyzer.predict_vortex_trajectory(&state(3.0, -3.0), 2.0, 4);
        assert_eq!(path.len(), 4);
        assert!(path.iter().all(|p| (p.z - CORE_PLANE_Z).abs() < 1e-12));

        let shed = analyzer.predict_vortex_trajectory(&state(3.0, 0.0), 2.0, 4);
        assert!(shed.last().is_some_and(|p| p.z < CORE_PLANE_Z));
    }

    #[test]
    fn empty_trajectory_for_degenerate_horizon() {
        let analyzer = VortexFlowAnalyzer::new(5.0, 4);
        assert!(analyzer.predict_vortex_trajectory(&state(1.0, 0.0), 0.0, 10).is_empty());
        assert!(analyzer.predict_vortex_trajectory(&state(1.0, 0.0), 1.0, 0).is_empty());
    }
}
