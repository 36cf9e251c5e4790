//! Real-time blade configuration optimizer.
//!
//! Single gradient step per cycle: raise pitch on lightly loaded stations
//! while the vibration constraint holds. Stops stepping once the objective
//! stops moving.

use super::CommandBuffer;
use super::controller::calculate_blade_efficiency;
use aero_common::rotor::{
    BladeElement, OptimizationConstraints, OptimizationTarget, RotorConfig, ServoCommand,
    VibrationData,
};
use tracing::debug;

/// Stations below this lift coefficient get a pitch step.
const LOW_LIFT_CL: f64 = 0.5;
/// Only every Nth station is stepped.
const STEP_STRIDE: usize = 5;

/// RMS of sample amplitudes [g]. Zero for no samples.
pub fn calculate_vibration_level(vibrations: &[VibrationData]) -> f64 {
    if vibrations.is_empty() {
        return 0.0;
    }
    let sum: f64 = vibrations.iter().map(|v| v.amplitude * v.amplitude).sum();
    (sum / vibrations.len() as f64).sqrt()
}

/// Σ |CL| + |CM| over all stations.
pub fn calculate_structural_load(elements: &[BladeElement]) -> f64 {
    elements
        .iter()
        .map(|e| e.lift_coefficient.abs() + e.moment_coefficient.abs())
        .sum()
}

pub struct RealTimeOptimizer {
    target: OptimizationTarget,
    constraints: OptimizationConstraints,
    step_deg: f64,
    convergence_threshold: f64,
    elements_per_blade: u8,
    last_objective: Option<f64>,
    converged: bool,
    iterations: u64,
}

impl RealTimeOptimizer {
    pub fn new(config: &RotorConfig) -> Self {
        Self {
            target: config.optimization_target,
            constraints: config.constraints,
            step_deg: config.optimizer_step_deg,
            convergence_threshold: config.convergence_threshold,
            elements_per_blade: config.elements_per_blade,
            last_objective: None,
            converged: false,
            iterations: 0,
        }
    }

    pub fn set_optimization_target(&mut self, target: OptimizationTarget) {
        self.target = target;
        self.reset();
    }

    #[inline]
    pub fn optimization_target(&self) -> OptimizationTarget {
        self.target
    }

    pub fn set_constraints(&mut self, constraints: OptimizationConstraints) {
        self.constraints = constraints;
    }

    #[inline]
    pub fn constraints(&self) -> &OptimizationConstraints {
        &self.constraints
    }

    /// Higher is better for every target.
    pub fn calculate_objective_function(
        &self,
        elements: &[BladeElement],
        vibrations: &[VibrationData],
    ) -> f64 {
        match self.target {
            OptimizationTarget::Efficiency => calculate_blade_efficiency(elements),
            OptimizationTarget::Vibration => -calculate_vibration_level(vibrations),
            OptimizationTarget::StructuralLoad => -calculate_structural_load(elements),
        }
    }

    /// One optimizer iteration, appending its pitch steps to `out`.
    /// Returns how many steps were issued: none once converged or while
    /// the vibration constraint is violated.
    pub fn optimize_blade_configuration(
        &mut self,
        elements: &[BladeElement],
        vibrations: &[VibrationData],
        out: &mut CommandBuffer,
    ) -> usize {
        self.iterations += 1;
        let objective = self.calculate_objective_function(elements, vibrations);
        if let Some(prev) = self.last_objective {
            let converged = (objective - prev).abs() < self.convergence_threshold;
            if converged && !self.converged {
                debug!(objective, iterations = self.iterations, "optimizer converged");
            }
            self.converged = converged;
        }
        self.last_objective = Some(objective);

        if self.converged {
            return 0;
        }
        let vibration = calculate_vibration_level(vibrations);
        if vibration > self.constraints.max_vibration_g {
            debug!(vibration, "vibration constraint violated, holding");
            return 0;
        }

        let per_blade = usize::from(self.elements_per_blade.max(1));
        let before = out.len();
        for (i, _) in elements
            .iter()
            .enumerate()
            .step_by(STEP_STRIDE)
            .filter(|(_, e)| e.lift_coefficient < LOW_LIFT_CL)
        {
            let _ = out.push(ServoCommand {
                pitch_adjustment: self.step_deg,
                ..ServoCommand::neutral((i / per_blade) as u8, (i % per_blade) as u8)
            });
        }
        out.len() - before
    }

    #[inline]
    pub fn is_optimization_converged(&self) -> bool {
        self.converged
    }

    #[inline]
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    #[inline]
    pub fn last_objective(&self) -> Option<f64> {
        self.last_objective
    }

    pub fn reset(&mut self) {
        self.last_objective = None;
        self.converged = false;
        self.iterations = 0;
    }
}
