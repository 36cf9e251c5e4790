//! Adaptive blade control laws.
//!
//! Spectrum analysis and resonance detection run every cycle; the mode
//! picks which law turns vibration and rotor state into servo requests.
//! Requests are deltas; the servo array enforces deflection and rate.

use super::CommandBuffer;
use aero_common::rotor::{
    AdaptationMode, BladeElement, ResonanceCondition, RotorConfig, RotorState, ServoCommand,
    VibrationData,
};
use std::f64::consts::PI;
use tracing::{debug, info};

/// Spectrum width, 1 Hz per bin.
pub const SPECTRUM_BINS: usize = 512;
/// Highest blade-passing harmonic checked for resonance.
pub const MAX_HARMONIC: u8 = 5;

/// Flap gain of the suppression law, per g.
const SUPPRESSION_FLAP_GAIN: f64 = 0.05;
/// Avoidance law acts on every Nth element.
const AVOIDANCE_STRIDE: usize = 5;
const AVOIDANCE_PITCH_DEG: f64 = 2.0;
/// Emergency law acts on every Nth element.
const EMERGENCY_STRIDE: usize = 3;
const EMERGENCY_PITCH_DEG: f64 = -2.0;
const EMERGENCY_FLAP_DEG: f64 = 1.0;
/// Angle of attack the loading law steers toward [deg].
const OPTIMAL_AOA_DEG: f64 = 5.0;
const LOADING_GAIN: f64 = 0.1;
const DEFAULT_TARGET_EFFICIENCY: f64 = 0.85;

/// Strongest 1 Hz bin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpectralPeak {
    pub frequency: f64,
    pub amplitude: f64,
}

/// L/(L+D) over all elements, chord weighted.
pub fn calculate_blade_efficiency(elements: &[BladeElement]) -> f64 {
    let (lift, drag) = elements.iter().fold((0.0, 0.0), |(l, d), e| {
        (l + e.lift_coefficient * e.chord, d + e.drag_coefficient * e.chord)
    });
    lift / (lift + drag + 0.001)
}

pub struct AdaptiveController {
    num_blades: u8,
    elements_per_blade: u8,
    mode: AdaptationMode,
    resonance_detection: bool,
    spectrum: Vec<f64>,
    resonance: ResonanceCondition,
    suppression_threshold: f64,
    suppression_gain: f64,
    resonance_threshold: f64,
    harmonic_tolerance: f64,
    target_efficiency: f64,
    efficiency: f64,
}

impl AdaptiveController {
    pub fn new(config: &RotorConfig) -> Self {
        Self {
            num_blades: config.num_blades,
            elements_per_blade: config.elements_per_blade,
            mode: config.mode,
            resonance_detection: true,
            spectrum: vec![0.0; SPECTRUM_BINS],
            resonance: ResonanceCondition::default(),
            suppression_threshold: config.suppression_threshold_g,
            suppression_gain: config.suppression_gain,
            resonance_threshold: config.resonance_threshold_g,
            harmonic_tolerance: config.harmonic_tolerance_hz,
            target_efficiency: DEFAULT_TARGET_EFFICIENCY,
            efficiency: 0.0,
        }
    }

    pub fn set_adaptation_mode(&mut self, mode: AdaptationMode) {
        if mode != self.mode {
            info!(from = ?self.mode, to = ?mode, "adaptation mode changed");
        }
        self.mode = mode;
    }

    #[inline]
    pub fn adaptation_mode(&self) -> AdaptationMode {
        self.mode
    }

    pub fn enable_resonance_detection(&mut self, enable: bool) {
        self.resonance_detection = enable;
        if !enable {
            self.resonance = ResonanceCondition::default();
        }
    }

    pub fn set_performance_target(&mut self, target: f64) {
        if target.is_finite() {
            self.target_efficiency = target.clamp(0.0, 1.0);
        }
    }

    // ─── Analysis ───────────────────────────────────────────────────

    /// Bin amplitudes into 1 Hz bins and return the strongest bin.
    ///
    /// Samples with negative, non-finite or out-of-range frequency and
    /// non-finite amplitude are skipped.
    pub fn analyze_vibration_spectrum(&mut self, vibrations: &[VibrationData]) -> SpectralPeak {
        self.spectrum.iter_mut().for_each(|b| *b = 0.0);
        for v in vibrations {
            if !v.frequency.is_finite() || v.frequency < 0.0 || !v.amplitude.is_finite() {
                continue;
            }
            let bin = v.frequency.round() as usize;
            if let Some(slot) = self.spectrum.get_mut(bin) {
                *slot += v.amplitude.abs();
            }
        }
        self.spectrum
            .iter()
            .enumerate()
            .fold(SpectralPeak::default(), |peak, (bin, &amp)| {
                if amp > peak.amplitude {
                    SpectralPeak {
                        frequency: bin as f64,
                        amplitude: amp,
                    }
                } else {
                    peak
                }
            })
    }

    /// Resonance: spectral peak above threshold within tolerance of a
    /// blade-passing harmonic 1..=5.
    pub fn detect_resonance(
        &mut self,
        vibrations: &[VibrationData],
        rotor: &RotorState,
    ) -> ResonanceCondition {
        let peak = self.analyze_vibration_spectrum(vibrations);
        let was_active = self.resonance.active;

        let bpf = rotor.blade_passing_frequency();
        let harmonic = if self.resonance_detection
            && peak.amplitude > self.resonance_threshold
            && bpf > 0.0
        {
            (1..=MAX_HARMONIC)
                .find(|&h| (f64::from(h) * bpf - peak.frequency).abs() < self.harmonic_tolerance)
        } else {
            None
        };

        self.resonance = match harmonic {
            Some(h) => ResonanceCondition {
                active: true,
                frequency: peak.frequency,
                amplitude: peak.amplitude,
                harmonic: h,
                severity: (peak.amplitude / (2.0 * self.resonance_threshold)).clamp(0.0, 1.0),
            },
            None => ResonanceCondition {
                frequency: peak.frequency,
                amplitude: peak.amplitude,
                ..ResonanceCondition::default()
            },
        };
        if self.resonance.active && !was_active {
            info!(
                frequency = peak.frequency,
                amplitude = peak.amplitude,
                harmonic = self.resonance.harmonic,
                "harmonic resonance detected"
            );
        }
        self.resonance
    }

    // ─── Control laws ───────────────────────────────────────────────
    //
    // Every law appends to `out`; requests past its capacity are dropped.

    /// One command per sample above the suppression threshold, on element
    /// `sensor_id % elements` of the reporting blade.
    pub fn compute_vibration_suppression(
        &self,
        vibrations: &[VibrationData],
        out: &mut CommandBuffer,
    ) {
        let elements = self.elements_per_blade.max(1);
        for v in vibrations
            .iter()
            .filter(|v| v.amplitude.is_finite() && v.amplitude > self.suppression_threshold)
        {
            let _ = out.push(ServoCommand {
                blade_id: v.blade_id,
                element_id: v.sensor_id % elements,
                pitch_adjustment: -self.suppression_gain * v.amplitude,
                flap_deflection: SUPPRESSION_FLAP_GAIN * v.amplitude,
                torsion_adjustment: 0.0,
            });
        }
    }

    /// Pitch pattern that detunes the blades from each other.
    pub fn compute_resonance_avoidance(&self, out: &mut CommandBuffer) {
        self.strided(AVOIDANCE_STRIDE, out, |blade, element| ServoCommand {
            pitch_adjustment: (f64::from(blade) * PI / 2.0).sin() * AVOIDANCE_PITCH_DEG,
            ..ServoCommand::neutral(blade, element)
        });
    }

    /// Unload the rotor: reduce pitch and deploy flaps.
    pub fn compute_emergency_adaptation(&self, out: &mut CommandBuffer) {
        self.strided(EMERGENCY_STRIDE, out, |blade, element| ServoCommand {
            pitch_adjustment: EMERGENCY_PITCH_DEG,
            flap_deflection: EMERGENCY_FLAP_DEG,
            ..ServoCommand::neutral(blade, element)
        });
    }

    /// Steer every element toward the optimal angle of attack and refresh
    /// the efficiency estimate.
    pub fn compute_blade_loading(&mut self, elements: &[BladeElement], out: &mut CommandBuffer) {
        self.efficiency = calculate_blade_efficiency(elements);
        if self.efficiency < self.target_efficiency {
            debug!(
                efficiency = self.efficiency,
                target = self.target_efficiency,
                "blade efficiency below target"
            );
        }
        let per_blade = usize::from(self.elements_per_blade.max(1));
        for (i, e) in elements.iter().enumerate() {
            let adjustment = LOADING_GAIN * (OPTIMAL_AOA_DEG - e.angle_of_attack.to_degrees());
            if adjustment.is_finite() && adjustment != 0.0 {
                let _ = out.push(ServoCommand {
                    pitch_adjustment: adjustment,
                    ..ServoCommand::neutral((i / per_blade) as u8, (i % per_blade) as u8)
                });
            }
        }
    }

    fn strided(
        &self,
        stride: usize,
        out: &mut CommandBuffer,
        make: impl Fn(u8, u8) -> ServoCommand,
    ) {
        for blade in 0..self.num_blades {
            for element in (0..self.elements_per_blade).step_by(stride) {
                let _ = out.push(make(blade, element));
            }
        }
    }

    /// Replace `out` with the requests of the current mode. Uses the
    /// resonance state from the last `detect_resonance`.
    pub fn compute_adaptive_commands(
        &mut self,
        elements: &[BladeElement],
        vibrations: &[VibrationData],
        out: &mut CommandBuffer,
    ) {
        out.clear();
        match self.mode {
            AdaptationMode::Passive => {}
            AdaptationMode::ActiveVibrationSuppression => {
                self.compute_vibration_suppression(vibrations, out)
            }
            AdaptationMode::PerformanceOptimization => self.compute_blade_loading(elements, out),
            AdaptationMode::ResonanceAvoidance => {
                if self.resonance.active {
                    self.compute_resonance_avoidance(out);
                }
            }
            AdaptationMode::EmergencyAdaptation => self.compute_emergency_adaptation(out),
        }
    }

    // ─── Accessors ──────────────────────────────────────────────────

    #[inline]
    pub fn resonance(&self) -> &ResonanceCondition {
        &self.resonance
    }

    #[inline]
    pub fn is_resonance_detected(&self) -> bool {
        self.resonance.active
    }

    #[inline]
    pub fn spectrum(&self) -> &[f64] {
        &self.spectrum
    }

    /// Efficiency from the last loading pass.
    #[inline]
    pub fn current_efficiency(&self) -> f64 {
        self.efficiency
    }
}
