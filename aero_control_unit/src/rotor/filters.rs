//! Vibration level conditioning.
//!
//! The raw per-cycle vibration level carries a strong component at the
//! blade-passing frequency. It goes through a biquad notch centred on the
//! BPF, then a first-order low-pass. The result drives the rotor's
//! excessive-vibration fault and its health score. A zero frequency
//! disables either stage.

use core::f64::consts::PI;

/// Retune threshold for the notch centre [Hz].
const RETUNE_EPSILON_HZ: f64 = 0.5;

// ─── Notch ──────────────────────────────────────────────────────────

/// Biquad notch coefficients, normalised by `a0`.
///
/// ```text
/// H(z) = (b0 + b1·z⁻¹ + b2·z⁻²) / (1 + a1·z⁻¹ + a2·z⁻²)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Biquad {
    /// `None` when the centre is not strictly inside (0, Nyquist).
    fn notch(center_hz: f64, bandwidth_hz: f64, sample_rate: f64) -> Option<Self> {
        if !(center_hz > 0.0) || !(sample_rate > 0.0) || center_hz >= 0.5 * sample_rate {
            return None;
        }
        let bw = if bandwidth_hz > 0.0 {
            bandwidth_hz
        } else {
            0.1 * center_hz
        };
        let w0 = 2.0 * PI * center_hz / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() * (bw * PI / sample_rate).tanh();
        let a0 = 1.0 + alpha;
        if a0.abs() < 1e-15 {
            return None;
        }
        Some(Self {
            b0: 1.0 / a0,
            b1: -2.0 * cos_w0 / a0,
            b2: 1.0 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        })
    }
}

/// Direct Form I notch.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotchFilter {
    coeffs: Option<Biquad>,
    center_hz: f64,
    x: [f64; 2],
    y: [f64; 2],
}

impl NotchFilter {
    /// Recompute coefficients and clear history.
    pub fn tune(&mut self, center_hz: f64, bandwidth_hz: f64, sample_rate: f64) {
        self.coeffs = Biquad::notch(center_hz, bandwidth_hz, sample_rate);
        self.center_hz = if self.coeffs.is_some() { center_hz } else { 0.0 };
        self.reset();
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.coeffs.is_some()
    }

    /// Current centre [Hz], 0 when disabled.
    #[inline]
    pub fn center_hz(&self) -> f64 {
        self.center_hz
    }

    #[inline]
    pub fn apply(&mut self, input: f64) -> f64 {
        let Some(c) = self.coeffs else {
            return input;
        };
        let output = c.b0 * input + c.b1 * self.x[0] + c.b2 * self.x[1]
            - c.a1 * self.y[0]
            - c.a2 * self.y[1];
        self.x = [input, self.x[0]];
        self.y = [output, self.y[0]];
        output
    }

    #[inline]
    pub fn reset(&mut self) {
        self.x = [0.0; 2];
        self.y = [0.0; 2];
    }
}

// ─── Low-pass ───────────────────────────────────────────────────────

/// First-order low-pass, starting from rest.
///
/// ```text
/// alpha = 2π·f·dt / (1 + 2π·f·dt)
/// y[n]  = y[n-1] + alpha·(x[n] − y[n-1])
/// ```
///
/// A step reaches ~63 % after `1 / (2π·f)` seconds.
#[derive(Debug, Clone, Copy, Default)]
pub struct LowPass {
    output: f64,
}

impl LowPass {
    /// A disabled stage (`cutoff_hz <= 0`) tracks its input.
    #[inline]
    pub fn apply(&mut self, cutoff_hz: f64, input: f64, dt: f64) -> f64 {
        if !(cutoff_hz > 0.0) || !(dt > 0.0) {
            self.output = input;
            return input;
        }
        let omega = 2.0 * PI * cutoff_hz * dt;
        self.output += omega / (1.0 + omega) * (input - self.output);
        self.output
    }

    #[inline]
    pub fn output(&self) -> f64 {
        self.output
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

// ─── Chain ──────────────────────────────────────────────────────────

/// Notch at the blade-passing frequency followed by a low-pass.
#[derive(Debug, Clone, Copy)]
pub struct VibrationFilter {
    notch: NotchFilter,
    lowpass: LowPass,
    bandwidth_hz: f64,
    cutoff_hz: f64,
    sample_rate: f64,
}

impl VibrationFilter {
    pub fn new(bandwidth_hz: f64, cutoff_hz: f64, sample_rate: f64) -> Self {
        Self {
            notch: NotchFilter::default(),
            lowpass: LowPass::default(),
            bandwidth_hz,
            cutoff_hz,
            sample_rate,
        }
    }

    /// Follow the rotor speed. Small drifts keep the filter history.
    pub fn retune(&mut self, blade_passing_hz: f64) {
        if (blade_passing_hz - self.notch.center_hz()).abs() > RETUNE_EPSILON_HZ {
            self.notch
                .tune(blade_passing_hz, self.bandwidth_hz, self.sample_rate);
        }
    }

    /// Filter one level sample. Non-finite samples are dropped and the
    /// previous output is returned.
    pub fn apply(&mut self, level: f64, dt: f64) -> f64 {
        if !level.is_finite() {
            return self.lowpass.output();
        }
        let notched = self.notch.apply(level);
        self.lowpass.apply(self.cutoff_hz, notched, dt)
    }

    #[inline]
    pub fn output(&self) -> f64 {
        self.lowpass.output()
    }

    #[inline]
    pub fn notch_center_hz(&self) -> f64 {
        self.notch.center_hz()
    }

    pub fn reset(&mut self) {
        self.notch.reset();
        self.lowpass.reset();
    }
}
