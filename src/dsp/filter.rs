//! # Feedback Filter (TPT State-Variable Filter)
//!
//! A two-pole filter that colours the repeats inside the feedback loop.
//! Each pass through the loop goes through the filter again, so a lowpass
//! makes every echo darker than the one before, a highpass makes them
//! thinner, and a bandpass narrows them toward the cutoff.
//!
//! ## Topology
//!
//! This is the "topology-preserving transform" (TPT) state-variable
//! filter: two trapezoidal integrators wired like the analog SVF circuit.
//! Because the integrator states map directly onto the analog capacitor
//! voltages, the filter stays well behaved when cutoff, resonance or mode
//! change while audio is running.
//!
//! ```text
//! g  = tan(π · cutoff / sample_rate)     prewarped integrator gain
//! R  = 1 / resonance                     damping
//! h  = 1 / (1 + R·g + g²)
//!
//! hp = h · (x - s1·(R + g) - s2)
//! bp = g·hp + s1        s1 = g·hp + bp
//! lp = g·bp + s2        s2 = g·bp + lp
//! ```
//!
//! All three responses fall out of the same computation, so switching mode
//! just picks a different output. The integrator states are untouched,
//! which is what keeps a mode switch from clicking.

use std::f32::consts::PI;

use nih_plug::prelude::Enum;

pub const MIN_CUTOFF_HZ: f32 = 20.0;
pub const MAX_CUTOFF_HZ: f32 = 20000.0;
/// Upper cutoff limit as a fraction of the sample rate. `tan()` blows up
/// at Nyquist (0.5), so stay a little below it.
const MAX_CUTOFF_RATIO: f32 = 0.49;

/// Resonance of zero would mean infinite damping (`R = 1 / 0`).
pub const MIN_RESONANCE: f32 = 0.01;
pub const MAX_RESONANCE: f32 = 2.0;

/// Which response the filter outputs.
#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMode {
    #[id = "lowpass"]
    #[name = "Lowpass"]
    Lowpass,
    #[id = "highpass"]
    #[name = "Highpass"]
    Highpass,
    #[id = "bandpass"]
    #[name = "Bandpass"]
    Bandpass,
}

impl FilterMode {
    /// Map a raw choice (0 = lowpass, 1 = highpass, 2 = bandpass).
    /// Anything else selects bandpass.
    pub fn from_choice(index: usize) -> Self {
        match index {
            0 => Self::Lowpass,
            1 => Self::Highpass,
            _ => Self::Bandpass,
        }
    }

    pub fn choice(self) -> usize {
        self as usize
    }
}

/// One channel's TPT state-variable filter.
#[derive(Debug, Clone)]
pub struct TptFilter {
    mode: FilterMode,
    sample_rate: f32,
    cutoff_hz: f32,
    resonance: f32,

    // Coefficients, recomputed only when cutoff, resonance or sample rate
    // change.
    g: f32,
    r: f32,
    h: f32,

    // Integrator states.
    s1: f32,
    s2: f32,
}

impl TptFilter {
    pub fn new() -> Self {
        let mut filter = Self {
            mode: FilterMode::Lowpass,
            sample_rate: 44100.0,
            cutoff_hz: 1000.0,
            resonance: std::f32::consts::FRAC_1_SQRT_2,
            g: 0.0,
            r: 0.0,
            h: 0.0,
            s1: 0.0,
            s2: 0.0,
        };
        filter.update_coefficients();
        filter
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_coefficients();
    }

    /// Takes effect on the next processed sample. State is kept.
    #[inline]
    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    /// Set the cutoff, clamped to 20 Hz..min(20 kHz, 0.49 · sample rate).
    pub fn set_cutoff(&mut self, cutoff_hz: f32) {
        let max = self.max_cutoff();
        let cutoff_hz = if cutoff_hz.is_nan() {
            MIN_CUTOFF_HZ
        } else {
            cutoff_hz.clamp(MIN_CUTOFF_HZ, max)
        };
        if cutoff_hz != self.cutoff_hz {
            self.cutoff_hz = cutoff_hz;
            self.update_coefficients();
        }
    }

    /// Set the resonance, clamped to 0.01..2.
    pub fn set_resonance(&mut self, resonance: f32) {
        let resonance = if resonance.is_nan() {
            MIN_RESONANCE
        } else {
            resonance.clamp(MIN_RESONANCE, MAX_RESONANCE)
        };
        if resonance != self.resonance {
            self.resonance = resonance;
            self.update_coefficients();
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff_hz
    }

    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    /// Filter one sample.
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let hp = self.h * (input - self.s1 * (self.r + self.g) - self.s2);

        let bp = self.g * hp + self.s1;
        self.s1 = self.g * hp + bp;

        let lp = self.g * bp + self.s2;
        self.s2 = self.g * bp + lp;

        match self.mode {
            FilterMode::Lowpass => lp,
            FilterMode::Highpass => hp,
            FilterMode::Bandpass => bp,
        }
    }

    /// Zero the integrators.
    pub fn reset(&mut self) {
        self.s1 = 0.0;
        self.s2 = 0.0;
    }

    fn max_cutoff(&self) -> f32 {
        MAX_CUTOFF_HZ
            .min(self.sample_rate * MAX_CUTOFF_RATIO)
            .max(MIN_CUTOFF_HZ)
    }

    fn update_coefficients(&mut self) {
        // Re-apply the clamp: a lower sample rate may have pulled the
        // ceiling below the stored cutoff.
        self.cutoff_hz = self.cutoff_hz.clamp(MIN_CUTOFF_HZ, self.max_cutoff());

        self.g = (PI * self.cutoff_hz / self.sample_rate).tan();
        self.r = 1.0 / self.resonance;
        self.h = 1.0 / (1.0 + self.r * self.g + self.g * self.g);
    }
}

impl Default for TptFilter {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────
