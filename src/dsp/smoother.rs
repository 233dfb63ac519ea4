//! # Parameter Smoothing
//!
//! When a knob moves, the parameter jumps instantly. Feeding that jump
//! straight into a gain is zipper noise; feeding it into the delay time
//! makes the read head skip across the ring buffer, which is an audible
//! click. Both get spread over a short ramp instead.
//!
//! - [`LinearSmoother`]: nih-plug's [`Smoother`] with
//!   [`SmoothingStyle::Linear`], for gains (feedback, mixes). A straight
//!   line sounds natural there.
//! - [`RaisedCosineSmoother`]: a half-cosine window from start to target,
//!   for delay time and stereo width. It leaves and arrives with zero
//!   slope, so a single knob move glides the pitch instead of stepping it.
//!   nih-plug has no such shape.
//!
//! ```text
//! linear         raised cosine
//!        ____            ___
//!       /               /
//!      /               |
//! ____/            ___/
//! ```
//!
//! The engine re-sends every target once per sample. nih-plug's smoother
//! restarts its ramp on every `set_target()`, so both types here ignore a
//! target they already have.

use std::f32::consts::{FRAC_PI_2, PI};

use nih_plug::prelude::{Smoother, SmoothingStyle};

/// Sample rate assumed until `set_sample_rate()` is called from `prepare()`.
const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// A linear ramp backed by nih-plug's [`Smoother`].
///
/// The nih-plug smoother takes the sample rate with every new target and
/// does not expose the target it is heading for. This keeps both, so the
/// owner can hand over the same target every sample without restarting
/// the ramp.
pub struct LinearSmoother {
    smoother: Smoother<f32>,
    sample_rate: f32,
    target: f32,
}

impl LinearSmoother {
    /// Create a settled smoother sitting at `initial`, ramping over
    /// `duration_ms` on every change.
    pub fn new(duration_ms: f32, initial: f32) -> Self {
        let smoother = Smoother::new(SmoothingStyle::Linear(duration_ms));
        smoother.reset(initial);
        Self {
            smoother,
            sample_rate: DEFAULT_SAMPLE_RATE,
            target: initial,
        }
    }

    /// A ramp in flight restarts from its current value at the new rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        if self.smoother.is_smoothing() {
            self.smoother.set_target(sample_rate, self.target);
        }
    }

    #[inline]
    pub fn set_target(&mut self, value: f32) {
        if value == self.target {
            return;
        }
        self.target = value;
        self.smoother.set_target(self.sample_rate, value);
    }

    /// Jump to `value` immediately, cancelling any ramp.
    pub fn reset(&mut self, value: f32) {
        self.target = value;
        self.smoother.reset(value);
    }

    /// Snap to the current target.
    pub fn settle(&mut self) {
        self.reset(self.target);
    }

    #[inline]
    pub fn next(&mut self) -> f32 {
        self.smoother.next()
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.smoother.previous_value()
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.smoother.is_smoothing()
    }
}

/// Shape of the ramp currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RampShape {
    /// Started from rest: eases in and out.
    Cosine,
    /// Retargeted mid-ramp: constant speed toward the new target, so a
    /// target that moves every sample is tracked within one ramp length.
    Linear,
}

/// A scalar that glides toward its target along a raised-cosine curve.
///
/// Owned by exactly one pipeline stage and advanced only on the audio
/// thread. A change that arrives while the value is at rest starts a
/// cosine ramp. A change that arrives mid-ramp (continuous automation,
/// a knob being dragged) continues linearly from wherever the value is,
/// so the lag behind a moving target stays around one ramp length.
#[derive(Debug, Clone)]
pub struct RaisedCosineSmoother {
    duration_ms: f32,
    sample_rate: f32,
    /// Ramp length in samples at the current sample rate.
    ramp_len: u32,

    current: f32,
    target: f32,
    /// Value the current ramp started from.
    start: f32,
    /// Samples left in the current ramp. Zero when settled.
    remaining: u32,
    shape: RampShape,
}

impl RaisedCosineSmoother {
    /// Create a settled smoother sitting at `initial`.
    pub fn new(duration_ms: f32, initial: f32) -> Self {
        Self {
            duration_ms,
            sample_rate: DEFAULT_SAMPLE_RATE,
            ramp_len: ramp_len(duration_ms, DEFAULT_SAMPLE_RATE),
            current: initial,
            target: initial,
            start: initial,
            remaining: 0,
            shape: RampShape::Cosine,
        }
    }

    /// Reconfigure for a new sample rate, keeping the current value.
    ///
    /// A ramp in flight restarts from where it is now with the new length,
    /// so the output never jumps.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.ramp_len = ramp_len(self.duration_ms, sample_rate);
        if self.remaining > 0 {
            self.begin_ramp(self.shape);
        }
    }

    /// Aim at a new value. Setting the target it already has is a no-op.
    #[inline]
    pub fn set_target(&mut self, value: f32) {
        if value == self.target {
            return;
        }
        self.target = value;
        let shape = if self.remaining > 0 {
            RampShape::Linear
        } else {
            RampShape::Cosine
        };
        self.begin_ramp(shape);
    }

    /// Jump to `value` immediately, cancelling any ramp.
    pub fn reset(&mut self, value: f32) {
        self.current = value;
        self.target = value;
        self.start = value;
        self.remaining = 0;
        self.shape = RampShape::Cosine;
    }

    /// Advance by one sample and return the new value.
    #[inline]
    pub fn next(&mut self) -> f32 {
        if self.remaining == 0 {
            return self.current;
        }

        self.remaining -= 1;
        if self.remaining == 0 {
            self.current = self.target;
            return self.current;
        }

        let progress = (self.ramp_len - self.remaining) as f32 / self.ramp_len as f32;
        let shaped = match self.shape {
            RampShape::Linear => progress,
            RampShape::Cosine => 0.5 * (1.0 - (PI * progress).cos()),
        };
        let value = self.start + (self.target - self.start) * shaped;

        // Rounding must never carry us past the target.
        self.current = if self.target >= self.start {
            value.min(self.target)
        } else {
            value.max(self.target)
        };
        self.current
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        self.remaining > 0
    }

    pub fn ramp_len(&self) -> u32 {
        self.ramp_len
    }

    /// Largest change a single `next()` can make during the current ramp.
    pub fn max_step(&self) -> f32 {
        if self.remaining == 0 {
            return 0.0;
        }
        let per_sample = (self.target - self.start).abs() / self.ramp_len as f32;
        match self.shape {
            RampShape::Linear => per_sample,
            // Peak slope of 0.5 * (1 - cos(pi * t)) is pi / 2.
            RampShape::Cosine => per_sample * FRAC_PI_2,
        }
    }

    fn begin_ramp(&mut self, shape: RampShape) {
        if self.ramp_len == 0 {
            self.reset(self.target);
            return;
        }
        self.start = self.current;
        self.remaining = self.ramp_len;
        self.shape = shape;
    }
}

fn ramp_len(duration_ms: f32, sample_rate: f32) -> u32 {
    let samples = duration_ms * 0.001 * sample_rate;
    if samples.is_finite() && samples >= 1.0 {
        samples.round() as u32
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_settled() {
        let sv = RaisedCosineSmoother::new(2.5, 440.0);
        assert_eq!(sv.current(), 440.0);
        assert_eq!(sv.target(), 440.0);
        assert!(!sv.is_smoothing());

        let linear = LinearSmoother::new(20.0, 0.25);
        assert_eq!(linear.current(), 0.25);
        assert_eq!(linear.target(), 0.25);
        assert!(!linear.is_smoothing());
    }

    #[test]
    fn test_raised_cosine_converges() {
        let mut sv = RaisedCosineSmoother::new(2.5, 24000.0);
        sv.set_sample_rate(48000.0);
        sv.set_target(12000.0);

        assert_eq!(sv.ramp_len(), 120);
        for _ in 0..sv.ramp_len() {
            sv.next();
        }
        assert_eq!(sv.current(), 12000.0);
        assert!(!sv.is_smoothing());
    }

    /// No single step may exceed the bound implied by the ramp length,
    /// and every step moves toward the target.
    #[test]
    fn test_steps_are_bounded_and_monotonic() {
        let mut sv = RaisedCosineSmoother::new(2.5, 0.0);
        sv.set_sample_rate(44100.0);
        sv.set_target(1000.0);
        let bound = sv.max_step();

        let mut prev = sv.current();
        while sv.is_smoothing() {
            let value = sv.next();
            let step = value - prev;
            assert!(step >= 0.0, "Moved away from target");
            assert!(step <= bound * 1.001, "Step {step} exceeds bound {bound}");
            prev = value;
        }
        assert_eq!(prev, 1000.0);
    }

    /// Changing the target mid-ramp continues from the current value
    /// instead of jumping.
    #[test]
    fn test_retarget_mid_ramp_is_continuous() {
        let mut sv = RaisedCosineSmoother::new(10.0, 0.0);
        sv.set_sample_rate(44100.0);
        sv.set_target(1.0);
        for _ in 0..200 {
            sv.next();
        }
        let before = sv.current();

        sv.set_target(-1.0);
        let after = sv.next();
        assert!(
            (after - before).abs() <= sv.max_step() * 1.001,
            "Retarget jumped from {before} to {after}"
        );
        assert!(after <= before, "Should now head downward");
    }

    /// A target that moves every sample (sample-accurate automation) is
    /// followed with a lag of about one ramp length, not left behind.
    #[test]
    fn test_tracks_target_moving_every_sample() {
        let mut sv = RaisedCosineSmoother::new(2.5, 0.0);
        sv.set_sample_rate(48000.0);
        let ramp_len = sv.ramp_len() as f32;

        let mut lag = 0.0;
        for n in 1..=4800 {
            let target = n as f32;
            sv.set_target(target);
            let value = sv.next();
            lag = target - value;
            assert!(value <= target, "Overshot at sample {n}");
        }
        assert!(
            lag < 2.0 * ramp_len,
            "Lagging {lag} samples behind, ramp is {ramp_len}"
        );

        // Once the target stops, the value settles on it within a ramp.
        for _ in 0..sv.ramp_len() {
            sv.next();
        }
        assert_eq!(sv.current(), 4800.0);
    }

    /// Re-sending the same target every sample must not restart the ramp.
    #[test]
    fn test_same_target_does_not_restart() {
        let mut sv = RaisedCosineSmoother::new(1.0, 0.0);
        sv.set_sample_rate(10000.0);
        for _ in 0..10 {
            sv.set_target(1.0);
            sv.next();
        }
        assert_eq!(sv.current(), 1.0);

        let mut linear = LinearSmoother::new(1.0, 0.0);
        linear.set_sample_rate(10000.0);
        for _ in 0..10 {
            linear.set_target(1.0);
            linear.next();
        }
        assert!((linear.current() - 1.0).abs() < 1e-6);
        assert!(!linear.is_smoothing());
    }

    #[test]
    fn test_linear_reaches_target_after_ramp() {
        let mut linear = LinearSmoother::new(10.0, 0.0);
        linear.set_sample_rate(48000.0);
        linear.set_target(1.0);

        let first = linear.next();
        assert!(
            (first - 1.0 / 480.0).abs() < 1e-6,
            "Expected a 1/480 step, got {first}"
        );
        for _ in 1..480 {
            linear.next();
        }
        assert!((linear.current() - 1.0).abs() < 1e-5);
        assert!(!linear.is_smoothing());
    }

    #[test]
    fn test_sample_rate_change_preserves_current() {
        let mut sv = RaisedCosineSmoother::new(10.0, 0.0);
        sv.set_sample_rate(44100.0);
        sv.set_target(1.0);
        for _ in 0..100 {
            sv.next();
        }
        let mid = sv.current();

        sv.set_sample_rate(96000.0);
        assert_eq!(sv.current(), mid);
        assert_eq!(sv.ramp_len(), 960);

        for _ in 0..960 {
            sv.next();
        }
        assert_eq!(sv.current(), 1.0);
    }

    #[test]
    fn test_zero_duration_is_instant() {
        let mut sv = RaisedCosineSmoother::new(0.0, 0.0);
        sv.set_sample_rate(48000.0);
        sv.set_target(0.5);
        assert_eq!(sv.current(), 0.5);
        assert_eq!(sv.next(), 0.5);
    }

    #[test]
    fn test_reset_cancels_ramp() {
        let mut sv = RaisedCosineSmoother::new(50.0, 0.0);
        sv.set_target(1.0);
        sv.next();
        sv.reset(0.25);
        assert!(!sv.is_smoothing());
        assert_eq!(sv.next(), 0.25);

        let mut linear = LinearSmoother::new(50.0, 0.0);
        linear.set_target(1.0);
        linear.next();
        linear.reset(0.25);
        assert!(!linear.is_smoothing());
        assert_eq!(linear.next(), 0.25);
        assert_eq!(linear.target(), 0.25);
    }
}
