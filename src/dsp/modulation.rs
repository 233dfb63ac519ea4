//! # Modulation Stage
//!
//! A short delay whose length is swept by a sine LFO: the classic chorus.
//! It sits in front of the feedback loop, so the modulated signal (not the
//! raw input) is what gets delayed and repeated, and every echo carries
//! the same gentle pitch wobble.
//!
//! ```text
//! delay(t) = centre + swing · depth · lfo(t)
//!
//! centre = 15 ms, swing = 10 ms, lfo ∈ [-1, 1]
//! ```
//!
//! The right channel reads the inverted LFO, so the two sides drift in
//! opposite directions and the stereo image widens.
//!
//! The stage has its own wet/dry mix. Bypass means mix 0 and active means
//! mix 1; the mix glides between them so toggling bypass does not click.
//! The delay lines keep running while bypassed, so re-enabling starts from
//! a filled buffer rather than silence.

use std::f32::consts::TAU;
use std::num::NonZeroUsize;

use super::delay_line::DelayLine;
use super::smoother::LinearSmoother;
use super::tempo::ms_to_samples;

pub const CENTRE_DELAY_MS: f32 = 15.0;
/// LFO swing at full depth, either side of the centre delay.
pub const MAX_SWING_MS: f32 = 10.0;

pub const MIN_RATE_HZ: f32 = 0.05;
pub const MAX_RATE_HZ: f32 = 5.0;
pub const MAX_FEEDBACK: f32 = 0.95;

/// Bypass crossfade, in milliseconds.
const MIX_SMOOTHING_MS: f32 = 20.0;

/// Channels with their own modulated delay (left and right).
const CHANNELS: usize = 2;

pub struct ModulationStage {
    sample_rate: f32,
    lines: Vec<DelayLine>,
    /// Last wet output per channel, for the stage's own feedback.
    last_wet: [f32; CHANNELS],

    /// LFO phase in cycles, always in `[0, 1)`.
    phase: f32,
    /// LFO value for the current frame, refreshed by `tick()`.
    lfo: f32,

    rate_hz: f32,
    depth: f32,
    feedback: f32,
    mix: LinearSmoother,
    /// Mix for the current frame, refreshed by `tick()`.
    current_mix: f32,
}

impl ModulationStage {
    pub fn new() -> Self {
        Self {
            sample_rate: 44100.0,
            lines: Vec::new(),
            last_wet: [0.0; CHANNELS],
            phase: 0.0,
            lfo: 0.0,
            rate_hz: 1.0,
            depth: 0.15,
            feedback: 0.0,
            mix: LinearSmoother::new(MIX_SMOOTHING_MS, 0.0),
            current_mix: 0.0,
        }
    }

    /// Allocate the per-channel delay lines for `sample_rate`.
    ///
    /// Must run before `process()`. Not real-time safe.
    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.mix.set_sample_rate(sample_rate);

        // Longest read is centre + swing, plus one sample for interpolation.
        let max_delay = ms_to_samples(CENTRE_DELAY_MS + MAX_SWING_MS, sample_rate);
        let capacity = NonZeroUsize::new(max_delay.ceil() as usize + 2).unwrap_or(NonZeroUsize::MIN);
        self.lines = (0..CHANNELS).map(|_| DelayLine::new(capacity)).collect();

        self.reset();
    }

    /// Clear delay lines and restart the LFO from phase zero.
    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        self.last_wet = [0.0; CHANNELS];
        self.phase = 0.0;
        self.lfo = 0.0;
        self.mix.settle();
        self.current_mix = self.mix.target();
    }

    pub fn set_rate(&mut self, rate_hz: f32) {
        self.rate_hz = if rate_hz.is_nan() {
            MIN_RATE_HZ
        } else {
            rate_hz.clamp(MIN_RATE_HZ, MAX_RATE_HZ)
        };
    }

    pub fn set_depth(&mut self, depth: f32) {
        self.depth = if depth.is_nan() { 0.0 } else { depth.clamp(0.0, 1.0) };
    }

    pub fn set_feedback(&mut self, feedback: f32) {
        self.feedback = if feedback.is_nan() {
            0.0
        } else {
            feedback.clamp(0.0, MAX_FEEDBACK)
        };
    }

    /// Wet proportion of this stage, 0 (dry-through) to 1 (fully wet).
    pub fn set_mix(&mut self, mix: f32) {
        let mix = if mix.is_nan() { 0.0 } else { mix.clamp(0.0, 1.0) };
        self.mix.set_target(mix);
    }

    /// `true` bypasses the stage (mix 0), `false` makes it fully wet.
    pub fn set_bypass(&mut self, bypass: bool) {
        self.set_mix(if bypass { 0.0 } else { 1.0 });
    }

    /// Snap the mix to its target without gliding. Used right after a
    /// stream reset, where there is no previous output to glide from.
    pub fn settle(&mut self) {
        self.mix.settle();
        self.current_mix = self.mix.target();
    }

    pub fn rate(&self) -> f32 {
        self.rate_hz
    }

    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Advance the LFO and the mix smoother by one frame. Call once per
    /// sample frame, before `process()` on each channel.
    #[inline]
    pub fn tick(&mut self) {
        self.lfo = (TAU * self.phase).sin();
        self.phase += self.rate_hz / self.sample_rate;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        self.current_mix = self.mix.next();
    }

    /// Process one sample of `channel` (0 = left, 1 = right).
    ///
    /// Channels without a modulated delay line pass through unchanged.
    #[inline]
    pub fn process(&mut self, channel: usize, input: f32) -> f32 {
        let Some(line) = self.lines.get_mut(channel) else {
            return input;
        };

        let lfo = if channel == 1 { -self.lfo } else { self.lfo };
        let delay_ms = CENTRE_DELAY_MS + MAX_SWING_MS * self.depth * lfo;
        let delay_samples = ms_to_samples(delay_ms, self.sample_rate);

        line.push(input + self.feedback * self.last_wet[channel]);
        let wet = line.pop_at(delay_samples);
        self.last_wet[channel] = wet;

        input * (1.0 - self.current_mix) + wet * self.current_mix
    }
}

impl Default for ModulationStage {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(sample_rate: f32) -> ModulationStage {
        let mut stage = ModulationStage::new();
        stage.prepare(sample_rate);
        stage
    }

    /// Bypassed, the stage reproduces its input bit for bit.
    #[test]
    fn test_bypass_is_transparent() {
        let mut stage = stage(48000.0);
        stage.set_bypass(true);
        stage.settle();
        stage.set_depth(1.0);

        for n in 0..4800 {
            stage.tick();
            let x = (n as f32 * 0.01).sin();
            assert_eq!(stage.process(0, x), x);
            assert_eq!(stage.process(1, -x), -x);
        }
    }

    /// Fully wet with zero depth, the stage is a plain 15 ms delay.
    #[test]
    fn test_active_with_zero_depth_delays_by_centre() {
        let sample_rate = 48000.0;
        let mut stage = stage(sample_rate);
        stage.set_bypass(false);
        stage.settle();
        stage.set_depth(0.0);

        let centre = ms_to_samples(CENTRE_DELAY_MS, sample_rate) as usize;
        let mut output = Vec::new();
        for n in 0..(centre + 10) {
            stage.tick();
            output.push(stage.process(0, if n == 0 { 1.0 } else { 0.0 }));
        }

        for (n, &y) in output.iter().enumerate() {
            let expected = if n == centre { 1.0 } else { 0.0 };
            assert!((y - expected).abs() < 1e-6, "Sample {n}: got {y}");
        }
    }

    /// The swept delay stays inside the ring buffer at full depth and
    /// produces a bounded, finite signal.
    #[test]
    fn test_full_depth_stays_bounded() {
        let mut stage = stage(44100.0);
        stage.set_bypass(false);
        stage.settle();
        stage.set_depth(1.0);
        stage.set_rate(MAX_RATE_HZ);
        stage.set_feedback(MAX_FEEDBACK);

        for n in 0..44100 {
            stage.tick();
            let x = (n as f32 * 0.05).sin();
            let left = stage.process(0, x);
            let right = stage.process(1, x);
            assert!(left.is_finite() && right.is_finite());
            assert!(left.abs() < 25.0 && right.abs() < 25.0);
        }
    }

    #[test]
    fn test_phase_wraps() {
        let mut stage = stage(1000.0);
        stage.set_rate(5.0);
        for _ in 0..10_000 {
            stage.tick();
            assert!((0.0..1.0).contains(&stage.phase()));
        }
    }

    /// Toggling bypass glides the mix instead of jumping.
    #[test]
    fn test_bypass_toggle_glides() {
        let mut stage = stage(48000.0);
        stage.set_bypass(true);
        stage.settle();

        stage.set_bypass(false);
        stage.tick();
        assert!(stage.current_mix > 0.0 && stage.current_mix < 0.01);

        for _ in 0..960 {
            stage.tick();
        }
        assert!((stage.current_mix - 1.0).abs() < 1e-5);
        assert!(!stage.mix.is_smoothing());
    }

    #[test]
    fn test_parameters_clamp() {
        let mut stage = ModulationStage::new();
        stage.set_rate(100.0);
        assert_eq!(stage.rate(), MAX_RATE_HZ);
        stage.set_rate(0.0);
        assert_eq!(stage.rate(), MIN_RATE_HZ);
        stage.set_depth(-1.0);
        assert_eq!(stage.depth(), 0.0);
        stage.set_depth(3.0);
        assert_eq!(stage.depth(), 1.0);
    }

    #[test]
    fn test_extra_channels_pass_through() {
        let mut stage = stage(48000.0);
        stage.set_bypass(false);
        stage.settle();
        stage.tick();
        assert_eq!(stage.process(2, 0.3), 0.3);
    }
}
