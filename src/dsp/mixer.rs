//! # Dry/Wet Mixer
//!
//! Linear crossfade between the untouched input (dry) and the delay
//! output (wet):
//!
//! ```text
//! output = dry * (1 - wet_proportion) + wet * wet_proportion
//!
//! wet_proportion = 0.0 → input only
//! wet_proportion = 1.0 → delay output only
//! ```
//!
//! If the wet path ever introduces latency, the dry path has to be held
//! back by the same amount or the blend turns into a comb filter. The
//! mixer keeps a small delay line per channel for that. This topology's
//! wet path is sample-accurate, so the engine runs it at zero latency and
//! the dry sample comes straight back out.

use std::num::NonZeroUsize;

use super::delay_line::DelayLine;
use super::smoother::LinearSmoother;

/// Wet-proportion ramp, in milliseconds.
const MIX_SMOOTHING_MS: f32 = 20.0;

pub struct DryWetMixer {
    dry_lines: Vec<DelayLine>,
    /// Samples the dry path is held back by.
    latency: usize,
    wet_proportion: LinearSmoother,
    /// Wet proportion for the current frame, refreshed by `tick()`.
    current: f32,
}

impl DryWetMixer {
    pub fn new() -> Self {
        Self {
            dry_lines: Vec::new(),
            latency: 0,
            wet_proportion: LinearSmoother::new(MIX_SMOOTHING_MS, 0.0),
            current: 0.0,
        }
    }

    /// Allocate dry buffers for `num_channels` channels, able to
    /// compensate up to `max_latency` samples. Not real-time safe.
    pub fn prepare(&mut self, sample_rate: f32, num_channels: usize, max_latency: usize) {
        let capacity = NonZeroUsize::new(max_latency + 1).unwrap_or(NonZeroUsize::MIN);
        self.dry_lines = (0..num_channels).map(|_| DelayLine::new(capacity)).collect();
        self.latency = self.latency.min(max_latency);
        self.wet_proportion.set_sample_rate(sample_rate);
        self.reset();
    }

    pub fn reset(&mut self) {
        for line in &mut self.dry_lines {
            line.clear();
        }
        self.wet_proportion.settle();
        self.current = self.wet_proportion.target();
    }

    /// Delay the dry path by `samples`, clamped to what `prepare()` made
    /// room for.
    pub fn set_wet_latency(&mut self, samples: usize) {
        let max = self
            .dry_lines
            .first()
            .map(|line| line.capacity() - 1)
            .unwrap_or(0);
        self.latency = samples.min(max);
    }

    pub fn wet_latency(&self) -> usize {
        self.latency
    }

    /// Set the wet proportion, clamped to `[0, 1]`.
    pub fn set_wet_proportion(&mut self, proportion: f32) {
        let proportion = if proportion.is_nan() {
            0.0
        } else {
            proportion.clamp(0.0, 1.0)
        };
        self.wet_proportion.set_target(proportion);
    }

    /// Snap the wet proportion to its target without gliding.
    pub fn settle(&mut self) {
        self.wet_proportion.settle();
        self.current = self.wet_proportion.target();
    }

    /// Advance the wet-proportion smoother by one frame.
    #[inline]
    pub fn tick(&mut self) {
        self.current = self.wet_proportion.next();
    }

    /// Capture this frame's dry sample for `channel`.
    #[inline]
    pub fn push_dry(&mut self, channel: usize, sample: f32) {
        if let Some(line) = self.dry_lines.get_mut(channel) {
            line.push(sample);
        }
    }

    /// Blend `wet` with the latency-aligned dry sample for `channel`.
    ///
    /// Channels the mixer was not prepared for return `wet` unchanged.
    #[inline]
    pub fn mix_wet(&self, channel: usize, wet: f32) -> f32 {
        let Some(line) = self.dry_lines.get(channel) else {
            return wet;
        };
        let dry = line.pop_at(self.latency as f32);
        dry * (1.0 - self.current) + wet * self.current
    }
}

impl Default for DryWetMixer {
    fn default() -> Self {
        Self::new()
    }
}
