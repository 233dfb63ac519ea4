//! # Delay Engine
//!
//! The host-independent signal chain. The plugin wrapper in `lib.rs` owns
//! one [`FilteredDelay`] and forwards `initialize()`, `reset()` and
//! `process()` to it; tests drive it directly with plain slices.
//!
//! ## Signal Flow (per channel of the stereo pair)
//!
//! ```text
//!            ┌───────────────────────────────── dry ───────────────────┐
//!            │                                                         ▼
//! input ─────┴─► [Modulation] ─► (−) ─► [Delay Line] ─► [Filter] ─► (+) ─► [Mixer] ─► out
//!                                 ▲                                  ▲ │
//!                                 │                                  │ │
//!                                 └──────────── decay ◄──────────────┴─┘
//!                                      decay = out · feedback · 0.5
//! ```
//!
//! The decayed previous output is subtracted before the delay line and
//! added back after the filter. The delay buffer never stores the loop
//! gain itself; the decay state carries it.
//!
//! ## Channels
//!
//! Channels 0 and 1 form a stereo pair with independent feedback loops.
//! The left side reads `delay + width`, the right side reads `delay`, so
//! WIDTH pulls the two sides apart. Any further channels pass through
//! untouched, and output channels beyond the input count are silenced.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::controls::{DelayControls, ParamId};
use crate::dsp::delay_line::DelayLine;
use crate::dsp::filter::{FilterMode, TptFilter};
use crate::dsp::mixer::DryWetMixer;
use crate::dsp::modulation::{ModulationStage, CENTRE_DELAY_MS, MAX_SWING_MS};
use crate::dsp::smoother::{LinearSmoother, RaisedCosineSmoother};
use crate::dsp::tempo::{effective_bpm, ms_to_samples, samples_to_ms, SyncMode, TempoSync};
use crate::error::PrepareError;

/// Longest delay the ring buffers hold: a whole note at 30 BPM, and four
/// times the longest free-running RATE. Longer synced times clamp.
pub const MAX_DELAY_SECONDS: f32 = 8.0;

/// Fixed scale folded into the feedback decay on top of the FEEDBACK gain.
pub const FEEDBACK_SCALE: f32 = 0.5;

/// Below this the filter cannot keep its cutoff range under Nyquist.
pub const MIN_SAMPLE_RATE: f32 = 8000.0;

/// Room reserved for dry-path latency compensation in the mixer.
const MAX_WET_LATENCY: usize = 1024;

/// Raised-cosine glide for delay time and width, in milliseconds.
const DELAY_SMOOTHING_MS: f32 = 2.5;
/// Linear feedback-gain ramp, in milliseconds.
const FEEDBACK_SMOOTHING_MS: f32 = 50.0;

/// A channel's role within the stereo pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairSide {
    Left,
    Right,
}

impl PairSide {
    /// Channel 0 is left, channel 1 is right, the rest are not part of
    /// the pair.
    pub fn from_channel(channel: usize) -> Option<Self> {
        match channel {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            _ => None,
        }
    }
}

/// One side's feedback loop: delay line, filter and decay state.
struct FeedbackPath {
    delay_line: DelayLine,
    filter: TptFilter,
    feedback: LinearSmoother,
    /// Previous output, already scaled by feedback gain and
    /// [`FEEDBACK_SCALE`].
    decay: f32,
}

impl FeedbackPath {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            delay_line: DelayLine::new(capacity),
            filter: TptFilter::new(),
            feedback: LinearSmoother::new(FEEDBACK_SMOOTHING_MS, 0.0),
            decay: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, input: f32, delay_samples: f32) -> f32 {
        self.delay_line.push(input - self.decay);
        let wet = self.filter.process(self.delay_line.pop_at(delay_samples));

        let output = wet + self.decay;
        self.decay = output * self.feedback.next() * FEEDBACK_SCALE;
        nih_plug::nih_debug_assert!(self.decay.is_finite());
        output
    }

    fn reset(&mut self) {
        self.delay_line.clear();
        self.filter.reset();
        self.decay = 0.0;
    }
}

/// Left and right feedback loops bound together.
pub struct StereoPair {
    left: FeedbackPath,
    right: FeedbackPath,
}

impl StereoPair {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            left: FeedbackPath::new(capacity),
            right: FeedbackPath::new(capacity),
        }
    }

    fn side_mut(&mut self, side: PairSide) -> &mut FeedbackPath {
        match side {
            PairSide::Left => &mut self.left,
            PairSide::Right => &mut self.right,
        }
    }

    fn paths_mut(&mut self) -> [&mut FeedbackPath; 2] {
        [&mut self.left, &mut self.right]
    }

    /// Push this frame's shared loop settings into both sides.
    #[inline]
    fn configure(&mut self, feedback: f32, mode: FilterMode, cutoff: f32, resonance: f32) {
        for path in self.paths_mut() {
            path.feedback.set_target(feedback);
            path.filter.set_mode(mode);
            path.filter.set_cutoff(cutoff);
            path.filter.set_resonance(resonance);
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        for path in self.paths_mut() {
            path.feedback.set_sample_rate(sample_rate);
            path.filter.set_sample_rate(sample_rate);
        }
    }

    fn settle_feedback(&mut self) {
        for path in self.paths_mut() {
            path.feedback.settle();
        }
    }

    fn capacity(&self) -> usize {
        self.left.delay_line.capacity()
    }

    fn reset(&mut self) {
        self.left.reset();
        self.right.reset();
    }
}

/// The complete delay effect for one audio stream.
pub struct FilteredDelay {
    controls: Arc<DelayControls>,

    sample_rate: f32,
    num_channels: usize,
    prepared: bool,
    /// Set by `reset()`: the first frame afterwards snaps every smoother
    /// straight to its target instead of gliding from stale values.
    settle_pending: bool,

    tempo: TempoSync,
    mode: SyncMode,
    delay_time: RaisedCosineSmoother,
    delay_offset: RaisedCosineSmoother,

    pair: StereoPair,
    modulation: ModulationStage,
    mixer: DryWetMixer,
}

impl FilteredDelay {
    pub fn new(controls: Arc<DelayControls>) -> Self {
        let default_rate = 44100.0;
        Self {
            controls,
            sample_rate: default_rate,
            num_channels: 0,
            prepared: false,
            settle_pending: true,
            tempo: TempoSync::new(default_rate),
            mode: SyncMode::Free,
            delay_time: RaisedCosineSmoother::new(DELAY_SMOOTHING_MS, 0.0),
            delay_offset: RaisedCosineSmoother::new(DELAY_SMOOTHING_MS, 0.0),
            // Placeholder single-sample rings until `prepare()` sizes them.
            pair: StereoPair::new(NonZeroUsize::MIN),
            modulation: ModulationStage::new(),
            mixer: DryWetMixer::new(),
        }
    }

    /// Configure for a stream and allocate every buffer. Blocking, not
    /// real-time safe; the host calls it before audio resumes.
    ///
    /// All state from a previous configuration is discarded, even when
    /// the new configuration is identical.
    pub fn prepare(&mut self, sample_rate: f32, num_channels: usize) -> Result<(), PrepareError> {
        if !sample_rate.is_finite() || sample_rate < MIN_SAMPLE_RATE {
            return Err(PrepareError::InvalidSampleRate(sample_rate));
        }
        if num_channels == 0 {
            return Err(PrepareError::NoChannels);
        }

        self.sample_rate = sample_rate;
        self.num_channels = num_channels;
        self.tempo = TempoSync::new(sample_rate);

        // Longest read: MAX_DELAY_SECONDS plus the full width offset, plus
        // one sample for interpolation.
        let max_width_ms = ParamId::Width.range().1;
        let max_delay = MAX_DELAY_SECONDS * sample_rate + ms_to_samples(max_width_ms, sample_rate);
        let capacity = NonZeroUsize::new(max_delay.ceil() as usize + 2).unwrap_or(NonZeroUsize::MIN);

        self.pair = StereoPair::new(capacity);
        self.pair.set_sample_rate(sample_rate);
        self.delay_time.set_sample_rate(sample_rate);
        self.delay_offset.set_sample_rate(sample_rate);
        self.modulation.prepare(sample_rate);
        self.mixer
            .prepare(sample_rate, num_channels.min(2), MAX_WET_LATENCY);
        self.controls.seed_synced_rate();

        nih_plug::nih_log!(
            "Delay prepared: {} Hz, {} channel(s), {} samples of delay per channel",
            sample_rate,
            num_channels,
            capacity
        );

        self.prepared = true;
        self.reset();
        Ok(())
    }

    /// Silence every buffer and restart every oscillator. Parameter
    /// targets are kept; smoothers snap to them on the next frame.
    pub fn reset(&mut self) {
        self.pair.reset();
        self.modulation.reset();
        self.mixer.reset();
        self.settle_pending = true;
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn sync_mode(&self) -> SyncMode {
        self.mode
    }

    /// Current (smoothed) delay time of the right channel, in samples.
    pub fn delay_samples(&self) -> f32 {
        self.delay_time.current()
    }

    /// Current (smoothed) extra delay of the left channel, in samples.
    pub fn width_samples(&self) -> f32 {
        self.delay_offset.current()
    }

    pub fn delay_capacity(&self) -> usize {
        self.pair.capacity()
    }

    /// Latency the wet path adds. The dry path is compensated internally.
    pub fn latency_samples(&self) -> u32 {
        self.mixer.wet_latency() as u32
    }

    /// Process one block in place.
    ///
    /// `channels` are the output buffers, pre-filled with input for the
    /// first `num_input_channels` of them. `host_tempo` is read once for
    /// the whole block; `None` or nonsense means 120 BPM.
    pub fn process_block(
        &mut self,
        channels: &mut [&mut [f32]],
        num_input_channels: usize,
        host_tempo: Option<f64>,
    ) {
        for channel in channels.iter_mut().skip(num_input_channels) {
            channel.fill(0.0);
        }
        if !self.prepared {
            return;
        }

        let bpm = effective_bpm(host_tempo);
        let active = channels.len().min(num_input_channels).min(2);
        let stereo = active == 2;
        let num_samples = channels
            .iter()
            .take(active)
            .map(|channel| channel.len())
            .min()
            .unwrap_or(0);

        for sample_idx in 0..num_samples {
            let (delay, width) = self.advance_frame(bpm);

            for (channel_idx, channel) in channels.iter_mut().take(active).enumerate() {
                let Some(side) = PairSide::from_channel(channel_idx) else {
                    continue;
                };
                let input = channel[sample_idx];

                self.mixer.push_dry(channel_idx, input);
                let modulated = self.modulation.process(channel_idx, input);

                // A mono stream has no partner to be wide against.
                let read_delay = match side {
                    PairSide::Left if stereo => delay + width,
                    _ => delay,
                };
                let wet = self.pair.side_mut(side).process(modulated, read_delay);

                channel[sample_idx] = self.mixer.mix_wet(channel_idx, wet);
            }
        }
    }

    /// How long the output keeps ringing after the input stops, in
    /// samples. `None` when the loop does not decay (FEEDBACK at 1).
    ///
    /// Each pass around the loop scales the echo cluster by
    /// `a / (1 - a)` with `a = feedback · 0.5`. The tail ends once the
    /// clusters are 60 dB down.
    pub fn tail_samples(&self) -> Option<u32> {
        let delay = self.delay_time.target() + self.delay_offset.target();
        let modulation = ms_to_samples(CENTRE_DELAY_MS + MAX_SWING_MS, self.sample_rate);
        let period = delay + modulation;

        let decay = self.controls.feedback().clamp(0.0, 1.0) * FEEDBACK_SCALE;
        let ratio = decay / (1.0 - decay);

        if ratio >= 0.999 {
            return None;
        }
        let passes = if ratio > 0.001 {
            // log10(0.001) = -3
            -3.0 / ratio.log10()
        } else {
            1.0
        };
        Some(((passes + 1.0) * period) as u32)
    }

    /// Read this frame's control targets, feed them to the stages, and
    /// advance every per-frame smoother. Returns the smoothed delay and
    /// width in samples.
    #[inline]
    fn advance_frame(&mut self, bpm: f64) -> (f32, f32) {
        let controls = &*self.controls;

        // Sync mode is re-read every sample: hosts with sample-accurate
        // automation can flip it mid-block.
        self.mode = SyncMode::from_flag(controls.bpm_sync());
        let delay_target =
            self.tempo
                .delay_samples(self.mode, controls.subdivision(), bpm, controls.rate_ms());
        if self.mode == SyncMode::Synced {
            controls.publish_synced_rate(samples_to_ms(delay_target, self.sample_rate));
        }
        let width_target = ms_to_samples(controls.width_ms(), self.sample_rate);

        self.delay_time.set_target(delay_target);
        self.delay_offset.set_target(width_target);
        self.pair.configure(
            controls.feedback(),
            controls.filter_mode(),
            controls.cutoff_hz(),
            controls.resonance(),
        );
        self.modulation.set_bypass(controls.mod_bypass());
        self.modulation.set_rate(controls.mod_rate_hz());
        self.modulation.set_depth(controls.mod_depth());
        self.modulation.set_feedback(controls.mod_feedback());
        self.mixer.set_wet_proportion(controls.mix());

        if self.settle_pending {
            self.delay_time.reset(delay_target);
            self.delay_offset.reset(width_target);
            self.pair.settle_feedback();
            self.modulation.settle();
            self.mixer.settle();
            self.settle_pending = false;
        }

        self.modulation.tick();
        self.mixer.tick();
        (self.delay_time.next(), self.delay_offset.next())
    }
}
