//! # Filtered Delay: a tempo-synced AU/VST3/CLAP delay plugin
//!
//! A stereo feedback delay with a resonant filter inside the loop, an
//! optional chorus stage in front of it, and delay times that can follow
//! the host tempo. Built with [nih-plug](https://github.com/robbert-vdh/nih-plug);
//! the same codebase produces Audio Unit (AUv2), VST3 and CLAP plugins.
//!
//! ## Layout
//!
//! ```text
//! lib.rs      host glue: layouts, lifecycle, format metadata
//! params.rs   nih-plug parameters, forwarding into the control block
//! controls.rs atomic parameter targets shared with the audio thread
//! engine.rs   the signal chain, host-independent
//! dsp/        delay line, filter, chorus, mixer, smoothing, tempo
//! ```
//!
//! The host-facing half (`FilteredDelayPlugin`, `DelayParams`) only moves
//! values around. All audio work happens in [`engine::FilteredDelay`],
//! which the tests drive directly.

pub mod controls;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod params;

use std::num::NonZeroU32;
use std::sync::Arc;

use nih_plug::prelude::*;

use controls::DelayControls;
use engine::FilteredDelay;
use params::DelayParams;

/// The plugin as the host sees it.
///
/// `params` and `engine` share one [`DelayControls`] block: parameter
/// callbacks write into it from any thread, and the engine reads it on
/// the audio thread.
pub struct FilteredDelayPlugin {
    params: Arc<DelayParams>,
    engine: FilteredDelay,
}

impl Default for FilteredDelayPlugin {
    fn default() -> Self {
        let controls = Arc::new(DelayControls::default());
        Self {
            params: Arc::new(DelayParams::new(Arc::clone(&controls))),
            engine: FilteredDelay::new(controls),
        }
    }
}

impl Plugin for FilteredDelayPlugin {
    const NAME: &'static str = "Filtered Delay";
    const VENDOR: &'static str = "Loveless Audio";
    const URL: &'static str = "";
    const EMAIL: &'static str = "steve.loveless@gmail.com";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    // Stereo first; most tracks are stereo. Mono has no partner channel,
    // so WIDTH does nothing there.
    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(2),
            main_output_channels: NonZeroU32::new(2),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
        AudioIOLayout {
            main_input_channels: NonZeroU32::new(1),
            main_output_channels: NonZeroU32::new(1),
            aux_input_ports: &[],
            aux_output_ports: &[],
            names: PortNames::const_default(),
        },
    ];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    // BPM Sync is re-read every sample, so automation landing mid-block
    // switches the delay source at the right sample.
    const SAMPLE_ACCURATE_AUTOMATION: bool = true;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    /// Allocate every buffer for the new configuration and report the
    /// resulting latency. Returning `false` tells the host this
    /// configuration cannot be used.
    fn initialize(
        &mut self,
        audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        context: &mut impl InitContext<Self>,
    ) -> bool {
        let num_channels = audio_io_layout
            .main_input_channels
            .map(|c| c.get() as usize)
            .unwrap_or(0);

        match self.configure(buffer_config.sample_rate, num_channels) {
            Some(latency) => {
                context.set_latency_samples(latency);
                true
            }
            None => false,
        }
    }

    /// Playback stopped or the plugin was bypassed: drop every echo still
    /// in flight.
    fn reset(&mut self) {
        self.engine.reset();
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        _aux: &mut AuxiliaryBuffers,
        context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        // The main buffer is in-place, so every channel carries input.
        let num_channels = buffer.channels();
        let tempo = context.transport().tempo;
        self.engine
            .process_block(buffer.as_slice(), num_channels, tempo);

        match self.engine.tail_samples() {
            Some(samples) => ProcessStatus::Tail(samples),
            None => ProcessStatus::KeepAlive,
        }
    }
}

impl FilteredDelayPlugin {
    /// Publish the parameters and prepare the engine. Returns the latency
    /// to report to the host, or `None` if the engine refused the stream.
    fn configure(&mut self, sample_rate: f32, num_channels: usize) -> Option<u32> {
        // State restores may have skipped callbacks for unchanged values.
        self.params.publish_all();

        match self.engine.prepare(sample_rate, num_channels) {
            Ok(()) => Some(self.engine.latency_samples()),
            Err(err) => {
                nih_error!("Cannot initialize Filtered Delay: {}", err);
                None
            }
        }
    }
}

impl ClapPlugin for FilteredDelayPlugin {
    const CLAP_ID: &'static str = "com.loveless-audio.filtered-delay-v1";
    const CLAP_DESCRIPTION: Option<&'static str> =
        Some("Tempo-synced stereo delay with a resonant filter in the feedback loop");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Stereo,
        ClapFeature::Mono,
        ClapFeature::Delay,
        ClapFeature::Filter,
    ];
}

impl Vst3Plugin for FilteredDelayPlugin {
    const VST3_CLASS_ID: [u8; 16] = *b"LvlssFltrDly_v01";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] = &[
        Vst3SubCategory::Fx,
        Vst3SubCategory::Delay,
        Vst3SubCategory::Filter,
    ];
}

nih_export_clap!(FilteredDelayPlugin);
nih_export_vst3!(FilteredDelayPlugin);

// AUv2 entry point wrapped around the CLAP export, for Logic Pro.
clap_wrapper::export_auv2!();
