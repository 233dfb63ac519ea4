//! # Plugin Parameters
//!
//! The host-facing parameter set. Every parameter's `#[id]` is one of the
//! stable identifiers from [`ParamId`], so sessions and automation lanes
//! keep pointing at the right control.
//!
//! ## Where values go
//!
//! nih-plug owns the parameter values, but the engine never reads them.
//! Each parameter carries a callback that forwards every change into the
//! shared [`DelayControls`] block:
//!
//! ```text
//! host / GUI / automation ──► FloatParam ──callback──► DelayControls (atomics)
//!                                                             │
//!                                      audio thread ◄─────────┘ loads targets
//! ```
//!
//! No smoothers are attached to the parameters themselves. The engine
//! smooths the targets it loads: nih-plug's `Smoother` for the gains, a
//! raised-cosine glide for delay time and width.
//!
//! Callbacks only fire on change. After a state restore the plugin calls
//! [`DelayParams::publish_all()`] so the control block matches whatever
//! the host loaded.

use std::sync::Arc;

use nih_plug::prelude::*;

use crate::controls::{DelayControls, ParamChange, ParamId};
use crate::dsp::filter::FilterMode;
use crate::dsp::tempo::Subdivision;

#[derive(Params)]
pub struct DelayParams {
    controls: Arc<DelayControls>,

    /// **BPM Sync**: follow the host tempo instead of the RATE knob.
    #[id = "BPM_SYNC"]
    pub bpm_sync: BoolParam,

    /// **Sync Rate**: note value of the delay while synced.
    #[id = "SYNC_RATE_CHOICE"]
    pub sync_rate: EnumParam<Subdivision>,

    /// **Rate**: free-running delay time in milliseconds.
    ///
    /// While BPM Sync is on the knob is inert, and its display shows the
    /// delay time the tempo currently produces.
    #[id = "RATE"]
    pub rate: FloatParam,

    /// **Feedback**: how long the echoes keep coming back.
    #[id = "FEEDBACK"]
    pub feedback: FloatParam,

    /// **Width**: extra delay on the left channel, in milliseconds.
    #[id = "WIDTH"]
    pub width: FloatParam,

    #[id = "MIX"]
    pub mix: FloatParam,

    #[id = "FILTER_TYPE"]
    pub filter_type: EnumParam<FilterMode>,

    /// **Cutoff**: corner frequency of the filter inside the feedback
    /// loop. Each repeat passes through it again.
    #[id = "CUTOFF"]
    pub cutoff: FloatParam,

    #[id = "RESONANCE"]
    pub resonance: FloatParam,

    /// **Mod Bypass**: switch the chorus stage in front of the loop off.
    #[id = "MOD_BP"]
    pub mod_bypass: BoolParam,

    #[id = "MOD_RATE"]
    pub mod_rate: FloatParam,

    #[id = "MOD_DEPTH"]
    pub mod_depth: FloatParam,

    #[id = "MOD_FB"]
    pub mod_feedback: FloatParam,
}

impl DelayParams {
    pub fn new(controls: Arc<DelayControls>) -> Self {
        let rate_display = {
            let controls = Arc::clone(&controls);
            Arc::new(move |value: f32| {
                let ms = if controls.bpm_sync() {
                    controls.live_rate_ms()
                } else {
                    value
                };
                format!("{ms:.1}")
            })
        };

        Self {
            bpm_sync: BoolParam::new("BPM Sync", ParamId::BpmSync.default_value() >= 0.5)
                .with_callback(forward(&controls, ParamChange::BpmSync)),

            sync_rate: EnumParam::new("Sync Rate", Subdivision::DEFAULT)
                .with_callback(forward(&controls, ParamChange::SyncRate)),

            rate: float_param(
                "Rate",
                ParamId::Rate,
                FloatRange::Skewed {
                    min: ParamId::Rate.range().0,
                    max: ParamId::Rate.range().1,
                    factor: FloatRange::skew_factor(-1.0),
                },
                &controls,
            )
            .with_unit(" ms")
            .with_step_size(0.1)
            .with_value_to_string(rate_display),

            feedback: percentage_param("Feedback", ParamId::Feedback, &controls),

            width: float_param("Width", ParamId::Width, linear(ParamId::Width), &controls)
                .with_unit(" ms")
                .with_step_size(0.01),

            mix: percentage_param("Mix", ParamId::Mix, &controls),

            filter_type: EnumParam::new("Filter Type", FilterMode::Lowpass)
                .with_callback(forward(&controls, ParamChange::FilterType)),

            cutoff: float_param(
                "Cutoff",
                ParamId::Cutoff,
                FloatRange::Skewed {
                    min: ParamId::Cutoff.range().0,
                    max: ParamId::Cutoff.range().1,
                    factor: FloatRange::skew_factor(-2.0),
                },
                &controls,
            )
            .with_unit(" Hz")
            .with_step_size(1.0),

            resonance: float_param(
                "Resonance",
                ParamId::Resonance,
                linear(ParamId::Resonance),
                &controls,
            )
            .with_step_size(0.001),

            mod_bypass: BoolParam::new("Mod Bypass", ParamId::ModBypass.default_value() >= 0.5)
                .with_callback(forward(&controls, ParamChange::ModBypass)),

            mod_rate: float_param(
                "Mod Rate",
                ParamId::ModRate,
                FloatRange::Skewed {
                    min: ParamId::ModRate.range().0,
                    max: ParamId::ModRate.range().1,
                    factor: FloatRange::skew_factor(-1.0),
                },
                &controls,
            )
            .with_unit(" Hz")
            .with_step_size(0.01),

            mod_depth: percentage_param("Mod Depth", ParamId::ModDepth, &controls),

            mod_feedback: percentage_param("Mod Feedback", ParamId::ModFeedback, &controls),

            controls,
        }
    }

    /// The control block every callback writes into.
    pub fn controls(&self) -> &Arc<DelayControls> {
        &self.controls
    }

    /// Push every current parameter value into the control block.
    ///
    /// Restoring state sets values without firing callbacks when a value
    /// happens to match, so `initialize()` calls this to guarantee the
    /// engine starts from what the host has loaded.
    pub fn publish_all(&self) {
        let changes = [
            ParamChange::BpmSync(self.bpm_sync.value()),
            ParamChange::SyncRate(self.sync_rate.value()),
            ParamChange::Rate(self.rate.value()),
            ParamChange::Feedback(self.feedback.value()),
            ParamChange::Width(self.width.value()),
            ParamChange::Mix(self.mix.value()),
            ParamChange::FilterType(self.filter_type.value()),
            ParamChange::Cutoff(self.cutoff.value()),
            ParamChange::Resonance(self.resonance.value()),
            ParamChange::ModBypass(self.mod_bypass.value()),
            ParamChange::ModRate(self.mod_rate.value()),
            ParamChange::ModDepth(self.mod_depth.value()),
            ParamChange::ModFeedback(self.mod_feedback.value()),
        ];
        for change in changes {
            self.controls.apply(change);
        }
    }
}

fn linear(id: ParamId) -> FloatRange {
    let (min, max) = id.range();
    FloatRange::Linear { min, max }
}

/// Wrap a typed change constructor into a parameter callback.
fn forward<T: 'static>(
    controls: &Arc<DelayControls>,
    change: fn(T) -> ParamChange,
) -> Arc<dyn Fn(T) + Send + Sync> {
    let controls = Arc::clone(controls);
    Arc::new(move |value| controls.apply(change(value)))
}

/// A float parameter whose default and clamping come from `id`.
fn float_param(
    name: &str,
    id: ParamId,
    range: FloatRange,
    controls: &Arc<DelayControls>,
) -> FloatParam {
    let controls = Arc::clone(controls);
    FloatParam::new(name, id.default_value(), range)
        .with_callback(Arc::new(move |value| {
            controls.apply(ParamChange::from_raw(id, value))
        }))
}

fn percentage_param(name: &str, id: ParamId, controls: &Arc<DelayControls>) -> FloatParam {
    float_param(name, id, linear(id), controls)
        .with_unit("%")
        .with_value_to_string(formatters::v2s_f32_percentage(1))
        .with_string_to_value(formatters::s2v_f32_percentage())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> DelayParams {
        DelayParams::new(Arc::new(DelayControls::default()))
    }

    /// Parameter defaults and control-block defaults come from the same
    /// table and must agree.
    #[test]
    fn test_defaults_agree_with_control_block() {
        let params = params();
        let controls = params.controls();

        assert_eq!(params.bpm_sync.value(), controls.bpm_sync());
        assert_eq!(params.sync_rate.value(), controls.subdivision());
        assert_eq!(params.rate.value(), controls.rate_ms());
        assert_eq!(params.feedback.value(), controls.feedback());
        assert_eq!(params.width.value(), controls.width_ms());
        assert_eq!(params.mix.value(), controls.mix());
        assert_eq!(params.filter_type.value(), controls.filter_mode());
        assert_eq!(params.cutoff.value(), controls.cutoff_hz());
        assert_eq!(params.resonance.value(), controls.resonance());
        assert_eq!(params.mod_bypass.value(), controls.mod_bypass());
        assert_eq!(params.mod_rate.value(), controls.mod_rate_hz());
        assert_eq!(params.mod_depth.value(), controls.mod_depth());
        assert_eq!(params.mod_feedback.value(), controls.mod_feedback());
    }

    #[test]
    fn test_publish_all_overwrites_stale_controls() {
        let params = params();
        let controls = Arc::clone(params.controls());
        controls.apply(ParamChange::Feedback(0.9));
        controls.apply(ParamChange::BpmSync(false));
        controls.apply(ParamChange::SyncRate(Subdivision::Whole));

        params.publish_all();

        assert_eq!(controls.feedback(), 0.25);
        assert!(controls.bpm_sync());
        assert_eq!(controls.subdivision(), Subdivision::Eighth);
    }

    #[test]
    fn test_rate_display_before_first_block() {
        let params = params();
        let normalized = params.rate.preview_normalized(500.0);
        assert_eq!(params.rate.normalized_value_to_string(normalized, false), "250.0");
    }

    /// While synced, the RATE display shows the live synced time instead
    /// of the knob position.
    #[test]
    fn test_rate_display_follows_sync() {
        let params = params();
        let controls = Arc::clone(params.controls());
        let normalized = params.rate.preview_normalized(500.0);

        controls.publish_synced_rate(250.0);
        assert_eq!(params.rate.normalized_value_to_string(normalized, false), "250.0");

        controls.apply(ParamChange::BpmSync(false));
        assert_eq!(params.rate.normalized_value_to_string(normalized, false), "500.0");
    }

    #[test]
    fn test_ids_are_the_stable_identifiers() {
        let params = params();
        let ids: Vec<String> = params
            .param_map()
            .into_iter()
            .map(|(id, _, _)| id)
            .collect();

        for id in ParamId::ALL {
            assert!(ids.iter().any(|known| known == id.as_str()), "{id:?} missing");
        }
        assert_eq!(ids.len(), ParamId::ALL.len());
    }
}
