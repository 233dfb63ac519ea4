//! # Control Block
//!
//! The only state shared between the audio thread and everything else.
//!
//! Parameter changes arrive from the host, the GUI or automation on
//! arbitrary threads. Each change is a [`ParamChange`] handed to
//! [`DelayControls::apply()`], which stores one word into one atomic. The
//! audio thread loads the targets it needs every sample. There is no lock,
//! no allocation, and no ordering between different fields: a change is
//! picked up within the block it lands in, which is all the smoothers need.
//!
//! One field flows the other way. While tempo sync is on, the audio thread
//! publishes the live delay time in milliseconds through
//! [`DelayControls::publish_synced_rate()`], so the RATE display can show
//! it. That store never goes through `apply()`, so it can never trigger a
//! parameter callback and loop back into the engine.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use atomic_float::AtomicF32;

use crate::dsp::filter::FilterMode;
use crate::dsp::tempo::{synced_ms, Subdivision, DEFAULT_BPM};

/// Stable parameter identifiers. The strings are what hosts store in
/// sessions and automation, so they must never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamId {
    BpmSync,
    SyncRateChoice,
    Rate,
    Feedback,
    Width,
    Mix,
    FilterType,
    Cutoff,
    Resonance,
    ModBypass,
    ModRate,
    ModDepth,
    ModFeedback,
}

impl ParamId {
    pub const ALL: [ParamId; 13] = [
        Self::BpmSync,
        Self::SyncRateChoice,
        Self::Rate,
        Self::Feedback,
        Self::Width,
        Self::Mix,
        Self::FilterType,
        Self::Cutoff,
        Self::Resonance,
        Self::ModBypass,
        Self::ModRate,
        Self::ModDepth,
        Self::ModFeedback,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BpmSync => "BPM_SYNC",
            Self::SyncRateChoice => "SYNC_RATE_CHOICE",
            Self::Rate => "RATE",
            Self::Feedback => "FEEDBACK",
            Self::Width => "WIDTH",
            Self::Mix => "MIX",
            Self::FilterType => "FILTER_TYPE",
            Self::Cutoff => "CUTOFF",
            Self::Resonance => "RESONANCE",
            Self::ModBypass => "MOD_BP",
            Self::ModRate => "MOD_RATE",
            Self::ModDepth => "MOD_DEPTH",
            Self::ModFeedback => "MOD_FB",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|param| param.as_str() == id)
    }

    /// Plain-value range. Booleans are `0..=1`, choices are index ranges.
    pub const fn range(self) -> (f32, f32) {
        match self {
            Self::BpmSync | Self::ModBypass => (0.0, 1.0),
            Self::SyncRateChoice => (0.0, 12.0),
            Self::Rate => (1.0, 2000.0),
            Self::Feedback => (0.0, 1.0),
            Self::Width => (0.0, 5.0),
            Self::Mix => (0.0, 1.0),
            Self::FilterType => (0.0, 2.0),
            Self::Cutoff => (20.0, 20000.0),
            Self::Resonance => (0.0, 2.0),
            Self::ModRate => (0.05, 5.0),
            Self::ModDepth => (0.0, 1.0),
            Self::ModFeedback => (0.0, 0.95),
        }
    }

    pub const fn default_value(self) -> f32 {
        match self {
            Self::BpmSync => 1.0,
            Self::SyncRateChoice => 3.0,
            Self::Rate => 500.0,
            Self::Feedback => 0.25,
            Self::Width => 0.0,
            Self::Mix => 0.0,
            Self::FilterType => 0.0,
            Self::Cutoff => 1000.0,
            Self::Resonance => 0.707,
            Self::ModBypass => 1.0,
            Self::ModRate => 1.0,
            Self::ModDepth => 0.15,
            Self::ModFeedback => 0.0,
        }
    }
}

/// A single parameter change, already typed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamChange {
    BpmSync(bool),
    SyncRate(Subdivision),
    /// Free-running delay time in milliseconds.
    Rate(f32),
    Feedback(f32),
    /// Left-channel delay offset in milliseconds.
    Width(f32),
    Mix(f32),
    FilterType(FilterMode),
    Cutoff(f32),
    Resonance(f32),
    ModBypass(bool),
    ModRate(f32),
    ModDepth(f32),
    ModFeedback(f32),
}

impl ParamChange {
    /// Build a change from an identifier and a plain value, the way a
    /// generic parameter router delivers them. Booleans are "on" above
    /// 0.5; choices round to the nearest index. Continuous values are
    /// clamped to the parameter's range.
    pub fn from_raw(id: ParamId, value: f32) -> Self {
        let (min, max) = id.range();
        let clamped = if value.is_nan() {
            id.default_value()
        } else {
            value.clamp(min, max)
        };
        let flag = clamped >= 0.5;
        let index = clamped.round() as usize;

        match id {
            ParamId::BpmSync => Self::BpmSync(flag),
            ParamId::SyncRateChoice => Self::SyncRate(Subdivision::from_choice(index)),
            ParamId::Rate => Self::Rate(clamped),
            ParamId::Feedback => Self::Feedback(clamped),
            ParamId::Width => Self::Width(clamped),
            ParamId::Mix => Self::Mix(clamped),
            ParamId::FilterType => Self::FilterType(FilterMode::from_choice(index)),
            ParamId::Cutoff => Self::Cutoff(clamped),
            ParamId::Resonance => Self::Resonance(clamped),
            ParamId::ModBypass => Self::ModBypass(flag),
            ParamId::ModRate => Self::ModRate(clamped),
            ParamId::ModDepth => Self::ModDepth(clamped),
            ParamId::ModFeedback => Self::ModFeedback(clamped),
        }
    }

    pub fn id(&self) -> ParamId {
        match self {
            Self::BpmSync(_) => ParamId::BpmSync,
            Self::SyncRate(_) => ParamId::SyncRateChoice,
            Self::Rate(_) => ParamId::Rate,
            Self::Feedback(_) => ParamId::Feedback,
            Self::Width(_) => ParamId::Width,
            Self::Mix(_) => ParamId::Mix,
            Self::FilterType(_) => ParamId::FilterType,
            Self::Cutoff(_) => ParamId::Cutoff,
            Self::Resonance(_) => ParamId::Resonance,
            Self::ModBypass(_) => ParamId::ModBypass,
            Self::ModRate(_) => ParamId::ModRate,
            Self::ModDepth(_) => ParamId::ModDepth,
            Self::ModFeedback(_) => ParamId::ModFeedback,
        }
    }
}

/// Atomic parameter targets shared by the control threads and the audio
/// thread. Create one, wrap it in an `Arc`, and hand clones to the
/// parameter callbacks and to the engine.
#[derive(Debug)]
pub struct DelayControls {
    bpm_sync: AtomicBool,
    subdivision: AtomicU8,
    rate_ms: AtomicF32,
    feedback: AtomicF32,
    width_ms: AtomicF32,
    mix: AtomicF32,
    filter_mode: AtomicU8,
    cutoff_hz: AtomicF32,
    resonance: AtomicF32,
    mod_bypass: AtomicBool,
    mod_rate_hz: AtomicF32,
    mod_depth: AtomicF32,
    mod_feedback: AtomicF32,

    /// Written by the audio thread only: the tempo-synced delay time in
    /// milliseconds, for display.
    synced_rate_ms: AtomicF32,
}

impl Default for DelayControls {
    fn default() -> Self {
        let controls = Self {
            bpm_sync: AtomicBool::new(false),
            subdivision: AtomicU8::new(0),
            rate_ms: AtomicF32::new(0.0),
            feedback: AtomicF32::new(0.0),
            width_ms: AtomicF32::new(0.0),
            mix: AtomicF32::new(0.0),
            filter_mode: AtomicU8::new(0),
            cutoff_hz: AtomicF32::new(0.0),
            resonance: AtomicF32::new(0.0),
            mod_bypass: AtomicBool::new(true),
            mod_rate_hz: AtomicF32::new(0.0),
            mod_depth: AtomicF32::new(0.0),
            mod_feedback: AtomicF32::new(0.0),
            synced_rate_ms: AtomicF32::new(0.0),
        };
        for id in ParamId::ALL {
            controls.apply(ParamChange::from_raw(id, id.default_value()));
        }
        controls.seed_synced_rate();
        controls
    }
}

impl DelayControls {
    /// Store a parameter change. Safe to call from any thread, at any
    /// time, including while the audio thread is processing. Never blocks
    /// or allocates.
    pub fn apply(&self, change: ParamChange) {
        match change {
            ParamChange::BpmSync(on) => self.bpm_sync.store(on, Ordering::Relaxed),
            ParamChange::SyncRate(subdivision) => self
                .subdivision
                .store(subdivision.choice() as u8, Ordering::Relaxed),
            ParamChange::Rate(ms) => self.rate_ms.store(ms, Ordering::Relaxed),
            ParamChange::Feedback(gain) => self.feedback.store(gain, Ordering::Relaxed),
            ParamChange::Width(ms) => self.width_ms.store(ms, Ordering::Relaxed),
            ParamChange::Mix(mix) => self.mix.store(mix, Ordering::Relaxed),
            ParamChange::FilterType(mode) => self
                .filter_mode
                .store(mode.choice() as u8, Ordering::Relaxed),
            ParamChange::Cutoff(hz) => self.cutoff_hz.store(hz, Ordering::Relaxed),
            ParamChange::Resonance(q) => self.resonance.store(q, Ordering::Relaxed),
            ParamChange::ModBypass(bypass) => self.mod_bypass.store(bypass, Ordering::Relaxed),
            ParamChange::ModRate(hz) => self.mod_rate_hz.store(hz, Ordering::Relaxed),
            ParamChange::ModDepth(depth) => self.mod_depth.store(depth, Ordering::Relaxed),
            ParamChange::ModFeedback(gain) => self.mod_feedback.store(gain, Ordering::Relaxed),
        }
    }

    /// Named-notification entry point: `(identifier, plain value)`.
    /// Unknown identifiers are ignored and reported as `false`.
    pub fn notify(&self, id: &str, value: f32) -> bool {
        match ParamId::from_id(id) {
            Some(id) => {
                self.apply(ParamChange::from_raw(id, value));
                true
            }
            None => false,
        }
    }

    /// Audio thread only. Publish the live tempo-synced delay time.
    #[inline]
    pub fn publish_synced_rate(&self, ms: f32) {
        self.synced_rate_ms.store(ms, Ordering::Relaxed);
    }

    /// Publish the synced time for the current subdivision at the default
    /// tempo, so the RATE display has a sensible value before the first
    /// block reports the real tempo.
    pub fn seed_synced_rate(&self) {
        self.publish_synced_rate(synced_ms(self.subdivision(), DEFAULT_BPM));
    }

    /// Delay time currently in effect, in milliseconds: the synced value
    /// while tempo sync is on, the RATE target otherwise.
    pub fn live_rate_ms(&self) -> f32 {
        if self.bpm_sync() {
            self.synced_rate_ms.load(Ordering::Relaxed)
        } else {
            self.rate_ms()
        }
    }

    #[inline]
    pub fn bpm_sync(&self) -> bool {
        self.bpm_sync.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn subdivision(&self) -> Subdivision {
        Subdivision::from_choice(self.subdivision.load(Ordering::Relaxed) as usize)
    }

    #[inline]
    pub fn rate_ms(&self) -> f32 {
        self.rate_ms.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn feedback(&self) -> f32 {
        self.feedback.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn width_ms(&self) -> f32 {
        self.width_ms.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn mix(&self) -> f32 {
        self.mix.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn filter_mode(&self) -> FilterMode {
        FilterMode::from_choice(self.filter_mode.load(Ordering::Relaxed) as usize)
    }

    #[inline]
    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn resonance(&self) -> f32 {
        self.resonance.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn mod_bypass(&self) -> bool {
        self.mod_bypass.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn mod_rate_hz(&self) -> f32 {
        self.mod_rate_hz.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn mod_depth(&self) -> f32 {
        self.mod_depth.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn mod_feedback(&self) -> f32 {
        self.mod_feedback.load(Ordering::Relaxed)
    }
}
