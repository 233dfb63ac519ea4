//! # Tempo Sync
//!
//! Converts the host tempo and a note-length choice into a delay time.
//!
//! One beat lasts `60 / bpm` seconds. A note value spans some number of
//! beats (a quarter note is one beat, an eighth is half a beat, a dotted
//! note is 1.5x, a triplet 2/3x), so:
//!
//! ```text
//! delay_samples = (60 / bpm) * beats * sample_rate
//!
//! 120 BPM, quarter note, 48 kHz:
//!   0.5 s * 1.0 * 48000 = 24000 samples
//! ```
//!
//! In free mode the delay time is simply the RATE knob in milliseconds.

use nih_plug::prelude::Enum;

/// Tempo assumed when the host reports none, or reports nonsense.
pub const DEFAULT_BPM: f64 = 120.0;

/// The musical note values offered for tempo-synced delay times, from
/// shortest to longest.
///
/// The discriminant order is the persisted choice index, so never reorder.
#[derive(Enum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subdivision {
    #[id = "16th"]
    #[name = "16th"]
    Sixteenth,
    #[id = "16th_triplet"]
    #[name = "16th Triplet"]
    SixteenthTriplet,
    #[id = "16th_dotted"]
    #[name = "16th Dotted"]
    SixteenthDotted,
    #[id = "8th"]
    #[name = "8th"]
    Eighth,
    #[id = "8th_triplet"]
    #[name = "8th Triplet"]
    EighthTriplet,
    #[id = "8th_dotted"]
    #[name = "8th Dotted"]
    EighthDotted,
    #[id = "quarter"]
    #[name = "Quarter"]
    Quarter,
    #[id = "quarter_triplet"]
    #[name = "Quarter Triplet"]
    QuarterTriplet,
    #[id = "quarter_dotted"]
    #[name = "Quarter Dotted"]
    QuarterDotted,
    #[id = "half"]
    #[name = "Half"]
    Half,
    #[id = "half_triplet"]
    #[name = "Half Triplet"]
    HalfTriplet,
    #[id = "half_dotted"]
    #[name = "Half Dotted"]
    HalfDotted,
    #[id = "whole"]
    #[name = "Whole"]
    Whole,
}

impl Subdivision {
    pub const ALL: [Subdivision; 13] = [
        Self::Sixteenth,
        Self::SixteenthTriplet,
        Self::SixteenthDotted,
        Self::Eighth,
        Self::EighthTriplet,
        Self::EighthDotted,
        Self::Quarter,
        Self::QuarterTriplet,
        Self::QuarterDotted,
        Self::Half,
        Self::HalfTriplet,
        Self::HalfDotted,
        Self::Whole,
    ];

    pub const DEFAULT: Subdivision = Self::Eighth;

    /// Look up a choice index. Indices past the end select the last entry.
    pub fn from_choice(index: usize) -> Self {
        Self::ALL[index.min(Self::ALL.len() - 1)]
    }

    pub fn choice(self) -> usize {
        self as usize
    }

    /// Length of the note in beats (quarter notes).
    pub fn beats(self) -> f64 {
        match self {
            Self::Sixteenth => 0.25,
            Self::SixteenthTriplet => 0.5 / 3.0,
            Self::SixteenthDotted => 0.375,
            Self::Eighth => 0.5,
            Self::EighthTriplet => 1.0 / 3.0,
            Self::EighthDotted => 0.75,
            Self::Quarter => 1.0,
            Self::QuarterTriplet => 2.0 / 3.0,
            Self::QuarterDotted => 1.5,
            Self::Half => 2.0,
            Self::HalfTriplet => 4.0 / 3.0,
            Self::HalfDotted => 3.0,
            Self::Whole => 4.0,
        }
    }
}

/// Where the delay time comes from. Re-evaluated every sample; either
/// state can follow the other at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// Delay time follows the RATE knob.
    Free,
    /// Delay time follows host tempo and the chosen subdivision.
    Synced,
}

impl SyncMode {
    pub fn from_flag(sync_enabled: bool) -> Self {
        if sync_enabled {
            Self::Synced
        } else {
            Self::Free
        }
    }
}

/// Replace a missing, non-finite or non-positive host tempo with
/// [`DEFAULT_BPM`].
pub fn effective_bpm(host_tempo: Option<f64>) -> f64 {
    match host_tempo {
        Some(bpm) if bpm.is_finite() && bpm > 0.0 => bpm,
        _ => DEFAULT_BPM,
    }
}

/// Length of `subdivision` at `bpm`, in milliseconds. Independent of the
/// sample rate.
pub fn synced_ms(subdivision: Subdivision, bpm: f64) -> f32 {
    (60_000.0 / effective_bpm(Some(bpm)) * subdivision.beats()) as f32
}

pub fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * sample_rate / 1000.0
}

pub fn samples_to_ms(samples: f32, sample_rate: f32) -> f32 {
    samples / sample_rate * 1000.0
}

/// Delay-time calculator for one stream configuration.
#[derive(Debug, Clone, Copy)]
pub struct TempoSync {
    sample_rate: f32,
}

impl TempoSync {
    pub fn new(sample_rate: f32) -> Self {
        Self { sample_rate }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Delay in samples for `subdivision` at `bpm`. The tempo goes
    /// through [`effective_bpm()`] first, so `bpm <= 0` acts as 120.
    pub fn synced_delay_samples(&self, subdivision: Subdivision, bpm: f64) -> f32 {
        let bpm = effective_bpm(Some(bpm));
        ((60.0 / bpm) * subdivision.beats() * self.sample_rate as f64) as f32
    }

    /// Delay in samples for the given mode.
    pub fn delay_samples(
        &self,
        mode: SyncMode,
        subdivision: Subdivision,
        bpm: f64,
        rate_ms: f32,
    ) -> f32 {
        match mode {
            SyncMode::Synced => self.synced_delay_samples(subdivision, bpm),
            SyncMode::Free => ms_to_samples(rate_ms, self.sample_rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_choice_index() {
        for (index, subdivision) in Subdivision::ALL.iter().enumerate() {
            assert_eq!(subdivision.choice(), index);
            assert_eq!(Subdivision::from_choice(index), *subdivision);
        }
        assert_eq!(Subdivision::from_choice(3), Subdivision::Eighth);
        assert_eq!(Subdivision::from_choice(6), Subdivision::Quarter);
        assert_eq!(Subdivision::DEFAULT.choice(), 3);
    }

    #[test]
    fn test_out_of_range_choice_clamps_to_whole() {
        assert_eq!(Subdivision::from_choice(13), Subdivision::Whole);
        assert_eq!(Subdivision::from_choice(usize::MAX), Subdivision::Whole);
    }

    #[test]
    fn test_synced_formula_for_every_entry() {
        let sync = TempoSync::new(48000.0);
        for bpm in [1.0, 37.5, 90.0, 120.0, 174.0, 300.0, 999.0] {
            for subdivision in Subdivision::ALL {
                let expected = (60.0 / bpm) * subdivision.beats() * 48000.0;
                let actual = sync.synced_delay_samples(subdivision, bpm) as f64;
                assert!(
                    (actual - expected).abs() <= expected * 1e-6,
                    "{subdivision:?} at {bpm} BPM: expected {expected}, got {actual}"
                );
            }
        }
    }

    #[test]
    fn test_quarter_at_120_is_half_a_second() {
        let sync = TempoSync::new(48000.0);
        assert_eq!(sync.synced_delay_samples(Subdivision::Quarter, 120.0), 24000.0);
        assert_eq!(sync.synced_delay_samples(Subdivision::Eighth, 120.0), 12000.0);
        assert_eq!(sync.synced_delay_samples(Subdivision::Whole, 120.0), 96000.0);
    }

    /// Any non-positive tempo behaves exactly like 120 BPM.
    #[test]
    fn test_degenerate_tempo_falls_back_to_default() {
        let sync = TempoSync::new(44100.0);
        for subdivision in Subdivision::ALL {
            let reference = sync.synced_delay_samples(subdivision, DEFAULT_BPM);
            for bpm in [0.0, -0.0, -1.0, -120.0, f64::NEG_INFINITY, f64::NAN] {
                assert_eq!(sync.synced_delay_samples(subdivision, bpm), reference);
            }
        }

        assert_eq!(effective_bpm(None), DEFAULT_BPM);
        assert_eq!(effective_bpm(Some(0.0)), DEFAULT_BPM);
        assert_eq!(effective_bpm(Some(-10.0)), DEFAULT_BPM);
        assert_eq!(effective_bpm(Some(140.0)), 140.0);
    }

    #[test]
    fn test_free_mode_uses_rate() {
        let sync = TempoSync::new(48000.0);
        let delay = sync.delay_samples(SyncMode::Free, Subdivision::Quarter, 60.0, 500.0);
        assert_eq!(delay, 24000.0);

        let delay = sync.delay_samples(SyncMode::Synced, Subdivision::Quarter, 60.0, 500.0);
        assert_eq!(delay, 48000.0);
    }

    #[test]
    fn test_ms_conversions() {
        assert_eq!(ms_to_samples(500.0, 48000.0), 24000.0);
        assert_eq!(samples_to_ms(24000.0, 48000.0), 500.0);
        assert_eq!(SyncMode::from_flag(true), SyncMode::Synced);
        assert_eq!(SyncMode::from_flag(false), SyncMode::Free);
    }

    #[test]
    fn test_synced_ms() {
        assert_eq!(synced_ms(Subdivision::Quarter, 120.0), 500.0);
        assert_eq!(synced_ms(Subdivision::Eighth, 120.0), 250.0);
        assert_eq!(synced_ms(Subdivision::Whole, 60.0), 4000.0);
        assert_eq!(synced_ms(Subdivision::Eighth, -3.0), 250.0);
    }
}
