//! # DSP (Digital Signal Processing) Primitives
//!
//! The building blocks the engine chains together:
//!
//! - **`delay_line`**: a ring buffer with fractional-delay reads. Every
//!   time-based stage in the plugin sits on top of it.
//!
//! - **`filter`**: a state-variable filter (lowpass, highpass, bandpass)
//!   placed inside the feedback loop, so each repeat is filtered again.
//!
//! - **`modulation`**: an LFO-swept short delay (chorus) in front of the
//!   loop.
//!
//! - **`mixer`**: the final dry/wet crossfade.
//!
//! - **`smoother`**: per-sample parameter ramps, linear or raised-cosine.
//!
//! - **`tempo`**: note values and the BPM-to-samples conversion.
//!
//! None of these allocate after construction/`prepare()`, and none of
//! them know about the plugin host.

pub mod delay_line;
pub mod filter;
pub mod mixer;
pub mod modulation;
pub mod smoother;
pub mod tempo;
