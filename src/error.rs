//! Stream configuration errors.
//!
//! Nothing on the audio path returns an error: bad tempo, out-of-range
//! parameters and channel-count mismatches are all absorbed by defaulting
//! or clamping. The only thing that can fail is `prepare()`, when the host
//! offers a configuration the engine cannot run at.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrepareError {
    /// Sample rate is non-finite or below the supported minimum.
    InvalidSampleRate(f32),
    /// The stream has no channels to process.
    NoChannels,
}

impl fmt::Display for PrepareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSampleRate(rate) => write!(f, "Unsupported sample rate: {} Hz", rate),
            Self::NoChannels => write!(f, "Stream has no audio channels"),
        }
    }
}

impl std::error::Error for PrepareError {}
