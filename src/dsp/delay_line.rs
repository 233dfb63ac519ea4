//! # Delay Line (Ring Buffer)
//!
//! A fixed-capacity circular buffer of samples. Every delay in the plugin
//! is one of these: the long feedback delay, the short modulated delay in
//! the modulation stage, and the dry-path latency compensation in the
//! mixer.
//!
//! ## Access Pattern
//!
//! Each processed sample does exactly one `push()` followed by one or more
//! `pop_at()` reads:
//!
//! 1. `push(x)` stores `x` at the write cursor and advances the cursor by
//!    one, wrapping at the capacity.
//! 2. `pop_at(d)` reads the sample pushed `d` samples before the most
//!    recent one. `pop_at(0.0)` is the sample just pushed, so a loop that
//!    pushes and then pops at `d` delays its input by exactly `d` samples.
//!
//! ## Linear Interpolation
//!
//! Smoothed delay times are continuous, so `d` is usually fractional. For
//! `d = 441.3` we blend the samples 441 and 442 behind the newest one:
//!
//! ```text
//! result = sample_a * (1 - frac) + sample_b * frac
//!        = sample_a * 0.7        + sample_b * 0.3
//! ```
//!
//! ## Clamping
//!
//! Requests outside `[0, capacity - 1]` are clamped rather than rejected.
//! Asking for more delay than the buffer holds returns the oldest stored
//! sample, which is a defined value and never an out-of-bounds read.

use std::num::NonZeroUsize;

/// A ring buffer used as an audio delay line.
///
/// Allocated once in `prepare()`. Changing the delay time only moves the
/// read position, so no allocation ever happens on the audio thread.
#[derive(Debug, Clone)]
pub struct DelayLine {
    /// The circular buffer. Starts out as silence.
    buffer: Vec<f32>,

    /// Slot the next `push()` writes to. The most recent sample lives one
    /// slot behind it.
    write_pos: usize,
}

impl DelayLine {
    /// Create a delay line holding `capacity` samples.
    ///
    /// The longest readable delay is `capacity - 1` samples. `NonZeroUsize`
    /// rules out an empty ring, which would make the modular arithmetic
    /// below divide by zero.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            buffer: vec![0.0; capacity.get()],
            write_pos: 0,
        }
    }

    /// Number of samples the ring holds.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Longest delay `pop_at()` will honour before clamping.
    pub fn max_delay(&self) -> f32 {
        (self.buffer.len() - 1) as f32
    }

    /// Store a sample at the write cursor and advance the cursor.
    #[inline]
    pub fn push(&mut self, sample: f32) {
        self.buffer[self.write_pos] = sample;
        self.write_pos += 1;
        if self.write_pos == self.buffer.len() {
            self.write_pos = 0;
        }
    }

    /// Read the sample `delay_samples` behind the most recent push.
    ///
    /// # How the index math works
    ///
    /// The newest sample sits at `write_pos - 1`. Going `N` further back
    /// on a ring of length `len`:
    ///
    /// ```text
    /// index = (write_pos + len - 1 - N) % len
    /// ```
    ///
    /// Adding `len` before subtracting keeps the `usize` arithmetic
    /// non-negative. `N` is at most `len - 1`, so the sum never underflows.
    #[inline]
    pub fn pop_at(&self, delay_samples: f32) -> f32 {
        let len = self.buffer.len();

        // `max` discards NaN (unlike `clamp`), so a NaN request degrades to
        // "no delay".
        let delay_clamped = delay_samples.max(0.0).min((len - 1) as f32);
        let delay_int = delay_clamped as usize;
        let delay_frac = delay_clamped - delay_int as f32;

        let newest = self.write_pos + len - 1;
        let index_a = (newest - delay_int) % len;
        // One sample older. When delay_int is already len - 1 this wraps
        // onto the newest sample, but delay_frac is 0 there so it has no
        // weight.
        let index_b = (newest + len - delay_int - 1) % len;

        let sample_a = self.buffer[index_a];
        let sample_b = self.buffer[index_b];

        sample_a * (1.0 - delay_frac) + sample_b * delay_frac
    }

    /// Clear the buffer to silence and rewind the write cursor.
    ///
    /// Called on every stream reset so that echoes from a previous
    /// playback (or a previous sample rate) never bleed into the next one.
    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
        self.write_pos = 0;
    }
}

// ─────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn delay_line(capacity: usize) -> DelayLine {
        DelayLine::new(NonZeroUsize::new(capacity).unwrap())
    }

    /// Popping at zero returns the sample that was just pushed.
    #[test]
    fn test_zero_delay_returns_latest_push() {
        let mut dl = delay_line(16);

        dl.push(0.75);
        let result = dl.pop_at(0.0);
        assert!((result - 0.75).abs() < 1e-6, "Expected 0.75, got {result}");
    }

    /// Pushing a known sequence and popping at a fixed delay `d` returns
    /// the same sequence shifted by exactly `d` samples.
    #[test]
    fn test_round_trip_shifts_by_delay() {
        let mut dl = delay_line(64);
        let delay = 7;

        let input: Vec<f32> = (0..200).map(|i| (i as f32 * 0.37).sin()).collect();
        let mut output = Vec::with_capacity(input.len());
        for &x in &input {
            dl.push(x);
            output.push(dl.pop_at(delay as f32));
        }

        for n in 0..delay {
            assert!(
                output[n].abs() < 1e-9,
                "Expected silence before the delay, got {} at {n}",
                output[n]
            );
        }
        for n in delay..input.len() {
            assert!(
                (output[n] - input[n - delay]).abs() < 1e-6,
                "Sample {n}: expected {}, got {}",
                input[n - delay],
                output[n]
            );
        }
    }

    /// Verify linear interpolation between two neighbours.
    #[test]
    fn test_interpolation() {
        let mut dl = delay_line(100);

        dl.push(0.0);
        dl.push(1.0);

        // 0.5 samples back sits halfway between 1.0 (newest) and 0.0.
        let result = dl.pop_at(0.5);
        assert!((result - 0.5).abs() < 1e-6, "Expected 0.5, got {result}");

        let result = dl.pop_at(0.25);
        assert!((result - 0.75).abs() < 1e-6, "Expected 0.75, got {result}");
    }

    /// Verify the buffer wraps correctly past its boundaries.
    #[test]
    fn test_wrapping() {
        let mut dl = delay_line(4);

        // Push 0..6 into a ring of 4. It now holds 2, 3, 4, 5.
        for i in 0..6 {
            dl.push(i as f32);
        }

        assert!((dl.pop_at(0.0) - 5.0).abs() < 1e-6);
        assert!((dl.pop_at(1.0) - 4.0).abs() < 1e-6);
        assert!((dl.pop_at(3.0) - 2.0).abs() < 1e-6);
    }

    /// Requests beyond the capacity clamp to the oldest stored sample.
    #[test]
    fn test_over_capacity_request_clamps() {
        let mut dl = delay_line(8);
        for i in 1..=8 {
            dl.push(i as f32);
        }

        // Oldest sample is 1.0, seven behind the newest.
        let oldest = dl.pop_at(7.0);
        assert!((oldest - 1.0).abs() < 1e-6, "Expected 1.0, got {oldest}");

        for delay in [8.0, 100.0, 1.0e9, f32::INFINITY] {
            let result = dl.pop_at(delay);
            assert!(
                (result - oldest).abs() < 1e-6,
                "Delay {delay} should clamp to the oldest sample, got {result}"
            );
        }
    }

    /// Negative and NaN requests degrade to "no delay".
    #[test]
    fn test_degenerate_requests_read_latest() {
        let mut dl = delay_line(8);
        dl.push(0.1);
        dl.push(0.2);

        assert!((dl.pop_at(-3.0) - 0.2).abs() < 1e-6);
        assert!((dl.pop_at(f32::NAN) - 0.2).abs() < 1e-6);
    }

    /// Verify that clearing resets everything to silence.
    #[test]
    fn test_clear() {
        let mut dl = delay_line(10);

        dl.push(0.5);
        dl.push(0.25);
        dl.clear();

        for delay in 0..10 {
            let result = dl.pop_at(delay as f32);
            assert!(
                result.abs() < 1e-6,
                "Expected 0.0 after clear at delay {delay}, got {result}"
            );
        }
    }

    #[test]
    fn test_capacity_and_max_delay() {
        let dl = delay_line(192_000);
        assert_eq!(dl.capacity(), 192_000);
        assert_eq!(dl.max_delay(), 191_999.0);
    }
}
