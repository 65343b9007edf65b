//! Common types for Fader
//!
//! This module contains the fundamental audio types used throughout the
//! engine: the internal float stereo sample/buffer used for processing, the
//! playback and deck enums, and conversion to/from the 16-bit PCM used at the
//! edges (decoded tracks in, rendered blocks out).

use std::ops::{Index, IndexMut};

/// Default sample rate (CD rate, matches what the external decoder hands us)
pub const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// Default number of output channels
pub const DEFAULT_CHANNELS: u16 = 2;

/// Bytes per emitted output sample (signed 16-bit PCM)
pub const BYTES_PER_SAMPLE: usize = 2;

/// Full-scale divisor for 16-bit PCM
const I16_SCALE: f32 = 32768.0;

/// Audio sample type (32-bit float for processing, 16-bit at the boundaries)
pub type Sample = f32;

/// Convert a 16-bit PCM sample to the internal float range [-1.0, 1.0)
#[inline]
pub fn sample_from_i16(value: i16) -> Sample {
    value as Sample / I16_SCALE
}

/// Convert an internal float sample to 16-bit PCM, saturating at the
/// representable range instead of wrapping
#[inline]
pub fn sample_to_i16(value: Sample) -> i16 {
    if value.is_nan() {
        return 0;
    }
    (value * I16_SCALE)
        .round()
        .clamp(i16::MIN as Sample, i16::MAX as Sample) as i16
}

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Average of both channels
    #[inline]
    pub fn mid(&self) -> Sample {
        (self.left + self.right) * 0.5
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A buffer of stereo samples
///
/// The primary processing buffer. Buffers used inside the render callback are
/// allocated once at the maximum block size and then resized within their
/// capacity, so the callback never touches the allocator.
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a new buffer with the specified capacity (in stereo samples)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Create a buffer from interleaved samples [L, R, L, R, ...]
    ///
    /// A trailing odd sample is ignored.
    pub fn from_interleaved(interleaved: &[Sample]) -> Self {
        let samples = interleaved
            .chunks_exact(2)
            .map(|chunk| StereoSample::new(chunk[0], chunk[1]))
            .collect();
        Self { samples }
    }

    /// Create a buffer from an existing Vec of StereoSamples
    pub fn from_vec(samples: Vec<StereoSample>) -> Self {
        Self { samples }
    }

    /// Get the number of stereo samples in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of stereo samples the buffer can hold without reallocating
    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Fills any newly exposed elements with silence. Must not exceed capacity.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        let current_len = self.samples.len();
        if new_len > current_len {
            debug_assert!(
                new_len <= self.samples.capacity(),
                "set_len_from_capacity called with len > capacity"
            );
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    /// Fill the buffer with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    /// Get a slice of the samples
    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    /// Get a mutable slice of the samples
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Get a zero-copy view of samples as interleaved f32 [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Add another buffer scaled by `gain` to this one
    ///
    /// Only the overlapping prefix is summed.
    pub fn add_scaled(&mut self, other: &StereoBuffer, gain: Sample) {
        for (dst, src) in self.samples.iter_mut().zip(other.samples.iter()) {
            *dst += *src * gain;
        }
    }

    /// Scale all samples by a factor
    pub fn scale(&mut self, factor: Sample) {
        for sample in &mut self.samples {
            *sample *= factor;
        }
    }

    /// Get an iterator over the samples
    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }

    /// Get a mutable iterator over the samples
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StereoSample> {
        self.samples.iter_mut()
    }

    /// Get the peak amplitude in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

/// Playback state for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum PlayState {
    #[default]
    Stopped = 0,
    Playing = 1,
    Paused = 2,
}

impl PlayState {
    /// Decode from the atomic representation; unknown values read as Stopped
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => PlayState::Playing,
            2 => PlayState::Paused,
            _ => PlayState::Stopped,
        }
    }
}

/// Which side of the crossfader a track is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeckSide {
    Left,
    Right,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_conversion_is_lossless_for_pcm() {
        for value in [i16::MIN, -12345, -1, 0, 1, 12345, i16::MAX] {
            assert_eq!(sample_to_i16(sample_from_i16(value)), value);
        }
    }

    #[test]
    fn test_sample_to_i16_saturates() {
        assert_eq!(sample_to_i16(3.0), i16::MAX);
        assert_eq!(sample_to_i16(-3.0), i16::MIN);
        assert_eq!(sample_to_i16(Sample::INFINITY), i16::MAX);
        assert_eq!(sample_to_i16(Sample::NAN), 0);
    }

    #[test]
    fn test_set_len_from_capacity_does_not_reallocate() {
        let mut buf = StereoBuffer::with_capacity(256);
        let cap = buf.capacity();
        buf.set_len_from_capacity(128);
        assert_eq!(buf.len(), 128);
        buf.set_len_from_capacity(256);
        assert_eq!(buf.len(), 256);
        assert_eq!(buf.capacity(), cap);
    }

    #[test]
    fn test_add_scaled() {
        let mut a = StereoBuffer::from_interleaved(&[0.5, 0.5, 0.25, -0.25]);
        let b = StereoBuffer::from_interleaved(&[1.0, -1.0, 1.0, 1.0]);
        a.add_scaled(&b, 0.5);
        assert_eq!(a[0], StereoSample::new(1.0, 0.0));
        assert_eq!(a[1], StereoSample::new(0.75, 0.25));
    }

    #[test]
    fn test_play_state_roundtrips_through_u8() {
        for state in [PlayState::Stopped, PlayState::Playing, PlayState::Paused] {
            assert_eq!(PlayState::from_u8(state as u8), state);
        }
        assert_eq!(PlayState::from_u8(99), PlayState::Stopped);
    }
}
