//! Five-band spectral equalizer
//!
//! Streaming STFT with 50% overlap-add. Each channel collects `frame_size`
//! samples, every `hop = frame_size / 2` samples the frame is windowed,
//! transformed, multiplied by the per-bin band gains, transformed back,
//! windowed again and added into the output accumulator.
//!
//! Analysis and synthesis both use a square-root periodic Hann window. Their
//! product is a periodic Hann, which sums to exactly 1 at 50% overlap, so
//! with all gains at 1.0 the output is the input delayed by `frame_size`
//! samples.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::{Effect, EqParams, EQ_BAND_EDGES_HZ, MAX_EQ_GAIN, NUM_EQ_BANDS};
use crate::types::StereoBuffer;

/// Default STFT frame size (~23ms at 44.1kHz)
pub const DEFAULT_EQ_FRAME_SIZE: usize = 1024;

/// Smallest accepted frame size
pub const MIN_EQ_FRAME_SIZE: usize = 64;

/// Largest accepted frame size
pub const MAX_EQ_FRAME_SIZE: usize = 8192;

/// Overlap-add state for one channel
struct SpectralChannel {
    /// Input FIFO, `frame_size` long
    input: Vec<f32>,
    /// Finished output for the current hop, `hop` long
    output: Vec<f32>,
    /// Overlap-add accumulator, `frame_size` long
    accum: Vec<f32>,
}

impl SpectralChannel {
    fn new(frame_size: usize, hop: usize) -> Self {
        Self {
            input: vec![0.0; frame_size],
            output: vec![0.0; hop],
            accum: vec![0.0; frame_size],
        }
    }

    fn reset(&mut self) {
        self.input.fill(0.0);
        self.output.fill(0.0);
        self.accum.fill(0.0);
    }
}

/// Overlap-add FFT equalizer with five contiguous bands
pub struct Equalizer {
    frame_size: usize,
    hop: usize,
    params: EqParams,
    /// Band index for every bin 0..=frame_size/2
    bin_bands: Vec<usize>,
    /// Gain for every bin 0..=frame_size/2
    bin_gains: Vec<f32>,
    /// sqrt(periodic Hann)
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    spectrum: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    channels: [SpectralChannel; 2],
    /// Write position in the input FIFOs, cycles through [hop, frame_size)
    rover: usize,
}

impl Equalizer {
    /// Create an equalizer with flat gains
    ///
    /// `frame_size` is clamped to [64, 8192] and rounded up to a power of two.
    pub fn new(sample_rate: u32, frame_size: usize) -> Self {
        let frame_size = frame_size
            .clamp(MIN_EQ_FRAME_SIZE, MAX_EQ_FRAME_SIZE)
            .next_power_of_two();
        let hop = frame_size / 2;

        let mut planner = FftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(frame_size);
        let inverse = planner.plan_fft_inverse(frame_size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        let window = (0..frame_size)
            .map(|n| {
                let hann = 0.5 - 0.5 * (2.0 * PI * n as f32 / frame_size as f32).cos();
                hann.sqrt()
            })
            .collect();

        let bin_hz = sample_rate as f32 / frame_size as f32;
        let bin_bands = (0..=frame_size / 2)
            .map(|bin| band_for_frequency(bin as f32 * bin_hz))
            .collect();

        let mut eq = Self {
            frame_size,
            hop,
            params: EqParams::FLAT,
            bin_bands,
            bin_gains: vec![1.0; frame_size / 2 + 1],
            window,
            forward,
            inverse,
            spectrum: vec![Complex::new(0.0, 0.0); frame_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            channels: [
                SpectralChannel::new(frame_size, hop),
                SpectralChannel::new(frame_size, hop),
            ],
            rover: hop,
        };
        eq.set_params(EqParams::FLAT);
        eq
    }

    /// Apply new band gains (takes effect at the next hop)
    pub fn set_params(&mut self, params: EqParams) {
        let mut gains = params.gains;
        for gain in &mut gains {
            *gain = if gain.is_finite() {
                gain.clamp(0.0, MAX_EQ_GAIN)
            } else {
                1.0
            };
        }
        self.params = EqParams { gains };
        for (bin_gain, &band) in self.bin_gains.iter_mut().zip(&self.bin_bands) {
            *bin_gain = gains[band];
        }
    }

    pub fn params(&self) -> EqParams {
        self.params
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Transform one full input frame and fold it into the accumulator
    fn transform_frame(&mut self, ch: usize) {
        let n = self.frame_size;
        let hop = self.hop;
        let scale = 1.0 / n as f32;
        let channel = &mut self.channels[ch];

        for ((bin, &x), &w) in self
            .spectrum
            .iter_mut()
            .zip(&channel.input)
            .zip(&self.window)
        {
            *bin = Complex::new(x * w, 0.0);
        }

        self.forward
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        // Real input: bins k and n-k are conjugates, scale both by the same gain
        let half = n / 2;
        self.spectrum[0] *= self.bin_gains[0];
        self.spectrum[half] *= self.bin_gains[half];
        for k in 1..half {
            let g = self.bin_gains[k];
            self.spectrum[k] *= g;
            self.spectrum[n - k] *= g;
        }

        self.inverse
            .process_with_scratch(&mut self.spectrum, &mut self.scratch);

        for ((acc, bin), &w) in channel
            .accum
            .iter_mut()
            .zip(&self.spectrum)
            .zip(&self.window)
        {
            *acc += bin.re * w * scale;
        }

        channel.output.copy_from_slice(&channel.accum[..hop]);
        channel.accum.copy_within(hop.., 0);
        channel.accum[n - hop..].fill(0.0);
        channel.input.copy_within(hop.., 0);
    }
}

/// Map a frequency to its band index
fn band_for_frequency(freq: f32) -> usize {
    EQ_BAND_EDGES_HZ
        .iter()
        .position(|&edge| freq < edge)
        .unwrap_or(NUM_EQ_BANDS - 1)
}

impl Effect for Equalizer {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let hop = self.hop;
        for sample in buffer.iter_mut() {
            let r = self.rover;
            self.channels[0].input[r] = sample.left;
            self.channels[1].input[r] = sample.right;
            sample.left = self.channels[0].output[r - hop];
            sample.right = self.channels[1].output[r - hop];

            self.rover += 1;
            if self.rover >= self.frame_size {
                self.rover = hop;
                self.transform_frame(0);
                self.transform_frame(1);
            }
        }
    }

    fn latency_samples(&self) -> u32 {
        self.frame_size as u32
    }

    fn name(&self) -> &'static str {
        "Equalizer"
    }

    fn is_bypassed(&self) -> bool {
        false
    }

    fn reset(&mut self) {
        for channel in &mut self.channels {
            channel.reset();
        }
        self.rover = self.hop;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn test_signal(len: usize, sample_rate: f32) -> StereoBuffer {
        let samples = (0..len)
            .map(|i| {
                let t = i as f32 / sample_rate;
                let l = 0.4 * (2.0 * PI * 110.0 * t).sin() + 0.2 * (2.0 * PI * 3000.0 * t).sin();
                let r = 0.3 * (2.0 * PI * 440.0 * t).sin() + 0.1 * (2.0 * PI * 9000.0 * t).sin();
                StereoSample::new(l, r)
            })
            .collect();
        StereoBuffer::from_vec(samples)
    }

    fn rms(values: impl Iterator<Item = f32>) -> f32 {
        let (sum, count) = values.fold((0.0f32, 0usize), |(s, c), v| (s + v * v, c + 1));
        (sum / count.max(1) as f32).sqrt()
    }

    #[test]
    fn test_band_mapping() {
        assert_eq!(band_for_frequency(0.0), 0);
        assert_eq!(band_for_frequency(249.0), 0);
        assert_eq!(band_for_frequency(250.0), 1);
        assert_eq!(band_for_frequency(3999.0), 2);
        assert_eq!(band_for_frequency(7000.0), 3);
        assert_eq!(band_for_frequency(15000.0), 4);
    }

    #[test]
    fn test_flat_eq_reproduces_dry_signal() {
        let sample_rate = 44100;
        let mut eq = Equalizer::new(sample_rate, 1024);
        let latency = eq.latency_samples() as usize;

        let dry = test_signal(8192, sample_rate as f32);
        let mut wet = dry.clone();

        // Feed in uneven block sizes like a real callback would
        let mut processed = Vec::with_capacity(dry.len());
        for chunk in wet.as_mut_slice().chunks_mut(300) {
            let mut block = StereoBuffer::from_vec(chunk.to_vec());
            eq.process(&mut block);
            processed.extend_from_slice(block.as_slice());
        }

        for i in 0..dry.len() - latency {
            let expected = dry[i];
            let got = processed[i + latency];
            assert!((expected.left - got.left).abs() < 1e-4, "left mismatch at {}", i);
            assert!((expected.right - got.right).abs() < 1e-4, "right mismatch at {}", i);
        }
    }

    #[test]
    fn test_eq_output_starts_silent() {
        let mut eq = Equalizer::new(44100, 512);
        let mut buffer = StereoBuffer::from_vec(vec![StereoSample::mono(0.5); 256]);
        eq.process(&mut buffer);
        assert_eq!(buffer.peak(), 0.0);
    }

    #[test]
    fn test_zero_low_band_removes_bass() {
        let sample_rate = 44100;
        let mut eq = Equalizer::new(sample_rate, 1024);
        eq.set_params(EqParams::new(0.0, 1.0, 1.0, 1.0, 1.0));

        // 100 Hz tone sits entirely in the low band
        let mut buffer = StereoBuffer::from_vec(
            (0..16384)
                .map(|i| StereoSample::mono(0.5 * (2.0 * PI * 100.0 * i as f32 / 44100.0).sin()))
                .collect(),
        );
        eq.process(&mut buffer);

        let tail = buffer.as_slice()[8192..].iter().map(|s| s.left);
        assert!(rms(tail) < 0.02);
    }

    #[test]
    fn test_boosted_band_increases_level() {
        let sample_rate = 44100;
        let mut eq = Equalizer::new(sample_rate, 1024);
        eq.set_params(EqParams::new(1.0, 1.0, 2.0, 1.0, 1.0));

        // 2 kHz tone in the mid band
        let mut buffer = StereoBuffer::from_vec(
            (0..16384)
                .map(|i| StereoSample::mono(0.25 * (2.0 * PI * 2000.0 * i as f32 / 44100.0).sin()))
                .collect(),
        );
        eq.process(&mut buffer);

        let level = rms(buffer.as_slice()[8192..].iter().map(|s| s.left));
        let expected = 0.5 / 2.0_f32.sqrt();
        assert!((level - expected).abs() < 0.03, "level {}", level);
    }

    #[test]
    fn test_set_params_clamps_invalid_gains() {
        let mut eq = Equalizer::new(44100, 256);
        eq.set_params(EqParams::new(-1.0, 5.0, f32::NAN, 1.0, 1.0));
        assert_eq!(eq.params().gains, [0.0, 2.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_frame_size_rounds_to_power_of_two() {
        assert_eq!(Equalizer::new(44100, 1000).frame_size(), 1024);
        assert_eq!(Equalizer::new(44100, 8).frame_size(), 64);
        assert_eq!(Equalizer::new(44100, usize::MAX).frame_size(), MAX_EQ_FRAME_SIZE);
    }
}
