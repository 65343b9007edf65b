//! Stereo reverb
//!
//! Freeverb-style network: eight parallel damped comb filters per channel
//! followed by four series all-pass diffusers. Room size shortens or
//! lengthens the delay lines (and raises feedback); damping sets the one-pole
//! lowpass in each comb's feedback path.

use super::{Effect, ReverbParams};
use crate::types::StereoBuffer;

/// Comb filter delay line lengths (in samples at 44.1kHz, full room)
const COMB_LENGTHS: [usize; 8] = [1557, 1617, 1491, 1422, 1277, 1356, 1188, 1116];

/// Allpass filter delay line lengths (in samples at 44.1kHz, full room)
const ALLPASS_LENGTHS: [usize; 4] = [225, 556, 441, 341];

/// Stereo spread offset for right channel (in samples)
const STEREO_SPREAD: usize = 23;

/// Shortest room as a fraction of the full delay length
const MIN_ROOM_SCALE: f32 = 0.5;

/// Gain compensation for comb filter summing
const COMB_GAIN: f32 = 0.2;

/// Allpass feedback coefficient
const ALLPASS_FEEDBACK: f32 = 0.5;

/// Damping range used by Freeverb (damping 1.0 maps here)
const DAMP_SCALE: f32 = 0.4;

/// Delay line whose active length can shrink within its allocation
struct DelayLine {
    buffer: Vec<f32>,
    len: usize,
    pos: usize,
}

impl DelayLine {
    fn new(max_len: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            buffer: vec![0.0; max_len],
            len: max_len,
            pos: 0,
        }
    }

    fn set_len(&mut self, len: usize) {
        self.len = len.clamp(1, self.buffer.len());
        if self.pos >= self.len {
            self.pos = 0;
        }
    }

    #[inline]
    fn read(&self) -> f32 {
        self.buffer[self.pos]
    }

    #[inline]
    fn write_advance(&mut self, value: f32) {
        self.buffer[self.pos] = value;
        self.pos += 1;
        if self.pos >= self.len {
            self.pos = 0;
        }
    }

    fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.pos = 0;
    }
}

struct CombFilter {
    line: DelayLine,
    base_len: f32,
    filter_state: f32,
}

impl CombFilter {
    fn new(base_len: f32) -> Self {
        Self {
            line: DelayLine::new(base_len.ceil() as usize),
            base_len,
            filter_state: 0.0,
        }
    }

    fn set_room_scale(&mut self, scale: f32) {
        self.line.set_len((self.base_len * scale) as usize);
    }

    #[inline]
    fn process(&mut self, input: f32, feedback: f32, damp: f32) -> f32 {
        let output = self.line.read();

        // One-pole lowpass filter for damping high frequencies
        self.filter_state = output * (1.0 - damp) + self.filter_state * damp;

        self.line.write_advance(input + self.filter_state * feedback);
        output
    }

    fn reset(&mut self) {
        self.line.reset();
        self.filter_state = 0.0;
    }
}

struct AllpassFilter {
    line: DelayLine,
    base_len: f32,
}

impl AllpassFilter {
    fn new(base_len: f32) -> Self {
        Self {
            line: DelayLine::new(base_len.ceil() as usize),
            base_len,
        }
    }

    fn set_room_scale(&mut self, scale: f32) {
        self.line.set_len((self.base_len * scale) as usize);
    }

    #[inline]
    fn process(&mut self, input: f32) -> f32 {
        let buffered = self.line.read();
        self.line.write_advance(input + buffered * ALLPASS_FEEDBACK);
        buffered - input
    }

    fn reset(&mut self) {
        self.line.reset();
    }
}

/// Freeverb-style stereo reverb
pub struct Reverb {
    params: ReverbParams,
    combs_l: Vec<CombFilter>,
    combs_r: Vec<CombFilter>,
    allpass_l: Vec<AllpassFilter>,
    allpass_r: Vec<AllpassFilter>,
}

impl Reverb {
    /// Create a reverb with delay lines sized for `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        let sr_scale = sample_rate as f32 / 44100.0;
        let scaled = |len: usize| len as f32 * sr_scale;

        let mut reverb = Self {
            params: ReverbParams::default(),
            combs_l: COMB_LENGTHS.iter().map(|&len| CombFilter::new(scaled(len))).collect(),
            combs_r: COMB_LENGTHS
                .iter()
                .map(|&len| CombFilter::new(scaled(len + STEREO_SPREAD)))
                .collect(),
            allpass_l: ALLPASS_LENGTHS
                .iter()
                .map(|&len| AllpassFilter::new(scaled(len)))
                .collect(),
            allpass_r: ALLPASS_LENGTHS
                .iter()
                .map(|&len| AllpassFilter::new(scaled(len + STEREO_SPREAD)))
                .collect(),
        };
        reverb.set_params(ReverbParams::default());
        reverb
    }

    pub fn set_params(&mut self, params: ReverbParams) {
        let params = ReverbParams {
            room_size: params.room_size.clamp(0.0, 1.0),
            damping: params.damping.clamp(0.0, 1.0),
            wet_level: params.wet_level.clamp(0.0, 1.0),
        };
        let scale = MIN_ROOM_SCALE + (1.0 - MIN_ROOM_SCALE) * params.room_size;
        for comb in self.combs_l.iter_mut().chain(self.combs_r.iter_mut()) {
            comb.set_room_scale(scale);
        }
        for ap in self.allpass_l.iter_mut().chain(self.allpass_r.iter_mut()) {
            ap.set_room_scale(scale);
        }
        self.params = params;
    }

    pub fn params(&self) -> ReverbParams {
        self.params
    }

    /// Comb feedback (0.7-0.98)
    fn feedback(&self) -> f32 {
        0.7 + self.params.room_size * 0.28
    }
}

impl Effect for Reverb {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let feedback = self.feedback();
        let damp = self.params.damping * DAMP_SCALE;
        let wet = self.params.wet_level;
        let dry = 1.0 - wet;

        for sample in buffer.iter_mut() {
            let input = sample.mid();

            let mut out_l = 0.0f32;
            let mut out_r = 0.0f32;
            for comb in &mut self.combs_l {
                out_l += comb.process(input, feedback, damp);
            }
            for comb in &mut self.combs_r {
                out_r += comb.process(input, feedback, damp);
            }
            out_l *= COMB_GAIN;
            out_r *= COMB_GAIN;

            for ap in &mut self.allpass_l {
                out_l = ap.process(out_l);
            }
            for ap in &mut self.allpass_r {
                out_r = ap.process(out_r);
            }

            sample.left = sample.left * dry + out_l * wet;
            sample.right = sample.right * dry + out_r * wet;
        }
    }

    fn latency_samples(&self) -> u32 {
        // The decay tail is intentional, not latency
        0
    }

    fn name(&self) -> &'static str {
        "Reverb"
    }

    fn is_bypassed(&self) -> bool {
        // Keep the network running at wet = 0 so raising the level later
        // doesn't start from a cold tank
        false
    }

    fn reset(&mut self) {
        for comb in self.combs_l.iter_mut().chain(self.combs_r.iter_mut()) {
            comb.reset();
        }
        for ap in self.allpass_l.iter_mut().chain(self.allpass_r.iter_mut()) {
            ap.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn impulse(len: usize) -> StereoBuffer {
        let mut buffer = StereoBuffer::silence(len);
        buffer[0] = StereoSample::new(1.0, 1.0);
        buffer
    }

    #[test]
    fn test_reverb_dry_is_identity() {
        let mut reverb = Reverb::new(44100);
        reverb.set_params(ReverbParams::new(0.9, 0.3, 0.0));

        let dry = StereoBuffer::from_vec(
            (0..2048)
                .map(|i| StereoSample::new((i as f32 * 0.01).sin(), (i as f32 * 0.02).cos()))
                .collect(),
        );
        let mut wet = dry.clone();
        reverb.process(&mut wet);
        assert_eq!(dry.as_slice(), wet.as_slice());
    }

    #[test]
    fn test_reverb_produces_tail() {
        let mut reverb = Reverb::new(44100);
        reverb.set_params(ReverbParams::new(0.5, 0.5, 1.0));

        let mut buffer = impulse(8192);
        reverb.process(&mut buffer);

        let tail: f32 = buffer.as_slice()[2000..].iter().map(|s| s.peak()).sum();
        assert!(tail > 0.0);
        assert!(buffer.iter().all(|s| s.left.is_finite() && s.right.is_finite()));
    }

    #[test]
    fn test_room_size_scales_first_reflection() {
        // Earliest comb output arrives after the shortest comb + allpass path;
        // a smaller room must answer sooner
        let first_nonzero = |room: f32| {
            let mut reverb = Reverb::new(44100);
            reverb.set_params(ReverbParams::new(room, 0.0, 1.0));
            let mut buffer = impulse(4096);
            reverb.process(&mut buffer);
            buffer
                .as_slice()
                .iter()
                .skip(1)
                .position(|s| s.left.abs() > 1e-6)
                .unwrap_or(usize::MAX)
        };
        assert!(first_nonzero(0.0) < first_nonzero(1.0));
    }

    #[test]
    fn test_reverb_reset_clears_tail() {
        let mut reverb = Reverb::new(44100);
        reverb.set_params(ReverbParams::new(0.8, 0.2, 1.0));
        let mut buffer = impulse(4096);
        reverb.process(&mut buffer);

        reverb.reset();
        let mut silent = StereoBuffer::silence(4096);
        reverb.process(&mut silent);
        assert_eq!(silent.peak(), 0.0);
    }
}
