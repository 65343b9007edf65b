//! Resonant low-pass / high-pass / band-pass filter

use std::f32::consts::PI;

use super::{Effect, FilterKind, FilterParams};
use crate::types::StereoBuffer;

/// Lower bound on Q so k = 1/q stays finite
const MIN_Q: f32 = 0.1;
/// Upper bound on Q; above this the filter self-oscillates
const MAX_Q: f32 = 20.0;

/// Two-pole (12dB/octave) state-variable filter, trapezoidal integration
///
/// One structure yields all three responses; the kind only selects which
/// output is used.
struct SvfFilter {
    // State per channel
    ic1eq_l: f32,
    ic2eq_l: f32,
    ic1eq_r: f32,
    ic2eq_r: f32,
    // Coefficients
    k: f32,
    a1: f32,
    a2: f32,
    a3: f32,
}

impl SvfFilter {
    fn new() -> Self {
        Self {
            ic1eq_l: 0.0,
            ic2eq_l: 0.0,
            ic1eq_r: 0.0,
            ic2eq_r: 0.0,
            k: 0.0,
            a1: 0.0,
            a2: 0.0,
            a3: 0.0,
        }
    }

    fn set_params(&mut self, cutoff: f32, q: f32, sample_rate: f32) {
        let nyquist = sample_rate / 2.0;
        let cutoff = cutoff.clamp(1.0, nyquist * 0.99);
        let q = q.clamp(MIN_Q, MAX_Q);

        let g = (PI * cutoff / sample_rate).tan();
        self.k = 1.0 / q;
        self.a1 = 1.0 / (1.0 + g * (g + self.k));
        self.a2 = g * self.a1;
        self.a3 = g * self.a2;
    }

    /// Process and return (lowpass, highpass, bandpass)
    #[inline]
    fn process(&mut self, left: f32, right: f32) -> ((f32, f32), (f32, f32), (f32, f32)) {
        let v3_l = left - self.ic2eq_l;
        let v1_l = self.a1 * self.ic1eq_l + self.a2 * v3_l;
        let v2_l = self.ic2eq_l + self.a2 * self.ic1eq_l + self.a3 * v3_l;
        self.ic1eq_l = 2.0 * v1_l - self.ic1eq_l;
        self.ic2eq_l = 2.0 * v2_l - self.ic2eq_l;

        let v3_r = right - self.ic2eq_r;
        let v1_r = self.a1 * self.ic1eq_r + self.a2 * v3_r;
        let v2_r = self.ic2eq_r + self.a2 * self.ic1eq_r + self.a3 * v3_r;
        self.ic1eq_r = 2.0 * v1_r - self.ic1eq_r;
        self.ic2eq_r = 2.0 * v2_r - self.ic2eq_r;

        let high_l = left - self.k * v1_l - v2_l;
        let high_r = right - self.k * v1_r - v2_r;

        ((v2_l, v2_r), (high_l, high_r), (v1_l, v1_r))
    }

    fn reset(&mut self) {
        self.ic1eq_l = 0.0;
        self.ic2eq_l = 0.0;
        self.ic1eq_r = 0.0;
        self.ic2eq_r = 0.0;
    }
}

/// Track filter stage
///
/// `FilterKind::None` is a pass-through. Switching kind keeps the filter state
/// so sweeps between responses don't click.
pub struct Filter {
    params: FilterParams,
    sample_rate: f32,
    svf: SvfFilter,
}

impl Filter {
    pub fn new(sample_rate: u32) -> Self {
        let mut filter = Self {
            params: FilterParams::default(),
            sample_rate: sample_rate as f32,
            svf: SvfFilter::new(),
        };
        filter.set_params(FilterParams::default());
        filter
    }

    pub fn set_params(&mut self, params: FilterParams) {
        if params.kind == FilterKind::None {
            self.svf.reset();
        }
        self.params = params;
        self.svf
            .set_params(params.cutoff_hz, params.resonance, self.sample_rate);
    }

    pub fn params(&self) -> FilterParams {
        self.params
    }
}

impl Effect for Filter {
    fn process(&mut self, buffer: &mut StereoBuffer) {
        let kind = self.params.kind;
        if kind == FilterKind::None {
            return;
        }

        for sample in buffer.iter_mut() {
            let (low, high, band) = self.svf.process(sample.left, sample.right);
            let (l, r) = match kind {
                FilterKind::LowPass => low,
                FilterKind::HighPass => high,
                FilterKind::BandPass => band,
                FilterKind::None => (sample.left, sample.right),
            };
            sample.left = l;
            sample.right = r;
        }
    }

    fn latency_samples(&self) -> u32 {
        0
    }

    fn name(&self) -> &'static str {
        "Filter"
    }

    fn is_bypassed(&self) -> bool {
        self.params.kind == FilterKind::None
    }

    fn reset(&mut self) {
        self.svf.reset();
    }
}
