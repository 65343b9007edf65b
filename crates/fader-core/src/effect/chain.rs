//! Per-track effect chain: EQ -> Filter -> Reverb

use super::{Effect, EffectsParams, Equalizer, Filter, Reverb};
use crate::audio::MAX_BUFFER_SIZE;
use crate::types::StereoBuffer;

/// The effects owned by one track slot
///
/// Lives on the audio thread. All memory (FFT scratch, delay lines) is
/// allocated in `new`.
///
/// While disabled the EQ still runs on a copy of the input, so its overlap
/// buffers always hold recent audio and enabling the chain mid-track
/// continues the signal instead of starting from silence.
pub struct EffectsChain {
    enabled: bool,
    eq: Equalizer,
    filter: Filter,
    reverb: Reverb,
    /// Copy of the dry block fed to the EQ while disabled
    primer: StereoBuffer,
}

impl EffectsChain {
    pub fn new(sample_rate: u32, eq_frame_size: usize) -> Self {
        Self {
            enabled: false,
            eq: Equalizer::new(sample_rate, eq_frame_size),
            filter: Filter::new(sample_rate),
            reverb: Reverb::new(sample_rate),
            primer: StereoBuffer::with_capacity(MAX_BUFFER_SIZE),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Turn the chain on or off; a disabled chain passes audio through
    ///
    /// Re-enabling clears the filter and reverb so no stale tail from an
    /// earlier run leaks into the mix. The EQ keeps its primed state.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled && !self.enabled {
            self.filter.reset();
            self.reverb.reset();
        }
        self.enabled = enabled;
    }

    /// Replace every parameter at once
    pub fn set_params(&mut self, params: EffectsParams) {
        self.eq.set_params(params.eq);
        self.filter.set_params(params.filter);
        self.reverb.set_params(params.reverb);
    }

    pub fn params(&self) -> EffectsParams {
        EffectsParams {
            eq: self.eq.params(),
            filter: self.filter.params(),
            reverb: self.reverb.params(),
        }
    }

    pub fn eq_mut(&mut self) -> &mut Equalizer {
        &mut self.eq
    }

    pub fn filter_mut(&mut self) -> &mut Filter {
        &mut self.filter
    }

    pub fn reverb_mut(&mut self) -> &mut Reverb {
        &mut self.reverb
    }

    /// Total delay of the enabled chain in samples
    pub fn latency_samples(&self) -> u32 {
        if !self.enabled {
            return 0;
        }
        self.max_latency_samples()
    }

    /// Latency the chain has whenever it is enabled
    pub fn max_latency_samples(&self) -> u32 {
        self.stages().iter().map(|e| e.latency_samples()).sum()
    }

    /// Run the chain over `buffer`
    ///
    /// A disabled chain leaves `buffer` untouched and only primes the EQ.
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        if !self.enabled {
            self.prime(buffer);
            return;
        }
        for effect in self.stages_mut() {
            if !effect.is_bypassed() {
                effect.process(buffer);
            }
        }
    }

    pub fn reset(&mut self) {
        for effect in self.stages_mut() {
            effect.reset();
        }
    }

    fn prime(&mut self, buffer: &StereoBuffer) {
        for chunk in buffer.as_slice().chunks(MAX_BUFFER_SIZE) {
            self.primer.set_len_from_capacity(chunk.len());
            self.primer.as_mut_slice().copy_from_slice(chunk);
            self.eq.process(&mut self.primer);
        }
    }

    fn stages(&self) -> [&dyn Effect; 3] {
        [&self.eq, &self.filter, &self.reverb]
    }

    fn stages_mut(&mut self) -> [&mut dyn Effect; 3] {
        [&mut self.eq, &mut self.filter, &mut self.reverb]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effect::{FilterKind, Preset};
    use crate::types::StereoSample;

    #[test]
    fn test_disabled_chain_is_passthrough() {
        let mut chain = EffectsChain::new(44100, 256);
        chain.set_params(Preset::TelephoneEffect.params());

        let dry = StereoBuffer::from_vec(vec![StereoSample::new(0.3, -0.2); 128]);
        let mut wet = dry.clone();
        chain.process(&mut wet);
        assert_eq!(dry.as_slice(), wet.as_slice());
        assert_eq!(chain.latency_samples(), 0);
    }

    #[test]
    fn test_enabled_chain_reports_eq_latency() {
        let mut chain = EffectsChain::new(44100, 512);
        chain.set_enabled(true);
        assert_eq!(chain.latency_samples(), 512);
    }

    #[test]
    fn test_enabling_mid_stream_continues_signal() {
        let mut chain = EffectsChain::new(44100, 256);
        let latency = chain.max_latency_samples() as usize;
        let input: Vec<StereoSample> = (0..2048)
            .map(|i| StereoSample::mono(0.5 + 0.25 * (i as f32 * 0.05).sin()))
            .collect();

        let mut first = StereoBuffer::from_vec(input[..1024].to_vec());
        chain.process(&mut first);
        assert_eq!(first.as_slice(), &input[..1024]);

        chain.set_enabled(true);
        let mut second = StereoBuffer::from_vec(input[1024..].to_vec());
        chain.process(&mut second);

        for i in 0..second.len() {
            let expected = input[1024 + i - latency].left;
            assert!((second[i].left - expected).abs() < 1e-4, "sample {}", i);
        }
    }

    #[test]
    fn test_set_params_reaches_every_stage() {
        let mut chain = EffectsChain::new(44100, 256);
        let params = Preset::TelephoneEffect.params();
        chain.set_params(params);
        assert_eq!(chain.params(), params);
        assert_eq!(chain.params().filter.kind, FilterKind::BandPass);
    }

    #[test]
    fn test_flat_enabled_chain_is_delayed_identity() {
        let mut chain = EffectsChain::new(44100, 256);
        chain.set_enabled(true);
        let latency = chain.latency_samples() as usize;

        let input: Vec<StereoSample> = (0..2048)
            .map(|i| StereoSample::mono((i as f32 * 0.05).sin() * 0.5))
            .collect();
        let mut buffer = StereoBuffer::from_vec(input.clone());
        chain.process(&mut buffer);

        for i in 0..input.len() - latency {
            assert!((buffer[i + latency].left - input[i].left).abs() < 1e-4);
        }
    }
}
