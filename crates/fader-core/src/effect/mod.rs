//! Per-track effects
//!
//! Every track owns an [`EffectsChain`] that runs on the audio thread in a
//! fixed order: spectral EQ, resonant filter, reverb. Parameters arrive as
//! plain value types ([`EqParams`], [`FilterParams`], [`ReverbParams`]) that
//! have already been validated on the control thread. The DSP side clamps
//! again so a stage can never be driven unstable.

mod chain;
mod eq;
mod filter;
mod preset;
mod reverb;

pub use chain::EffectsChain;
pub use eq::{Equalizer, DEFAULT_EQ_FRAME_SIZE, MAX_EQ_FRAME_SIZE, MIN_EQ_FRAME_SIZE};
pub use filter::Filter;
pub use preset::Preset;
pub use reverb::Reverb;

use serde::{Deserialize, Serialize};

use crate::error::{MixerError, MixerResult};
use crate::types::StereoBuffer;

/// Audio effect trait
///
/// Implemented by each stage of the chain. Effects process stereo buffers in
/// place and must not allocate in `process`.
pub trait Effect: Send {
    /// Process a stereo buffer in-place
    fn process(&mut self, buffer: &mut StereoBuffer);

    /// Delay this effect adds to the signal, in samples
    fn latency_samples(&self) -> u32;

    /// Display name
    fn name(&self) -> &'static str;

    /// Whether `process` can be skipped because the effect is a pass-through
    fn is_bypassed(&self) -> bool;

    /// Clear internal state (delay lines, overlap buffers)
    fn reset(&mut self);
}

/// Number of EQ bands
pub const NUM_EQ_BANDS: usize = 5;

/// Upper edges of the first four EQ bands in Hz; the fifth runs to Nyquist
pub const EQ_BAND_EDGES_HZ: [f32; NUM_EQ_BANDS - 1] = [250.0, 1000.0, 4000.0, 8000.0];

/// Largest accepted EQ band gain
pub const MAX_EQ_GAIN: f32 = 2.0;

/// Five-band EQ gains (linear multipliers)
///
/// Bands: low (< 250 Hz), mid-low (< 1 kHz), mid (< 4 kHz), mid-high (< 8 kHz),
/// high (rest).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EqParams {
    pub gains: [f32; NUM_EQ_BANDS],
}

impl EqParams {
    /// All bands at unity
    pub const FLAT: Self = Self {
        gains: [1.0; NUM_EQ_BANDS],
    };

    pub fn new(low: f32, mid_low: f32, mid: f32, mid_high: f32, high: f32) -> Self {
        Self {
            gains: [low, mid_low, mid, mid_high, high],
        }
    }

    /// Check every band gain is finite and within [0, MAX_EQ_GAIN]
    pub fn validate(&self) -> MixerResult<()> {
        for (band, &gain) in self.gains.iter().enumerate() {
            if !gain.is_finite() || !(0.0..=MAX_EQ_GAIN).contains(&gain) {
                return Err(MixerError::InvalidEq(format!(
                    "band {} gain {} outside [0, {}]",
                    band, gain, MAX_EQ_GAIN
                )));
            }
        }
        Ok(())
    }

    pub fn is_flat(&self) -> bool {
        self.gains.iter().all(|&g| g == 1.0)
    }
}

impl Default for EqParams {
    fn default() -> Self {
        Self::FLAT
    }
}

/// Filter response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Pass-through
    #[default]
    None,
    LowPass,
    HighPass,
    BandPass,
}

/// Resonant filter settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterParams {
    pub kind: FilterKind,
    /// Cutoff (or center, for band-pass) in Hz; must lie in (0, nyquist)
    pub cutoff_hz: f32,
    /// Resonance as a Q factor; must be >= 0
    pub resonance: f32,
}

impl FilterParams {
    pub fn new(kind: FilterKind, cutoff_hz: f32, resonance: f32) -> Self {
        Self {
            kind,
            cutoff_hz,
            resonance,
        }
    }

    /// Validate against the engine sample rate
    pub fn validate(&self, sample_rate: u32) -> MixerResult<()> {
        let nyquist = sample_rate as f32 / 2.0;
        if !self.cutoff_hz.is_finite() || self.cutoff_hz <= 0.0 || self.cutoff_hz >= nyquist {
            return Err(MixerError::InvalidFilter(format!(
                "cutoff {}Hz outside (0, {}Hz)",
                self.cutoff_hz, nyquist
            )));
        }
        if !self.resonance.is_finite() || self.resonance < 0.0 {
            return Err(MixerError::InvalidFilter(format!(
                "resonance {} must be >= 0",
                self.resonance
            )));
        }
        Ok(())
    }
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            kind: FilterKind::None,
            cutoff_hz: 1000.0,
            resonance: 1.0,
        }
    }
}

/// Reverb settings, all in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReverbParams {
    /// Scales delay-line lengths and feedback
    pub room_size: f32,
    /// High-frequency loss in the feedback path
    pub damping: f32,
    /// Wet/dry blend; 0 = dry only
    pub wet_level: f32,
}

impl ReverbParams {
    pub fn new(room_size: f32, damping: f32, wet_level: f32) -> Self {
        Self {
            room_size,
            damping,
            wet_level,
        }
    }

    pub fn validate(&self) -> MixerResult<()> {
        let fields = [
            ("room_size", self.room_size),
            ("damping", self.damping),
            ("wet_level", self.wet_level),
        ];
        for (name, value) in fields {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(MixerError::InvalidReverb(format!(
                    "{} {} outside [0, 1]",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

impl Default for ReverbParams {
    fn default() -> Self {
        Self {
            room_size: 0.5,
            damping: 0.5,
            wet_level: 0.0,
        }
    }
}

/// Complete parameter set for one track's chain
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EffectsParams {
    pub eq: EqParams,
    pub filter: FilterParams,
    pub reverb: ReverbParams,
}

impl EffectsParams {
    pub fn validate(&self, sample_rate: u32) -> MixerResult<()> {
        self.eq.validate()?;
        self.filter.validate(sample_rate)?;
        self.reverb.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eq_validation() {
        assert!(EqParams::FLAT.validate().is_ok());
        assert!(EqParams::new(0.0, 2.0, 1.0, 1.0, 1.0).validate().is_ok());
        assert!(EqParams::new(-0.1, 1.0, 1.0, 1.0, 1.0).validate().is_err());
        assert!(EqParams::new(1.0, 1.0, 2.5, 1.0, 1.0).validate().is_err());
        assert!(EqParams::new(1.0, 1.0, 1.0, f32::NAN, 1.0).validate().is_err());
    }

    #[test]
    fn test_filter_validation_bounds() {
        let ok = FilterParams::new(FilterKind::LowPass, 1000.0, 0.7);
        assert!(ok.validate(44100).is_ok());

        assert!(FilterParams::new(FilterKind::LowPass, 0.0, 0.7).validate(44100).is_err());
        assert!(FilterParams::new(FilterKind::LowPass, 22050.0, 0.7).validate(44100).is_err());
        assert!(FilterParams::new(FilterKind::HighPass, 500.0, -1.0).validate(44100).is_err());
        assert!(FilterParams::new(FilterKind::BandPass, f32::INFINITY, 1.0).validate(44100).is_err());
    }

    #[test]
    fn test_reverb_validation() {
        assert!(ReverbParams::default().validate().is_ok());
        assert!(ReverbParams::new(1.0, 0.0, 1.0).validate().is_ok());
        assert!(ReverbParams::new(1.1, 0.5, 0.5).validate().is_err());
        assert!(ReverbParams::new(0.5, 0.5, -0.01).validate().is_err());
    }

    #[test]
    fn test_filter_kind_serde_names() {
        let yaml = serde_yaml::to_string(&FilterKind::BandPass).unwrap();
        assert_eq!(yaml.trim(), "band_pass");
    }
}
