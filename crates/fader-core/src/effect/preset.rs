//! Named effect presets
//!
//! A preset is a complete [`EffectsParams`] value. Anything a preset doesn't
//! mention is reset to neutral, so applying one never leaves stale settings
//! from a previous preset behind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{EffectsParams, EqParams, FilterKind, FilterParams, ReverbParams};
use crate::error::MixerError;

/// Built-in effect presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Flat,
    BassBoost,
    TrebleBoost,
    VocalEnhance,
    ClubSound,
    TelephoneEffect,
    EchoChamber,
}

impl Preset {
    pub const ALL: [Preset; 7] = [
        Preset::Flat,
        Preset::BassBoost,
        Preset::TrebleBoost,
        Preset::VocalEnhance,
        Preset::ClubSound,
        Preset::TelephoneEffect,
        Preset::EchoChamber,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Flat => "flat",
            Preset::BassBoost => "bass_boost",
            Preset::TrebleBoost => "treble_boost",
            Preset::VocalEnhance => "vocal_enhance",
            Preset::ClubSound => "club_sound",
            Preset::TelephoneEffect => "telephone_effect",
            Preset::EchoChamber => "echo_chamber",
        }
    }

    /// The full parameter set this preset stands for
    pub fn params(&self) -> EffectsParams {
        let neutral = EffectsParams::default();
        match self {
            Preset::Flat => neutral,
            Preset::BassBoost => EffectsParams {
                eq: EqParams::new(1.8, 1.2, 1.0, 0.9, 0.9),
                ..neutral
            },
            Preset::TrebleBoost => EffectsParams {
                eq: EqParams::new(0.9, 0.9, 1.0, 1.3, 1.6),
                ..neutral
            },
            Preset::VocalEnhance => EffectsParams {
                eq: EqParams::new(0.8, 1.0, 1.4, 1.3, 1.0),
                ..neutral
            },
            Preset::ClubSound => EffectsParams {
                eq: EqParams::new(1.5, 1.0, 0.9, 1.1, 1.3),
                reverb: ReverbParams::new(0.6, 0.4, 0.25),
                ..neutral
            },
            Preset::TelephoneEffect => EffectsParams {
                eq: EqParams::new(0.3, 0.8, 1.5, 1.2, 0.4),
                filter: FilterParams::new(FilterKind::BandPass, 1500.0, 2.0),
                ..neutral
            },
            Preset::EchoChamber => EffectsParams {
                reverb: ReverbParams::new(0.9, 0.3, 0.6),
                ..neutral
            },
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = MixerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        Preset::ALL
            .iter()
            .copied()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| MixerError::UnknownPreset(s.to_string()))
    }
}
