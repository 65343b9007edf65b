//! Mixer control state and crossfader curves

use std::f32::consts::FRAC_PI_2;

use serde::{Deserialize, Serialize};

use crate::types::DeckSide;

/// Crossfader response curve
///
/// Both curves are monotonic and give the two sides equal weight at 0.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossfaderCurve {
    /// left = 1 - x, right = x (0.5 each at center)
    #[default]
    Linear,
    /// left = cos(x * pi/2), right = sin(x * pi/2) (~0.707 each at center,
    /// constant summed power)
    EqualPower,
}

impl CrossfaderCurve {
    /// (left weight, right weight) for a crossfader position in [0, 1]
    #[inline]
    pub fn weights(&self, position: f32) -> (f32, f32) {
        let x = position.clamp(0.0, 1.0);
        match self {
            CrossfaderCurve::Linear => (1.0 - x, x),
            CrossfaderCurve::EqualPower => {
                // Pin the ends so full-left/right are exactly silent on the far side
                if x <= 0.0 {
                    (1.0, 0.0)
                } else if x >= 1.0 {
                    (0.0, 1.0)
                } else {
                    ((x * FRAC_PI_2).cos(), (x * FRAC_PI_2).sin())
                }
            }
        }
    }
}

/// Mixer-wide control values
///
/// The engine owns the authoritative copy and only changes it while draining
/// the command queue, so a render cycle always sees one consistent snapshot.
/// [`MixerHandle`](super::MixerHandle) keeps a mirror to validate against and
/// answer getters without touching the audio thread.
#[derive(Debug, Clone, PartialEq)]
pub struct MixerControlState {
    /// Master volume in [0, 1]
    pub master_volume: f32,
    /// Crossfader position in [0, 1], 0 = full left
    pub crossfader: f32,
    pub curve: CrossfaderCurve,
    /// Per-slot track gain in [0, 1]
    pub track_gains: Vec<f32>,
    /// Per-slot crossfader side; `None` tracks ignore the crossfader
    pub deck_sides: Vec<Option<DeckSide>>,
}

impl MixerControlState {
    pub fn new(max_tracks: usize, curve: CrossfaderCurve) -> Self {
        Self {
            master_volume: 1.0,
            crossfader: 0.5,
            curve,
            track_gains: vec![1.0; max_tracks],
            deck_sides: vec![None; max_tracks],
        }
    }

    /// Crossfade weight for a track on `side`
    #[inline]
    pub fn deck_weight(&self, side: Option<DeckSide>) -> f32 {
        let (left, right) = self.curve.weights(self.crossfader);
        match side {
            Some(DeckSide::Left) => left,
            Some(DeckSide::Right) => right,
            None => 1.0,
        }
    }

    /// Effective gain for a slot: track gain x crossfade weight
    #[inline]
    pub fn slot_weight(&self, slot: usize) -> f32 {
        let gain = self.track_gains.get(slot).copied().unwrap_or(0.0);
        let side = self.deck_sides.get(slot).copied().flatten();
        gain * self.deck_weight(side)
    }

    /// Reset a slot to unity gain and no deck side (on load/unload)
    pub fn reset_slot(&mut self, slot: usize) {
        if let Some(gain) = self.track_gains.get_mut(slot) {
            *gain = 1.0;
        }
        if let Some(side) = self.deck_sides.get_mut(slot) {
            *side = None;
        }
    }

    /// Assign the two crossfader decks, clearing any previous assignment
    pub fn assign_decks(&mut self, left: usize, right: usize) {
        self.deck_sides.fill(None);
        if let Some(side) = self.deck_sides.get_mut(left) {
            *side = Some(DeckSide::Left);
        }
        if let Some(side) = self.deck_sides.get_mut(right) {
            *side = Some(DeckSide::Right);
        }
    }
}
