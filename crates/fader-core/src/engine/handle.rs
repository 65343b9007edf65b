//! Control-side mixer handle
//!
//! [`MixerHandle`] is what front ends talk to. It validates every request,
//! turns it into an [`EngineCommand`] and pushes it onto the lock-free queue.
//! It keeps a mirror of the control state and per-track effect settings so
//! setters can validate and getters can answer without crossing to the
//! audio thread. Playback position and state are read from the tracks'
//! atomics, which reflect the last rendered cycle.

use std::collections::HashMap;
use std::sync::Arc;

use super::command::EngineCommand;
use super::control::MixerControlState;
use crate::effect::{EffectsParams, EqParams, FilterParams, Preset, ReverbParams};
use crate::error::{MixerError, MixerResult};
use crate::track::{AudioTrack, TrackAtomics, TrackData};
use crate::types::{DeckSide, PlayState};

/// Mirror of what the engine holds for one loaded track
struct TrackEntry {
    slot: usize,
    frames: usize,
    effects: EffectsParams,
    effects_enabled: bool,
}

/// Control-thread handle to the mixer
pub struct MixerHandle {
    producer: rtrb::Producer<EngineCommand>,
    control: MixerControlState,
    tracks: HashMap<String, TrackEntry>,
    slot_atomics: Vec<Arc<TrackAtomics>>,
    sample_rate: u32,
}

impl MixerHandle {
    pub(crate) fn new(
        producer: rtrb::Producer<EngineCommand>,
        control: MixerControlState,
        sample_rate: u32,
    ) -> Self {
        let slot_atomics = (0..control.track_gains.len())
            .map(|_| Arc::new(TrackAtomics::new()))
            .collect();
        Self {
            producer,
            control,
            tracks: HashMap::new(),
            slot_atomics,
            sample_rate,
        }
    }

    /// Engine sample rate; tracks must be decoded at this rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of track slots
    pub fn max_tracks(&self) -> usize {
        self.slot_atomics.len()
    }

    fn send(&mut self, cmd: EngineCommand) -> MixerResult<()> {
        self.producer
            .push(cmd)
            .map_err(|_| MixerError::QueueFull)
    }

    fn entry(&self, track_id: &str) -> MixerResult<&TrackEntry> {
        self.tracks
            .get(track_id)
            .ok_or_else(|| MixerError::UnknownTrack(track_id.to_string()))
    }

    fn entry_mut(&mut self, track_id: &str) -> MixerResult<&mut TrackEntry> {
        self.tracks
            .get_mut(track_id)
            .ok_or_else(|| MixerError::UnknownTrack(track_id.to_string()))
    }

    fn slot_of(&self, track_id: &str) -> MixerResult<usize> {
        self.entry(track_id).map(|e| e.slot)
    }

    fn free_slot(&self) -> Option<usize> {
        (0..self.max_tracks()).find(|slot| !self.tracks.values().any(|e| e.slot == *slot))
    }

    // ─────────────────────────────────────────────────────────────
    // Track management
    // ─────────────────────────────────────────────────────────────

    /// Load decoded interleaved PCM under `track_id`
    ///
    /// The track starts Stopped at position 0 with unity gain, no deck side and
    /// effects off. Loading under an id that is already loaded replaces that
    /// track in its slot.
    pub fn load(
        &mut self,
        track_id: &str,
        samples: Vec<i16>,
        sample_rate: u32,
        channels: u16,
    ) -> MixerResult<()> {
        if sample_rate != self.sample_rate {
            return Err(MixerError::SampleRateMismatch {
                engine: self.sample_rate,
                track: sample_rate,
            });
        }
        let data = TrackData::new(samples, sample_rate, channels)?;
        let frames = data.frames();
        let duration = data.duration_secs();

        let slot = match self.tracks.get(track_id) {
            Some(entry) => entry.slot,
            None => self
                .free_slot()
                .ok_or(MixerError::TooManyTracks(self.max_tracks()))?,
        };

        let track = AudioTrack::new(data, self.slot_atomics[slot].clone());
        self.send(EngineCommand::LoadTrack {
            slot,
            track: Box::new(track),
        })?;

        self.control.reset_slot(slot);
        self.tracks.insert(
            track_id.to_string(),
            TrackEntry {
                slot,
                frames,
                effects: EffectsParams::default(),
                effects_enabled: false,
            },
        );

        log::info!(
            "load: '{}' into slot {} ({:.1}s, {} channel(s))",
            track_id,
            slot,
            duration,
            channels
        );
        Ok(())
    }

    /// Remove a track; its memory is released off the audio thread
    pub fn unload(&mut self, track_id: &str) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        self.send(EngineCommand::UnloadTrack { slot })?;
        self.control.reset_slot(slot);
        self.tracks.remove(track_id);
        log::info!("unload: '{}' from slot {}", track_id, slot);
        Ok(())
    }

    /// Ids of all loaded tracks, sorted
    pub fn track_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tracks.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn is_loaded(&self, track_id: &str) -> bool {
        self.tracks.contains_key(track_id)
    }

    // ─────────────────────────────────────────────────────────────
    // Playback
    // ─────────────────────────────────────────────────────────────

    pub fn play(&mut self, track_id: &str) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        self.send(EngineCommand::Play { slot })
    }

    /// Toggle between Playing and Paused (no effect on a stopped track)
    pub fn pause(&mut self, track_id: &str) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        self.send(EngineCommand::Pause { slot })
    }

    /// Stop and rewind to the start
    pub fn stop(&mut self, track_id: &str) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        self.send(EngineCommand::Stop { slot })
    }

    /// Jump to `seconds` from the start of the track
    pub fn seek(&mut self, track_id: &str, seconds: f64) -> MixerResult<()> {
        let entry = self.entry(track_id)?;
        let slot = entry.slot;
        let frame = seconds * self.sample_rate as f64;
        if !seconds.is_finite() || seconds < 0.0 || frame > entry.frames as f64 {
            return Err(MixerError::InvalidPosition(seconds));
        }
        self.send(EngineCommand::Seek {
            slot,
            frame: frame as usize,
        })
    }

    /// Playback state as of the last rendered cycle
    pub fn track_state(&self, track_id: &str) -> MixerResult<PlayState> {
        let slot = self.slot_of(track_id)?;
        Ok(self.slot_atomics[slot].play_state())
    }

    /// Playback position in seconds as of the last rendered cycle
    pub fn track_position(&self, track_id: &str) -> MixerResult<f64> {
        let slot = self.slot_of(track_id)?;
        Ok(self.slot_atomics[slot].position() as f64 / self.sample_rate as f64)
    }

    pub fn track_duration(&self, track_id: &str) -> MixerResult<f64> {
        let entry = self.entry(track_id)?;
        Ok(entry.frames as f64 / self.sample_rate as f64)
    }

    // ─────────────────────────────────────────────────────────────
    // Mixer controls
    // ─────────────────────────────────────────────────────────────

    pub fn set_track_volume(&mut self, track_id: &str, gain: f32) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        validate_unit(gain).map_err(MixerError::InvalidGain)?;
        self.send(EngineCommand::SetTrackGain { slot, gain })?;
        self.control.track_gains[slot] = gain;
        Ok(())
    }

    pub fn track_volume(&self, track_id: &str) -> MixerResult<f32> {
        let slot = self.slot_of(track_id)?;
        Ok(self.control.track_gains[slot])
    }

    pub fn set_master_volume(&mut self, volume: f32) -> MixerResult<()> {
        validate_unit(volume).map_err(MixerError::InvalidGain)?;
        self.send(EngineCommand::SetMasterVolume { volume })?;
        self.control.master_volume = volume;
        Ok(())
    }

    pub fn master_volume(&self) -> f32 {
        self.control.master_volume
    }

    /// Move the crossfader (0 = full left deck, 1 = full right deck)
    pub fn set_crossfader(&mut self, position: f32) -> MixerResult<()> {
        validate_unit(position).map_err(MixerError::InvalidCrossfader)?;
        self.send(EngineCommand::SetCrossfader { position })?;
        self.control.crossfader = position;
        Ok(())
    }

    pub fn crossfader(&self) -> f32 {
        self.control.crossfader
    }

    /// Put `track_a` on the left deck and `track_b` on the right, then set the
    /// crossfader, all in one step
    ///
    /// Any other track loses its deck assignment.
    pub fn apply_crossfader(
        &mut self,
        track_a: &str,
        track_b: &str,
        position: f32,
    ) -> MixerResult<()> {
        validate_unit(position).map_err(MixerError::InvalidCrossfader)?;
        let left = self.slot_of(track_a)?;
        let right = self.slot_of(track_b)?;
        if left == right {
            return Err(MixerError::SameTrack(track_a.to_string()));
        }
        self.send(EngineCommand::AssignDecks {
            left,
            right,
            position,
        })?;
        self.control.assign_decks(left, right);
        self.control.crossfader = position;
        Ok(())
    }

    /// Assign a single track to a crossfader side (`None` = unaffected by the crossfader)
    pub fn set_deck(&mut self, track_id: &str, side: Option<DeckSide>) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        self.send(EngineCommand::SetDeckSide { slot, side })?;
        self.control.deck_sides[slot] = side;
        Ok(())
    }

    pub fn deck(&self, track_id: &str) -> MixerResult<Option<DeckSide>> {
        let slot = self.slot_of(track_id)?;
        Ok(self.control.deck_sides[slot])
    }

    // ─────────────────────────────────────────────────────────────
    // Effects
    // ─────────────────────────────────────────────────────────────

    pub fn enable_effects(&mut self, track_id: &str, enabled: bool) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        self.send(EngineCommand::SetEffectsEnabled { slot, enabled })?;
        self.entry_mut(track_id)?.effects_enabled = enabled;
        Ok(())
    }

    pub fn effects_enabled(&self, track_id: &str) -> MixerResult<bool> {
        Ok(self.entry(track_id)?.effects_enabled)
    }

    pub fn set_eq(&mut self, track_id: &str, params: EqParams) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        params.validate()?;
        self.send(EngineCommand::SetEq { slot, params })?;
        self.entry_mut(track_id)?.effects.eq = params;
        Ok(())
    }

    pub fn set_filter(&mut self, track_id: &str, params: FilterParams) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        params.validate(self.sample_rate)?;
        self.send(EngineCommand::SetFilter { slot, params })?;
        self.entry_mut(track_id)?.effects.filter = params;
        Ok(())
    }

    pub fn set_reverb(&mut self, track_id: &str, params: ReverbParams) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        params.validate()?;
        self.send(EngineCommand::SetReverb { slot, params })?;
        self.entry_mut(track_id)?.effects.reverb = params;
        Ok(())
    }

    /// Replace the track's whole effect configuration with a preset
    pub fn apply_preset(&mut self, track_id: &str, preset: Preset) -> MixerResult<()> {
        let slot = self.slot_of(track_id)?;
        let params = preset.params();
        params.validate(self.sample_rate)?;
        self.send(EngineCommand::SetEffects { slot, params })?;
        self.entry_mut(track_id)?.effects = params;
        log::debug!("apply_preset: '{}' -> {}", track_id, preset);
        Ok(())
    }

    /// Current effect settings for a track
    pub fn effects(&self, track_id: &str) -> MixerResult<EffectsParams> {
        Ok(self.entry(track_id)?.effects)
    }
}

/// Accept finite values in [0, 1]; the rejected value comes back as the error
fn validate_unit(value: f32) -> Result<(), f32> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(value)
    }
}
