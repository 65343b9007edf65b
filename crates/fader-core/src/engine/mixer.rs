//! The mix engine: audio-thread side of the mixer
//!
//! Owns every track slot, each slot's effects chain and the authoritative
//! [`MixerControlState`]. Once per callback it drains the command queue, then
//! for each playing track pulls a block, runs the chain, scales by track gain
//! times crossfade weight, sums, applies master volume and writes the block
//! out with saturation.
//!
//! Nothing on the render path allocates: slot buffers and the mix buffer are
//! sized to [`MAX_BUFFER_SIZE`] up front and larger host requests are
//! rendered in several blocks.

use rayon::prelude::*;

use super::command::EngineCommand;
use super::control::{CrossfaderCurve, MixerControlState};
use super::latency::{DelayLine, LatencyCompensator};
use crate::audio::MAX_BUFFER_SIZE;
use crate::effect::{EffectsChain, EffectsParams};
use crate::track::AudioTrack;
use crate::types::{sample_to_i16, Sample, StereoBuffer, StereoSample, BYTES_PER_SAMPLE};

/// One preallocated track position
struct TrackSlot {
    track: Option<AudioTrack>,
    chain: EffectsChain,
    /// Dry signal history, read back by the global latency while the chain is off
    compensation: DelayLine,
    buffer: StereoBuffer,
    /// Frames of latency still to flush after the track ran out
    tail: usize,
    /// Whether `buffer` holds audio for the current block
    active: bool,
}

impl TrackSlot {
    fn new(sample_rate: u32, eq_frame_size: usize) -> Self {
        let chain = EffectsChain::new(sample_rate, eq_frame_size);
        let compensation = DelayLine::new(chain.max_latency_samples() as usize);
        Self {
            track: None,
            chain,
            compensation,
            buffer: StereoBuffer::with_capacity(MAX_BUFFER_SIZE),
            tail: 0,
            active: false,
        }
    }

    /// Pull and process one block, delayed to `global_latency` frames
    ///
    /// Every slot's chain shares one EQ frame size, so an enabled chain is
    /// already at the global latency and only disabled slots need the
    /// compensation line.
    fn render(&mut self, frames: usize, global_latency: usize) {
        self.active = false;
        self.compensation.set_delay(global_latency);
        let Some(track) = self.track.as_mut() else {
            return;
        };

        if track.is_playing() {
            track.pull(&mut self.buffer, frames);
            if !track.is_playing() {
                // Ran out this block: let the delay drain
                self.tail = global_latency;
            }
        } else if self.tail > 0 {
            self.buffer.set_len_from_capacity(frames);
            self.buffer.fill_silence();
            self.tail = self.tail.saturating_sub(frames);
        } else {
            return;
        }
        self.active = true;

        if self.chain.is_enabled() {
            self.compensation.push(&self.buffer);
            self.chain.process(&mut self.buffer);
        } else {
            self.chain.process(&mut self.buffer);
            self.compensation.process(&mut self.buffer);
        }

        // A misbehaving chain must not poison the whole mix
        if !self.buffer.iter().all(|s| s.left.is_finite() && s.right.is_finite()) {
            self.buffer.fill_silence();
            self.chain.reset();
            self.compensation.clear();
            self.tail = 0;
        }
    }

    fn clear_chain(&mut self) {
        self.chain.set_enabled(false);
        self.chain.set_params(EffectsParams::default());
        self.chain.reset();
        self.compensation.clear();
        self.tail = 0;
    }
}

/// Audio-thread mixer
pub struct MixEngine {
    commands: rtrb::Consumer<EngineCommand>,
    control: MixerControlState,
    slots: Vec<TrackSlot>,
    latency: LatencyCompensator,
    mix_buffer: StereoBuffer,
    /// Dedicated workers for rendering tracks in parallel (None = sequential)
    pool: Option<rayon::ThreadPool>,
    sample_rate: u32,
    channels: u16,
}

impl MixEngine {
    /// Create the engine with all slots preallocated
    ///
    /// Call off the audio thread.
    pub fn new(
        commands: rtrb::Consumer<EngineCommand>,
        sample_rate: u32,
        channels: u16,
        max_tracks: usize,
        curve: CrossfaderCurve,
        eq_frame_size: usize,
        render_threads: usize,
    ) -> Self {
        let slots = (0..max_tracks)
            .map(|_| TrackSlot::new(sample_rate, eq_frame_size))
            .collect();

        let pool = if render_threads > 1 && max_tracks > 1 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(render_threads.min(max_tracks))
                .thread_name(|i| format!("mix-worker-{}", i))
                .build()
            {
                Ok(pool) => Some(pool),
                Err(e) => {
                    log::warn!("MixEngine::new: Failed to build render pool ({}), rendering sequentially", e);
                    None
                }
            }
        } else {
            None
        };

        log::info!(
            "MixEngine::new: {} slots, {}Hz, {} channel(s), {:?} crossfader",
            max_tracks,
            sample_rate,
            channels,
            curve
        );

        Self {
            commands,
            control: MixerControlState::new(max_tracks, curve),
            slots,
            latency: LatencyCompensator::new(max_tracks),
            mix_buffer: StereoBuffer::with_capacity(MAX_BUFFER_SIZE),
            pool,
            sample_rate,
            channels: channels.max(1),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Current control snapshot (as of the last drained command)
    pub fn control(&self) -> &MixerControlState {
        &self.control
    }

    /// Delay every track is aligned to, in frames
    pub fn latency_frames(&self) -> u32 {
        self.latency.global_latency()
    }

    /// Apply every command queued so far
    ///
    /// Bounded by what was in the queue on entry, so a writer racing the
    /// callback can't keep it here.
    pub fn process_commands(&mut self) {
        let pending = self.commands.slots();
        for _ in 0..pending {
            match self.commands.pop() {
                Ok(cmd) => self.apply(cmd),
                Err(_) => break,
            }
        }
    }

    fn apply(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::LoadTrack { slot, track } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.track = Some(*track);
                    s.clear_chain();
                    self.latency.set_slot_latency(slot, 0);
                    self.control.reset_slot(slot);
                }
            }
            EngineCommand::UnloadTrack { slot } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    if let Some(mut track) = s.track.take() {
                        track.stop();
                    }
                    s.clear_chain();
                    self.latency.set_slot_latency(slot, 0);
                    self.control.reset_slot(slot);
                }
            }
            EngineCommand::Play { slot } => {
                if let Some(track) = self.track_mut(slot) {
                    track.play();
                }
            }
            EngineCommand::Pause { slot } => {
                if let Some(track) = self.track_mut(slot) {
                    track.pause();
                }
            }
            EngineCommand::Stop { slot } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    if let Some(track) = s.track.as_mut() {
                        track.stop();
                    }
                    s.chain.reset();
                    s.compensation.clear();
                    s.tail = 0;
                }
            }
            EngineCommand::Seek { slot, frame } => {
                if let Some(track) = self.track_mut(slot) {
                    track.seek(frame);
                }
            }
            EngineCommand::SetTrackGain { slot, gain } => {
                if let Some(g) = self.control.track_gains.get_mut(slot) {
                    *g = gain.clamp(0.0, 1.0);
                }
            }
            EngineCommand::SetMasterVolume { volume } => {
                self.control.master_volume = volume.clamp(0.0, 1.0);
            }
            EngineCommand::SetCrossfader { position } => {
                self.control.crossfader = position.clamp(0.0, 1.0);
            }
            EngineCommand::AssignDecks {
                left,
                right,
                position,
            } => {
                self.control.assign_decks(left, right);
                self.control.crossfader = position.clamp(0.0, 1.0);
            }
            EngineCommand::SetDeckSide { slot, side } => {
                if let Some(s) = self.control.deck_sides.get_mut(slot) {
                    *s = side;
                }
            }
            EngineCommand::SetEffectsEnabled { slot, enabled } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.chain.set_enabled(enabled);
                    self.latency.set_slot_latency(slot, s.chain.latency_samples());
                }
            }
            EngineCommand::SetEq { slot, params } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.chain.eq_mut().set_params(params);
                }
            }
            EngineCommand::SetFilter { slot, params } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.chain.filter_mut().set_params(params);
                }
            }
            EngineCommand::SetReverb { slot, params } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.chain.reverb_mut().set_params(params);
                }
            }
            EngineCommand::SetEffects { slot, params } => {
                if let Some(s) = self.slots.get_mut(slot) {
                    s.chain.set_params(params);
                }
            }
        }
    }

    fn track_mut(&mut self, slot: usize) -> Option<&mut AudioTrack> {
        self.slots.get_mut(slot)?.track.as_mut()
    }

    /// Mix one block of at most MAX_BUFFER_SIZE frames into `mix_buffer`
    fn mix_block(&mut self, frames: usize) {
        let latency = self.latency.global_latency() as usize;
        match &self.pool {
            Some(pool) => {
                let slots = &mut self.slots;
                pool.install(|| slots.par_iter_mut().for_each(|slot| slot.render(frames, latency)));
            }
            None => self.slots.iter_mut().for_each(|slot| slot.render(frames, latency)),
        }
        if !self.slots.iter().any(|slot| slot.active) {
            self.latency.settle();
        }

        self.mix_buffer.set_len_from_capacity(frames);
        self.mix_buffer.fill_silence();
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.active {
                let weight = self.control.slot_weight(index);
                if weight > 0.0 {
                    self.mix_buffer.add_scaled(&slot.buffer, weight);
                }
            }
        }
        self.mix_buffer.scale(self.control.master_volume);
    }

    /// Render interleaved output, converting each mixed sample with `convert`
    fn render_with<T: Copy + Default>(&mut self, out: &mut [T], convert: impl Fn(Sample) -> T) {
        self.process_commands();

        let channels = self.channels as usize;
        let frames = out.len() / channels;
        let mut done = 0;

        while done < frames {
            let block = (frames - done).min(MAX_BUFFER_SIZE);
            self.mix_block(block);

            let dst = &mut out[done * channels..(done + block) * channels];
            if channels == 2 {
                for (dst, &sample) in dst.iter_mut().zip(self.mix_buffer.as_interleaved()) {
                    *dst = convert(sample);
                }
            } else {
                for (frame, sample) in dst.chunks_exact_mut(channels).zip(self.mix_buffer.iter()) {
                    write_frame(frame, sample, &convert);
                }
            }
            done += block;
        }

        // Trailing partial frame, if the host handed us one
        out[frames * channels..].fill(T::default());
    }

    /// Render into an interleaved 16-bit buffer (real-time safe)
    ///
    /// Renders `out.len() / channels` frames. Values saturate at the i16
    /// range instead of wrapping.
    pub fn render_into(&mut self, out: &mut [i16]) {
        self.render_with(out, sample_to_i16);
    }

    /// Render into an interleaved float buffer (real-time safe), clamped to [-1, 1]
    pub fn render_into_f32(&mut self, out: &mut [f32]) {
        self.render_with(out, |s| if s.is_nan() { 0.0 } else { s.clamp(-1.0, 1.0) });
    }

    /// Render `frame_count` frames as little-endian 16-bit PCM bytes
    ///
    /// Always returns exactly `frame_count * channels * 2` bytes. Allocates,
    /// so hosts with a real-time callback should use [`render_into`](Self::render_into).
    pub fn render(&mut self, frame_count: usize) -> Vec<u8> {
        let mut samples = vec![0i16; frame_count * self.channels as usize];
        self.render_into(&mut samples);
        let mut bytes = Vec::with_capacity(samples.len() * BYTES_PER_SAMPLE);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        bytes
    }
}

#[inline]
fn write_frame<T: Copy + Default>(frame: &mut [T], sample: &StereoSample, convert: &impl Fn(Sample) -> T) {
    match frame.len() {
        1 => frame[0] = convert(sample.mid()),
        _ => {
            frame[0] = convert(sample.left);
            frame[1] = convert(sample.right);
            // Fill additional channels with silence
            for ch in frame.iter_mut().skip(2) {
                *ch = T::default();
            }
        }
    }
}
