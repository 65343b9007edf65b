//! Lock-free command queue from control threads to the audio callback
//!
//! Control threads never touch engine state directly. Every mutation is an
//! [`EngineCommand`] pushed into a bounded `rtrb` ring buffer; the audio
//! callback drains the queue once at the start of each cycle, so state
//! changes land on block boundaries and a slow writer can't stall output.
//!
//! ```ignore
//! let (tx, rx) = command_channel(COMMAND_QUEUE_CAPACITY);
//! tx.push(EngineCommand::Play { slot: 0 })?;   // control thread, never blocks
//! engine.process_commands();                   // audio thread, once per cycle
//! ```

use crate::effect::{EffectsParams, EqParams, FilterParams, ReverbParams};
use crate::track::AudioTrack;
use crate::types::DeckSide;

/// Commands sent from control threads to the audio thread
///
/// Commands address preallocated track slots by index. Values are validated
/// before they are queued; the engine applies them without further checks
/// beyond bounds.
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Track Management
    // ─────────────────────────────────────────────────────────────
    /// Put a loaded track into a slot
    ///
    /// Boxed to keep the enum small; the PCM itself sits behind a
    /// `basedrop::Shared` and is never freed on the audio thread.
    LoadTrack { slot: usize, track: Box<AudioTrack> },
    /// Remove the track from a slot
    UnloadTrack { slot: usize },

    // ─────────────────────────────────────────────────────────────
    // Playback Control
    // ─────────────────────────────────────────────────────────────
    Play { slot: usize },
    /// Toggle Playing <-> Paused
    Pause { slot: usize },
    /// Stop and rewind to 0
    Stop { slot: usize },
    /// Move the cursor (in frames)
    Seek { slot: usize, frame: usize },

    // ─────────────────────────────────────────────────────────────
    // Mixer Controls
    // ─────────────────────────────────────────────────────────────
    SetTrackGain { slot: usize, gain: f32 },
    SetMasterVolume { volume: f32 },
    SetCrossfader { position: f32 },
    /// Assign one slot to each crossfader side and move the fader
    AssignDecks { left: usize, right: usize, position: f32 },
    /// Put a single slot on a crossfader side (or take it off)
    SetDeckSide { slot: usize, side: Option<DeckSide> },

    // ─────────────────────────────────────────────────────────────
    // Effects
    // ─────────────────────────────────────────────────────────────
    SetEffectsEnabled { slot: usize, enabled: bool },
    SetEq { slot: usize, params: EqParams },
    SetFilter { slot: usize, params: FilterParams },
    SetReverb { slot: usize, params: ReverbParams },
    /// Replace the whole chain configuration at once (presets)
    SetEffects { slot: usize, params: EffectsParams },
}

/// Default capacity of the command queue
///
/// A preset or a deck assignment is one command, so even bursty front ends
/// stay far below this.
pub const COMMAND_QUEUE_CAPACITY: usize = 1024;

/// Create a new command channel (producer/consumer pair)
///
/// The producer belongs to the control side, the consumer to the audio
/// thread.
pub fn command_channel(
    capacity: usize,
) -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(capacity.max(1))
}
