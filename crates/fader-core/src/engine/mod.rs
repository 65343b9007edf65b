//! Mixing engine
//!
//! - [`MixerHandle`]: control side, validates and queues changes
//! - [`MixEngine`]: audio side, drains the queue and renders blocks
//! - [`EngineCommand`]: what travels between them over a lock-free ring buffer
//! - [`MixerControlState`]: master volume, crossfader, per-track gains
//! - `latency`: keeps tracks sample-aligned when effect chains add delay
//! - `gc`: deferred deallocation of track buffers

mod command;
mod control;
pub mod gc;
mod handle;
mod latency;
mod mixer;

pub use command::{command_channel, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use control::{CrossfaderCurve, MixerControlState};
pub use handle::MixerHandle;
pub use mixer::MixEngine;

use crate::config::MixerConfig;

/// Create a connected handle/engine pair
///
/// Move the engine to whatever drives the audio callback (see
/// [`start_audio_system`](crate::audio::start_audio_system)); keep the handle
/// on the control side.
///
/// Out-of-range config values are clamped (see [`MixerConfig::sanitized`]).
pub fn create_mixer(sample_rate: u32, channels: u16, config: &MixerConfig) -> (MixerHandle, MixEngine) {
    let config = config.sanitized();
    let (producer, consumer) = command_channel(config.command_queue_capacity);

    let engine = MixEngine::new(
        consumer,
        sample_rate,
        channels,
        config.max_tracks,
        config.crossfader_curve,
        config.eq_frame_size,
        config.render_threads,
    );
    let handle = MixerHandle::new(producer, engine.control().clone(), sample_rate);

    (handle, engine)
}
