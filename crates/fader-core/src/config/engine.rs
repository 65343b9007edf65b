//! Engine configuration
//!
//! One YAML document with an `audio` section (output device and stream
//! format) and a `mixer` section (track slots, crossfader, effects sizing).
//! Missing keys take their defaults.

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::effect::{DEFAULT_EQ_FRAME_SIZE, MAX_EQ_FRAME_SIZE, MIN_EQ_FRAME_SIZE};
use crate::engine::{CrossfaderCurve, COMMAND_QUEUE_CAPACITY};

/// Default number of track slots
pub const DEFAULT_MAX_TRACKS: usize = 8;

/// Upper bound on track slots
pub const MAX_TRACKS: usize = 64;

/// Upper bound on render worker threads
pub const MAX_RENDER_THREADS: usize = 16;

/// Mixer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    /// Number of preallocated track slots (loaded tracks at once)
    /// Default: 8
    pub max_tracks: usize,

    /// Crossfader response
    /// Default: linear
    pub crossfader_curve: CrossfaderCurve,

    /// Capacity of the control -> audio command queue
    /// Default: 1024
    pub command_queue_capacity: usize,

    /// EQ frame size in samples (rounded up to a power of two)
    /// Larger frames give finer band edges and more latency.
    /// Default: 1024
    pub eq_frame_size: usize,

    /// Worker threads for rendering tracks in parallel (0 or 1 = render on
    /// the audio thread only)
    /// Default: 2
    pub render_threads: usize,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            max_tracks: DEFAULT_MAX_TRACKS,
            crossfader_curve: CrossfaderCurve::default(),
            command_queue_capacity: COMMAND_QUEUE_CAPACITY,
            eq_frame_size: DEFAULT_EQ_FRAME_SIZE,
            render_threads: 2,
        }
    }
}

impl MixerConfig {
    /// Copy with every field clamped to what the engine can allocate
    pub fn sanitized(&self) -> Self {
        Self {
            max_tracks: self.max_tracks.clamp(1, MAX_TRACKS),
            crossfader_curve: self.crossfader_curve,
            command_queue_capacity: self.command_queue_capacity.clamp(1, 1 << 16),
            eq_frame_size: self
                .eq_frame_size
                .clamp(MIN_EQ_FRAME_SIZE, MAX_EQ_FRAME_SIZE),
            render_threads: self.render_threads.min(MAX_RENDER_THREADS),
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub audio: AudioConfig,
    pub mixer: MixerConfig,
}
