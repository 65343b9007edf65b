//! Control-plane error types
//!
//! Every mixer operation validates its input before anything is queued for
//! the audio thread. A returned error means nothing changed.

use thiserror::Error;

/// Errors returned by mixer control operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MixerError {
    /// Track or master gain outside [0, 1]
    #[error("Gain out of range [0, 1]: {0}")]
    InvalidGain(f32),

    /// Crossfader position outside [0, 1]
    #[error("Crossfader position out of range [0, 1]: {0}")]
    InvalidCrossfader(f32),

    /// Filter cutoff outside (0, nyquist) or negative resonance
    #[error("Invalid filter parameters: {0}")]
    InvalidFilter(String),

    /// EQ band gain outside [0, 2]
    #[error("Invalid EQ band gain: {0}")]
    InvalidEq(String),

    /// Reverb parameter outside [0, 1]
    #[error("Invalid reverb parameters: {0}")]
    InvalidReverb(String),

    /// No track loaded under this id
    #[error("Unknown track: {0}")]
    UnknownTrack(String),

    /// Both crossfader decks name the same track
    #[error("Track assigned to both crossfader decks: {0}")]
    SameTrack(String),

    /// All track slots are occupied
    #[error("No free track slot (max {0})")]
    TooManyTracks(usize),

    /// Only mono and stereo sources are supported
    #[error("Unsupported channel count: {0}")]
    UnsupportedChannels(u16),

    /// Track sample rate differs from the engine rate (resampling is the decoder's job)
    #[error("Sample rate mismatch: engine={engine}Hz, track={track}Hz")]
    SampleRateMismatch { engine: u32, track: u32 },

    /// No samples, or a sample count that isn't a whole number of frames
    #[error("Sample buffer is empty or not frame-aligned")]
    EmptyBuffer,

    /// Seek target outside the track
    #[error("Seek position out of range: {0}s")]
    InvalidPosition(f64),

    /// Unknown preset name
    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    /// The command queue to the audio thread is full; retry on the next cycle
    #[error("Command queue full")]
    QueueFull,
}

/// Result type for mixer control operations
pub type MixerResult<T> = Result<T, MixerError>;
