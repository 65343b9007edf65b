//! Fader Core - real-time mixing engine for DJ software
//!
//! Tracks are decoded 16-bit PCM loaded into fixed slots. Once per audio
//! callback the [`engine::MixEngine`] drains its command queue, runs every
//! playing track through its effects chain, weights it by gain and crossfader
//! and sums the result with saturation. Front ends drive it through an
//! [`engine::MixerHandle`] and never block the audio thread.

pub mod audio;
pub mod config;
pub mod effect;
pub mod engine;
pub mod error;
pub mod track;
pub mod types;

pub use engine::{create_mixer, CrossfaderCurve, MixEngine, MixerHandle};
pub use error::{MixerError, MixerResult};
pub use types::*;
