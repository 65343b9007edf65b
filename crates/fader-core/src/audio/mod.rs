//! Audio output
//!
//! The engine renders whenever the host asks; this module decides who asks.
//! With the `cpal-backend` feature a real device drives the callback,
//! otherwise (or when no device can be opened) a mock driver renders on a
//! timer so the rest of the system behaves the same.
//!
//! ```ignore
//! use fader_core::{audio::start_audio_system, config::EngineConfig};
//!
//! let mut system = start_audio_system(&EngineConfig::default())?;
//! system.mixer.load("a", pcm, system.sample_rate, 2)?;
//! system.mixer.play("a")?;
//! ```

mod backend;
mod config;
mod error;
mod mock;

#[cfg(feature = "cpal-backend")]
mod cpal_backend;

pub use backend::{start_audio_system, AudioHandle, AudioSystemResult};
pub use config::{AudioConfig, BackendKind, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
pub use error::{AudioError, AudioResult};
pub use mock::MockAudioHandle;

#[cfg(feature = "cpal-backend")]
pub use cpal_backend::CpalAudioHandle;
