//! Backend selection
//!
//! Both backends share the same split: the control side keeps a
//! [`MixerHandle`], the backend's audio thread owns the [`MixEngine`] and
//! calls its render method once per cycle.
//!
//! [`MixEngine`]: crate::engine::MixEngine

use super::config::BackendKind;
use super::error::AudioResult;
use super::mock::MockAudioHandle;
use crate::config::EngineConfig;
use crate::engine::{create_mixer, MixerHandle};

/// Result of starting the audio system
pub struct AudioSystemResult {
    /// Handle to keep audio alive (drop to stop)
    pub handle: AudioHandle,
    /// Control handle for loading tracks and moving faders
    pub mixer: MixerHandle,
    /// Sample rate the engine runs at (tracks must match it)
    pub sample_rate: u32,
    /// Buffer size in frames
    pub buffer_size: u32,
    /// One-way output latency in milliseconds
    pub latency_ms: f32,
}

/// Handle to the active audio output. Drop this to stop audio.
pub enum AudioHandle {
    #[cfg(feature = "cpal-backend")]
    Cpal(super::cpal_backend::CpalAudioHandle),
    Mock(MockAudioHandle),
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        match self {
            #[cfg(feature = "cpal-backend")]
            AudioHandle::Cpal(h) => h.sample_rate(),
            AudioHandle::Mock(h) => h.sample_rate(),
        }
    }

    pub fn buffer_size(&self) -> u32 {
        match self {
            #[cfg(feature = "cpal-backend")]
            AudioHandle::Cpal(h) => h.buffer_size(),
            AudioHandle::Mock(h) => h.buffer_size(),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            #[cfg(feature = "cpal-backend")]
            AudioHandle::Cpal(_) => "cpal",
            AudioHandle::Mock(_) => "mock",
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, AudioHandle::Mock(_))
    }
}

/// Start the audio system with the given configuration
///
/// - `Mock`: synthetic driver, always succeeds
/// - `Cpal`: real device, errors if it can't be opened or the crate was
///   built without `cpal-backend`
/// - `Auto`: real device if possible, otherwise the mock driver
pub fn start_audio_system(config: &EngineConfig) -> AudioResult<AudioSystemResult> {
    match config.audio.backend {
        BackendKind::Mock => start_mock(config),
        BackendKind::Cpal => start_cpal(config),
        BackendKind::Auto => start_cpal(config).or_else(|e| {
            log::warn!("start_audio_system: No usable audio device ({}), falling back to mock driver", e);
            start_mock(config)
        }),
    }
}

#[cfg(feature = "cpal-backend")]
fn start_cpal(config: &EngineConfig) -> AudioResult<AudioSystemResult> {
    super::cpal_backend::start(config)
}

#[cfg(not(feature = "cpal-backend"))]
fn start_cpal(_config: &EngineConfig) -> AudioResult<AudioSystemResult> {
    Err(super::error::AudioError::BackendUnavailable("cpal".to_string()))
}

fn start_mock(config: &EngineConfig) -> AudioResult<AudioSystemResult> {
    let audio = config.audio.sanitized();
    let (mixer, engine) = create_mixer(audio.sample_rate, audio.channels, &config.mixer);
    let handle = MockAudioHandle::start(engine, audio.buffer_size)?;

    log::info!(
        "start_audio_system: Mock driver at {}Hz, {} frames",
        audio.sample_rate,
        audio.buffer_size
    );

    Ok(AudioSystemResult {
        handle: AudioHandle::Mock(handle),
        mixer,
        sample_rate: audio.sample_rate,
        buffer_size: audio.buffer_size,
        latency_ms: audio.latency_ms(),
    })
}
