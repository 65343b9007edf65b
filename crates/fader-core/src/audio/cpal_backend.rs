//! CPAL output backend
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Control Thread  │───push()───────────►│   Command Queue     │
//! │  (MixerHandle)   │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         │                                           │ pop()
//!         │ Relaxed atomics                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  TrackAtomics    │◄────────────────────│  CPAL Audio Thread  │
//! │   (lock-free)    │     sync writes     │  (owns MixEngine)   │
//! └──────────────────┘                     └─────────────────────┘
//! ```
//!
//! The stream callback owns the engine outright; there is a single output
//! stream, so nothing else ever needs to reach it.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, SampleRate, Stream, StreamConfig};

use super::backend::{AudioHandle, AudioSystemResult};
use super::error::{AudioError, AudioResult};
use crate::config::EngineConfig;
use crate::engine::{create_mixer, MixEngine};

/// Keeps the output stream alive. Drop this to stop audio.
pub struct CpalAudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl CpalAudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Buffer size in frames as requested from the device
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Open the configured (or default) output device and start streaming
pub fn start(config: &EngineConfig) -> AudioResult<AudioSystemResult> {
    let audio = config.audio.sanitized();
    let host = cpal::default_host();

    let device = match &audio.device {
        Some(name) => find_device(&host, name)?,
        None => host
            .default_output_device()
            .ok_or_else(|| AudioError::NoDefaultDevice("No default output device".to_string()))?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (sample_rate, channels, sample_format) = select_output_config(&device, audio.sample_rate)?;
    let buffer_size = audio.buffer_size;

    let stream_config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    let latency_ms = (buffer_size as f32 / sample_rate as f32) * 1000.0;
    log::info!(
        "Audio config: {} channels, {}Hz, {:?}, {} frames (~{:.1}ms latency)",
        channels,
        sample_rate,
        sample_format,
        buffer_size,
        latency_ms
    );

    let (mixer, engine) = create_mixer(sample_rate, channels, &config.mixer);
    let stream = build_output_stream(&device, &stream_config, sample_format, engine)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioSystemResult {
        handle: AudioHandle::Cpal(CpalAudioHandle {
            _stream: stream,
            sample_rate,
            buffer_size,
        }),
        mixer,
        sample_rate,
        buffer_size,
        latency_ms,
    })
}

fn find_device(host: &cpal::Host, name: &str) -> AudioResult<cpal::Device> {
    let devices = host
        .output_devices()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;

    let mut seen_any = false;
    for device in devices {
        seen_any = true;
        if device.name().map(|n| n == name).unwrap_or(false) {
            return Ok(device);
        }
    }

    if seen_any {
        Err(AudioError::DeviceNotFound(name.to_string()))
    } else {
        Err(AudioError::NoDevices)
    }
}

/// Pick (sample rate, channels, format) for the stream
///
/// Prefers a supported f32 or i16 range containing the requested rate, and
/// falls back to the device default (tracks must then be decoded at that rate).
fn select_output_config(device: &cpal::Device, requested_rate: u32) -> AudioResult<(u32, u16, SampleFormat)> {
    let ranges = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;

    let matching = ranges
        .filter(|r| matches!(r.sample_format(), SampleFormat::F32 | SampleFormat::I16))
        .filter(|r| r.min_sample_rate().0 <= requested_rate && requested_rate <= r.max_sample_rate().0)
        .max_by_key(|r| (r.sample_format() == SampleFormat::F32, r.channels() == 2));

    if let Some(range) = matching {
        return Ok((requested_rate, range.channels(), range.sample_format()));
    }

    let default = device
        .default_output_config()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?;
    log::warn!(
        "Device does not support {}Hz, using its default of {}Hz",
        requested_rate,
        default.sample_rate().0
    );
    Ok((default.sample_rate().0, default.channels(), default.sample_format()))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    sample_format: SampleFormat,
    mut engine: MixEngine,
) -> AudioResult<Stream> {
    let err_fn = |err: cpal::StreamError| log::error!("Audio stream error: {}", err);

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| engine.render_into_f32(data),
            err_fn,
            None,
        ),
        SampleFormat::I16 => device.build_output_stream(
            config,
            move |data: &mut [i16], _info: &cpal::OutputCallbackInfo| engine.render_into(data),
            err_fn,
            None,
        ),
        other => return Err(AudioError::UnsupportedFormat(format!("{:?}", other))),
    };

    stream.map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
