//! Audio backend configuration
//!
//! Stream format and backend selection for the audio I/O boundary.

use serde::{Deserialize, Serialize};

use crate::types::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};

/// Maximum frames rendered per internal block
///
/// Per-track and mix buffers are preallocated at this size. Larger host
/// requests are rendered as several blocks.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Default buffer size (frames)
/// 512 frames is a safe default that works on most systems (~11.6ms at 44.1kHz)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Smallest accepted buffer size (frames)
const MIN_BUFFER_SIZE: u32 = 16;

/// Supported sample-rate range
const SAMPLE_RATE_RANGE: (u32, u32) = (8000, 192_000);

/// Which audio output to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Try hardware first, fall back to the mock renderer
    #[default]
    Auto,
    /// Hardware output only (fails if the device can't be opened)
    Cpal,
    /// Synthetic driver: renders on a timer, output discarded
    Mock,
}

/// Configuration for the audio backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub backend: BackendKind,

    /// Output device name (None = system default)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    /// Engine sample rate; tracks must be decoded at this rate
    pub sample_rate: u32,

    /// Output channels (1 = mono downmix, 2 = stereo, more = extra channels silent)
    pub channels: u16,

    /// Frames per callback
    pub buffer_size: u32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            device: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl AudioConfig {
    /// Config for the synthetic driver (tests, headless runs)
    pub fn mock() -> Self {
        Self {
            backend: BackendKind::Mock,
            ..Default::default()
        }
    }

    /// Clamp every field into its supported range
    pub fn sanitized(&self) -> Self {
        Self {
            backend: self.backend,
            device: self.device.clone(),
            sample_rate: self
                .sample_rate
                .clamp(SAMPLE_RATE_RANGE.0, SAMPLE_RATE_RANGE.1),
            channels: self.channels.max(1),
            buffer_size: self
                .buffer_size
                .clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE as u32),
        }
    }

    /// Callback period in milliseconds
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitized_clamps() {
        let config = AudioConfig {
            sample_rate: 10,
            channels: 0,
            buffer_size: 1_000_000,
            ..Default::default()
        };
        let clean = config.sanitized();
        assert_eq!(clean.sample_rate, 8000);
        assert_eq!(clean.channels, 1);
        assert_eq!(clean.buffer_size, MAX_BUFFER_SIZE as u32);
    }

    #[test]
    fn test_latency_ms() {
        let config = AudioConfig {
            sample_rate: 48000,
            buffer_size: 480,
            ..Default::default()
        };
        assert!((config.latency_ms() - 10.0).abs() < 1e-4);
    }
}
