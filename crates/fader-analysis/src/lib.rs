//! Fader Analysis - offline tempo analysis and auto-sync
//!
//! - [`BeatDetector`]: energy-envelope beat detection producing [`BeatInfo`]
//! - [`AutoSync`]: tempo ratio, phase offset and crossfade timing between
//!   two analyzed tracks
//! - [`BeatAnalysisService`]: runs detection on a background thread with a
//!   one-shot reply per request
//!
//! Nothing here touches the audio thread; results feed the mixer's control
//! side.

pub mod beatgrid;
pub mod config;
pub mod detector;
pub mod envelope;
pub mod service;
pub mod sync;
pub mod tempo;

pub use config::AnalysisConfig;
pub use detector::{BeatDetector, BeatInfo};
pub use service::{AnalysisCommand, AnalysisError, AnalysisResult, BeatAnalysisService, ServiceHandle};
pub use sync::{AutoSync, MixWindow, SyncAdvice};
