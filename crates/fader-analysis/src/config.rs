//! Analysis configuration
//!
//! Loaded from `analysis.yaml` next to the engine config. Thresholds here are
//! tuning values, not correctness requirements: defaults work for club music
//! with a clear kick, sparse material may want a lower `threshold_k`.

use std::path::Path;

use serde::{Deserialize, Serialize};

use fader_core::config::{default_config_path, load_config};

/// Default file name under the fader config directory
pub const ANALYSIS_CONFIG_FILE: &str = "analysis.yaml";

/// Tempo analysis and sync settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Energy envelope hop length in milliseconds
    pub hop_ms: f64,

    /// Onset threshold: local mean + k standard deviations
    pub threshold_k: f32,

    /// Width of the sliding window the threshold statistics use (seconds)
    pub threshold_window_secs: f64,

    /// Slowest tempo considered
    pub min_bpm: f64,

    /// Fastest tempo considered
    pub max_bpm: f64,

    /// Beats per phrase; every Nth grid beat is a downbeat
    pub beats_per_phrase: usize,

    /// How far an onset interval may stray from the beat period and still
    /// count as consistent (fraction of the period)
    pub consistency_tolerance: f64,

    /// Wall-clock budget for one detection; past it the result is best effort
    pub time_budget_ms: u64,

    /// How close a tempo ratio must be to 0.5x or 2x to be treated as a
    /// half/double-tempo match (relative)
    pub harmonic_tolerance: f64,

    /// Length of a suggested crossfade in beats
    pub crossfade_beats: usize,

    /// Largest tempo change (relative) still considered syncable
    pub sync_tolerance: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            hop_ms: 10.0,
            threshold_k: 1.5,
            threshold_window_secs: 1.0,
            min_bpm: 60.0,
            max_bpm: 200.0,
            beats_per_phrase: 4,
            consistency_tolerance: 0.08,
            time_budget_ms: 5000,
            harmonic_tolerance: 0.12,
            crossfade_beats: 16,
            sync_tolerance: 0.12,
        }
    }
}

impl AnalysisConfig {
    /// Load from `path`, falling back to defaults
    pub fn load(path: &Path) -> Self {
        load_config::<Self>(path).sanitized()
    }

    /// Load from the default location (`~/.config/fader/analysis.yaml`)
    pub fn load_default() -> Self {
        Self::load(&default_config_path(ANALYSIS_CONFIG_FILE))
    }

    /// Clamp every field into a usable range
    ///
    /// Non-finite values fall back to the default for that field.
    pub fn sanitized(&self) -> Self {
        let defaults = Self::default();
        let finite_or = |v: f64, d: f64| if v.is_finite() { v } else { d };

        let min_bpm = finite_or(self.min_bpm, defaults.min_bpm).clamp(20.0, 400.0);
        let max_bpm = finite_or(self.max_bpm, defaults.max_bpm).clamp(20.0, 400.0);
        let (min_bpm, max_bpm) = if min_bpm < max_bpm {
            (min_bpm, max_bpm)
        } else {
            (defaults.min_bpm, defaults.max_bpm)
        };

        Self {
            hop_ms: finite_or(self.hop_ms, defaults.hop_ms).clamp(1.0, 50.0),
            threshold_k: if self.threshold_k.is_finite() {
                self.threshold_k.clamp(0.0, 10.0)
            } else {
                defaults.threshold_k
            },
            threshold_window_secs: finite_or(self.threshold_window_secs, defaults.threshold_window_secs)
                .clamp(0.1, 30.0),
            min_bpm,
            max_bpm,
            beats_per_phrase: self.beats_per_phrase.max(1),
            consistency_tolerance: finite_or(self.consistency_tolerance, defaults.consistency_tolerance)
                .clamp(0.01, 0.5),
            time_budget_ms: self.time_budget_ms,
            harmonic_tolerance: finite_or(self.harmonic_tolerance, defaults.harmonic_tolerance)
                .clamp(0.0, 0.3),
            crossfade_beats: self.crossfade_beats.max(1),
            sync_tolerance: finite_or(self.sync_tolerance, defaults.sync_tolerance).clamp(0.0, 1.0),
        }
    }

    /// Hop length in samples at `sample_rate`
    pub fn hop_samples(&self, sample_rate: u32) -> usize {
        ((self.hop_ms / 1000.0 * sample_rate as f64).round() as usize).max(1)
    }

    /// (shortest, longest) beat period in seconds
    pub fn period_range(&self) -> (f64, f64) {
        (60.0 / self.max_bpm, 60.0 / self.min_bpm)
    }
}
