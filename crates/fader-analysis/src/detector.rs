//! Beat detector
//!
//! ```text
//! PCM ──► mono ──► hop energy ──► adaptive threshold ──► onsets
//!                                                          │
//!                 BeatInfo ◄── grid from strongest ◄── interval histogram
//! ```
//!
//! Runs off the audio thread. Degenerate input (empty, silent, a steady
//! tone) gives a zero-confidence result, never an error.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::beatgrid::BeatGrid;
use crate::config::AnalysisConfig;
use crate::envelope::{adaptive_threshold, hop_energy, mono_mixdown, pick_peaks};
use crate::tempo::estimate_tempo;

/// Hops of envelope computed between time-budget checks
const HOPS_PER_BLOCK: usize = 1000;

/// Result of beat detection for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeatInfo {
    /// Estimated tempo; 0 when no tempo could be found
    pub bpm: f64,
    /// Quantized beat grid in seconds, strictly increasing, within the track
    pub beats: Vec<f64>,
    /// Phrase boundaries (subset of `beats`)
    pub downbeats: Vec<f64>,
    /// Raw onset times the tempo was estimated from
    pub onsets: Vec<f64>,
    /// How well the onsets agree with the grid, in [0, 1]
    pub confidence: f64,
    /// Track length in seconds
    pub duration: f64,
    /// False when the time budget cut analysis short
    pub complete: bool,
}

impl BeatInfo {
    /// Zero-confidence result with no tempo
    pub fn empty(duration: f64) -> Self {
        Self {
            bpm: 0.0,
            beats: Vec::new(),
            downbeats: Vec::new(),
            onsets: Vec::new(),
            confidence: 0.0,
            duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
            complete: true,
        }
    }

    /// Beat period in seconds, `None` without a tempo
    pub fn period(&self) -> Option<f64> {
        (self.bpm > 0.0 && self.bpm.is_finite()).then(|| 60.0 / self.bpm)
    }

    pub fn first_beat(&self) -> Option<f64> {
        self.beats.first().copied()
    }

    /// Whether there is a usable tempo and grid
    pub fn has_tempo(&self) -> bool {
        self.period().is_some() && !self.beats.is_empty()
    }
}

/// Offline beat detector for one sample rate
#[derive(Debug, Clone)]
pub struct BeatDetector {
    config: AnalysisConfig,
    sample_rate: u32,
}

impl BeatDetector {
    pub fn new(config: AnalysisConfig, sample_rate: u32) -> Self {
        Self {
            config: config.sanitized(),
            sample_rate: sample_rate.max(1),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Detect beats in interleaved 16-bit PCM
    ///
    /// `duration_secs` bounds the grid; a non-positive or non-finite value
    /// is replaced by the length of `samples`.
    pub fn detect_beats(&self, samples: &[i16], channels: u16, duration_secs: f64) -> BeatInfo {
        let mono = mono_mixdown(samples, channels);
        self.detect_mono(&mono, duration_secs)
    }

    /// Detect beats in a mono float signal
    pub fn detect_mono(&self, mono: &[f32], duration_secs: f64) -> BeatInfo {
        let started = Instant::now();
        let budget = Duration::from_millis(self.config.time_budget_ms);
        let sample_rate = self.sample_rate as f64;

        let duration = if duration_secs.is_finite() && duration_secs > 0.0 {
            duration_secs
        } else {
            mono.len() as f64 / sample_rate
        };
        if mono.is_empty() {
            return BeatInfo::empty(duration);
        }

        let hop = self.config.hop_samples(self.sample_rate);
        let hop_secs = hop as f64 / sample_rate;

        // Envelope in blocks so an overrun stops early with what it has
        let mut envelope = Vec::with_capacity(mono.len() / hop + 1);
        let mut analyzed = 0usize;
        for block in mono.chunks(hop * HOPS_PER_BLOCK) {
            envelope.extend(hop_energy(block, hop));
            analyzed += block.len();
            if analyzed < mono.len() && started.elapsed() >= budget {
                log::warn!(
                    "detect_beats: Time budget of {:?} exceeded after {:.1}s of {:.1}s, returning best effort",
                    budget,
                    analyzed as f64 / sample_rate,
                    mono.len() as f64 / sample_rate
                );
                break;
            }
        }
        let coverage = analyzed as f64 / mono.len() as f64;

        let window = ((self.config.threshold_window_secs / hop_secs).round() as usize).max(3);
        let threshold = adaptive_threshold(&envelope, window, self.config.threshold_k);
        let (min_period, max_period) = self.config.period_range();
        // Half the shortest period: off-beats still get through and fold onto the beat
        let min_gap = ((0.5 * min_period / hop_secs).floor() as usize).max(1);
        let peaks = pick_peaks(&envelope, &threshold, min_gap);

        let onsets: Vec<f64> = peaks
            .iter()
            .map(|p| p.hop as f64 * hop_secs)
            .filter(|&t| t < duration)
            .collect();

        let Some(tempo) = estimate_tempo(
            &onsets,
            hop_secs,
            min_period,
            max_period,
            self.config.consistency_tolerance,
        ) else {
            log::debug!("detect_beats: No tempo found ({} onsets)", onsets.len());
            return BeatInfo {
                onsets,
                complete: coverage >= 1.0,
                ..BeatInfo::empty(duration)
            };
        };

        let anchor = peaks
            .iter()
            .max_by(|a, b| a.strength.total_cmp(&b.strength))
            .map(|p| p.hop as f64 * hop_secs)
            .unwrap_or(0.0);
        let grid = BeatGrid::build(anchor, tempo.period, duration, self.config.beats_per_phrase);

        let confidence = (tempo.confidence * coverage).clamp(0.0, 1.0);

        log::debug!(
            "detect_beats: {:.2} BPM, confidence {:.2}, {} onsets, {} beats in {:?}",
            tempo.bpm(),
            confidence,
            onsets.len(),
            grid.beats.len(),
            started.elapsed()
        );

        BeatInfo {
            bpm: tempo.bpm(),
            beats: grid.beats,
            downbeats: grid.downbeats,
            onsets,
            confidence,
            duration,
            complete: coverage >= 1.0,
        }
    }

    /// Analyze many tracks in parallel on a dedicated pool
    ///
    /// Each entry is `(track_id, interleaved samples)`; durations come from
    /// the sample counts. Results keep the input order.
    pub fn detect_batch(&self, tracks: &[(String, Vec<i16>)], channels: u16) -> Vec<(String, BeatInfo)> {
        let frames_per_sec = self.sample_rate as f64 * channels.max(1) as f64;
        let analyze = |(id, samples): &(String, Vec<i16>)| {
            let duration = samples.len() as f64 / frames_per_sec;
            (id.clone(), self.detect_beats(samples, channels, duration))
        };

        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
            .min(tracks.len())
            .max(1);

        log::info!("detect_batch: Analyzing {} tracks on {} threads", tracks.len(), threads);

        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("beat-analysis-{}", i))
            .build()
        {
            Ok(pool) => pool.install(|| tracks.par_iter().map(analyze).collect()),
            Err(e) => {
                log::warn!("detect_batch: Failed to build thread pool ({}), analyzing sequentially", e);
                tracks.iter().map(analyze).collect()
            }
        }
    }
}
