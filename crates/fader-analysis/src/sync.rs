//! Auto-sync: tempo matching and mix timing between two analyzed tracks
//!
//! Track A is the one playing, track B the one coming in. Ratios are B
//! relative to A: playing B at `1 / tempo_ratio` speed matches A's tempo.

use serde::{Deserialize, Serialize};

use crate::beatgrid::next_index;
use crate::config::AnalysisConfig;
use crate::detector::BeatInfo;

/// Harmonic relations tried when matching tempos, in preference order
const HARMONICS: [f64; 3] = [1.0, 0.5, 2.0];

/// Suggested crossfade, in track A's timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixWindow {
    /// Crossfade start (a beat of A, a phrase boundary when A has them)
    pub start: f64,
    /// Crossfade end (a beat of A)
    pub end: f64,
    /// Whole beats between `start` and `end`
    pub beats: usize,
    /// Position in track B that should sound at `start`
    pub b_entry: f64,
}

/// How to bring track B in over track A
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAdvice {
    /// B's tempo over A's after harmonic correction
    pub tempo_ratio: f64,
    /// Harmonic B was matched at: 1, 0.5 (B detected at half tempo) or 2
    pub harmonic: f64,
    /// Shift from A's grid to B's at the mix window start, in [0, shorter beat period)
    pub phase_offset_seconds: f64,
    /// `12 * log2(tempo_ratio)`
    pub pitch_adjustment_semitones: f64,
    /// Whether the tempo change is small enough to sync
    pub sync_possible: bool,
    /// Crossfade suggestion from the start of A
    pub mix_window: Option<MixWindow>,
}

impl SyncAdvice {
    /// Advice for a pair without usable tempos
    pub fn unsyncable() -> Self {
        Self {
            tempo_ratio: 1.0,
            harmonic: 1.0,
            phase_offset_seconds: 0.0,
            pitch_adjustment_semitones: 0.0,
            sync_possible: false,
            mix_window: None,
        }
    }
}

/// Tempo/phase matcher
#[derive(Debug, Clone)]
pub struct AutoSync {
    harmonic_tolerance: f64,
    sync_tolerance: f64,
    crossfade_beats: usize,
}

impl Default for AutoSync {
    fn default() -> Self {
        Self::new(&AnalysisConfig::default())
    }
}

impl AutoSync {
    pub fn new(config: &AnalysisConfig) -> Self {
        let config = config.sanitized();
        Self {
            harmonic_tolerance: config.harmonic_tolerance,
            sync_tolerance: config.sync_tolerance,
            crossfade_beats: config.crossfade_beats,
        }
    }

    /// `(tempo_ratio, harmonic)` for B against A
    ///
    /// The raw ratio `bpm_b / bpm_a` is divided by whichever of 1, 0.5, 2 it
    /// lies closest to, if it is within the harmonic tolerance of it; this
    /// absorbs half/double-tempo detections. `None` for non-positive tempos.
    pub fn tempo_ratio(&self, bpm_a: f64, bpm_b: f64) -> Option<(f64, f64)> {
        if !(bpm_a > 0.0 && bpm_b > 0.0 && bpm_a.is_finite() && bpm_b.is_finite()) {
            return None;
        }
        let raw = bpm_b / bpm_a;

        let (deviation, harmonic) = HARMONICS
            .iter()
            .map(|&h| ((raw / h - 1.0).abs(), h))
            .fold((f64::INFINITY, 1.0), |best, cand| if cand.0 < best.0 { cand } else { best });

        if deviation <= self.harmonic_tolerance {
            Some((raw / harmonic, harmonic))
        } else {
            Some((raw, 1.0))
        }
    }

    /// Shift from A's grid to B's near the start of both tracks
    pub fn phase_offset(&self, a: &BeatInfo, b: &BeatInfo) -> f64 {
        self.phase_offset_at(a, b, 0.0)
    }

    /// Shift from A's grid to B's at `position`, modulo the shorter beat period
    ///
    /// Takes A's next beat at or after `position` (its last beat past the
    /// end) and the B beat closest to it, so the result stays correct around
    /// the mix point when the tempos differ. 0 when either track has no grid.
    pub fn phase_offset_at(&self, a: &BeatInfo, b: &BeatInfo, position: f64) -> f64 {
        let (Some(period_a), Some(period_b)) = (a.period(), b.period()) else {
            return 0.0;
        };
        let a_beat = match next_index(&a.beats, position) {
            Some(index) => a.beats[index],
            None => match a.beats.last() {
                Some(&last) => last,
                None => return 0.0,
            },
        };
        let Some(b_beat) = nearest(&b.beats, a_beat) else {
            return 0.0;
        };

        let period = period_a.min(period_b);
        let offset = (b_beat - a_beat).rem_euclid(period);
        // rem_euclid can round up to the modulus itself
        if offset >= period {
            0.0
        } else {
            offset
        }
    }

    /// Full sync advice for mixing B into A
    pub fn sync(&self, a: &BeatInfo, b: &BeatInfo) -> SyncAdvice {
        let Some((tempo_ratio, harmonic)) = self.tempo_ratio(a.bpm, b.bpm) else {
            log::debug!("sync: Missing tempo (a={:.2}, b={:.2})", a.bpm, b.bpm);
            return SyncAdvice::unsyncable();
        };

        let mix_window = self.suggest_mix_timing(a, b, 0.0);
        let mix_start = mix_window.map_or(0.0, |w| w.start);

        let advice = SyncAdvice {
            tempo_ratio,
            harmonic,
            phase_offset_seconds: self.phase_offset_at(a, b, mix_start),
            pitch_adjustment_semitones: 12.0 * tempo_ratio.log2(),
            sync_possible: (tempo_ratio - 1.0).abs() <= self.sync_tolerance,
            mix_window,
        };

        log::debug!(
            "sync: {:.2} -> {:.2} BPM, ratio {:.4} (x{}), {:+.2} semitones, possible={}",
            a.bpm,
            b.bpm,
            advice.tempo_ratio,
            advice.harmonic,
            advice.pitch_adjustment_semitones,
            advice.sync_possible
        );

        advice
    }

    /// Next crossfade window in A at or after `current_position`
    ///
    /// Starts on A's next phrase boundary (next beat if A has no downbeats)
    /// and runs `crossfade_beats` whole beats, fewer if A ends sooner. B
    /// enters on its first phrase boundary. `None` if A has no grid left
    /// after `current_position`.
    pub fn suggest_mix_timing(&self, a: &BeatInfo, b: &BeatInfo, current_position: f64) -> Option<MixWindow> {
        let boundaries = if a.downbeats.is_empty() { &a.beats } else { &a.downbeats };
        let start = boundaries[next_index(boundaries, current_position)?];
        let start_beat = next_index(&a.beats, start)?;

        let beats = self.crossfade_beats.min(a.beats.len() - 1 - start_beat);
        if beats == 0 {
            return None;
        }

        let b_entry = b
            .downbeats
            .first()
            .or(b.beats.first())
            .copied()
            .unwrap_or(0.0);

        Some(MixWindow {
            start,
            end: a.beats[start_beat + beats],
            beats,
            b_entry,
        })
    }
}

/// Entry of `times` closest to `target`, earlier one on a tie
fn nearest(times: &[f64], target: f64) -> Option<f64> {
    let index = times.partition_point(|&t| t < target);
    let after = times.get(index).copied();
    let before = index.checked_sub(1).map(|i| times[i]);
    match (before, after) {
        (Some(b), Some(a)) => Some(if target - b <= a - target { b } else { a }),
        (b, a) => b.or(a),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beatgrid::BeatGrid;

    fn beat_info(bpm: f64, first_beat: f64, duration: f64) -> BeatInfo {
        let grid = BeatGrid::build(first_beat, 60.0 / bpm, duration, 4);
        BeatInfo {
            bpm,
            beats: grid.beats,
            downbeats: grid.downbeats,
            onsets: Vec::new(),
            confidence: 1.0,
            duration,
            complete: true,
        }
    }

    #[test]
    fn test_120_vs_128() {
        let sync = AutoSync::default();
        let a = beat_info(120.0, 0.0, 60.0);
        let b = beat_info(128.0, 0.1, 60.0);

        let advice = sync.sync(&a, &b);

        assert!((advice.tempo_ratio - 128.0 / 120.0).abs() < 1e-9);
        assert_eq!(advice.harmonic, 1.0);
        assert!(advice.sync_possible);
        assert!((advice.pitch_adjustment_semitones - 12.0 * (128.0f64 / 120.0).log2()).abs() < 1e-9);

        let shorter = 60.0 / 128.0;
        assert!(advice.phase_offset_seconds >= 0.0 && advice.phase_offset_seconds < shorter);
        assert!((advice.phase_offset_seconds - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_phase_offset_wraps_negative_shift() {
        let sync = AutoSync::default();
        let a = beat_info(120.0, 0.45, 30.0);
        let b = beat_info(120.0, 0.4, 30.0);
        assert!((sync.phase_offset(&a, &b) - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_phase_offset_follows_drifting_grids() {
        let sync = AutoSync::default();
        let a = beat_info(120.0, 0.0, 60.0);
        let b = beat_info(128.0, 0.1, 60.0);

        assert!((sync.phase_offset_at(&a, &b, 0.0) - 0.1).abs() < 1e-9);
        // A beat at 10.0, closest B beat 9.94375
        let offset = sync.phase_offset_at(&a, &b, 10.0);
        assert!((offset - 0.4125).abs() < 1e-9);
        assert!(offset < 60.0 / 128.0);
    }

    #[test]
    fn test_phase_offset_is_constant_for_equal_tempos() {
        let sync = AutoSync::default();
        let a = beat_info(120.0, 0.1, 60.0);
        let b = beat_info(120.0, 0.35, 60.0);
        for position in [0.0, 7.3, 31.0, 80.0] {
            assert!((sync.phase_offset_at(&a, &b, position) - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn test_nearest() {
        assert_eq!(nearest(&[1.0, 2.0, 3.0], 2.4), Some(2.0));
        assert_eq!(nearest(&[1.0, 2.0, 3.0], 2.6), Some(3.0));
        assert_eq!(nearest(&[1.0, 2.0], 1.5), Some(1.0));
        assert_eq!(nearest(&[1.0], 9.0), Some(1.0));
        assert_eq!(nearest(&[], 1.0), None);
    }

    #[test]
    fn test_half_and_double_tempo_snap() {
        let sync = AutoSync::default();

        let (ratio, harmonic) = sync.tempo_ratio(120.0, 240.0).unwrap();
        assert!((ratio - 1.0).abs() < 1e-9);
        assert_eq!(harmonic, 2.0);

        let (ratio, harmonic) = sync.tempo_ratio(120.0, 62.0).unwrap();
        assert!((ratio - 62.0 / 60.0).abs() < 1e-9);
        assert_eq!(harmonic, 0.5);
    }

    #[test]
    fn test_far_tempo_not_syncable() {
        let sync = AutoSync::default();
        let advice = sync.sync(&beat_info(120.0, 0.0, 30.0), &beat_info(175.0, 0.0, 30.0));
        assert_eq!(advice.harmonic, 1.0);
        assert!((advice.tempo_ratio - 175.0 / 120.0).abs() < 1e-9);
        assert!(!advice.sync_possible);
    }

    #[test]
    fn test_degenerate_pair() {
        let sync = AutoSync::default();
        let advice = sync.sync(&beat_info(120.0, 0.0, 30.0), &BeatInfo::empty(30.0));
        assert_eq!(advice, SyncAdvice::unsyncable());
        assert_eq!(sync.phase_offset(&BeatInfo::empty(1.0), &BeatInfo::empty(1.0)), 0.0);
    }

    #[test]
    fn test_mix_window_on_phrase_boundary() {
        let sync = AutoSync::default();
        let a = beat_info(120.0, 0.0, 60.0);
        let b = beat_info(128.0, 0.1, 60.0);

        let window = sync.suggest_mix_timing(&a, &b, 3.1).unwrap();

        assert_eq!(window.start, 4.0);
        assert_eq!(window.beats, 16);
        assert_eq!(window.end, 12.0);
        assert!((window.b_entry - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_mix_window_near_end() {
        let sync = AutoSync::default();
        let a = beat_info(120.0, 0.0, 60.0);
        let b = beat_info(120.0, 0.0, 60.0);

        let window = sync.suggest_mix_timing(&a, &b, 57.0).unwrap();
        assert_eq!((window.start, window.end, window.beats), (58.0, 59.5, 3));

        assert!(sync.suggest_mix_timing(&a, &b, 58.5).is_none());
    }

    #[test]
    fn test_mix_window_falls_back_to_beats() {
        let sync = AutoSync::default();
        let mut a = beat_info(120.0, 0.0, 60.0);
        a.downbeats.clear();

        let window = sync.suggest_mix_timing(&a, &BeatInfo::empty(10.0), 3.1).unwrap();
        assert_eq!(window.start, 3.5);
        assert_eq!(window.b_entry, 0.0);
    }
}
