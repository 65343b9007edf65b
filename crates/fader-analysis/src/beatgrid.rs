//! Beat grid generation
//!
//! The grid is pure quantization: once the period is known it is stepped
//! out from the strongest onset in both directions across the whole track,
//! regardless of where other onsets fell.

/// Quantized beats and phrase boundaries of one track
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatGrid {
    /// Beat times in seconds, strictly increasing, within [0, duration)
    pub beats: Vec<f64>,
    /// Subset of `beats` that start a phrase
    pub downbeats: Vec<f64>,
}

impl BeatGrid {
    /// Step `period` out from `anchor` across `[0, duration)`
    ///
    /// The anchor beat is a downbeat; every `beats_per_phrase`-th beat from
    /// it (in both directions) is too. Empty for a non-positive period or
    /// duration.
    pub fn build(anchor: f64, period: f64, duration: f64, beats_per_phrase: usize) -> Self {
        if !(period > 0.0 && period.is_finite() && duration > 0.0 && duration.is_finite()) {
            return Self::default();
        }

        let anchor = if anchor.is_finite() { anchor.clamp(0.0, duration) } else { 0.0 };
        // Nudge so an anchor a rounding error short of a whole beat isn't pushed back one
        let anchor_index = (anchor / period + 1e-6).floor();
        let first = (anchor - anchor_index * period).max(0.0);
        let phrase = beats_per_phrase.max(1);
        let anchor_phase = anchor_index as usize % phrase;

        let mut grid = Self::default();
        let mut n = 0usize;
        loop {
            // Multiply rather than accumulate so long tracks don't drift
            let t = first + n as f64 * period;
            if t >= duration {
                break;
            }
            if grid.beats.last().map_or(true, |&last| t > last) {
                grid.beats.push(t);
                if n % phrase == anchor_phase {
                    grid.downbeats.push(t);
                }
            }
            n += 1;
        }
        grid
    }
}

/// Index of the first entry in `times` at or after `position`
///
/// A small epsilon keeps a position sitting exactly on a beat (after float
/// round trips) on that beat.
pub fn next_index(times: &[f64], position: f64) -> Option<usize> {
    const EPSILON: f64 = 1e-6;
    let index = times.partition_point(|&t| t < position - EPSILON);
    (index < times.len()).then_some(index)
}
