//! Tempo estimation from onset times
//!
//! Inter-onset intervals are folded by octaves into the plausible period
//! range, histogrammed at hop resolution and the densest bin (after light
//! smoothing) wins. The period is then refined to the mean of the intervals
//! that voted for it.

/// Dominant beat period and how well the onsets agree with it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    /// Beat period in seconds
    pub period: f64,
    /// Fraction of onset intervals consistent with `period`, in [0, 1]
    pub confidence: f64,
}

impl TempoEstimate {
    pub fn bpm(&self) -> f64 {
        60.0 / self.period
    }
}

/// Fold an interval by octaves into `[min_period, max_period]`
///
/// `None` if it can't be folded in (non-positive, or the range spans less
/// than an octave and the interval falls in the gap).
pub fn fold_interval(interval: f64, min_period: f64, max_period: f64) -> Option<f64> {
    if !(interval > 0.0 && interval.is_finite()) {
        return None;
    }
    let mut folded = interval;
    while folded < min_period {
        folded *= 2.0;
    }
    while folded > max_period {
        folded /= 2.0;
    }
    (folded >= min_period && folded <= max_period).then_some(folded)
}

/// Estimate the beat period from onset times (seconds, ascending)
///
/// - `resolution`: histogram bin width in seconds (the hop length)
/// - `tolerance`: consistency window as a fraction of the period
///
/// Returns `None` with fewer than two onsets or no foldable interval.
pub fn estimate_tempo(
    onsets: &[f64],
    resolution: f64,
    min_period: f64,
    max_period: f64,
    tolerance: f64,
) -> Option<TempoEstimate> {
    let intervals: Vec<f64> = onsets.windows(2).map(|w| w[1] - w[0]).collect();
    let folded: Vec<f64> = intervals
        .iter()
        .filter_map(|&i| fold_interval(i, min_period, max_period))
        .collect();
    if folded.is_empty() || !(resolution > 0.0) {
        return None;
    }

    let bins = ((max_period - min_period) / resolution).ceil() as usize + 1;
    let mut histogram = vec![0.0f64; bins];
    for &interval in &folded {
        let bin = (((interval - min_period) / resolution).round() as usize).min(bins - 1);
        histogram[bin] += 1.0;
    }

    // [0.5, 1, 0.5] smoothing so jitter split across two bins still wins
    let smoothed: Vec<f64> = (0..bins)
        .map(|i| {
            let left = if i > 0 { histogram[i - 1] } else { 0.0 };
            let right = histogram.get(i + 1).copied().unwrap_or(0.0);
            0.5 * left + histogram[i] + 0.5 * right
        })
        .collect();

    let best = smoothed
        .iter()
        .enumerate()
        .fold((0, f64::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc })
        .0;
    let center = min_period + best as f64 * resolution;

    let window = (tolerance * center).max(resolution);
    let voters: Vec<f64> = folded
        .iter()
        .copied()
        .filter(|i| (i - center).abs() <= window)
        .collect();
    let period = if voters.is_empty() {
        center
    } else {
        voters.iter().sum::<f64>() / voters.len() as f64
    };

    Some(TempoEstimate {
        period,
        confidence: consistency(&intervals, period, tolerance),
    })
}

/// Fraction of intervals within `tolerance * period` of one or two periods
///
/// One skipped beat (a quiet kick) doesn't count against the grid.
pub fn consistency(intervals: &[f64], period: f64, tolerance: f64) -> f64 {
    if intervals.is_empty() || !(period > 0.0) {
        return 0.0;
    }
    let consistent = intervals
        .iter()
        .filter(|&&interval| {
            let beats = (interval / period).round();
            (1.0..=2.0).contains(&beats) && (interval - beats * period).abs() <= tolerance * period
        })
        .count();
    consistent as f64 / intervals.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_interval() {
        assert_eq!(fold_interval(0.25, 0.3, 1.0), Some(0.5));
        assert_eq!(fold_interval(1.6, 0.3, 1.0), Some(0.8));
        assert_eq!(fold_interval(0.5, 0.3, 1.0), Some(0.5));
        assert_eq!(fold_interval(0.0, 0.3, 1.0), None);
        // Range narrower than an octave: 0.3 folds to 0.6, outside [0.45, 0.55]
        assert_eq!(fold_interval(0.3, 0.45, 0.55), None);
    }

    #[test]
    fn test_regular_onsets() {
        let onsets: Vec<f64> = (0..20).map(|i| i as f64 * 0.5).collect();
        let tempo = estimate_tempo(&onsets, 0.01, 0.3, 1.0, 0.08).unwrap();
        assert!((tempo.bpm() - 120.0).abs() < 1e-6);
        assert_eq!(tempo.confidence, 1.0);
    }

    #[test]
    fn test_offbeats_fold_to_beat_period() {
        // Eighth notes at 120 BPM: every interval is 0.25s
        let onsets: Vec<f64> = (0..40).map(|i| i as f64 * 0.25).collect();
        let tempo = estimate_tempo(&onsets, 0.01, 0.3, 1.0, 0.08).unwrap();
        assert!((tempo.bpm() - 120.0).abs() < 1e-6);
    }

    #[test]
    fn test_outliers_lower_confidence() {
        let mut onsets: Vec<f64> = (0..10).map(|i| i as f64 * 0.5).collect();
        onsets.push(4.5 + 0.37);
        onsets.push(5.5);
        let tempo = estimate_tempo(&onsets, 0.01, 0.3, 1.0, 0.08).unwrap();
        assert!((tempo.bpm() - 120.0).abs() < 0.5);
        assert!(tempo.confidence < 1.0 && tempo.confidence > 0.5);
    }

    #[test]
    fn test_degenerate_input() {
        assert!(estimate_tempo(&[], 0.01, 0.3, 1.0, 0.08).is_none());
        assert!(estimate_tempo(&[1.0], 0.01, 0.3, 1.0, 0.08).is_none());
        assert_eq!(consistency(&[], 0.5, 0.08), 0.0);
    }
}
