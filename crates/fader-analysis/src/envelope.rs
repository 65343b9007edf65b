//! Energy envelope and onset picking
//!
//! The signal is reduced to mean energy per hop, then a hop counts as an
//! onset when it is a local maximum that rises above `mean + k * sigma` of
//! the envelope around it. The local statistics let quiet intros and loud
//! drops be judged against their own level.

use rayon::prelude::*;

use fader_core::sample_from_i16;

/// Hops with less mean energy than this are silence (about -80 dBFS)
const SILENCE_FLOOR: f32 = 1e-8;

/// A detected envelope peak
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Peak {
    /// Hop index into the envelope
    pub hop: usize,
    /// Envelope value at the peak
    pub strength: f32,
}

/// Average interleaved 16-bit frames down to mono in [-1, 1)
///
/// A trailing partial frame is ignored.
pub fn mono_mixdown(samples: &[i16], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    let scale = 1.0 / channels as f32;
    samples
        .par_chunks_exact(channels)
        .map(|frame| frame.iter().map(|&s| sample_from_i16(s)).sum::<f32>() * scale)
        .collect()
}

/// Mean energy of each `hop`-sized window
///
/// Non-finite samples count as silence. The last window may be short but is
/// still normalized by the full hop so it can't outweigh its neighbours.
pub fn hop_energy(mono: &[f32], hop: usize) -> Vec<f32> {
    let hop = hop.max(1);
    mono.par_chunks(hop)
        .map(|window| {
            let sum: f32 = window
                .iter()
                .map(|&s| if s.is_finite() { s * s } else { 0.0 })
                .sum();
            sum / hop as f32
        })
        .collect()
}

/// Per-hop threshold: mean + k standard deviations over a centered window
pub fn adaptive_threshold(envelope: &[f32], window: usize, k: f32) -> Vec<f32> {
    let n = envelope.len();
    let half = window.max(1) / 2;

    // Prefix sums keep this linear in the envelope length
    let mut sum = Vec::with_capacity(n + 1);
    let mut sum_sq = Vec::with_capacity(n + 1);
    sum.push(0.0f64);
    sum_sq.push(0.0f64);
    for &e in envelope {
        let e = e as f64;
        sum.push(sum[sum.len() - 1] + e);
        sum_sq.push(sum_sq[sum_sq.len() - 1] + e * e);
    }

    (0..n)
        .map(|i| {
            let lo = i.saturating_sub(half);
            let hi = (i + half + 1).min(n);
            let count = (hi - lo) as f64;
            let mean = (sum[hi] - sum[lo]) / count;
            let variance = ((sum_sq[hi] - sum_sq[lo]) / count - mean * mean).max(0.0);
            (mean + k as f64 * variance.sqrt()) as f32
        })
        .collect()
}

/// Local maxima above `threshold`, at least `min_gap` hops apart
///
/// When two candidates fall closer than `min_gap`, the stronger one wins.
pub fn pick_peaks(envelope: &[f32], threshold: &[f32], min_gap: usize) -> Vec<Peak> {
    let mut peaks: Vec<Peak> = Vec::new();

    for (i, &e) in envelope.iter().enumerate() {
        let left = if i > 0 { envelope[i - 1] } else { 0.0 };
        let right = envelope.get(i + 1).copied().unwrap_or(0.0);
        let limit = threshold.get(i).copied().unwrap_or(f32::INFINITY);

        if e <= SILENCE_FLOOR || e <= limit || e < left || e <= right {
            continue;
        }

        let candidate = Peak { hop: i, strength: e };
        match peaks.last_mut() {
            Some(last) if i - last.hop < min_gap => {
                if e > last.strength {
                    *last = candidate;
                }
            }
            _ => peaks.push(candidate),
        }
    }

    peaks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_mixdown_averages_channels() {
        let mono = mono_mixdown(&[16384, -16384, 16384, 16384, 7], 2);
        assert_eq!(mono, vec![0.0, 0.5]);
    }

    #[test]
    fn test_hop_energy_ignores_non_finite() {
        let energy = hop_energy(&[1.0, f32::NAN, 1.0, 1.0, 0.5], 2);
        assert_eq!(energy, vec![0.5, 1.0, 0.125]);
    }

    #[test]
    fn test_threshold_flat_envelope_is_mean() {
        let threshold = adaptive_threshold(&[2.0; 10], 4, 1.5);
        assert!(threshold.iter().all(|&t| (t - 2.0).abs() < 1e-6));
    }

    #[test]
    fn test_pick_peaks_finds_spikes() {
        let mut envelope = vec![0.0f32; 100];
        for i in (5..100).step_by(20) {
            envelope[i] = 1.0;
        }
        let threshold = adaptive_threshold(&envelope, 50, 1.5);
        let peaks = pick_peaks(&envelope, &threshold, 5);
        let hops: Vec<usize> = peaks.iter().map(|p| p.hop).collect();
        assert_eq!(hops, vec![5, 25, 45, 65, 85]);
    }

    #[test]
    fn test_pick_peaks_keeps_stronger_of_close_pair() {
        let mut envelope = vec![0.0f32; 20];
        envelope[5] = 0.5;
        envelope[8] = 1.0;
        let peaks = pick_peaks(&envelope, &vec![0.1; 20], 5);
        assert_eq!(peaks, vec![Peak { hop: 8, strength: 1.0 }]);
    }

    #[test]
    fn test_silence_and_steady_tone_have_no_peaks() {
        let silence = vec![0.0f32; 50];
        assert!(pick_peaks(&silence, &adaptive_threshold(&silence, 10, 1.5), 1).is_empty());

        let steady = vec![0.3f32; 50];
        assert!(pick_peaks(&steady, &adaptive_threshold(&steady, 10, 1.5), 1).is_empty());
    }
}
