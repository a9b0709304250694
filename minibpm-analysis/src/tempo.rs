//! Tempo search over the combined autocorrelation
//!
//! # Algorithm
//!
//! 1. Restrict the search to beat lags whose tempo lies in the BPM range
//! 2. Reinforce each beat lag with the autocorrelation at its bar lag
//!    (`beats_per_bar * lag`); a strong bar periodicity corroborates the beat
//! 3. Weight each score by a smooth preference for tempi around 125 BPM
//! 4. Keep the positive local maxima and rank them, best first
//!
//! Equal scores are ordered by lag, so the faster tempo comes first.

use std::cmp::Ordering;
use std::ops::RangeInclusive;

/// Weight of the autocorrelation at the beat lag itself
const BEAT_WEIGHT: f64 = 1.0;
/// Weight of the autocorrelation at the bar lag
const BAR_WEIGHT: f64 = 0.5;

/// Centre of the perceptual tempo preference
const PREFERRED_BPM: f64 = 125.0;
/// Standard deviation of the preference curve, in octaves
const PREFERENCE_WIDTH_OCTAVES: f64 = 1.0;

/// One tempo hypothesis
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoCandidate {
    /// Tempo in beats per minute
    pub bpm: f64,
    /// Final weighted score (higher is more likely)
    pub score: f64,
    /// Beat period in feature frames
    pub lag: usize,
}

/// Searches an autocorrelation for the most plausible beat period
#[derive(Debug, Clone, PartialEq)]
pub struct TempoSearch {
    frames_per_second: f64,
    min_bpm: f64,
    max_bpm: f64,
    beats_per_bar: usize,
}

impl TempoSearch {
    /// `min_bpm < max_bpm` and `beats_per_bar >= 1` are the caller's responsibility
    pub fn new(frames_per_second: f64, min_bpm: f64, max_bpm: f64, beats_per_bar: u32) -> Self {
        Self {
            frames_per_second,
            min_bpm,
            max_bpm,
            beats_per_bar: beats_per_bar.max(1) as usize,
        }
    }

    pub fn lag_to_bpm(&self, lag: usize) -> f64 {
        60.0 * self.frames_per_second / lag as f64
    }

    /// Shortest and longest beat lag inside the BPM range
    pub fn lag_bounds(&self) -> (usize, usize) {
        let min_lag = (60.0 * self.frames_per_second / self.max_bpm)
            .ceil()
            .max(1.0) as usize;
        let max_lag = (60.0 * self.frames_per_second / self.min_bpm).floor() as usize;
        (min_lag, max_lag)
    }

    /// Beat lags searchable with `frames` accumulated frames
    ///
    /// Returns `None` when there is too little data: a lag needs at least two
    /// periods of frames behind it, and the range must hold two lags or more.
    pub fn beat_lags(&self, frames: usize) -> Option<RangeInclusive<usize>> {
        let (min_lag, max_lag) = self.lag_bounds();
        if frames < 2 * (min_lag + 1) {
            return None;
        }
        let upper = max_lag.min(frames / 2);
        if upper <= min_lag {
            return None;
        }
        Some(min_lag..=upper)
    }

    /// Largest autocorrelation lag read when searching `beat_lags`
    pub fn autocorrelation_lags(&self, beat_lags: &RangeInclusive<usize>) -> usize {
        // Bar window of the neighbour just past the last beat lag
        self.beats_per_bar * (beat_lags.end() + 2) - 1
    }

    /// Rank the tempo candidates found in `acf` over `beat_lags`, best first
    ///
    /// Bar lags beyond the end of `acf` are clamped to its last lag.
    pub fn search(&self, acf: &[f64], beat_lags: RangeInclusive<usize>) -> Vec<TempoCandidate> {
        if acf.len() <= *beat_lags.end() {
            return Vec::new();
        }

        // Score one lag either side of the range so edge lags have neighbours
        let lo = beat_lags.start().saturating_sub(1).max(1);
        let hi = (beat_lags.end() + 1).min(acf.len() - 1);
        let scores: Vec<f64> = (lo..=hi).map(|lag| self.score(acf, lag)).collect();
        let score_at = |lag: usize| scores[lag - lo];

        let mut candidates: Vec<TempoCandidate> = beat_lags
            .filter(|&lag| {
                let score = score_at(lag);
                score > 0.0
                    && (lag == lo || score > score_at(lag - 1))
                    && (lag == hi || score >= score_at(lag + 1))
            })
            .map(|lag| TempoCandidate {
                bpm: self.lag_to_bpm(lag),
                score: score_at(lag),
                lag,
            })
            .filter(|c| c.bpm >= self.min_bpm && c.bpm <= self.max_bpm)
            .collect();

        sort_candidates(&mut candidates);
        candidates
    }

    /// Beat value plus bar value, before perceptual weighting
    pub fn reinforce(&self, acf: &[f64], lag: usize) -> f64 {
        BEAT_WEIGHT * acf[lag] + BAR_WEIGHT * bar_value(acf, lag, self.beats_per_bar)
    }

    fn score(&self, acf: &[f64], lag: usize) -> f64 {
        self.reinforce(acf, lag) * perceptual_weight(self.lag_to_bpm(lag))
    }
}

/// Autocorrelation at the bar lag of `lag`
///
/// A beat period lies somewhere in `[lag, lag + 1)`, so its bar period lies in
/// `[bpb * lag, bpb * (lag + 1))`; the strongest value in that window is used.
fn bar_value(acf: &[f64], lag: usize, beats_per_bar: usize) -> f64 {
    let last = acf.len() - 1;
    let start = (lag * beats_per_bar).min(last);
    let end = (lag * beats_per_bar + beats_per_bar - 1).min(last);
    acf[start..=end]
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max)
}

/// Preference for tempi near 125 BPM, in `(0, 1]`
///
/// A Gaussian over octaves: halving or doubling the tempo costs the same.
pub fn perceptual_weight(bpm: f64) -> f64 {
    let octaves = (bpm / PREFERRED_BPM).log2() / PREFERENCE_WIDTH_OCTAVES;
    (-0.5 * octaves * octaves).exp()
}

/// Descending score; ties go to the shorter lag (higher BPM)
pub(crate) fn sort_candidates(candidates: &mut [TempoCandidate]) {
    candidates.sort_by(|a, b| match b.score.total_cmp(&a.score) {
        Ordering::Equal => a.lag.cmp(&b.lag),
        other => other,
    });
}
