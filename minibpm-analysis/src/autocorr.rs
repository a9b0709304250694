//! Autocorrelation of the accumulated feature sequences
//!
//! # Algorithm
//!
//! 1. Remove each sequence's mean so the autocorrelation measures periodicity
//!    rather than overall level
//! 2. `acf[lag] = sum(x[i] * x[i + lag]) / (n - lag)` for every lag up to the
//!    requested maximum and at most `n / 2` (unbiased estimate over at least
//!    half the frames)
//! 3. Scale each autocorrelation to unit value at lag 0; sequences with no
//!    variation contribute nothing
//! 4. Sum the three normalised autocorrelations lag by lag, weighted so the
//!    low-frequency flux dominates

use crate::accumulator::FeatureSequences;

/// Variance below this fraction of the signal energy is treated as no variation
const DEGENERATE_RATIO: f64 = 1e-9;

/// Relative weight of each feature in the combined autocorrelation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureWeights {
    pub low_flux: f64,
    pub high_magnitude: f64,
    pub rms: f64,
}

impl Default for FeatureWeights {
    /// Low-band flux carries the estimate; the other two are fallbacks
    fn default() -> Self {
        Self {
            low_flux: 1.0,
            high_magnitude: 0.4,
            rms: 0.3,
        }
    }
}

/// Autocorrelation of `sequence` for lags `0..=max_lag`, normalised to 1 at lag 0
///
/// Lags are limited to `sequence.len() / 2`, so no lag is estimated from only
/// a handful of products. An empty sequence gives an empty result; a silent
/// or constant one gives all zeros.
pub fn normalized_autocorrelation(sequence: &[f32], max_lag: usize) -> Vec<f64> {
    let n = sequence.len();
    if n == 0 {
        return Vec::new();
    }
    let max_lag = max_lag.min(n / 2);

    let mean = sequence.iter().map(|&v| v as f64).sum::<f64>() / n as f64;
    let energy = sequence.iter().map(|&v| (v as f64).powi(2)).sum::<f64>() / n as f64;
    let centred: Vec<f64> = sequence.iter().map(|&v| v as f64 - mean).collect();

    let mut acf: Vec<f64> = (0..=max_lag)
        .map(|lag| {
            let sum: f64 = centred[..n - lag]
                .iter()
                .zip(&centred[lag..])
                .map(|(a, b)| a * b)
                .sum();
            sum / (n - lag) as f64
        })
        .collect();

    if energy <= 0.0 || acf[0] <= energy * DEGENERATE_RATIO {
        acf.fill(0.0);
        return acf;
    }

    let variance = acf[0];
    for value in &mut acf {
        *value /= variance;
    }
    acf
}

/// Weighted lag-by-lag sum of the three normalised feature autocorrelations
///
/// The result has one entry per lag in `0..=max_lag`, limited to half the
/// number of accumulated frames.
pub fn combined_autocorrelation(
    features: &FeatureSequences,
    max_lag: usize,
    weights: FeatureWeights,
) -> Vec<f64> {
    let low = normalized_autocorrelation(features.low_flux(), max_lag);
    let high = normalized_autocorrelation(features.high_magnitude(), max_lag);
    let rms = normalized_autocorrelation(features.rms(), max_lag);

    low.iter()
        .zip(&high)
        .zip(&rms)
        .map(|((l, h), r)| weights.low_flux * l + weights.high_magnitude * h + weights.rms * r)
        .collect()
}
