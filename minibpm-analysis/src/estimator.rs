//! Streaming fixed-tempo estimator
//!
//! Feed audio with [`TempoEstimator::process`] in blocks of any size, then
//! call [`TempoEstimator::estimate_tempo`]; or hand a whole clip to
//! [`TempoEstimator::estimate_tempo_of_samples`]. Only the per-frame features
//! are retained between calls, so a clip never has to be held in memory.

use tracing::{debug, trace, warn};

use crate::accumulator::FeatureSequences;
use crate::autocorr::{combined_autocorrelation, FeatureWeights};
use crate::error::{validate_sample_rate, validate_tempo_range, ConfigError};
use crate::features::{FeatureExtractor, FrameLayout};
use crate::framer::FrameSegmenter;
use crate::tempo::{TempoCandidate, TempoSearch};

pub const DEFAULT_MIN_BPM: f64 = 55.0;
pub const DEFAULT_MAX_BPM: f64 = 190.0;
pub const DEFAULT_BEATS_PER_BAR: u32 = 4;

/// Fixed-tempo BPM estimator for a single channel of audio
///
/// Multi-channel audio must be averaged to mono first. One instance analyses
/// one clip at a time; call [`reset`](Self::reset) before starting another.
pub struct TempoEstimator {
    sample_rate: f32,
    layout: FrameLayout,
    min_bpm: f64,
    max_bpm: f64,
    beats_per_bar: u32,
    state: AnalysisState,
}

/// Everything that accumulates while a clip is analysed
struct AnalysisState {
    segmenter: FrameSegmenter,
    extractor: FeatureExtractor,
    features: FeatureSequences,
    candidates: Vec<TempoCandidate>,
}

impl AnalysisState {
    fn new(layout: &FrameLayout) -> Self {
        Self {
            segmenter: FrameSegmenter::new(layout.frame_len, layout.hop),
            extractor: FeatureExtractor::new(layout.clone()),
            features: FeatureSequences::new(),
            candidates: Vec::new(),
        }
    }

    fn clear(&mut self) {
        self.segmenter.reset();
        self.extractor.reset();
        self.features.clear();
        self.candidates.clear();
    }
}

impl TempoEstimator {
    /// Create an estimator for audio at `sample_rate` Hz
    ///
    /// Frame length and filterbank bins are derived from the sample rate,
    /// which is fixed for the lifetime of the estimator.
    pub fn new(sample_rate: f32) -> Result<Self, ConfigError> {
        validate_sample_rate(sample_rate)?;

        let layout = FrameLayout::for_sample_rate(sample_rate);
        debug!(
            sample_rate,
            frame_len = layout.frame_len,
            hop = layout.hop,
            high_bin = layout.high_bin,
            "Created tempo estimator"
        );

        Ok(Self {
            sample_rate,
            state: AnalysisState::new(&layout),
            layout,
            min_bpm: DEFAULT_MIN_BPM,
            max_bpm: DEFAULT_MAX_BPM,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
        })
    }

    /// Samples per analysis frame
    pub fn frame_len(&self) -> usize {
        self.layout.frame_len
    }

    /// Samples between successive frames
    pub fn hop_size(&self) -> usize {
        self.layout.hop
    }

    /// Set the range of valid tempi (default 55-190 BPM)
    pub fn set_tempo_range(&mut self, min: f64, max: f64) -> Result<(), ConfigError> {
        validate_tempo_range(min, max)?;
        self.min_bpm = min;
        self.max_bpm = max;
        Ok(())
    }

    /// Current `(min, max)` tempo range in BPM
    pub fn tempo_range(&self) -> (f64, f64) {
        (self.min_bpm, self.max_bpm)
    }

    /// Set the number of beats per bar, if known (default 4)
    ///
    /// This is only a hint for the bar-lag reinforcement; meter is never detected.
    pub fn set_beats_per_bar(&mut self, beats_per_bar: u32) -> Result<(), ConfigError> {
        if beats_per_bar == 0 {
            return Err(ConfigError::InvalidBeatsPerBar(beats_per_bar));
        }
        self.beats_per_bar = beats_per_bar;
        Ok(())
    }

    pub fn beats_per_bar(&self) -> u32 {
        self.beats_per_bar
    }

    /// Supply the next block of samples
    ///
    /// Blocks are contiguous and may be any length, including zero. The
    /// accumulated features do not depend on how the audio is split up.
    pub fn process(&mut self, samples: &[f32]) {
        let AnalysisState {
            segmenter,
            extractor,
            features,
            ..
        } = &mut self.state;

        segmenter.push(samples, |frame| features.push(extractor.extract(frame)));
    }

    /// Estimate the tempo of a whole clip in one call
    ///
    /// Equivalent to [`process`](Self::process) followed by
    /// [`estimate_tempo`](Self::estimate_tempo). Do not combine with earlier
    /// `process` calls on the same clip; call [`reset`](Self::reset) between clips.
    pub fn estimate_tempo_of_samples(&mut self, samples: &[f32]) -> f64 {
        if !self.state.features.is_empty() || self.state.segmenter.pending_len() > 0 {
            warn!(
                frames = self.state.features.len(),
                "One-shot estimate over previously accumulated audio; call reset() between clips"
            );
        }
        self.process(samples);
        self.estimate_tempo()
    }

    /// Estimate the tempo of all audio supplied so far
    ///
    /// Returns the best candidate's BPM, or 0 if too little audio has been
    /// supplied (or no periodicity was found). Replaces the candidate list.
    pub fn estimate_tempo(&mut self) -> f64 {
        self.state.candidates.clear();

        let frames = self.state.features.len();
        let search = TempoSearch::new(
            self.layout.frames_per_second(self.sample_rate),
            self.min_bpm,
            self.max_bpm,
            self.beats_per_bar,
        );

        let Some(beat_lags) = search.beat_lags(frames) else {
            debug!(frames, "Too few frames to estimate tempo");
            return 0.0;
        };

        let max_lag = search.autocorrelation_lags(&beat_lags);
        let acf = combined_autocorrelation(&self.state.features, max_lag, FeatureWeights::default());
        let candidates = search.search(&acf, beat_lags.clone());

        debug!(
            frames,
            min_lag = beat_lags.start(),
            max_lag = beat_lags.end(),
            candidates = candidates.len(),
            "Tempo search complete"
        );
        for candidate in candidates.iter().take(5) {
            trace!(
                bpm = candidate.bpm,
                score = candidate.score,
                lag = candidate.lag,
                "Tempo candidate"
            );
        }

        self.state.candidates = candidates;
        self.state.candidates.first().map_or(0.0, |best| best.bpm)
    }

    /// Candidate tempi from the last estimate, best first
    ///
    /// The first entry equals the value the estimate returned. Empty before
    /// any estimate, after [`reset`](Self::reset), or when the estimate was 0.
    pub fn tempo_candidates(&self) -> Vec<f64> {
        self.state.candidates.iter().map(|c| c.bpm).collect()
    }

    /// Candidates from the last estimate with their scores, best first
    pub fn candidates(&self) -> &[TempoCandidate] {
        &self.state.candidates
    }

    /// Features accumulated so far
    pub fn features(&self) -> &FeatureSequences {
        &self.state.features
    }

    /// Number of frames accumulated so far
    pub fn frame_count(&self) -> usize {
        self.state.features.len()
    }

    /// Prepare for a new clip, keeping the tempo range and beats per bar
    pub fn reset(&mut self) {
        self.state.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::MAX_SAMPLE_RATE;

    const SAMPLE_RATE: f32 = 44100.0;
    const TOLERANCE: f64 = 2.0;

    /// Unit impulses at exactly `bpm`, for `beats` beats plus half a second
    fn click_track(bpm: f64, beats: usize) -> Vec<f32> {
        let period = SAMPLE_RATE as f64 * 60.0 / bpm;
        let len = (period * beats as f64) as usize + SAMPLE_RATE as usize / 2;
        let mut samples = vec![0.0; len];
        let mut beat = 0;
        loop {
            let position = (beat as f64 * period).round() as usize;
            if position >= len {
                break;
            }
            samples[position] = 1.0;
            beat += 1;
        }
        samples
    }

    fn estimator() -> TempoEstimator {
        TempoEstimator::new(SAMPLE_RATE).unwrap()
    }

    #[test]
    fn test_defaults() {
        let estimator = estimator();
        assert_eq!(estimator.tempo_range(), (55.0, 190.0));
        assert_eq!(estimator.beats_per_bar(), 4);
        assert_eq!(estimator.frame_len(), 512);
        assert_eq!(estimator.hop_size(), 256);
        assert!(estimator.tempo_candidates().is_empty());
    }

    #[test]
    fn test_rejects_invalid_sample_rate() {
        for rate in [0.0, -44100.0, f32::NAN, f32::INFINITY, 1.0e30, f32::MAX] {
            assert!(
                matches!(
                    TempoEstimator::new(rate),
                    Err(ConfigError::InvalidSampleRate(_))
                ),
                "rate {}",
                rate
            );
        }
    }

    #[test]
    fn test_sample_rate_bounds() {
        assert!(TempoEstimator::new(MAX_SAMPLE_RATE).is_ok());
        assert!(TempoEstimator::new(MAX_SAMPLE_RATE * 2.0).is_err());
        assert!(TempoEstimator::new(1.0).is_ok());
    }

    #[test]
    fn test_rejects_invalid_configuration() {
        let mut estimator = estimator();

        assert_eq!(
            estimator.set_tempo_range(150.0, 100.0),
            Err(ConfigError::InvalidTempoRange {
                min: 150.0,
                max: 100.0
            })
        );
        assert!(estimator.set_tempo_range(0.0, 100.0).is_err());
        assert_eq!(
            estimator.set_beats_per_bar(0),
            Err(ConfigError::InvalidBeatsPerBar(0))
        );

        // Rejected values leave the configuration untouched
        assert_eq!(estimator.tempo_range(), (55.0, 190.0));
        assert_eq!(estimator.beats_per_bar(), 4);

        estimator.set_tempo_range(80.0, 160.0).unwrap();
        estimator.set_beats_per_bar(3).unwrap();
        assert_eq!(estimator.tempo_range(), (80.0, 160.0));
        assert_eq!(estimator.beats_per_bar(), 3);
    }

    #[test]
    fn test_click_track_120() {
        let mut estimator = estimator();
        let bpm = estimator.estimate_tempo_of_samples(&click_track(120.0, 32));

        assert!((bpm - 120.0).abs() < TOLERANCE, "estimated {}", bpm);
        let candidates = estimator.tempo_candidates();
        assert_eq!(candidates[0], bpm);
    }

    #[test]
    fn test_click_track_60_is_not_doubled() {
        let mut estimator = estimator();
        let bpm = estimator.estimate_tempo_of_samples(&click_track(60.0, 32));
        assert!((bpm - 60.0).abs() < TOLERANCE, "estimated {}", bpm);
    }

    #[test]
    fn test_click_track_90() {
        let mut estimator = estimator();
        let bpm = estimator.estimate_tempo_of_samples(&click_track(90.0, 40));
        assert!((bpm - 90.0).abs() < TOLERANCE, "estimated {}", bpm);
    }

    #[test]
    fn test_streaming_matches_one_shot() {
        let samples = click_track(120.0, 32);

        let mut one_shot = estimator();
        let expected = one_shot.estimate_tempo_of_samples(&samples);

        let mut streaming = estimator();
        for block in samples.chunks(1000) {
            streaming.process(block);
        }
        assert_eq!(streaming.estimate_tempo(), expected);
        assert_eq!(streaming.tempo_candidates(), one_shot.tempo_candidates());
    }

    #[test]
    fn test_chunk_invariance() {
        let samples: Vec<f32> = click_track(128.0, 12)
            .iter()
            .enumerate()
            .map(|(i, s)| s + 0.1 * (i as f32 * 0.013).sin())
            .collect();

        let mut whole = estimator();
        whole.process(&samples);
        let expected_features = whole.features().clone();
        let expected_bpm = whole.estimate_tempo();

        for chunk_size in [1, 7, 255, 256, 257, 512, 4096, 33333] {
            let mut chunked = estimator();
            for block in samples.chunks(chunk_size) {
                chunked.process(block);
                chunked.process(&[]);
            }
            assert_eq!(chunked.features(), &expected_features, "chunk {}", chunk_size);
            assert_eq!(chunked.estimate_tempo(), expected_bpm, "chunk {}", chunk_size);
        }
    }

    #[test]
    fn test_uneven_chunks() {
        let samples = click_track(100.0, 16);
        let mut whole = estimator();
        whole.process(&samples);

        let mut chunked = estimator();
        let mut rest = samples.as_slice();
        let mut size = 1;
        while !rest.is_empty() {
            let take = size.min(rest.len());
            chunked.process(&rest[..take]);
            rest = &rest[take..];
            size = size * 3 % 1777 + 1;
        }
        assert_eq!(chunked.features(), whole.features());
    }

    #[test]
    fn test_candidates_idempotent_read() {
        let mut estimator = estimator();
        estimator.estimate_tempo_of_samples(&click_track(120.0, 32));
        let first = estimator.tempo_candidates();
        let second = estimator.tempo_candidates();
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[test]
    fn test_best_first_ordering() {
        let mut estimator = estimator();
        let bpm = estimator.estimate_tempo_of_samples(&click_track(120.0, 32));
        assert_eq!(estimator.tempo_candidates()[0], bpm);
        for pair in estimator.candidates().windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_candidates_respect_range() {
        let mut estimator = estimator();
        estimator.set_tempo_range(100.0, 140.0).unwrap();
        estimator.estimate_tempo_of_samples(&click_track(60.0, 32));

        let candidates = estimator.tempo_candidates();
        assert!(!candidates.is_empty());
        for bpm in candidates {
            assert!((100.0..=140.0).contains(&bpm), "candidate {}", bpm);
        }
    }

    #[test]
    fn test_range_change_between_estimates() {
        let mut estimator = estimator();
        estimator.process(&click_track(120.0, 32));
        let first = estimator.estimate_tempo();
        assert!((first - 120.0).abs() < TOLERANCE);

        // Same features, narrower range: 120 is excluded and 60 remains
        estimator.set_tempo_range(55.0, 100.0).unwrap();
        let second = estimator.estimate_tempo();
        assert!((second - 60.0).abs() < TOLERANCE, "estimated {}", second);
        assert!(estimator.tempo_candidates().iter().all(|&c| c <= 100.0));
    }

    #[test]
    fn test_reset_clears_state() {
        let mut estimator = estimator();
        estimator.set_tempo_range(70.0, 180.0).unwrap();
        estimator.set_beats_per_bar(3).unwrap();
        estimator.estimate_tempo_of_samples(&click_track(120.0, 32));
        assert!(!estimator.tempo_candidates().is_empty());

        estimator.reset();
        assert!(estimator.tempo_candidates().is_empty());
        assert_eq!(estimator.frame_count(), 0);
        assert_eq!(estimator.estimate_tempo(), 0.0);

        // Configuration survives
        assert_eq!(estimator.tempo_range(), (70.0, 180.0));
        assert_eq!(estimator.beats_per_bar(), 3);
    }

    #[test]
    fn test_reset_allows_reuse() {
        let mut estimator = estimator();
        estimator.estimate_tempo_of_samples(&click_track(90.0, 40));
        estimator.reset();
        let bpm = estimator.estimate_tempo_of_samples(&click_track(120.0, 32));

        let mut fresh = TempoEstimator::new(SAMPLE_RATE).unwrap();
        assert_eq!(bpm, fresh.estimate_tempo_of_samples(&click_track(120.0, 32)));
    }

    #[test]
    fn test_less_than_one_frame_is_undetermined() {
        let mut estimator = estimator();
        let samples = vec![0.5; estimator.frame_len() - 1];
        assert_eq!(estimator.estimate_tempo_of_samples(&samples), 0.0);
        assert_eq!(estimator.frame_count(), 0);
        assert!(estimator.tempo_candidates().is_empty());
    }

    #[test]
    fn test_no_input_is_undetermined() {
        let mut estimator = estimator();
        assert_eq!(estimator.estimate_tempo(), 0.0);
        assert_eq!(estimator.estimate_tempo_of_samples(&[]), 0.0);
    }

    #[test]
    fn test_short_clip_is_undetermined() {
        let mut estimator = estimator();
        // 0.3 s is less than two periods of even the fastest tempo
        let mut samples = vec![0.0; 13_230];
        samples[0] = 1.0;
        samples[6_615] = 1.0;
        let bpm = estimator.estimate_tempo_of_samples(&samples);
        assert_eq!(bpm, 0.0);
        assert!(estimator.frame_count() > 0);
        assert!(estimator.tempo_candidates().is_empty());
    }

    #[test]
    fn test_silence_is_undetermined() {
        for len in [0, 100, 44100, 44100 * 10] {
            let mut estimator = estimator();
            assert_eq!(estimator.estimate_tempo_of_samples(&vec![0.0; len]), 0.0);
            assert!(estimator.tempo_candidates().is_empty());
        }
    }

    #[test]
    fn test_failed_estimate_clears_old_candidates() {
        let mut estimator = estimator();
        estimator.process(&click_track(120.0, 32));
        estimator.estimate_tempo();
        assert!(!estimator.tempo_candidates().is_empty());

        // No lag fits a range this narrow at this frame rate
        estimator.set_tempo_range(120.5, 120.6).unwrap();
        assert_eq!(estimator.estimate_tempo(), 0.0);
        assert!(estimator.tempo_candidates().is_empty());
    }

    #[test]
    fn test_other_sample_rate() {
        let mut estimator = TempoEstimator::new(48000.0).unwrap();
        let period = 48000.0 * 60.0 / 120.0;
        let mut samples = vec![0.0f32; 48000 * 20];
        let mut position = 0.0;
        while (position as usize) < samples.len() {
            samples[position as usize] = 1.0;
            position += period;
        }

        let bpm = estimator.estimate_tempo_of_samples(&samples);
        assert!((bpm - 120.0).abs() < TOLERANCE, "estimated {}", bpm);
    }

    #[test]
    fn test_short_clip_with_long_bar() {
        // Bar lags reach past the available autocorrelation on a 3.5 s clip
        let samples = click_track(120.0, 8);
        let samples = &samples[..(SAMPLE_RATE * 3.5) as usize];

        for beats_per_bar in [4, 8] {
            let mut estimator = estimator();
            estimator.set_beats_per_bar(beats_per_bar).unwrap();
            let bpm = estimator.estimate_tempo_of_samples(samples);
            assert!(
                (bpm - 120.0).abs() < TOLERANCE,
                "beats per bar {}: estimated {}",
                beats_per_bar,
                bpm
            );
        }
    }
}
