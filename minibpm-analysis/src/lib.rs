//! Fixed-tempo BPM estimation for single-channel music audio
//!
//! Samples are cut into overlapping frames, reduced to three per-frame
//! features and accumulated across the whole clip. An estimate
//! autocorrelates the accumulated features and searches the result for the
//! most plausible beat period.

mod accumulator;
mod autocorr;
mod error;
mod estimator;
mod features;
mod framer;
mod tempo;

pub use accumulator::FeatureSequences;
pub use autocorr::{combined_autocorrelation, normalized_autocorrelation, FeatureWeights};
pub use error::{validate_sample_rate, validate_tempo_range, ConfigError};
pub use estimator::{TempoEstimator, DEFAULT_BEATS_PER_BAR, DEFAULT_MAX_BPM, DEFAULT_MIN_BPM};
pub use features::{FeatureExtractor, FeatureFrame, FrameLayout, MAX_SAMPLE_RATE};
pub use framer::FrameSegmenter;
pub use tempo::{perceptual_weight, TempoCandidate, TempoSearch};
