//! Time-ordered feature sequences accumulated across the analysed signal

use crate::features::FeatureFrame;

/// Three parallel feature sequences, one entry per frame in time order
///
/// Entries are only ever appended a whole frame at a time, so the three
/// sequences always have the same length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSequences {
    low_flux: Vec<f32>,
    high_magnitude: Vec<f32>,
    rms: Vec<f32>,
}

impl FeatureSequences {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one frame's features to all three sequences
    pub fn push(&mut self, frame: FeatureFrame) {
        self.low_flux.push(frame.low_flux);
        self.high_magnitude.push(frame.high_magnitude);
        self.rms.push(frame.rms);
    }

    /// Number of frames accumulated
    pub fn len(&self) -> usize {
        self.low_flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.low_flux.is_empty()
    }

    pub fn low_flux(&self) -> &[f32] {
        &self.low_flux
    }

    pub fn high_magnitude(&self) -> &[f32] {
        &self.high_magnitude
    }

    pub fn rms(&self) -> &[f32] {
        &self.rms
    }

    pub fn clear(&mut self) {
        self.low_flux.clear();
        self.high_magnitude.clear();
        self.rms.clear();
    }
}

impl FromIterator<FeatureFrame> for FeatureSequences {
    fn from_iter<I: IntoIterator<Item = FeatureFrame>>(iter: I) -> Self {
        let mut sequences = Self::new();
        for frame in iter {
            sequences.push(frame);
        }
        sequences
    }
}
