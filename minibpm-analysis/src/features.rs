//! Per-frame feature extraction
//!
//! Each frame is reduced to three values: the half-wave rectified spectral
//! flux of a small low-frequency filterbank, the magnitude of a single bin
//! around 9 kHz (a broadband-noise probe) and the frame's RMS level.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Upper edge of the low-frequency filterbank in Hz, about an octave above middle C
pub const LOW_BAND_MAX_HZ: f32 = 550.0;

/// Centre of the broadband-noise probe bin in Hz
pub const HIGH_BIN_HZ: f32 = 9000.0;

/// Number of transform bins the low band should span
const LOW_BAND_BINS: f32 = 6.0;

const MIN_FRAME_LEN: usize = 16;

/// Highest supported sample rate in Hz (frames of 32768 samples)
pub const MAX_SAMPLE_RATE: f32 = 1_536_000.0;

/// Frame geometry derived from the sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct FrameLayout {
    /// Samples per frame (a power of two)
    pub frame_len: usize,
    /// Samples between successive frame starts
    pub hop: usize,
    /// Transform bins making up the low-frequency filterbank (DC excluded)
    pub low_bins: RangeInclusive<usize>,
    /// Transform bin used as the high-frequency probe
    pub high_bin: usize,
}

impl FrameLayout {
    /// Size frames so the low band occupies about half a dozen transform bins
    ///
    /// `sample_rate` must be positive and at most [`MAX_SAMPLE_RATE`]; the
    /// estimator validates it first.
    pub fn for_sample_rate(sample_rate: f32) -> Self {
        let wanted = (sample_rate * LOW_BAND_BINS / LOW_BAND_MAX_HZ).ceil() as usize;
        let frame_len = wanted.max(MIN_FRAME_LEN).next_power_of_two();
        let nyquist_bin = frame_len / 2;
        let bin_hz = sample_rate / frame_len as f32;

        let low_max = ((LOW_BAND_MAX_HZ / bin_hz).floor() as usize).clamp(1, nyquist_bin);
        let high_bin = ((HIGH_BIN_HZ / bin_hz).round() as usize).clamp(1, nyquist_bin);

        Self {
            frame_len,
            hop: frame_len / 2,
            low_bins: 1..=low_max,
            high_bin,
        }
    }

    /// Feature frames produced per second of audio
    pub fn frames_per_second(&self, sample_rate: f32) -> f64 {
        sample_rate as f64 / self.hop as f64
    }

    pub fn low_band_len(&self) -> usize {
        self.low_bins.end() - self.low_bins.start() + 1
    }
}

/// The three features of one frame
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FeatureFrame {
    /// Sum of positive magnitude changes across the low-band bins
    pub low_flux: f32,
    /// Magnitude of the high-frequency probe bin
    pub high_magnitude: f32,
    /// Root-mean-square amplitude of the raw frame
    pub rms: f32,
}

/// Computes [`FeatureFrame`]s, carrying the low-band magnitudes from frame to frame
pub struct FeatureExtractor {
    layout: FrameLayout,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    fft_buffer: Vec<Complex<f32>>,
    /// Low-band magnitudes of the previous frame (zero before the first frame)
    previous_low: Vec<f32>,
}

impl FeatureExtractor {
    pub fn new(layout: FrameLayout) -> Self {
        let frame_len = layout.frame_len;
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(frame_len);

        // Pre-compute Hann window
        let window: Vec<f32> = (0..frame_len)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / frame_len as f32).cos()))
            .collect();

        let previous_low = vec![0.0; layout.low_band_len()];

        Self {
            layout,
            fft,
            window,
            fft_buffer: vec![Complex::new(0.0, 0.0); frame_len],
            previous_low,
        }
    }

    /// Extract the features of one full frame
    ///
    /// Frames shorter than the layout's frame length are zero padded.
    pub fn extract(&mut self, frame: &[f32]) -> FeatureFrame {
        let frame = &frame[..frame.len().min(self.layout.frame_len)];

        let rms = if frame.is_empty() {
            0.0
        } else {
            (frame.iter().map(|s| s * s).sum::<f32>() / self.layout.frame_len as f32).sqrt()
        };

        for (i, buf) in self.fft_buffer.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            *buf = Complex::new(sample * self.window[i], 0.0);
        }
        self.fft.process(&mut self.fft_buffer);

        // Half-wave rectified flux: only rising band energy counts
        let mut low_flux = 0.0f32;
        let low_bins = &self.fft_buffer[self.layout.low_bins.clone()];
        for (previous, bin) in self.previous_low.iter_mut().zip(low_bins) {
            let magnitude = bin.norm();
            low_flux += (magnitude - *previous).max(0.0);
            *previous = magnitude;
        }

        FeatureFrame {
            low_flux,
            high_magnitude: self.fft_buffer[self.layout.high_bin].norm(),
            rms,
        }
    }

    /// Forget the previous frame, so the next flux is measured against silence
    pub fn reset(&mut self) {
        self.previous_low.fill(0.0);
    }
}
