//! Audio file decoding and streaming tempo analysis

use std::path::{Path, PathBuf};

use minibpm_analysis::{ConfigError, TempoCandidate};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, StandardTagKey, Tag};
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::TempoSettings;

/// Errors that can occur while loading and analysing a track
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Audio track has no sample rate")]
    UnknownSampleRate,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid analysis settings: {0}")]
    Settings(#[from] ConfigError),
}

/// Track metadata
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub title: String,
    pub artist: String,
    pub duration_secs: f64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Tempo analysis of one audio file
#[derive(Debug, Clone)]
pub struct TrackTempo {
    pub path: PathBuf,
    /// Estimated tempo, or 0 if it could not be determined
    pub bpm: f64,
    /// All candidates, best first
    pub candidates: Vec<TempoCandidate>,
    /// Seconds of audio fed to the estimator
    pub analyzed_secs: f64,
    pub metadata: TrackMetadata,
}

impl TrackTempo {
    pub fn is_determined(&self) -> bool {
        self.bpm > 0.0
    }
}

/// Decodes audio files with Symphonia and streams them through a tempo estimator
///
/// Packets are downmixed and analysed as they are decoded, so only the
/// estimator's per-frame features are kept in memory.
#[derive(Debug, Clone, Default)]
pub struct TrackLoader {
    settings: TempoSettings,
}

impl TrackLoader {
    pub fn new(settings: TempoSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &TempoSettings {
        &self.settings
    }

    /// Decode `path` and estimate its tempo
    pub fn analyze(&self, path: &Path) -> Result<TrackTempo, LoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Create hint from file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let mut probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut metadata = TrackMetadata {
            title: path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("Unknown")
                .to_string(),
            artist: "Unknown".to_string(),
            ..Default::default()
        };

        // Tags may sit in front of the container (ID3) or inside it
        if let Some(probed_meta) = probed.metadata.get() {
            if let Some(revision) = probed_meta.current() {
                apply_tags(&mut metadata, revision.tags());
            }
        }
        let mut format = probed.format;
        if let Some(revision) = format.metadata().current() {
            apply_tags(&mut metadata, revision.tags());
        }

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(LoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let sample_rate = codec_params
            .sample_rate
            .ok_or(LoadError::UnknownSampleRate)?;

        metadata.sample_rate = sample_rate;
        metadata.channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| LoadError::Decode(e.to_string()))?;

        let mut estimator = self.settings.build_estimator(sample_rate as f32)?;
        let frame_limit = self
            .settings
            .max_duration_secs
            .map(|secs| (secs * sample_rate as f64) as usize);
        let mut frames_fed = 0usize;

        debug!(
            path = %path.display(),
            sample_rate,
            channels = metadata.channels,
            "Analyzing track"
        );

        loop {
            if frame_limit.is_some_and(|limit| frames_fed >= limit) {
                break;
            }

            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(reason)) => {
                    warn!(path = %path.display(), reason, "Skipping undecodable packet");
                    continue;
                }
                Err(e) => return Err(LoadError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            let mono = downmix(sample_buf.samples(), spec.channels.count());
            let take = frame_limit.map_or(mono.len(), |limit| (limit - frames_fed).min(mono.len()));
            estimator.process(&mono[..take]);
            frames_fed += take;
        }

        let analyzed_secs = frames_fed as f64 / sample_rate as f64;
        metadata.duration_secs = codec_params
            .n_frames
            .map(|n| n as f64 / sample_rate as f64)
            .unwrap_or(analyzed_secs);

        let bpm = estimator.estimate_tempo();
        let candidates = estimator.candidates().to_vec();
        info!(
            path = %path.display(),
            bpm,
            candidates = candidates.len(),
            analyzed_secs,
            "Analyzed track"
        );

        Ok(TrackTempo {
            path: path.to_path_buf(),
            bpm,
            candidates,
            analyzed_secs,
            metadata,
        })
    }
}

/// Average interleaved channels down to mono
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    let scale = 1.0 / channels as f32;
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() * scale)
        .collect()
}

fn apply_tags(metadata: &mut TrackMetadata, tags: &[Tag]) {
    for tag in tags {
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) => metadata.title = tag.value.to_string(),
            Some(StandardTagKey::Artist) => metadata.artist = tag.value.to_string(),
            _ => {}
        }
    }
}
