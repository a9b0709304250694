//! Analysis settings and their persistence
//!
//! Stores the preferred tempo range, beats per bar and scan parallelism in a
//! simple `key=value` file under the user's config directory.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::warn;

use minibpm_analysis::{
    validate_tempo_range, ConfigError, TempoEstimator, DEFAULT_BEATS_PER_BAR, DEFAULT_MAX_BPM,
    DEFAULT_MIN_BPM,
};

/// Estimator settings applied to every analysed track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoSettings {
    pub min_bpm: f64,
    pub max_bpm: f64,
    pub beats_per_bar: u32,
    /// Stop analysing after this many seconds of audio (whole track if `None`)
    pub max_duration_secs: Option<f64>,
}

impl Default for TempoSettings {
    fn default() -> Self {
        Self {
            min_bpm: DEFAULT_MIN_BPM,
            max_bpm: DEFAULT_MAX_BPM,
            beats_per_bar: DEFAULT_BEATS_PER_BAR,
            max_duration_secs: None,
        }
    }
}

impl TempoSettings {
    /// Check the settings without building an estimator
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_tempo_range(self.min_bpm, self.max_bpm)?;
        if self.beats_per_bar == 0 {
            return Err(ConfigError::InvalidBeatsPerBar(self.beats_per_bar));
        }
        Ok(())
    }

    /// Build an estimator for `sample_rate` configured with these settings
    pub fn build_estimator(&self, sample_rate: f32) -> Result<TempoEstimator, ConfigError> {
        let mut estimator = TempoEstimator::new(sample_rate)?;
        estimator.set_tempo_range(self.min_bpm, self.max_bpm)?;
        estimator.set_beats_per_bar(self.beats_per_bar)?;
        Ok(estimator)
    }
}

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub tempo: TempoSettings,
    /// Maximum number of tracks analysed in parallel
    pub max_threads: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tempo: TempoSettings::default(),
            max_threads: 4,
        }
    }
}

impl Config {
    /// Load config from the default location
    ///
    /// Returns default config if file doesn't exist or can't be read.
    pub fn load() -> Self {
        let path = Self::config_path();
        Self::load_from(&path).unwrap_or_default()
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> io::Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.serialize())
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("minibpm")
            .join("config.txt")
    }

    /// Parse config from simple key=value format
    ///
    /// Unknown keys and unparsable values are ignored. A tempo range that
    /// fails validation falls back to the default range.
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();

            match key.trim() {
                "min_bpm" => {
                    if let Ok(v) = value.parse() {
                        config.tempo.min_bpm = v;
                    }
                }
                "max_bpm" => {
                    if let Ok(v) = value.parse() {
                        config.tempo.max_bpm = v;
                    }
                }
                "beats_per_bar" => {
                    if let Ok(v) = value.parse::<u32>() {
                        if v >= 1 {
                            config.tempo.beats_per_bar = v;
                        }
                    }
                }
                "max_duration_secs" => {
                    config.tempo.max_duration_secs =
                        value.parse::<f64>().ok().filter(|secs| *secs > 0.0);
                }
                "max_threads" => {
                    if let Ok(v) = value.parse::<usize>() {
                        config.max_threads = v.max(1);
                    }
                }
                _ => {} // Ignore unknown keys
            }
        }

        if validate_tempo_range(config.tempo.min_bpm, config.tempo.max_bpm).is_err() {
            warn!(
                min = config.tempo.min_bpm,
                max = config.tempo.max_bpm,
                "Ignoring invalid tempo range in config"
            );
            config.tempo.min_bpm = DEFAULT_MIN_BPM;
            config.tempo.max_bpm = DEFAULT_MAX_BPM;
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let mut lines = vec![
            "# MiniBPM Configuration".to_string(),
            format!("min_bpm={}", self.tempo.min_bpm),
            format!("max_bpm={}", self.tempo.max_bpm),
            format!("beats_per_bar={}", self.tempo.beats_per_bar),
            format!("max_threads={}", self.max_threads),
        ];

        if let Some(secs) = self.tempo.max_duration_secs {
            lines.push(format!("max_duration_secs={}", secs));
        }

        lines.join("\n")
    }
}
