use std::path::PathBuf;

use clap::{ArgAction, Parser};
use minibpm_library::TempoSettings;

#[derive(Parser, Debug)]
#[command(name = "minibpm", version, about = "Estimate the tempo of audio files")]
pub struct Cli {
    /// Audio files or directories to analyse (directories are scanned recursively)
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Lowest tempo to consider, in BPM
    #[arg(long)]
    pub min: Option<f64>,

    /// Highest tempo to consider, in BPM
    #[arg(long)]
    pub max: Option<f64>,

    /// Beats per bar used to reinforce the beat period
    #[arg(long)]
    pub beats_per_bar: Option<u32>,

    /// Also print the best N tempo candidates of each file
    #[arg(short, long, default_value_t = 0)]
    pub candidates: usize,

    /// Number of files analysed in parallel
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Only analyse the first SECONDS of each file
    #[arg(long, value_name = "SECONDS", value_parser = parse_seconds)]
    pub max_duration: Option<f64>,

    /// Store the effective settings as the new defaults
    #[arg(long)]
    pub save_config: bool,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

fn parse_seconds(s: &str) -> Result<f64, String> {
    let secs: f64 = s
        .parse()
        .map_err(|e| format!("Invalid duration: {}", e))?;
    if secs.is_finite() && secs > 0.0 {
        Ok(secs)
    } else {
        Err(format!("Duration must be positive: {}", s))
    }
}

impl Cli {
    /// Apply command-line overrides on top of the configured settings
    pub fn tempo_settings(&self, configured: TempoSettings) -> TempoSettings {
        TempoSettings {
            min_bpm: self.min.unwrap_or(configured.min_bpm),
            max_bpm: self.max.unwrap_or(configured.max_bpm),
            beats_per_bar: self.beats_per_bar.unwrap_or(configured.beats_per_bar),
            max_duration_secs: self.max_duration.or(configured.max_duration_secs),
        }
    }

    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}
