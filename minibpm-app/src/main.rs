//! MiniBPM - command-line tempo estimator
//!
//! Prints one `<bpm>\t<path>` line per analysed file.

mod cli;

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use minibpm_library::{
    collect_audio_files, Config, LibraryScanner, TrackTempo, AUDIO_EXTENSIONS,
};

use cli::Cli;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    let config = Config::load();
    debug!(path = %Config::config_path().display(), ?config, "Loaded config");

    let settings = cli.tempo_settings(config.tempo);
    settings.validate().context("invalid tempo settings")?;
    let threads = cli.threads.unwrap_or(config.max_threads).max(1);

    if cli.save_config {
        let updated = Config {
            tempo: settings,
            max_threads: threads,
        };
        updated.save().with_context(|| {
            format!("failed to save config to {}", Config::config_path().display())
        })?;
        info!(path = %Config::config_path().display(), "Saved config");
    }

    let files = expand_paths(&cli.paths);
    if files.is_empty() {
        bail!("no audio files found");
    }
    info!(files = files.len(), threads, "Analyzing");

    let total = files.len();
    let scanner = LibraryScanner::new(settings);
    let result = scanner.analyze_files(files, threads, None)?;

    for track in &result.tracks {
        print_track(track, cli.candidates);
    }
    for failure in &result.failures {
        eprintln!("error: {}: {}", failure.path.display(), failure.message);
    }

    if !result.failures.is_empty() {
        bail!("{} of {} files could not be analysed", result.failed_count(), total);
    }
    Ok(())
}

fn init_logging(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Files are kept as given; directories are replaced by the audio files inside them
fn expand_paths(paths: &[PathBuf]) -> Vec<PathBuf> {
    let extensions: Vec<String> = AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect();
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            files.extend(collect_audio_files(path, &extensions, true));
        } else {
            files.push(path.clone());
        }
    }
    files
}

fn print_track(track: &TrackTempo, candidates: usize) {
    if track.is_determined() {
        println!("{:.2}\t{}", track.bpm, track.path.display());
    } else {
        println!("undetermined\t{}", track.path.display());
    }
    for candidate in track.candidates.iter().take(candidates) {
        println!("\t{:.2}\t{:.3}", candidate.bpm, candidate.score);
    }
}
