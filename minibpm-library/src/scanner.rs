//! Directory scanner with parallel tempo analysis
//!
//! Collects audio files from a directory and estimates their tempo on a pool
//! of worker threads. Every worker decodes its own tracks with its own
//! estimator; only the job queue and the result channel are shared.

use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self, Receiver, Sender};
use minibpm_analysis::ConfigError;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::TempoSettings;
use crate::loader::{TrackLoader, TrackTempo};

/// File extensions scanned by default
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "flac", "wav", "ogg", "m4a", "aac"];

/// Progress updates during directory scanning
#[derive(Debug, Clone, PartialEq)]
pub enum ScanProgress {
    /// Scanning started
    Started {
        /// Total number of files to process
        total: usize,
    },
    /// Currently analyzing a file
    Analyzing {
        /// Current file number (1-indexed)
        current: usize,
        /// Total number of files
        total: usize,
        /// Path being analyzed
        path: PathBuf,
    },
    /// Scanning completed
    Complete {
        /// Number of files that were analyzed
        analyzed: usize,
        /// Number of files that failed
        failed: usize,
    },
    /// Error analyzing a file
    Error {
        /// Path that failed
        path: PathBuf,
        /// Error message
        message: String,
    },
}

/// Configuration for the directory scanner
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Directory to scan
    pub directory: PathBuf,
    /// File extensions to include
    pub extensions: Vec<String>,
    /// Maximum number of parallel analysis threads
    pub max_threads: usize,
    /// Whether to scan subdirectories recursively
    pub recursive: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::new(),
            extensions: AUDIO_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_threads: 4,
            recursive: true,
        }
    }
}

/// Error type for scanning operations
///
/// Per-file failures are not errors; they are reported in [`ScanResult::failures`].
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Invalid analysis settings: {0}")]
    Settings(#[from] ConfigError),
    #[error("Analysis worker panicked")]
    WorkerPanicked,
}

/// A file that could not be analyzed
#[derive(Debug, Clone, PartialEq)]
pub struct ScanFailure {
    pub path: PathBuf,
    pub message: String,
}

/// Result of a directory scan
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    /// Analyzed tracks, sorted by path
    pub tracks: Vec<TrackTempo>,
    /// Files that failed to load, sorted by path
    pub failures: Vec<ScanFailure>,
}

impl ScanResult {
    pub fn analyzed_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failures.len()
    }
}

/// Directory scanner with parallel analysis
#[derive(Debug, Clone, Default)]
pub struct LibraryScanner {
    loader: TrackLoader,
}

impl LibraryScanner {
    pub fn new(settings: TempoSettings) -> Self {
        Self {
            loader: TrackLoader::new(settings),
        }
    }

    pub fn settings(&self) -> &TempoSettings {
        self.loader.settings()
    }

    /// Scan a directory synchronously (blocking)
    ///
    /// Returns the scan result and sends progress updates through the channel.
    pub fn scan(
        &self,
        config: &ScanConfig,
        progress_tx: Option<Sender<ScanProgress>>,
    ) -> Result<ScanResult, ScanError> {
        let files = collect_audio_files(&config.directory, &config.extensions, config.recursive);
        debug!(
            directory = %config.directory.display(),
            files = files.len(),
            "Collected audio files"
        );
        self.analyze_files(files, config.max_threads, progress_tx)
    }

    /// Start an asynchronous scan
    ///
    /// Returns a receiver for progress updates and a handle to the scanning thread.
    pub fn scan_async(
        &self,
        config: ScanConfig,
    ) -> (Receiver<ScanProgress>, JoinHandle<Result<ScanResult, ScanError>>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let scanner = self.clone();

        let handle = thread::spawn(move || scanner.scan(&config, Some(tx)));

        (rx, handle)
    }

    /// Analyze an explicit list of files on up to `max_threads` threads
    pub fn analyze_files(
        &self,
        files: Vec<PathBuf>,
        max_threads: usize,
        progress_tx: Option<Sender<ScanProgress>>,
    ) -> Result<ScanResult, ScanError> {
        // Fail once up front instead of once per file
        self.loader.settings().validate()?;

        let total = files.len();
        if let Some(ref tx) = progress_tx {
            let _ = tx.send(ScanProgress::Started { total });
        }

        let mut result = ScanResult::default();

        if total > 0 {
            let (job_tx, job_rx) = crossbeam_channel::unbounded();
            for job in files.into_iter().enumerate() {
                let _ = job_tx.send(job);
            }
            drop(job_tx);

            let (result_tx, result_rx) = crossbeam_channel::unbounded();
            let thread_count = max_threads.min(total).max(1);

            let handles: Vec<JoinHandle<()>> = (0..thread_count)
                .map(|_| {
                    let jobs = job_rx.clone();
                    let results = result_tx.clone();
                    let progress_tx = progress_tx.clone();
                    let loader = self.loader.clone();
                    thread::spawn(move || {
                        run_worker(&loader, jobs, results, progress_tx, total)
                    })
                })
                .collect();
            drop(result_tx);

            // Wait for all threads
            let mut panicked = false;
            for handle in handles {
                panicked |= handle.join().is_err();
            }
            if panicked {
                return Err(ScanError::WorkerPanicked);
            }

            for outcome in result_rx.try_iter() {
                match outcome {
                    Ok(track) => result.tracks.push(track),
                    Err(failure) => result.failures.push(failure),
                }
            }
            result.tracks.sort_by(|a, b| a.path.cmp(&b.path));
            result.failures.sort_by(|a, b| a.path.cmp(&b.path));
        }

        if let Some(ref tx) = progress_tx {
            let _ = tx.send(ScanProgress::Complete {
                analyzed: result.analyzed_count(),
                failed: result.failed_count(),
            });
        }

        Ok(result)
    }
}

/// Pull jobs until the queue is drained
fn run_worker(
    loader: &TrackLoader,
    jobs: Receiver<(usize, PathBuf)>,
    results: Sender<Result<TrackTempo, ScanFailure>>,
    progress_tx: Option<Sender<ScanProgress>>,
    total: usize,
) {
    for (idx, path) in jobs.iter() {
        if let Some(ref tx) = progress_tx {
            let _ = tx.send(ScanProgress::Analyzing {
                current: idx + 1,
                total,
                path: path.clone(),
            });
        }

        let outcome = loader.analyze(&path).map_err(|e| {
            warn!(path = %path.display(), error = %e, "Failed to analyze track");
            ScanFailure {
                path: path.clone(),
                message: e.to_string(),
            }
        });

        if let (Err(failure), Some(tx)) = (&outcome, &progress_tx) {
            let _ = tx.send(ScanProgress::Error {
                path: failure.path.clone(),
                message: failure.message.clone(),
            });
        }

        if results.send(outcome).is_err() {
            break;
        }
    }
}

/// Collect all audio files from a directory
///
/// Extensions match case-insensitively. Unreadable directories are skipped.
pub fn collect_audio_files(dir: &Path, extensions: &[String], recursive: bool) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
            return files;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                if extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
                    files.push(path);
                }
            }
        } else if path.is_dir() && recursive {
            files.extend(collect_audio_files(&path, extensions, recursive));
        }
    }

    // Sort by path for consistent ordering
    files.sort();
    files
}
