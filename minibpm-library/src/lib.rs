//! Track-level tempo analysis for MiniBPM - loading, settings and batch scanning

mod config;
mod loader;
mod scanner;
#[cfg(test)]
mod testing;

pub use config::{Config, TempoSettings};
pub use loader::{downmix, LoadError, TrackLoader, TrackMetadata, TrackTempo};
pub use scanner::{
    collect_audio_files, LibraryScanner, ScanConfig, ScanError, ScanFailure, ScanProgress,
    ScanResult, AUDIO_EXTENSIONS,
};
