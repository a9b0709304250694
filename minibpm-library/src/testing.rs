//! Fixtures shared by the library tests

use std::fs;
use std::path::Path;

/// Unit impulses at `bpm`, followed by half a second of silence
pub(crate) fn click_track(sample_rate: u32, bpm: f64, beats: usize) -> Vec<f32> {
    let period = sample_rate as f64 * 60.0 / bpm;
    let len = (period * beats as f64) as usize + sample_rate as usize / 2;
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

/// Write interleaved samples as a 16-bit PCM WAV file
pub(crate) fn write_wav(path: &Path, interleaved: &[f32], sample_rate: u32, channels: u16) {
    let data_len = (interleaved.len() * 2) as u32;
    let block_align = channels * 2;
    let byte_rate = sample_rate * block_align as u32;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&channels.to_le_bytes());
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&block_align.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for &sample in interleaved {
        let quantized = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        bytes.extend_from_slice(&quantized.to_le_bytes());
    }

    fs::write(path, bytes).unwrap();
}
