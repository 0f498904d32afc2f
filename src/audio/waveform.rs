//! Reads the transcoder's WAV output into normalized f32 samples.

use anyhow::{anyhow, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use wav::BitDepth;

/// Load a WAV file as mono f32 samples in [-1.0, 1.0].
///
/// Multi-channel input is averaged down to mono. The sample rate must match
/// `expected_rate`, since the model has no resampler of its own. A file
/// with no samples at all is an error.
pub fn read_waveform(path: &Path, expected_rate: u32) -> Result<Vec<f32>> {
    let mut reader = BufReader::new(File::open(path)?);
    let (header, data) = wav::read(&mut reader)
        .map_err(|e| anyhow!("could not parse WAV {}: {}", path.display(), e))?;

    if header.sampling_rate != expected_rate {
        return Err(anyhow!(
            "expected {}Hz audio, got {}Hz",
            expected_rate,
            header.sampling_rate
        ));
    }

    let samples: Vec<f32> = match data {
        BitDepth::Eight(s) => s.iter().map(|&x| (x as f32 - 128.0) / 128.0).collect(),
        BitDepth::Sixteen(s) => s.iter().map(|&x| x as f32 / 32768.0).collect(),
        BitDepth::TwentyFour(s) => s.iter().map(|&x| x as f32 / 8_388_608.0).collect(),
        BitDepth::ThirtyTwoFloat(s) => s,
        BitDepth::Empty => Vec::new(),
    };

    if samples.is_empty() {
        return Err(anyhow!("transcoded audio contains no samples"));
    }

    let channels = header.channel_count.max(1) as usize;
    if channels == 1 {
        return Ok(samples);
    }

    Ok(samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect())
}
