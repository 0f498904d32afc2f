//! # Audio Transcoder
//!
//! Normalizes whatever the client pointed us at (mp3, ogg, m4a, wav at any
//! rate...) into the 16kHz mono 16-bit WAV the model expects, by running
//! ffmpeg as a child process.

use crate::config::TranscodeConfig;
use crate::error::{AppError, AppResult};
use std::ffi::OsString;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// How much of ffmpeg's stderr is kept in error messages.
const STDERR_TAIL_BYTES: usize = 512;

/// Thin wrapper around the ffmpeg executable.
#[derive(Debug, Clone)]
pub struct Transcoder {
    ffmpeg_path: String,
    sample_rate: u32,
    channels: u16,
}

impl Transcoder {
    pub fn new(config: &TranscodeConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            sample_rate: config.sample_rate,
            channels: config.channels,
        }
    }

    pub fn ffmpeg_path(&self) -> &str {
        &self.ffmpeg_path
    }

    /// Arguments passed to ffmpeg for one conversion.
    fn command_args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-nostdin", "-y", "-loglevel", "error", "-i"]
            .iter()
            .map(OsString::from)
            .collect();
        args.push(input.into());
        args.extend(
            [
                "-ar".to_string(),
                self.sample_rate.to_string(),
                "-ac".to_string(),
                self.channels.to_string(),
                "-c:a".to_string(),
                "pcm_s16le".to_string(),
                "-f".to_string(),
                "wav".to_string(),
            ]
            .into_iter()
            .map(OsString::from),
        );
        args.push(output.into());
        args
    }

    /// Convert `input` into a normalized WAV at `output`.
    ///
    /// Fails with `TranscodeFailed` when ffmpeg cannot be started or exits with
    /// a non-zero status (corrupt input, unsupported codec, ...).
    pub async fn transcode(&self, input: &Path, output: &Path) -> AppResult<()> {
        let start_time = std::time::Instant::now();

        let result = Command::new(&self.ffmpeg_path)
            .args(self.command_args(input, output))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                AppError::TranscodeFailed(format!("could not run {}: {}", self.ffmpeg_path, e))
            })?;

        if !result.status.success() {
            return Err(AppError::TranscodeFailed(format!(
                "{} exited with {}: {}",
                self.ffmpeg_path,
                result.status,
                stderr_tail(&result.stderr)
            )));
        }

        tracing::debug!(
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Audio transcoded to {}Hz/{}ch",
            self.sample_rate,
            self.channels
        );
        Ok(())
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    let mut cut = text.len().saturating_sub(STDERR_TAIL_BYTES);
    while !text.is_char_boundary(cut) {
        cut += 1;
    }
    text[cut..].to_string()
}
