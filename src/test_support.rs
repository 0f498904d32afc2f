//! Shared fixtures for unit tests: a scripted recognizer, a stand-in for
//! ffmpeg, and a throwaway upstream HTTP server that serves audio (and
//! not-audio).

use crate::audio::read_waveform;
use crate::transcription::{Segment, SpeechRecognizer};
use actix_web::{http::header, web, App, HttpResponse, HttpServer};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::io::Cursor;
use std::path::Path;
use wav::{BitDepth, Header, WAV_FORMAT_PCM};

/// Recognizer that returns fixed segment texts, or a fixed error.
///
/// The waveform is still decoded, so a missing or empty WAV fails the same
/// way it does with a real model.
pub struct FakeRecognizer {
    pub texts: Vec<&'static str>,
    pub failure: Option<&'static str>,
}

impl Default for FakeRecognizer {
    fn default() -> Self {
        Self {
            texts: vec!["hello", "world"],
            failure: None,
        }
    }
}

#[async_trait]
impl SpeechRecognizer for FakeRecognizer {
    async fn transcribe(&self, waveform: &Path, _language: &str) -> Result<Vec<Segment>> {
        if let Some(message) = self.failure {
            return Err(anyhow!(message));
        }
        read_waveform(waveform, 16_000)?;

        Ok(self
            .texts
            .iter()
            .enumerate()
            .map(|(i, text)| Segment {
                start: i as f64 * 30.0,
                end: (i + 1) as f64 * 30.0,
                text: text.to_string(),
            })
            .collect())
    }

    fn model_name(&self) -> &str {
        "fake-whisper"
    }

    fn device_name(&self) -> &str {
        "cpu"
    }
}

/// One second of a 440Hz tone as a 16kHz mono 16-bit WAV file.
pub fn tone_wav_bytes() -> Vec<u8> {
    let samples: Vec<i16> = (0..16_000)
        .map(|i| {
            let t = i as f32 / 16_000.0;
            ((t * 440.0 * std::f32::consts::TAU).sin() * 8_000.0) as i16
        })
        .collect();

    let mut cursor = Cursor::new(Vec::new());
    wav::write(
        Header::new(WAV_FORMAT_PCM, 1, 16_000, 16),
        &BitDepth::Sixteen(samples),
        &mut cursor,
    )
    .expect("writing to memory cannot fail");
    cursor.into_inner()
}

/// A WAV header with no samples.
pub fn empty_wav_bytes() -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    wav::write(
        Header::new(WAV_FORMAT_PCM, 1, 16_000, 16),
        &BitDepth::Sixteen(Vec::new()),
        &mut cursor,
    )
    .expect("writing to memory cannot fail");
    cursor.into_inner()
}

#[cfg(unix)]
const PASSTHROUGH_SCRIPT: &str = r#"#!/bin/sh
while [ "$#" -gt 0 ]; do
  if [ "$1" = "-i" ]; then shift; input="$1"; fi
  output="$1"
  shift
done
exec cp "$input" "$output"
"#;

/// Write an executable that accepts ffmpeg's arguments and copies the `-i`
/// input to the output path unchanged.
///
/// Served fixtures are already 16kHz mono WAV, so the copy is what ffmpeg
/// would have produced. Returns the script path and the directory guard.
#[cfg(unix)]
pub fn passthrough_ffmpeg() -> (std::path::PathBuf, tempfile::TempDir) {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().expect("create script dir");
    let path = dir.path().join("ffmpeg");
    std::fs::write(&path, PASSTHROUGH_SCRIPT).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod script");
    (path, dir)
}

/// Start an upstream server on an ephemeral port and return its base URL.
///
/// Routes:
/// - `/tone.wav`: valid audio
/// - `/empty.wav`: a WAV with no samples
/// - `/garbage.mp3`: plain text pretending to be audio
/// - `/missing.wav`: 404
/// - `/redirect`: 302 to `/garbage.mp3`
///
/// Must be called from inside an actix runtime (e.g. an `#[actix_web::test]`).
pub fn spawn_upstream() -> String {
    let server = HttpServer::new(|| {
        App::new()
            .route(
                "/tone.wav",
                web::get().to(|| async {
                    HttpResponse::Ok().content_type("audio/wav").body(tone_wav_bytes())
                }),
            )
            .route(
                "/empty.wav",
                web::get().to(|| async {
                    HttpResponse::Ok().content_type("audio/wav").body(empty_wav_bytes())
                }),
            )
            .route(
                "/garbage.mp3",
                web::get().to(|| async {
                    HttpResponse::Ok().content_type("audio/mpeg").body("definitely not audio")
                }),
            )
            .route(
                "/missing.wav",
                web::get().to(|| async { HttpResponse::NotFound().finish() }),
            )
            .route(
                "/redirect",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .insert_header((header::LOCATION, "/garbage.mp3"))
                        .finish()
                }),
            )
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))
    .expect("bind ephemeral port");

    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());
    format!("http://{}", addr)
}
