//! # Transcription Engine
//!
//! The seam between the request pipeline and speech recognition. Handlers
//! only see the [`SpeechRecognizer`] trait; [`WhisperEngine`] is the
//! production implementation backed by a candle Whisper model.
//!
//! ## Key Responsibilities:
//! - **Model ownership**: The model is loaded once and shared for the life of
//!   the process
//! - **Off-runtime inference**: Decoding is CPU/GPU bound, so it runs on the
//!   blocking thread pool instead of an actix worker
//! - **Segment joining**: Time-ordered segment texts become one transcript

use crate::audio::read_waveform;
use crate::config::ModelConfig;
use crate::device::{device_label, select_device, DevicePreference};
use crate::transcription::model::WhisperModel;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use candle_transformers::models::whisper as m;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// A timed span of transcribed text.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Start of the span, in seconds from the beginning of the audio
    pub start: f64,
    /// End of the span, in seconds
    pub end: f64,
    pub text: String,
}

/// Speech-to-text over a normalized (16kHz mono WAV) audio file.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    /// Produce time-ordered segments for the waveform at `waveform`.
    async fn transcribe(&self, waveform: &Path, language: &str) -> Result<Vec<Segment>>;

    /// Model identifier, for logs and the health endpoint.
    fn model_name(&self) -> &str;

    /// Device the model runs on.
    fn device_name(&self) -> &str;
}

/// Concatenate segment texts in time order, separated by single spaces.
///
/// Segments with no text (silent windows) are skipped so they don't leave
/// doubled spaces behind.
pub fn join_segments(segments: &[Segment]) -> String {
    segments
        .iter()
        .map(|segment| segment.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whisper-backed recognizer.
///
/// ## Thread Safety:
/// The decoder keeps a key/value cache between steps, so one inference call
/// holds the model exclusively. Concurrent requests queue on the mutex; the
/// model itself is never reloaded or replaced.
pub struct WhisperEngine {
    model: Arc<Mutex<WhisperModel>>,
    model_name: String,
    device_name: &'static str,
}

impl WhisperEngine {
    /// Select the device and load the configured checkpoint.
    pub async fn load(config: &ModelConfig) -> Result<Self> {
        let preference = config
            .device
            .parse::<DevicePreference>()
            .map_err(|e| anyhow!(e))?;
        let device = select_device(preference);
        let device_name = device_label(&device);

        let model = WhisperModel::load(&config.repo, &config.revision, device).await?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            model_name: config.repo.clone(),
            device_name,
        })
    }
}

#[async_trait]
impl SpeechRecognizer for WhisperEngine {
    async fn transcribe(&self, waveform: &Path, language: &str) -> Result<Vec<Segment>> {
        let model = Arc::clone(&self.model);
        let waveform = waveform.to_path_buf();
        let language = language.to_string();

        tokio::task::spawn_blocking(move || {
            let pcm = read_waveform(&waveform, m::SAMPLE_RATE as u32)?;
            let mut model = model
                .lock()
                .map_err(|_| anyhow!("model lock poisoned by an earlier panic"))?;
            model.transcribe(&pcm, &language)
        })
        .await?
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn device_name(&self) -> &str {
        self.device_name
    }
}
