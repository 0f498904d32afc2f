//! # Transcription Endpoint
//!
//! `POST` with `{"wav": "<url>", "language": "<code>"}` runs the pipeline:
//!
//! 1. **Validate** both fields before touching the network
//! 2. **Fetch** the audio into a request workspace
//! 3. **Transcode** it to 16kHz mono WAV with ffmpeg
//! 4. **Transcribe** with the shared model and join the segments
//!
//! The workspace is dropped when the handler returns, deleting both files no
//! matter which stage failed.

use crate::audio::RequestWorkspace;
use crate::error::{AppError, AppResult};
use crate::state::AppState;
use crate::transcription::join_segments;
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use serde::Serialize;
use serde_json::Value;
use std::time::Instant;
use tracing::{error, info};

/// A validated transcription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscribeRequest {
    pub audio_url: String,
    pub language: String,
}

impl TranscribeRequest {
    /// Parse and validate a raw request body.
    ///
    /// A body that is not JSON, or not an object, has no `wav` field, so it is
    /// reported the same way as a missing `wav`.
    pub fn from_body(body: &[u8]) -> AppResult<Self> {
        let value: Value = serde_json::from_slice(body).unwrap_or(Value::Null);
        Self::from_value(&value)
    }

    pub fn from_value(value: &Value) -> AppResult<Self> {
        Ok(Self {
            audio_url: required_string(value, "wav")?,
            language: required_string(value, "language")?,
        })
    }
}

/// Present, a string, and not blank; anything else counts as missing.
fn required_string(value: &Value, field: &'static str) -> AppResult<String> {
    value
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(AppError::MissingField(field))
}

#[derive(Debug, Serialize)]
struct TranscribeResponse {
    transcription: String,
}

/// POST handler.
pub async fn transcribe(state: web::Data<AppState>, body: web::Bytes) -> AppResult<HttpResponse> {
    let request = TranscribeRequest::from_body(&body).inspect_err(|e| {
        info!(stage = e.stage(), "Rejected request: {}", e);
    })?;

    let start_time = Instant::now();
    let transcription = run_pipeline(&state, &request).await.inspect_err(|e| {
        error!(
            url = %request.audio_url,
            language = %request.language,
            stage = e.stage(),
            "Error processing audio: {}",
            e
        );
    })?;

    state.increment_transcription_count();
    info!(
        url = %request.audio_url,
        language = %request.language,
        chars = transcription.len(),
        duration_ms = start_time.elapsed().as_millis() as u64,
        "Transcription completed"
    );

    Ok(HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(TranscribeResponse { transcription }))
}

/// Fetch → transcode → transcribe for one validated request.
async fn run_pipeline(state: &AppState, request: &TranscribeRequest) -> AppResult<String> {
    let workspace = RequestWorkspace::new()
        .map_err(|e| AppError::FetchFailed(format!("could not create temporary file: {}", e)))?;
    tracing::debug!(workspace = %workspace.path().display(), "Created request workspace");

    info!(url = %request.audio_url, "Downloading audio");
    let source = state
        .fetcher
        .fetch(&request.audio_url, &workspace.source_path())
        .await?;

    state
        .transcoder
        .transcode(&source, &workspace.waveform_path())
        .await?;

    info!(
        model = state.recognizer.model_name(),
        language = %request.language,
        "Running Whisper transcription"
    );
    let segments = state
        .recognizer
        .transcribe(&workspace.waveform_path(), &request.language)
        .await
        .map_err(|e| AppError::InferenceFailed(format!("{:#}", e)))?;

    Ok(join_segments(&segments))
}

/// OPTIONS handler: CORS preflight, whatever the request carries.
pub async fn preflight() -> HttpResponse {
    HttpResponse::NoContent()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_METHODS, "POST"))
        .insert_header((header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"))
        .insert_header((header::ACCESS_CONTROL_MAX_AGE, "3600"))
        .finish()
}
