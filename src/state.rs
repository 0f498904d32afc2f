//! # Application State
//!
//! Everything a request handler needs, built once in `main` and handed to
//! actix as `web::Data`. Cloning an `AppState` is cheap: every field is either
//! reference counted or a small handle.
//!
//! ## What is shared:
//! - **config**: Immutable after start-up
//! - **recognizer**: The loaded speech model (read-only, never reloaded)
//! - **fetcher / transcoder**: Stateless helpers (the HTTP client pools
//!   connections internally)
//! - **metrics**: Counters updated by middleware and handlers

use crate::audio::{AudioFetcher, Transcoder};
use crate::config::AppConfig;
use crate::transcription::SpeechRecognizer;
use anyhow::Result;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub recognizer: Arc<dyn SpeechRecognizer>,
    pub fetcher: AudioFetcher,
    pub transcoder: Transcoder,
    pub metrics: Arc<RwLock<AppMetrics>>,
    pub start_time: Instant,
}

/// Counters collected across all HTTP requests.
#[derive(Debug, Default, Clone)]
pub struct AppMetrics {
    /// Total number of HTTP requests received since start
    pub request_count: u64,
    /// Responses with a 4xx or 5xx status
    pub error_count: u64,
    /// Successful transcriptions
    pub transcription_count: u64,
}

impl AppState {
    /// Assemble the state around an already-loaded recognizer.
    pub fn new(config: AppConfig, recognizer: Arc<dyn SpeechRecognizer>) -> Result<Self> {
        let fetcher = AudioFetcher::new(&config.fetch)?;
        let transcoder = Transcoder::new(&config.transcode);

        Ok(Self {
            config: Arc::new(config),
            recognizer,
            fetcher,
            transcoder,
            metrics: Arc::new(RwLock::new(AppMetrics::default())),
            start_time: Instant::now(),
        })
    }

    // A panic while holding the lock leaves plain counters intact, so a
    // poisoned lock is still usable.
    fn metrics_read(&self) -> RwLockReadGuard<'_, AppMetrics> {
        self.metrics.read().unwrap_or_else(|e| e.into_inner())
    }

    fn metrics_write(&self) -> RwLockWriteGuard<'_, AppMetrics> {
        self.metrics.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn increment_request_count(&self) {
        self.metrics_write().request_count += 1;
    }

    pub fn increment_error_count(&self) {
        self.metrics_write().error_count += 1;
    }

    pub fn increment_transcription_count(&self) {
        self.metrics_write().transcription_count += 1;
    }

    /// Copy of the current counters, so the lock isn't held while serializing.
    pub fn get_metrics_snapshot(&self) -> AppMetrics {
        self.metrics_read().clone()
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
