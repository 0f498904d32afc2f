//! # Configuration Management
//!
//! Loads service configuration from several layered sources:
//! - Built-in defaults (the values the service was designed around)
//! - An optional `config.toml` next to the binary
//! - Environment variables with the `APP_` prefix
//! - `HOST` / `PORT`, which hosting platforms set for us
//!
//! ## Configuration Priority (highest to lowest):
//! 1. `HOST` / `PORT`
//! 2. Environment variables (APP_SERVER__PORT, APP_FETCH__TIMEOUT_SECS, etc.)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Main application configuration that contains all settings.
///
/// Each section maps to one stage of the transcription pipeline, plus the
/// HTTP server that fronts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub fetch: FetchConfig,
    pub transcode: TranscodeConfig,
}

/// Where the HTTP server listens.
///
/// `host = "0.0.0.0"` is the default because the service normally runs in a
/// container behind the platform's router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which Whisper checkpoint to load at start-up and where to run it.
///
/// ## Fields:
/// - `repo`: Hugging Face repository holding `config.json`, `tokenizer.json`
///   and `model.safetensors` (e.g. "openai/whisper-base", "openai/whisper-small")
/// - `revision`: Git revision of the repository to pin
/// - `device`: "auto", "cpu", "cuda" or "metal"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub repo: String,
    pub revision: String,
    pub device: String,
}

/// Settings for downloading the source audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Whole-request timeout, in seconds
    pub timeout_secs: u64,
    /// Maximum number of redirects followed before giving up
    pub max_redirects: usize,
}

impl FetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Settings for the external ffmpeg transcoding step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscodeConfig {
    pub ffmpeg_path: String,
    pub sample_rate: u32,
    pub channels: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            model: ModelConfig {
                repo: "openai/whisper-base".to_string(), // Multilingual, small enough for CPU
                revision: "main".to_string(),
                device: "auto".to_string(),
            },
            fetch: FetchConfig {
                timeout_secs: 10,
                max_redirects: 10,
            },
            transcode: TranscodeConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                sample_rate: 16_000, // Whisper expects 16kHz mono
                channels: 1,
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from multiple sources in priority order.
    ///
    /// ## Environment Variable Examples:
    /// - `APP_MODEL__REPO=openai/whisper-small`: Use a bigger checkpoint
    /// - `APP_TRANSCODE__FFMPEG_PATH=/usr/local/bin/ffmpeg`: Custom ffmpeg binary
    /// - `PORT=3000`: Special case for deployment platforms
    pub fn load() -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            // Double underscore separates sections so single underscores can stay in keys
            .add_source(
                config::Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__"),
            );

        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }

        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    ///
    /// Catching these at start-up means a bad deployment fails loudly instead
    /// of turning every request into a 500.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow::anyhow!("Server port cannot be 0"));
        }

        if self.model.repo.trim().is_empty() {
            return Err(anyhow::anyhow!("Model repository cannot be empty"));
        }

        if self.model.device.parse::<crate::device::DevicePreference>().is_err() {
            return Err(anyhow::anyhow!("Unknown device preference: {}", self.model.device));
        }

        if self.fetch.timeout_secs == 0 {
            return Err(anyhow::anyhow!("Fetch timeout must be greater than 0"));
        }

        if self.transcode.sample_rate == 0 {
            return Err(anyhow::anyhow!("Transcode sample rate must be greater than 0"));
        }

        if self.transcode.channels == 0 {
            return Err(anyhow::anyhow!("Transcode channel count must be greater than 0"));
        }

        Ok(())
    }
}
