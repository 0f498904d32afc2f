//! # Transcribe Service - Main Application Entry Point
//!
//! An HTTP service that takes a URL to an audio file and a language code,
//! downloads and normalizes the audio, and returns a Whisper transcription.
//!
//! ## Application Architecture:
//! - **config**: Layered configuration (defaults, config.toml, environment)
//! - **error**: The pipeline's error taxonomy and its HTTP mapping
//! - **state**: Shared state handed to every request handler
//! - **audio**: Download, ffmpeg transcoding, WAV decoding
//! - **transcription**: The Whisper model and the recognizer seam
//! - **handlers**: HTTP routes
//! - **middleware**: Request logging and counters
//!
//! ## Start-up Order:
//! The model is loaded before the server binds, so the first request never
//! pays the load cost and a broken model configuration stops the process
//! instead of failing every request.

mod audio;
mod config;
mod device;
mod error;
mod handlers;
mod health;
mod middleware;
mod state;
mod transcription;

#[cfg(test)]
mod test_support;

use actix_web::http::header;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use config::AppConfig;
use state::AppState;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::WhisperEngine;

/// Seconds in-flight requests get to finish after SIGINT/SIGTERM.
const SHUTDOWN_TIMEOUT_SECS: u64 = 60;

#[actix_web::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    init_tracing();

    let config = AppConfig::load()?;
    config.validate()?;

    info!("Starting transcribe-service v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration loaded: {}:{}", config.server.host, config.server.port);

    let recognizer = WhisperEngine::load(&config.model).await?;
    let app_state = AppState::new(config.clone(), Arc::new(recognizer))?;
    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    info!("Starting HTTP server on {}", bind_addr);

    // actix installs SIGINT/SIGTERM handlers and drains workers on shutdown
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            // Middleware executes in reverse order for responses
            .wrap(DefaultHeaders::new().add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*")))
            .wrap(Logger::default())
            .wrap(middleware::MetricsMiddleware)
            .wrap(middleware::RequestLogging)
            .configure(handlers::configure)
    })
    .shutdown_timeout(SHUTDOWN_TIMEOUT_SECS)
    .bind(&bind_addr)?
    .run()
    .await?;

    info!("Server stopped gracefully");
    Ok(())
}

/// Console logging, filtered by `RUST_LOG`.
///
/// Defaults to "transcribe_service=debug,actix_web=info" when unset.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transcribe_service=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
