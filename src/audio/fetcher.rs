//! # Audio Fetcher
//!
//! Downloads the audio referenced by a request. One `reqwest::Client` is built
//! at start-up and shared by every request, so connection pools and TLS state
//! are reused.

use crate::config::FetchConfig;
use crate::error::{AppError, AppResult};
use anyhow::Result;
use reqwest::redirect::Policy;
use std::path::{Path, PathBuf};

/// Bounded-timeout HTTP downloader.
#[derive(Debug, Clone)]
pub struct AudioFetcher {
    client: reqwest::Client,
}

impl AudioFetcher {
    /// Build the shared client.
    ///
    /// The timeout covers the whole exchange (connect, headers and body), and
    /// redirects are followed up to `max_redirects` hops.
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .redirect(Policy::limited(config.max_redirects))
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Download `url` and write the body to `dest`.
    ///
    /// ## Returns:
    /// - **Ok(path)**: Where the body was stored (`dest`)
    /// - **Err(AppError::FetchFailed)**: Transport error, non-2xx status, or the
    ///   body could not be stored
    pub async fn fetch(&self, url: &str, dest: &Path) -> AppResult<PathBuf> {
        tracing::debug!(url = %url, "Requesting source audio");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::FetchFailed(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchFailed(format!(
                "{} returned HTTP {}",
                url, status
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::FetchFailed(format!("reading body from {} failed: {}", url, e)))?;

        tokio::fs::write(dest, &body)
            .await
            .map_err(|e| AppError::FetchFailed(format!("could not store downloaded audio: {}", e)))?;

        tracing::debug!(url = %url, bytes = body.len(), "Source audio downloaded");
        Ok(dest.to_path_buf())
    }
}
