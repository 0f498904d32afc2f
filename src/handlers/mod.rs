//! HTTP route table.

pub mod transcribe;

use crate::health;
use actix_web::http::Method;
use actix_web::web;

pub use transcribe::{preflight, transcribe};

/// Register every route. Shared by `main` and the handler tests.
///
/// The transcription endpoint answers at the root (function-style hosting)
/// and under the versioned API prefix.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource(["/", "/api/v1/transcribe"])
            .route(web::post().to(transcribe))
            .route(web::method(Method::OPTIONS).to(preflight)),
    )
    .route("/health", web::get().to(health::health_check))
    .route("/api/v1/health", web::get().to(health::health_check));
}
