//! # Error Handling
//!
//! The request path has exactly four ways to fail, one per pipeline stage.
//! Each variant carries a human-readable message that is returned verbatim to
//! the client as `{"error": message}`.
//!
//! ## HTTP Status Code Mapping:
//! - MissingField → 400 (the client sent an incomplete request)
//! - FetchFailed / TranscodeFailed / InferenceFailed → 500
//!
//! Every error response carries `Access-Control-Allow-Origin: *` so browsers
//! can read the message.

use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

/// Failure kinds of the transcription pipeline.
#[derive(Debug)]
pub enum AppError {
    /// A required request field is absent. Holds the field name.
    MissingField(&'static str),

    /// Downloading the source audio failed (transport error or non-2xx status).
    FetchFailed(String),

    /// The external transcoder rejected the input or could not be run.
    TranscodeFailed(String),

    /// The speech recognition model failed on the normalized waveform.
    InferenceFailed(String),
}

impl AppError {
    /// Short stage name, used as a structured logging field.
    pub fn stage(&self) -> &'static str {
        match self {
            AppError::MissingField(_) => "validate",
            AppError::FetchFailed(_) => "fetch",
            AppError::TranscodeFailed(_) => "transcode",
            AppError::InferenceFailed(_) => "inference",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::MissingField("language") => write!(
                f,
                "Invalid request, 'language' field is required, try en, he or fr"
            ),
            AppError::MissingField(field) => {
                write!(f, "Invalid request, '{}' field is required", field)
            }
            AppError::FetchFailed(msg) => write!(f, "Failed to fetch audio: {}", msg),
            AppError::TranscodeFailed(msg) => write!(f, "Failed to transcode audio: {}", msg),
            AppError::InferenceFailed(msg) => write!(f, "Transcription failed: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::MissingField(_) => StatusCode::BAD_REQUEST,
            AppError::FetchFailed(_)
            | AppError::TranscodeFailed(_)
            | AppError::InferenceFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
            .json(json!({ "error": self.to_string() }))
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::MissingField("wav").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::FetchFailed("404".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::TranscodeFailed("exit 1".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::InferenceFailed("bad".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_missing_field_messages_name_the_field() {
        assert!(AppError::MissingField("wav").to_string().contains("'wav'"));
        assert!(AppError::MissingField("language").to_string().contains("'language'"));
    }

    #[actix_web::test]
    async fn test_error_response_body_and_cors_header() {
        let resp = AppError::FetchFailed("upstream returned 404 Not Found".into()).error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );

        let body = to_bytes(resp.into_body()).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            value,
            json!({ "error": "Failed to fetch audio: upstream returned 404 Not Found" })
        );
    }
}
