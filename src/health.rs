use crate::state::AppState;
use actix_web::http::header;
use actix_web::{web, HttpResponse};
use serde_json::json;

pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let metrics = state.get_metrics_snapshot();
    let config = &state.config;

    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .json(json!({
            "status": "healthy",
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "uptime_seconds": state.get_uptime_seconds(),
            "service": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION")
            },
            "model": {
                "name": state.recognizer.model_name(),
                "device": state.recognizer.device_name(),
                "status": "loaded"
            },
            "transcoder": {
                "ffmpeg_path": state.transcoder.ffmpeg_path(),
                "sample_rate": config.transcode.sample_rate,
                "channels": config.transcode.channels
            },
            "metrics": {
                "total_requests": metrics.request_count,
                "total_errors": metrics.error_count,
                "transcriptions": metrics.transcription_count,
                "error_rate": if metrics.request_count > 0 {
                    metrics.error_count as f64 / metrics.request_count as f64
                } else {
                    0.0
                }
            }
        }))
}
