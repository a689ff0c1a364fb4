use std::sync::Arc;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use stockwatch_detection::Detector;

use crate::app::errors;
use crate::app::services::AppServices;

/// Unscoped operational endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/system/detectors", get(detectors))
        .route("/system/read-models/rebuild", post(rebuild_read_models))
}

pub async fn health() -> StatusCode {
    StatusCode::OK
}

/// Detector versions and the detection config in effect.
pub async fn detectors(Extension(services): Extension<Arc<AppServices>>) -> Response {
    let detectors: Vec<_> = Detector::ALL
        .iter()
        .map(|d| {
            serde_json::json!({
                "anomaly_type": d.anomaly_type().as_str(),
                "version": d.version(),
            })
        })
        .collect();
    Json(serde_json::json!({
        "detectors": detectors,
        "config": services.ledger().detection_config(),
    }))
    .into_response()
}

pub async fn rebuild_read_models(Extension(services): Extension<Arc<AppServices>>) -> Result<Response, Response> {
    let replayed = services
        .ledger()
        .rebuild_read_models()
        .map_err(errors::ledger_error_to_response)?;
    tracing::info!(events = replayed, "read models rebuilt on request");
    Ok(Json(serde_json::json!({ "events_replayed": replayed })).into_response())
}
