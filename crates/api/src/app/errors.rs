use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockwatch_core::DomainError;
use stockwatch_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        LedgerError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        LedgerError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        LedgerError::Concurrency(msg) => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "concurrency_conflict",
                "message": msg,
                "retryable": true,
            })),
        )
            .into_response(),
        LedgerError::OwnerIsolation(msg) => json_error(StatusCode::FORBIDDEN, "owner_isolation", msg),
        LedgerError::Deserialize(msg) => {
            tracing::error!(error = %msg, "stored event could not be read");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "deserialize_error", msg)
        }
        LedgerError::Store(e) => {
            tracing::error!(error = %e, "event store failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string())
        }
    }
}

/// Request-level parse failures (bad enum strings, malformed ids).
pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        other => ledger_error_to_response(other.into()),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
