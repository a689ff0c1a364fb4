use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use stockwatch_inventory::AnomalyId;

use super::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{ActorContext, OwnerContext};

pub fn router() -> Router {
    Router::new()
        .route("/anomalies", get(list_unresolved))
        .route("/anomalies/summary", get(summary))
        .route("/anomalies/:id/ack", post(acknowledge))
}

/// Unresolved anomalies, newest first. `item_id` narrows to one item.
pub async fn list_unresolved(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Query(params): Query<dto::AnomalyParams>,
) -> Result<Response, Response> {
    let query = params.into_query().map_err(errors::domain_error_to_response)?;
    let records = services
        .ledger()
        .list_unresolved_anomalies(owner.owner_id(), &query)
        .map_err(errors::ledger_error_to_response)?;

    let anomalies: Vec<_> = records.iter().map(dto::anomaly_to_json).collect();
    Ok(Json(serde_json::json!({
        "count": anomalies.len(),
        "anomalies": anomalies,
    }))
    .into_response())
}

pub async fn summary(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
) -> Response {
    let summary = services.ledger().anomaly_summary(owner.owner_id());
    Json(dto::summary_to_json(&summary)).into_response()
}

pub async fn acknowledge(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, Response> {
    let anomaly_id: AnomalyId = parse_id(&id)?;
    let record = services
        .ledger()
        .acknowledge_anomaly(owner.owner_id(), anomaly_id, actor.actor())
        .map_err(errors::ledger_error_to_response)?;
    Ok(Json(dto::anomaly_to_json(&record)).into_response())
}
