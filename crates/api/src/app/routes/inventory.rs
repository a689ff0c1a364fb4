use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};

use stockwatch_inventory::{InventoryItemId, ItemStatus};

use super::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::{ActorContext, OwnerContext};

type ApiResult = Result<Response, Response>;

pub fn router() -> Router {
    Router::new()
        .route("/items", post(register_item).get(list_items))
        .route("/items/:id", get(get_item))
        .route("/items/:id/thresholds", put(update_thresholds))
        .route("/items/:id/status", put(change_status))
        .route("/items/:id/mutations", post(append_mutation))
        .route("/items/:id/ledger", get(ledger_history))
        .route("/items/:id/reservations", post(reserve))
        .route("/items/:id/reservations/release", post(release_reservation))
        .route("/items/:id/safety-threshold", get(safety_threshold))
}

pub async fn register_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Json(body): Json<dto::RegisterItemBody>,
) -> ApiResult {
    let request = body.into_request().map_err(errors::domain_error_to_response)?;
    let view = services
        .ledger()
        .register_item(owner.owner_id(), request)
        .map_err(errors::ledger_error_to_response)?;
    Ok((StatusCode::CREATED, Json(dto::item_to_json(view))).into_response())
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
) -> Response {
    let items: Vec<_> = services
        .ledger()
        .list_items(owner.owner_id())
        .into_iter()
        .map(dto::item_to_json)
        .collect();
    Json(serde_json::json!({ "count": items.len(), "items": items })).into_response()
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let item_id: InventoryItemId = parse_id(&id)?;
    let view = services
        .ledger()
        .get_item(owner.owner_id(), item_id)
        .map_err(errors::ledger_error_to_response)?;
    Ok(Json(dto::item_to_json(view)).into_response())
}

pub async fn update_thresholds(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ThresholdsBody>,
) -> ApiResult {
    let item_id: InventoryItemId = parse_id(&id)?;
    let view = services
        .ledger()
        .update_thresholds(owner.owner_id(), item_id, body.safety_stock_quantity, body.reorder_point)
        .map_err(errors::ledger_error_to_response)?;
    Ok(Json(dto::item_to_json(view)).into_response())
}

pub async fn change_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::StatusBody>,
) -> ApiResult {
    let item_id: InventoryItemId = parse_id(&id)?;
    let status = ItemStatus::parse(&body.status).map_err(errors::domain_error_to_response)?;
    let view = services
        .ledger()
        .change_status(owner.owner_id(), item_id, status)
        .map_err(errors::ledger_error_to_response)?;
    Ok(Json(dto::item_to_json(view)).into_response())
}

pub async fn append_mutation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::MutationBody>,
) -> ApiResult {
    let item_id: InventoryItemId = parse_id(&id)?;
    let mut request = body.into_request().map_err(errors::domain_error_to_response)?;
    request.actor = actor.actor();

    let outcome = services
        .ledger()
        .append_mutation(owner.owner_id(), item_id, request)
        .map_err(errors::ledger_error_to_response)?;
    Ok((StatusCode::CREATED, Json(dto::outcome_to_json(&outcome))).into_response())
}

pub async fn ledger_history(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Query(params): Query<dto::LedgerParams>,
) -> ApiResult {
    let item_id: InventoryItemId = parse_id(&id)?;
    let filter = params.into_filter().map_err(errors::domain_error_to_response)?;
    let entries = services
        .ledger()
        .ledger_history(owner.owner_id(), item_id, &filter)
        .map_err(errors::ledger_error_to_response)?;

    let entries: Vec<_> = entries.iter().map(dto::entry_to_json).collect();
    Ok(Json(serde_json::json!({
        "item_id": item_id.to_string(),
        "count": entries.len(),
        "entries": entries,
    }))
    .into_response())
}

pub async fn reserve(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuantityBody>,
) -> ApiResult {
    let item_id: InventoryItemId = parse_id(&id)?;
    let view = services
        .ledger()
        .reserve(owner.owner_id(), item_id, body.quantity)
        .map_err(errors::ledger_error_to_response)?;
    Ok(Json(dto::item_to_json(view)).into_response())
}

pub async fn release_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::QuantityBody>,
) -> ApiResult {
    let item_id: InventoryItemId = parse_id(&id)?;
    let view = services
        .ledger()
        .release_reservation(owner.owner_id(), item_id, body.quantity)
        .map_err(errors::ledger_error_to_response)?;
    Ok(Json(dto::item_to_json(view)).into_response())
}

pub async fn safety_threshold(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(owner): Extension<OwnerContext>,
    Path(id): Path<String>,
) -> ApiResult {
    let item_id: InventoryItemId = parse_id(&id)?;
    let threshold = services
        .ledger()
        .compute_safety_threshold(owner.owner_id(), item_id)
        .map_err(errors::ledger_error_to_response)?;
    Ok(Json(dto::threshold_to_json(item_id, &threshold)).into_response())
}
