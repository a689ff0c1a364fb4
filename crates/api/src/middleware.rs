use axum::{
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};

use stockwatch_core::{OwnerId, UserId};

use crate::app::errors;
use crate::context::{ActorContext, OwnerContext};

pub const OWNER_HEADER: &str = "x-owner-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Resolve the owner scope (required) and the audit actor (optional) from
/// request headers.
pub async fn owner_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let owner_id: OwnerId = match header_value(req.headers(), OWNER_HEADER)? {
        Some(raw) => raw.parse().map_err(|_| {
            errors::json_error(StatusCode::BAD_REQUEST, "invalid_owner", "X-Owner-Id must be a UUID")
        })?,
        None => {
            return Err(errors::json_error(
                StatusCode::BAD_REQUEST,
                "missing_owner",
                "X-Owner-Id header is required",
            ));
        }
    };

    let actor: Option<UserId> = header_value(req.headers(), ACTOR_HEADER)?
        .map(|raw| {
            raw.parse().map_err(|_| {
                errors::json_error(StatusCode::BAD_REQUEST, "invalid_actor", "X-Actor-Id must be a UUID")
            })
        })
        .transpose()?;

    req.extensions_mut().insert(OwnerContext::new(owner_id));
    req.extensions_mut().insert(ActorContext::new(actor));

    Ok(next.run(req).await)
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>, Response> {
    let Some(value) = headers.get(name) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| {
        errors::json_error(StatusCode::BAD_REQUEST, "invalid_header", format!("{name} is not valid ASCII"))
    })?;
    let value = value.trim();
    Ok((!value.is_empty()).then_some(value))
}
