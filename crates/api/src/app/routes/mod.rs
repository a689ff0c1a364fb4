use axum::Router;

pub mod anomalies;
pub mod inventory;
pub mod system;

/// Router for all owner-scoped endpoints.
pub fn router() -> Router {
    Router::new().nest("/inventory", inventory::router().merge(anomalies::router()))
}

/// Parse a path id, mapping failures to a 400.
pub(crate) fn parse_id<T>(raw: &str) -> Result<T, axum::response::Response>
where
    T: std::str::FromStr<Err = stockwatch_core::DomainError>,
{
    raw.parse::<T>().map_err(crate::app::errors::domain_error_to_response)
}
