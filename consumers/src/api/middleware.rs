//! Authorization and listing middleware for Axum

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use consumers_store::RequestDescriptor;

use super::auth::CapabilityGate;
use super::error::ApiError;

/// Reject requests lacking the required scope before any other layer runs
///
/// The resolved [`Principal`](super::auth::Principal) is stored in the request extensions.
pub async fn authorize(
    State(gate): State<CapabilityGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = gate.authorize(request.headers())?;
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

const SINGLE_ID_WARNING: &str = "299 consumer-management \"Selecting a single consumer using \
the id filter is deprecated. Please use the /{consumer-id} endpoint\"";

/// Flag listings that select exactly one consumer through `id`
///
/// Sits outside the cache layer so replayed responses carry the header too.
pub async fn single_id_deprecation(request: Request, next: Next) -> Response {
    let single_id = request.method() == Method::GET
        && request.uri().path() == "/"
        && RequestDescriptor::from_uri(request.uri())
            .query_parameters
            .get("id")
            .is_some_and(|values| values.values().len() == 1);

    let mut response = next.run(request).await;
    if single_id {
        response
            .headers_mut()
            .insert(header::WARNING, HeaderValue::from_static(SINGLE_ID_WARNING));
    }
    response
}
