//! API routes for the consumers service

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Extension, Json,
};
use consumers_store::{
    schema::{self, Consumer, ConsumerFilter, ConsumerUpdate, NewConsumer},
    DatabaseClient, HealthCheckResult, RequestDescriptor, ResponseCacheStore,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::auth::Principal;
use super::error::ApiError;

/// Application state
pub struct AppState {
    pub database: DatabaseClient,
    pub cache_store: Arc<dyn ResponseCacheStore>,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub database: HealthCheckResult,
    pub cache: CacheHealth,
}

#[derive(Serialize)]
pub struct CacheHealth {
    pub backend: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe for container orchestration
pub async fn ping() -> StatusCode {
    StatusCode::NO_CONTENT
}

/// Health check endpoint
pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = state.database.health_check_with_retry().await;
    let cache = match state.cache_store.ping().await {
        Ok(()) => CacheHealth {
            backend: state.cache_store.backend().to_string(),
            healthy: true,
            error: None,
        },
        Err(e) => CacheHealth {
            backend: state.cache_store.backend().to_string(),
            healthy: false,
            error: Some(e.to_string()),
        },
    };

    let operational = database.status.is_operational() && cache.healthy;
    let status = if operational {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(HealthResponse {
            status: format!("{:?}", database.status).to_lowercase(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            database,
            cache,
        }),
    )
}

/// Build the listing filter from the request query
///
/// Recognized parameters: `usage_above` (integer, first value wins; the older
/// `usageAbove` spelling is accepted when `usage_above` is absent), `id`
/// (repeatable UUID) and `in` (repeatable shape key).
pub fn consumer_filter(descriptor: &RequestDescriptor) -> Result<ConsumerFilter, ApiError> {
    let params = &descriptor.query_parameters;

    let usage_above = match params
        .get("usage_above")
        .or_else(|| params.get("usageAbove"))
        .and_then(|v| v.values().first().copied())
    {
        Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
            warn!("Found invalid value for 'usage_above' in request");
            ApiError::InvalidQueryParameter(format!(
                "'usage_above' must be an integer, got '{}'",
                raw
            ))
        })?),
        None => None,
    };

    let ids = match params.get("id") {
        Some(values) => Some(
            values
                .values()
                .into_iter()
                .map(|raw| {
                    Uuid::parse_str(raw.trim()).map_err(|_| {
                        ApiError::InvalidQueryParameter(format!(
                            "'id' must be a UUID, got '{}'",
                            raw
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
        ),
        None => None,
    };

    let area_keys = params.get("in").map(|values| {
        values
            .values()
            .into_iter()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .collect::<Vec<_>>()
    });

    Ok(ConsumerFilter {
        usage_above,
        ids,
        area_keys,
    })
}

/// List consumers, optionally filtered by usage, id and area
pub async fn list_consumers(
    State(state): State<Arc<AppState>>,
    uri: Uri,
) -> Result<Response, ApiError> {
    let filter = consumer_filter(&RequestDescriptor::from_uri(&uri))?;
    let consumers = schema::list_consumers(state.database.pool(), &filter).await?;

    if consumers.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(consumers).into_response())
}

/// Fetch a single consumer
pub async fn get_consumer(
    State(state): State<Arc<AppState>>,
    consumer_id: Result<Path<Uuid>, axum::extract::rejection::PathRejection>,
) -> Result<Json<Consumer>, ApiError> {
    let Path(consumer_id) =
        consumer_id.map_err(|e| ApiError::InvalidPathParameter(e.body_text()))?;

    schema::get_consumer(state.database.pool(), consumer_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NoSuchConsumer(consumer_id.to_string()))
}

/// Create a consumer
pub async fn create_consumer(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<NewConsumer>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(new_consumer) =
        payload.map_err(|e| ApiError::UnprocessableEntity(e.body_text()))?;

    let consumer = schema::create_consumer(state.database.pool(), &new_consumer).await?;
    info!(
        subject = ?principal.subject,
        consumer = %consumer.id,
        "Created consumer '{}'",
        consumer.name
    );

    Ok((StatusCode::CREATED, Json(consumer)).into_response())
}

/// Update name and/or location of a consumer
pub async fn update_consumer(
    State(state): State<Arc<AppState>>,
    consumer_id: Result<Path<Uuid>, axum::extract::rejection::PathRejection>,
    payload: Result<Json<ConsumerUpdate>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Path(consumer_id) =
        consumer_id.map_err(|e| ApiError::InvalidPathParameter(e.body_text()))?;
    let Json(update) = payload.map_err(|e| ApiError::UnprocessableEntity(e.body_text()))?;

    let consumer = if update.is_empty() {
        schema::get_consumer(state.database.pool(), consumer_id).await?
    } else {
        schema::update_consumer(state.database.pool(), consumer_id, &update).await?
    };

    match consumer {
        Some(consumer) => Ok(Json(consumer).into_response()),
        None => Err(ApiError::NoSuchConsumer(consumer_id.to_string())),
    }
}

/// Delete a consumer; deleting an unknown id succeeds
pub async fn delete_consumer(
    State(state): State<Arc<AppState>>,
    consumer_id: Result<Path<Uuid>, axum::extract::rejection::PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(consumer_id) =
        consumer_id.map_err(|e| ApiError::InvalidPathParameter(e.body_text()))?;

    let removed = schema::delete_consumer(state.database.pool(), consumer_id).await?;
    info!(consumer = %consumer_id, removed, "Deleted consumer");

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_without_parameters() {
        let filter = consumer_filter(&RequestDescriptor::from_parts("/", None)).unwrap();
        assert!(filter.is_unrestricted());
    }

    #[test]
    fn test_filter_all_dimensions() {
        let id = Uuid::new_v4();
        let query = format!("usage_above=1500&id={}&in=03241&in=03252", id);
        let filter = consumer_filter(&RequestDescriptor::from_parts("/", Some(&query))).unwrap();

        assert_eq!(filter.usage_above, Some(1500));
        assert_eq!(filter.ids, Some(vec![id]));
        assert_eq!(
            filter.area_keys,
            Some(vec!["03241".to_string(), "03252".to_string()])
        );
    }

    #[test]
    fn test_filter_rejects_invalid_usage() {
        let result = consumer_filter(&RequestDescriptor::from_parts("/", Some("usage_above=lots")));
        assert!(matches!(result, Err(ApiError::InvalidQueryParameter(_))));
    }

    #[test]
    fn test_filter_rejects_invalid_id() {
        let result = consumer_filter(&RequestDescriptor::from_parts("/", Some("id=not-a-uuid")));
        assert!(matches!(result, Err(ApiError::InvalidQueryParameter(_))));
    }

    #[test]
    fn test_filter_accepts_camel_case_usage() {
        let filter =
            consumer_filter(&RequestDescriptor::from_parts("/", Some("usageAbove=250"))).unwrap();
        assert_eq!(filter.usage_above, Some(250));

        let filter = consumer_filter(&RequestDescriptor::from_parts(
            "/",
            Some("usage_above=10&usageAbove=250"),
        ))
        .unwrap();
        assert_eq!(filter.usage_above, Some(10));

        let result = consumer_filter(&RequestDescriptor::from_parts("/", Some("usageAbove=x")));
        assert!(matches!(result, Err(ApiError::InvalidQueryParameter(_))));
    }

    #[test]
    fn test_filter_ignores_unrelated_parameters() {
        let filter =
            consumer_filter(&RequestDescriptor::from_parts("/", Some("page=2&sort=name"))).unwrap();
        assert!(filter.is_unrestricted());
    }
}
