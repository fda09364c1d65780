//! Conditional response caching for the consumer listing
//!
//! Responses of the cacheable route are stored in a shared
//! [`ResponseCacheStore`] under the request fingerprint, together with the
//! modification time of the data domain they were produced from. A request is
//! answered from the store as long as the [`FreshnessOracle`] reports no newer
//! modification; otherwise the handler runs and the entry is rewritten.
//!
//! Every response leaving this layer for the cacheable route carries
//! `ETag: <fingerprint>` and `Last-Modified`.

use axum::{
    body::{self, Body},
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use consumers_store::{
    cache::{epoch, format_http_date, parse_http_date, to_http_precision},
    CacheConfig, CacheKeys, Fingerprint, FreshnessOracle, RequestDescriptor, ResponseCacheStore,
};
use std::sync::Arc;
use tracing::debug;

use super::error::ApiError;

/// Outcome of comparing the request validators with the domain timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    /// The client copy is current, answer 304 without a body
    NotModified,
    /// A stored payload may be replayed if present
    Lookup,
    /// Run the handler and rewrite the entry
    Refresh,
}

/// Validators known for one request
#[derive(Debug, Clone, Default)]
pub struct Validators {
    /// Parsed `If-Modified-Since`, `None` when absent or malformed
    pub if_modified_since: Option<DateTime<Utc>>,
    /// Change timestamp stored next to the cached payload
    pub stored_last_change: Option<DateTime<Utc>>,
    /// Whether `If-None-Match` names the request fingerprint
    pub etag_matches: bool,
}

impl Validators {
    /// Timestamp of the newest data the client is assumed to hold
    pub fn client_known_modified(&self) -> DateTime<Utc> {
        self.if_modified_since
            .or(self.stored_last_change)
            .unwrap_or_else(epoch)
    }
}

/// Decide how to answer a request given its validators
///
/// `domain_last_modified` must already be truncated to whole seconds.
pub fn evaluate(
    validators: &Validators,
    domain_last_modified: DateTime<Utc>,
    fast_path: bool,
) -> CacheDecision {
    let data_changed = validators.client_known_modified() < domain_last_modified;

    // An entry older than the domain is never replayed or confirmed, even
    // when the client claims a newer copy.
    let entry_current = matches!(
        validators.stored_last_change,
        Some(stored) if stored >= domain_last_modified
    );

    if data_changed || !entry_current {
        return CacheDecision::Refresh;
    }
    if fast_path && validators.etag_matches {
        return CacheDecision::NotModified;
    }
    CacheDecision::Lookup
}

/// Cache layer state, shared by all requests
pub struct ConditionalCache {
    config: CacheConfig,
    store: Arc<dyn ResponseCacheStore>,
    oracle: Arc<dyn FreshnessOracle>,
}

impl ConditionalCache {
    pub fn new(
        config: CacheConfig,
        store: Arc<dyn ResponseCacheStore>,
        oracle: Arc<dyn FreshnessOracle>,
    ) -> Self {
        Self {
            config,
            store,
            oracle,
        }
    }

    /// Answer `request` from the cache or through `next`
    pub async fn handle(&self, request: Request, next: Next) -> Result<Response, ApiError> {
        if !self
            .config
            .is_cacheable(request.method(), request.uri().path())
        {
            return Ok(next.run(request).await);
        }

        let fingerprint = RequestDescriptor::from_uri(request.uri()).fingerprint();
        let keys = CacheKeys::new(&self.config.namespace, &fingerprint);

        let stored_last_change = self
            .store
            .get(&keys.last_change)
            .await?
            .and_then(|raw| parse_http_date(&raw));
        let validators = Validators {
            if_modified_since: request
                .headers()
                .get(header::IF_MODIFIED_SINCE)
                .and_then(|value| parse_http_date(value)),
            stored_last_change,
            etag_matches: if_none_match_matches(request.headers(), &fingerprint),
        };

        let domain_last_modified = to_http_precision(
            self.oracle
                .last_modified(&self.config.data_domain)
                .await?,
        );

        let decision = evaluate(
            &validators,
            domain_last_modified,
            self.config.enable_if_none_match_fast_path,
        );
        debug!(
            fingerprint = %fingerprint,
            client_known = %validators.client_known_modified(),
            domain = %domain_last_modified,
            ?decision,
            "cache decision"
        );

        match decision {
            CacheDecision::NotModified => not_modified(&fingerprint, &domain_last_modified),
            CacheDecision::Lookup => match self.store.get(&keys.data).await? {
                Some(payload) => {
                    let last_change = stored_last_change.unwrap_or(domain_last_modified);
                    debug!(fingerprint = %fingerprint, bytes = payload.len(), "serving cached response");
                    self.replay(payload, &fingerprint, &last_change)
                }
                None => {
                    debug!(fingerprint = %fingerprint, "change timestamp without payload, refreshing");
                    self.refresh(request, next, &fingerprint, &keys, domain_last_modified)
                        .await
                }
            },
            CacheDecision::Refresh => {
                self.refresh(request, next, &fingerprint, &keys, domain_last_modified)
                    .await
            }
        }
    }

    async fn refresh(
        &self,
        request: Request,
        next: Next,
        fingerprint: &Fingerprint,
        keys: &CacheKeys,
        domain_last_modified: DateTime<Utc>,
    ) -> Result<Response, ApiError> {
        let response = next.run(request).await;
        if !response.status().is_success() {
            debug!(
                fingerprint = %fingerprint,
                status = %response.status(),
                "not caching unsuccessful response"
            );
            return Ok(response);
        }

        let (mut parts, body) = response.into_parts();
        let payload = body::to_bytes(body, self.config.max_body_bytes)
            .await
            .map_err(|e| ApiError::ResponseCapture(e.to_string()))?;

        let last_modified = format_http_date(&domain_last_modified);
        self.store.set(&keys.data, &payload).await?;
        self.store
            .set(&keys.last_change, last_modified.as_bytes())
            .await?;
        debug!(fingerprint = %fingerprint, bytes = payload.len(), "response cached");

        parts.headers.insert(header::ETAG, etag_value(fingerprint)?);
        parts
            .headers
            .insert(header::LAST_MODIFIED, date_value(&last_modified)?);

        Ok(Response::from_parts(parts, Body::from(payload)))
    }

    fn replay(
        &self,
        payload: Vec<u8>,
        fingerprint: &Fingerprint,
        last_change: &DateTime<Utc>,
    ) -> Result<Response, ApiError> {
        // An empty listing was produced as 204 and is replayed as such
        let builder = if payload.is_empty() {
            Response::builder().status(StatusCode::NO_CONTENT)
        } else {
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, self.config.content_type.as_str())
        };

        builder
            .header(header::ETAG, fingerprint.as_str())
            .header(header::LAST_MODIFIED, format_http_date(last_change))
            .body(Body::from(payload))
            .map_err(|e| ApiError::ResponseCapture(e.to_string()))
    }
}

/// Axum middleware running [`ConditionalCache::handle`]
pub async fn conditional_cache(
    State(cache): State<Arc<ConditionalCache>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    cache.handle(request, next).await
}

fn if_none_match_matches(headers: &HeaderMap, fingerprint: &Fingerprint) -> bool {
    headers
        .get_all(header::IF_NONE_MATCH)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| fingerprint.matches_if_none_match(value))
}

fn not_modified(
    fingerprint: &Fingerprint,
    last_modified: &DateTime<Utc>,
) -> Result<Response, ApiError> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(header::ETAG, fingerprint.as_str())
        .header(header::LAST_MODIFIED, format_http_date(last_modified))
        .body(Body::empty())
        .map_err(|e| ApiError::ResponseCapture(e.to_string()))
}

fn etag_value(fingerprint: &Fingerprint) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(fingerprint.as_str()).map_err(|e| ApiError::ResponseCapture(e.to_string()))
}

fn date_value(date: &str) -> Result<HeaderValue, ApiError> {
    HeaderValue::from_str(date).map_err(|e| ApiError::ResponseCapture(e.to_string()))
}
