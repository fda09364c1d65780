//! API server for the consumers service

use anyhow::{anyhow, Result};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use consumers_store::{
    freshness::DEFAULT_REGISTRY_TABLE, CacheConfig, DatabaseClient, HealthCheckConfig,
    MemoryResponseStore, PostgresFreshnessOracle, RedisResponseStore, ResponseCacheStore,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use super::auth::CapabilityGate;
use super::conditional_cache::{conditional_cache, ConditionalCache};
use super::middleware::{authorize, single_id_deprecation};
use super::routes::{
    create_consumer, delete_consumer, get_consumer, health_check, list_consumers, ping,
    update_consumer, AppState,
};

/// Configuration for the API server
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    pub host: String,
    pub port: u16,
    /// Scope a caller needs for every consumer route
    pub required_scope: String,
    /// Accept bearer tokens signed with this secret in addition to gateway headers
    pub jwt_secret: Option<String>,
    pub database_url: String,
    pub max_connections: u32,
    /// Table holding per-schema modification times
    pub registry_table: String,
    /// Shared Redis cache; `None` keeps responses in process memory
    pub redis_url: Option<String>,
    pub cache: CacheConfig,
    pub health: HealthCheckConfig,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        let mut cache = CacheConfig::default();
        if let Ok(service_name) = std::env::var("SERVICE_NAME") {
            cache.namespace = service_name;
        }
        if let Some(limit) = std::env::var("CACHE_MAX_BODY_BYTES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            cache.max_body_bytes = limit;
        }

        Self {
            host: std::env::var("CONSUMERS_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("CONSUMERS_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
            required_scope: std::env::var("REQUIRED_SCOPE")
                .unwrap_or_else(|_| "water-usage:consumers".to_string()),
            jwt_secret: std::env::var("JWT_SECRET").ok().filter(|s| !s.is_empty()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost/water_usage".to_string()),
            max_connections: 16,
            registry_table: std::env::var("SCHEMA_REGISTRY_TABLE")
                .unwrap_or_else(|_| DEFAULT_REGISTRY_TABLE.to_string()),
            redis_url: std::env::var("REDIS_URL").ok().filter(|s| !s.is_empty()),
            cache,
            health: HealthCheckConfig::default(),
        }
    }
}

/// Assemble the service router
///
/// The capability gate wraps the cache layer, so unauthorized requests never
/// reach the cache store.
pub fn build_router(
    app_state: Arc<AppState>,
    gate: CapabilityGate,
    cache: Arc<ConditionalCache>,
) -> Router {
    let protected = Router::new()
        .route("/", get(list_consumers).put(create_consumer))
        .route(
            "/:consumer_id",
            get(get_consumer)
                .patch(update_consumer)
                .delete(delete_consumer),
        )
        .layer(from_fn_with_state(cache, conditional_cache))
        .layer(from_fn(single_id_deprecation))
        .layer(from_fn_with_state(gate, authorize));

    Router::new()
        // Public routes
        .route("/ping", get(ping))
        .route("/health", get(health_check))
        .merge(protected)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// API server
pub struct ApiServer {
    config: ApiServerConfig,
}

impl ApiServer {
    /// Create a new API server with configuration
    pub fn new(config: ApiServerConfig) -> Self {
        Self { config }
    }

    /// Create a new API server with configuration from the environment
    pub fn with_defaults() -> Self {
        Self {
            config: ApiServerConfig::default(),
        }
    }

    /// Start the API server
    pub async fn start(self) -> Result<()> {
        self.config
            .cache
            .validate()
            .map_err(|e| anyhow!("Invalid cache configuration: {}", e))?;

        let database = DatabaseClient::with_config(
            &self.config.database_url,
            self.config.max_connections,
            self.config.health.clone(),
        )
        .await?;

        let cache_store: Arc<dyn ResponseCacheStore> = match &self.config.redis_url {
            Some(url) => Arc::new(RedisResponseStore::connect(url, self.config.cache.entry_ttl).await?),
            None => {
                warn!("REDIS_URL not set, cached responses are kept in process memory");
                Arc::new(MemoryResponseStore::new())
            }
        };
        let oracle = Arc::new(PostgresFreshnessOracle::with_registry(
            database.pool().clone(),
            &self.config.registry_table,
        )?);

        let mut gate = CapabilityGate::new(self.config.required_scope.clone());
        if let Some(secret) = &self.config.jwt_secret {
            gate = gate.with_jwt_secret(secret);
        }

        let cache = Arc::new(ConditionalCache::new(
            self.config.cache.clone(),
            cache_store.clone(),
            oracle,
        ));
        let app_state = Arc::new(AppState {
            database,
            cache_store,
        });

        let app = build_router(app_state, gate, cache);

        // Start server
        let addr = format!("{}:{}", self.config.host, self.config.port);
        info!("Starting API server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
