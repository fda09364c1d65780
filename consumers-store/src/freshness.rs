//! Freshness oracle
//!
//! Reports when the data behind an endpoint last changed. The Postgres
//! implementation reads a schema-update registry that statement-level
//! triggers keep current (see `migrations/`).

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Default registry table maintained by the bundled migration
pub const DEFAULT_REGISTRY_TABLE: &str = "public.schema_updates";

/// Source of last-modification timestamps per data domain
#[async_trait]
pub trait FreshnessOracle: Send + Sync {
    /// Last modification time of `domain`, in UTC.
    ///
    /// Unknown domains and unreachable stores are errors; callers must not
    /// substitute a default.
    async fn last_modified(&self, domain: &str) -> Result<DateTime<Utc>>;
}

/// Oracle backed by the schema-update registry in Postgres
#[derive(Clone)]
pub struct PostgresFreshnessOracle {
    pool: PgPool,
    query: String,
}

impl PostgresFreshnessOracle {
    /// Use the default registry table
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            query: registry_query(DEFAULT_REGISTRY_TABLE),
        }
    }

    /// Use a custom registry table (`schema.table` or `table`)
    pub fn with_registry(pool: PgPool, registry_table: &str) -> Result<Self> {
        if !is_qualified_identifier(registry_table) {
            return Err(StoreError::ConfigError(format!(
                "invalid registry table name: {}",
                registry_table
            )));
        }

        Ok(Self {
            pool,
            query: registry_query(registry_table),
        })
    }
}

fn registry_query(registry_table: &str) -> String {
    format!(
        "SELECT max(last_update) FROM {} WHERE schema_name = $1",
        registry_table
    )
}

#[async_trait]
impl FreshnessOracle for PostgresFreshnessOracle {
    async fn last_modified(&self, domain: &str) -> Result<DateTime<Utc>> {
        let last_update: Option<DateTime<Utc>> = sqlx::query_scalar(&self.query)
            .bind(domain)
            .fetch_one(&self.pool)
            .await?;

        debug!(domain, ?last_update, "schema registry lookup");
        last_update.ok_or_else(|| StoreError::UnknownDomain(domain.to_string()))
    }
}

/// Oracle whose timestamps are set explicitly
///
/// Used when the service runs without a schema registry and in tests.
#[derive(Clone, Default)]
pub struct ManualFreshnessOracle {
    domains: Arc<RwLock<HashMap<String, DateTime<Utc>>>>,
}

impl ManualFreshnessOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a modification of `domain` at `at`
    pub async fn touch(&self, domain: &str, at: DateTime<Utc>) {
        self.domains.write().await.insert(domain.to_string(), at);
    }

    /// Record a modification of `domain` now
    pub async fn touch_now(&self, domain: &str) -> DateTime<Utc> {
        let now = Utc::now();
        self.touch(domain, now).await;
        now
    }
}

#[async_trait]
impl FreshnessOracle for ManualFreshnessOracle {
    async fn last_modified(&self, domain: &str) -> Result<DateTime<Utc>> {
        self.domains
            .read()
            .await
            .get(domain)
            .copied()
            .ok_or_else(|| StoreError::UnknownDomain(domain.to_string()))
    }
}

fn is_qualified_identifier(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() <= 2
        && parts.iter().all(|part| {
            !part.is_empty()
                && part
                    .chars()
                    .next()
                    .map(|c| c.is_ascii_alphabetic() || c == '_')
                    .unwrap_or(false)
                && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}
