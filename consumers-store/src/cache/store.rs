//! Response cache store implementations
//!
//! The store is a plain key-value map shared by every instance of the
//! service. It performs no locking: concurrent writers of the same key race
//! and the last write wins. A missing key is a cache miss, never an error.

use crate::error::{Result, StoreError};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Key-value store holding cached payloads and their change timestamps
#[async_trait]
pub trait ResponseCacheStore: Send + Sync {
    /// Read a value, `None` on a miss
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Check that the store is reachable
    async fn ping(&self) -> Result<()>;

    /// Short backend name used in logs and health reports
    fn backend(&self) -> &'static str;
}

/// Redis-backed store shared across service instances
///
/// Holds a [`ConnectionManager`], which multiplexes one connection and
/// reconnects on failure. Cloning the store clones the handle, not the
/// connection.
#[derive(Clone)]
pub struct RedisResponseStore {
    connection: ConnectionManager,
    entry_ttl: Option<Duration>,
}

impl RedisResponseStore {
    /// Connect to Redis at `url` (e.g. `redis://localhost:6379/0`)
    pub async fn connect(url: &str, entry_ttl: Option<Duration>) -> Result<Self> {
        info!("Connecting to Redis response cache");

        let client = redis::Client::open(url).map_err(|e| StoreError::ConfigError(e.to_string()))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| StoreError::CacheError(e.to_string()))?;

        info!("Successfully connected to Redis");

        Ok(Self {
            connection,
            entry_ttl,
        })
    }
}

#[async_trait]
impl ResponseCacheStore for RedisResponseStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.connection.clone();
        let value: Option<Vec<u8>> = conn.get(key).await?;
        debug!(key, hit = value.is_some(), "redis GET");
        Ok(value)
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        let mut conn = self.connection.clone();
        match self.entry_ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(key, value, ttl.as_secs()).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        debug!(key, bytes = value.len(), "redis SET");
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        let reply: String = redis::cmd("PING").query_async(&mut conn).await?;
        if reply != "PONG" {
            return Err(StoreError::CacheError(format!(
                "unexpected PING reply: {}",
                reply
            )));
        }
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}

/// In-process store for single-instance deployments and tests
#[derive(Clone, Default)]
pub struct MemoryResponseStore {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryResponseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains_key(&self, key: &str) -> bool {
        self.entries.read().await.contains_key(key)
    }

    /// Drop every entry, as an external eviction would
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

#[async_trait]
impl ResponseCacheStore for MemoryResponseStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
