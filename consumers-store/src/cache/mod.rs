//! # Conditional Response Cache Primitives
//!
//! Building blocks used by the HTTP conditional-cache middleware:
//!
//! - **Fingerprinting**: stable SHA3-256 identity of a request's path and
//!   query parameters, independent of repeated-parameter ordering
//! - **Keys**: derivation of the payload and change-timestamp keys
//! - **Store**: shared key-value store (Redis) with an in-process variant
//! - **HTTP dates**: one adapter normalizing header bytes and strings before
//!   validator parsing
//!
//! ## Example
//!
//! ```rust
//! use consumers_store::cache::{CacheKeys, RequestDescriptor};
//!
//! let a = RequestDescriptor::from_parts("/", Some("id=A&id=B"));
//! let b = RequestDescriptor::from_parts("/", Some("id=B&id=A"));
//! assert_eq!(a.fingerprint(), b.fingerprint());
//!
//! let keys = CacheKeys::new("water-usage-consumers", &a.fingerprint());
//! assert!(keys.data.starts_with("water-usage-consumers.data."));
//! ```

pub mod config;
pub mod fingerprint;
pub mod http_date;
pub mod keys;
pub mod store;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use fingerprint::{fingerprint, Fingerprint, QueryValue, RequestDescriptor};
pub use http_date::{epoch, format_http_date, parse_http_date, to_http_precision, HeaderText};
pub use keys::CacheKeys;
pub use store::{MemoryResponseStore, RedisResponseStore, ResponseCacheStore};
