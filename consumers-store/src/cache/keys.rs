//! Cache key derivation
//!
//! Every fingerprint owns two keys inside a namespace: one for the response
//! payload and one for the formatted timestamp of the data it was built from.

use super::fingerprint::Fingerprint;

/// Pair of store keys addressing one cache entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKeys {
    /// `<namespace>.data.<fingerprint>`
    pub data: String,
    /// `<namespace>.last_change.<fingerprint>`
    pub last_change: String,
}

impl CacheKeys {
    pub fn new(namespace: &str, fingerprint: &Fingerprint) -> Self {
        Self {
            data: format!("{}.data.{}", namespace, fingerprint),
            last_change: format!("{}.last_change.{}", namespace, fingerprint),
        }
    }
}
