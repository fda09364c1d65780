//! Request fingerprinting
//!
//! A fingerprint identifies the cache-relevant part of a request: its path
//! and its query parameters. Repeated query keys are collected into a
//! sequence and sorted, so `?id=A&id=B` and `?id=B&id=A` hash identically.

use http::Uri;
use serde::Serialize;
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;
use std::fmt;

/// Value of a single query parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum QueryValue {
    /// Key appeared once in the query string
    Single(String),
    /// Key appeared more than once, values in arrival order
    Multiple(Vec<String>),
}

impl QueryValue {
    fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(first) => {
                let first = std::mem::take(first);
                *self = QueryValue::Multiple(vec![first, value]);
            }
            QueryValue::Multiple(values) => values.push(value),
        }
    }

    /// All values carried by this parameter
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(v) => vec![v.as_str()],
            QueryValue::Multiple(vs) => vs.iter().map(String::as_str).collect(),
        }
    }
}

/// Path and query parameters of an inbound request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDescriptor {
    pub path: String,
    pub query_parameters: BTreeMap<String, QueryValue>,
}

impl RequestDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query_parameters: BTreeMap::new(),
        }
    }

    /// Add one occurrence of a query parameter
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.add_param(key.into(), value.into());
        self
    }

    fn add_param(&mut self, key: String, value: String) {
        match self.query_parameters.get_mut(&key) {
            Some(existing) => existing.push(value),
            None => {
                self.query_parameters.insert(key, QueryValue::Single(value));
            }
        }
    }

    /// Build a descriptor from a raw (still percent-encoded) query string.
    ///
    /// A query string that cannot be decoded contributes no parameters.
    pub fn from_parts(path: &str, raw_query: Option<&str>) -> Self {
        let mut descriptor = Self::new(path);
        if let Some(query) = raw_query.filter(|q| !q.is_empty()) {
            match serde_urlencoded::from_str::<Vec<(String, String)>>(query) {
                Ok(pairs) => {
                    for (key, value) in pairs {
                        descriptor.add_param(key, value);
                    }
                }
                Err(e) => {
                    tracing::debug!("Ignoring undecodable query string {:?}: {}", query, e);
                }
            }
        }
        descriptor
    }

    pub fn from_uri(uri: &Uri) -> Self {
        Self::from_parts(uri.path(), uri.query())
    }

    /// Compute the fingerprint of this descriptor
    pub fn fingerprint(&self) -> Fingerprint {
        fingerprint(&self.path, &self.query_parameters)
    }
}

#[derive(Serialize)]
struct CanonicalRequest<'a> {
    request_path: &'a str,
    request_query_parameter: BTreeMap<&'a str, QueryValue>,
}

/// Lowercase hex SHA3-256 digest of a canonical request
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether an `If-None-Match` value names this fingerprint.
    ///
    /// Accepts `*`, comma separated lists, quoted and weak (`W/`) tags.
    pub fn matches_if_none_match(&self, header: &str) -> bool {
        header.split(',').map(str::trim).any(|tag| {
            if tag == "*" {
                return true;
            }
            let tag = tag.strip_prefix("W/").unwrap_or(tag);
            let tag = tag
                .strip_prefix('"')
                .and_then(|t| t.strip_suffix('"'))
                .unwrap_or(tag);
            tag == self.0
        })
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Canonicalize `path` and `query_parameters` and hash them.
///
/// Sequence values are sorted ascending; object keys are serialized in
/// lexicographic order without whitespace.
pub fn fingerprint(path: &str, query_parameters: &BTreeMap<String, QueryValue>) -> Fingerprint {
    let normalized = query_parameters
        .iter()
        .map(|(key, value)| {
            let value = match value {
                QueryValue::Single(v) => QueryValue::Single(v.clone()),
                QueryValue::Multiple(vs) => {
                    let mut sorted = vs.clone();
                    sorted.sort();
                    QueryValue::Multiple(sorted)
                }
            };
            (key.as_str(), value)
        })
        .collect();

    let canonical = CanonicalRequest {
        request_path: path,
        request_query_parameter: normalized,
    };

    // Only string maps and sequences are serialized here, which cannot fail.
    let serialized = serde_json::to_vec(&canonical).unwrap_or_default();
    Fingerprint(hex::encode(Sha3_256::digest(&serialized)))
}
