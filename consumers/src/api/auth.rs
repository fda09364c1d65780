//! Capability checks for the consumers API
//!
//! A request is authorized when it carries the service scope, either in the
//! `scopes` claim of a bearer JWT or in the `X-Authenticated-Scope` header
//! that the upstream API gateway sets after authenticating the caller.

use anyhow::{anyhow, Result};
use axum::http::{header, HeaderMap};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

use super::error::ApiError;

/// Header carrying the comma separated scopes granted by the gateway
pub const SCOPE_HEADER: &str = "x-authenticated-scope";
/// Header carrying the user id authenticated by the gateway
pub const USER_HEADER: &str = "x-authenticated-userid";

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user identifier)
    pub sub: String,
    /// Issued at (timestamp)
    pub iat: i64,
    /// Expiration time (timestamp)
    pub exp: i64,
    /// Granted scopes
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// JWT authentication handler
pub struct JwtAuth {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtAuth {
    /// Create a new JWT authentication handler with a secret key
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Generate a JWT token granting `scopes` to `subject`
    ///
    /// # Arguments
    /// * `subject` - The user identifier
    /// * `scopes` - Scopes granted by the token
    /// * `expires_in_hours` - Token expiration time in hours (default: 24)
    pub fn generate_token(
        &self,
        subject: &str,
        scopes: &[String],
        expires_in_hours: Option<i64>,
    ) -> Result<String> {
        let now = Utc::now();
        let expires_in = expires_in_hours.unwrap_or(24);
        let exp = now + Duration::hours(expires_in);

        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            scopes: scopes.to_vec(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| anyhow!("Failed to generate token: {}", e))?;

        Ok(token)
    }

    /// Validate a JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let token_data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| anyhow!("Invalid token: {}", e))?;

        Ok(token_data.claims)
    }

    /// Extract token from Authorization header (Bearer token)
    pub fn extract_bearer_token(auth_header: &str) -> Result<String> {
        if !auth_header.starts_with("Bearer ") {
            return Err(anyhow!("Invalid authorization header format"));
        }

        let token = auth_header.trim_start_matches("Bearer ").trim();
        if token.is_empty() {
            return Err(anyhow!("Empty token"));
        }

        Ok(token.to_string())
    }
}

/// Authorized caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    /// User identifier, `None` when the gateway did not forward one
    pub subject: Option<String>,
    pub scopes: Vec<String>,
}

impl Principal {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.iter().any(|s| s == scope)
    }
}

/// Gate admitting requests that carry the required scope
#[derive(Clone)]
pub struct CapabilityGate {
    required_scope: String,
    jwt_auth: Option<Arc<JwtAuth>>,
}

impl CapabilityGate {
    /// Gate relying on gateway headers only
    pub fn new(required_scope: impl Into<String>) -> Self {
        Self {
            required_scope: required_scope.into(),
            jwt_auth: None,
        }
    }

    /// Also accept bearer tokens signed with `secret`
    pub fn with_jwt_secret(mut self, secret: &str) -> Self {
        self.jwt_auth = Some(Arc::new(JwtAuth::new(secret)));
        self
    }

    pub fn required_scope(&self) -> &str {
        &self.required_scope
    }

    /// Resolve the caller from request headers and check the required scope
    pub fn authorize(&self, headers: &HeaderMap) -> std::result::Result<Principal, ApiError> {
        let principal = match (&self.jwt_auth, headers.get(header::AUTHORIZATION)) {
            (Some(jwt_auth), Some(value)) => {
                let value = value.to_str().map_err(|_| ApiError::Unauthorized)?;
                let token =
                    JwtAuth::extract_bearer_token(value).map_err(|_| ApiError::Unauthorized)?;
                let claims = jwt_auth.validate_token(&token).map_err(|e| {
                    warn!("Rejecting request with invalid bearer token: {}", e);
                    ApiError::Unauthorized
                })?;
                Principal {
                    subject: Some(claims.sub),
                    scopes: claims.scopes,
                }
            }
            _ => Self::gateway_principal(headers)?,
        };

        if !principal.has_scope(&self.required_scope) {
            warn!(
                subject = ?principal.subject,
                "Request rejected, the caller is missing the scope '{}'",
                self.required_scope
            );
            return Err(ApiError::MissingScope(self.required_scope.clone()));
        }

        Ok(principal)
    }

    fn gateway_principal(headers: &HeaderMap) -> std::result::Result<Principal, ApiError> {
        let scopes: Vec<String> = headers
            .get(SCOPE_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        if scopes.is_empty() {
            warn!("Unauthorized request, the scope header had no content or was not set");
            return Err(ApiError::Unauthorized);
        }

        let subject = headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(Principal { subject, scopes })
    }
}
