//! HTTP API of the consumers service

pub mod auth;
pub mod conditional_cache;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;

pub use auth::{CapabilityGate, JwtAuth, Principal};
pub use conditional_cache::ConditionalCache;
pub use error::{ApiError, ErrorResponse};
pub use server::{build_router, ApiServer, ApiServerConfig};
