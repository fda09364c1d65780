pub mod api;

pub use api::{
    build_router, ApiError, ApiServer, ApiServerConfig, CapabilityGate, ConditionalCache,
    ErrorResponse, JwtAuth, Principal,
};
