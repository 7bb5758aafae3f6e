//! Federation Gateway
//!
//! HTTP front end for the federation bridge. Sits behind the identity-aware
//! proxy, reads its signed assertion from each request and provisions the
//! caller in every configured downstream system.
//!
//! ## API Endpoints
//!
//! - `GET /health` - Liveness check with the enabled systems
//! - `POST /v1/bridge` - Verify the assertion and provision everywhere
//! - `POST /v1/sessions/{system}` - Log an end user in to one system

pub mod api;
pub mod config;

pub use api::create_router;
pub use api::error::{ApiError, ErrorResponse};
pub use api::handlers::{AppState, SessionRequest, SessionResponse};
pub use config::{GatewayConfig, SystemConfig};
