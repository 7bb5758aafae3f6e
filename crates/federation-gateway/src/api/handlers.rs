//! Request handlers for the gateway

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    Json,
};
use federation_bridge::{FederationBridge, SessionArtifact};
use federation_core::{
    FallbackHeaders, InboundAssertion, ASSERTION_HEADER, EMAIL_HEADER, NAME_HEADER, USER_HEADER,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{warn, Instrument};
use uuid::Uuid;

use crate::api::error::ApiError;

/// Shared state for all handlers
pub struct AppState {
    pub bridge: Arc<FederationBridge>,
    /// Upper bound on one `/v1/bridge` request, across all systems
    pub deadline: Duration,
}

impl AppState {
    pub fn new(bridge: FederationBridge, deadline: Duration) -> Self {
        Self {
            bridge: Arc::new(bridge),
            deadline,
        }
    }
}

fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// Collect the assertion and fallback claim headers of a request
pub fn inbound_from_headers(headers: &HeaderMap) -> InboundAssertion {
    InboundAssertion {
        assertion: header_string(headers, ASSERTION_HEADER),
        fallback: FallbackHeaders {
            email: header_string(headers, EMAIL_HEADER),
            name: header_string(headers, NAME_HEADER),
            user: header_string(headers, USER_HEADER),
        },
    }
}

// =============================================================================
// Bridge
// =============================================================================

/// POST /v1/bridge
///
/// Verifies the proxy assertion and provisions the identity in every
/// configured system. Responds 200 when all systems succeed and 207 with
/// per-system detail otherwise.
pub async fn bridge_identity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let request_id = Uuid::new_v4();
    let inbound = inbound_from_headers(&headers);

    let report = state
        .bridge
        .bridge_within(&inbound, state.deadline)
        .instrument(tracing::info_span!("bridge", %request_id))
        .await?;

    let failed = report.failed().count();
    let status = if report.is_complete_success() {
        StatusCode::OK
    } else {
        warn!(
            %request_id,
            subject = %report.identity.subject,
            failed,
            "Bridge completed with failures"
        );
        StatusCode::MULTI_STATUS
    };

    let body = serde_json::to_value(report.summary())
        .map_err(|e| ApiError::Internal(format!("serialize report: {}", e)))?;

    Ok((status, Json(body)))
}

// =============================================================================
// Sessions
// =============================================================================

/// Request to open a session as an end user
#[derive(Deserialize)]
pub struct SessionRequest {
    pub email: String,
    pub password: String,
}

/// Session token for the caller to replay against the downstream
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub system: String,
    /// `cookie` or `header`
    pub kind: &'static str,
    /// Cookie or header name the token belongs in
    pub name: String,
    pub token: String,
}

/// POST /v1/sessions/{system}
pub async fn open_session(
    State(state): State<Arc<AppState>>,
    Path(system): Path<String>,
    Json(request): Json<SessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    if request.email.trim().is_empty() {
        return Err(ApiError::BadRequest("email must not be empty".into()));
    }

    let session = state
        .bridge
        .establish_session(&system, &request.email, &request.password)
        .await?;

    let (kind, name) = match &session.artifact {
        SessionArtifact::Cookie { name } => ("cookie", name.clone()),
        SessionArtifact::Token { header } => ("header", header.clone()),
    };

    Ok(Json(SessionResponse {
        system: session.system.clone(),
        kind,
        name,
        token: session.expose_token().to_string(),
    }))
}
