//! API error types and responses

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use federation_bridge::BridgeError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// API error type
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

/// API error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Bridge(err) => bridge_status(err),
        }
    }
}

/// HTTP status for an error that aborted a whole request
pub fn bridge_status(err: &BridgeError) -> StatusCode {
    match err {
        BridgeError::Assertion(_) => StatusCode::UNAUTHORIZED,
        BridgeError::SessionEstablishFailed { .. } => StatusCode::UNAUTHORIZED,
        BridgeError::UpstreamAuthFailed { .. } => StatusCode::BAD_GATEWAY,
        BridgeError::ProvisioningFailed { .. } => StatusCode::BAD_GATEWAY,
        BridgeError::NetworkFailure { .. } => StatusCode::GATEWAY_TIMEOUT,
        BridgeError::IncompleteIdentity { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        BridgeError::UnknownSystem(_) => StatusCode::NOT_FOUND,
        BridgeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, details) = match &self {
            ApiError::BadRequest(_) => ("BAD_REQUEST", None),
            ApiError::Internal(_) => ("INTERNAL_ERROR", None),
            ApiError::Bridge(err) => (err.code(), bridge_details(err)),
        };

        if status.is_server_error() {
            error!(code, error = %self, "Request failed");
        }

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

fn bridge_details(err: &BridgeError) -> Option<serde_json::Value> {
    match err {
        BridgeError::UpstreamAuthFailed { system, .. }
        | BridgeError::SessionEstablishFailed { system, .. }
        | BridgeError::NetworkFailure { system, .. }
        | BridgeError::IncompleteIdentity { system, .. } => Some(serde_json::json!({
            "system": system,
            "retryable": err.is_retryable(),
        })),
        BridgeError::ProvisioningFailed { system, status, .. } => Some(serde_json::json!({
            "system": system,
            "status": status,
            "retryable": false,
        })),
        _ => None,
    }
}
