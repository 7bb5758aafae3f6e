//! Error types for the Federation Bridge

use federation_core::IdentityError;
use thiserror::Error;

/// Result type for Federation Bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Errors that can occur while bridging an identity
///
/// Messages carry the downstream name, HTTP status and a truncated response
/// body. Passwords and session tokens never appear in them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Assertion missing, malformed, badly signed or using the wrong algorithm
    #[error(transparent)]
    Assertion(#[from] IdentityError),

    /// Administrative login to a downstream system failed
    #[error("{system}: administrative login failed: {reason}")]
    UpstreamAuthFailed { system: String, reason: String },

    /// Downstream rejected the lookup or creation of a user
    #[error("{system}: provisioning failed with HTTP {status}: {body}")]
    ProvisioningFailed {
        system: String,
        status: u16,
        body: String,
    },

    /// End-user login did not yield a session
    #[error("{system}: session could not be established: {reason}")]
    SessionEstablishFailed { system: String, reason: String },

    /// Timeout or connection error; safe to retry
    #[error("{system}: network failure: {reason}")]
    NetworkFailure { system: String, reason: String },

    /// Identity lacks a field this system needs to key the account
    #[error("{system}: identity has no {missing}")]
    IncompleteIdentity { system: String, missing: String },

    /// No adapter registered under this name
    #[error("Unknown downstream system: {0}")]
    UnknownSystem(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BridgeError {
    /// Whether the same call may succeed if simply retried
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::NetworkFailure { .. })
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            BridgeError::Assertion(IdentityError::MissingAssertion) => "MISSING_ASSERTION",
            BridgeError::Assertion(IdentityError::InvalidAssertion(_)) => "INVALID_ASSERTION",
            BridgeError::Assertion(IdentityError::UnsupportedAlgorithm(_)) => {
                "UNSUPPORTED_ALGORITHM"
            }
            BridgeError::UpstreamAuthFailed { .. } => "UPSTREAM_AUTH_FAILED",
            BridgeError::ProvisioningFailed { .. } => "PROVISIONING_FAILED",
            BridgeError::SessionEstablishFailed { .. } => "SESSION_ESTABLISH_FAILED",
            BridgeError::NetworkFailure { .. } => "NETWORK_FAILURE",
            BridgeError::IncompleteIdentity { .. } => "INCOMPLETE_IDENTITY",
            BridgeError::UnknownSystem(_) => "UNKNOWN_SYSTEM",
            BridgeError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Map a transport-level reqwest error for the given system
    pub(crate) fn from_transport(system: &str, err: reqwest::Error) -> Self {
        let reason = if err.is_timeout() {
            "request timed out".to_string()
        } else if err.is_connect() {
            "connection failed".to_string()
        } else {
            // Drop the URL so query strings never leak into messages
            err.without_url().to_string()
        };
        BridgeError::NetworkFailure {
            system: system.to_string(),
            reason,
        }
    }
}
