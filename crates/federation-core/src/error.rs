//! Error types for assertion verification

use thiserror::Error;

/// Result type alias using IdentityError
pub type Result<T> = std::result::Result<T, IdentityError>;

/// Errors produced while verifying an inbound assertion
///
/// Canonicalization is total and has no error type of its own.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The assertion header was absent or empty
    #[error("Missing identity assertion")]
    MissingAssertion,

    /// Malformed token structure, undecodable segment or bad signature
    #[error("Invalid identity assertion: {0}")]
    InvalidAssertion(String),

    /// Header declared an algorithm other than HS256
    #[error("Unsupported assertion algorithm: {0}")]
    UnsupportedAlgorithm(String),
}

impl IdentityError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        IdentityError::InvalidAssertion(reason.into())
    }
}
