//! Federation Core
//!
//! Network-free building blocks of the identity federation bridge:
//!
//! - **Verifier**: checks the HMAC-SHA-256 assertion forwarded by the
//!   identity-aware proxy and yields the raw [`ClaimSet`]
//! - **Mapper**: turns verified claims into a [`CanonicalIdentity`] and then
//!   into one payload per downstream system
//!
//! ## Data flow
//!
//! ```text
//! assertion header ──▶ AssertionVerifier ──▶ ClaimSet
//!                                              │ (+ fallback headers)
//!                                              ▼
//!                                      CanonicalIdentity ──▶ ChatPayload
//!                                                        └─▶ WorkflowPayload
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use federation_core::{AssertionVerifier, CanonicalIdentity, InboundAssertion};
//!
//! let verifier = AssertionVerifier::new(&shared_secret);
//! let claims = verifier.verify_request(&InboundAssertion::new(header_value))?;
//! let identity = CanonicalIdentity::from_claims(&claims);
//! println!("handle: {}", identity.handle);
//! ```

pub mod claims;
pub mod error;
pub mod identity;
pub mod payload;
pub mod verifier;

pub use claims::{
    ClaimSet, FallbackHeaders, InboundAssertion, ASSERTION_HEADER, EMAIL_HEADER, NAME_HEADER,
    USER_HEADER,
};
pub use error::{IdentityError, Result};
pub use identity::{sanitize_handle, title_case_handle, CanonicalIdentity, MAX_HANDLE_LEN};
pub use payload::{infer_role, ChatPayload, RoleDecision, WorkflowPayload, WorkflowRole};
pub use verifier::{AssertionVerifier, SecretEncoding, SharedSecret, SUPPORTED_ALGORITHM};
