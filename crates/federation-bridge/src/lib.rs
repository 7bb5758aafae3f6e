//! Federation Bridge
//!
//! Provisions identities asserted by the upstream proxy into downstream
//! tools that cannot consume the proxy's assertion themselves.
//!
//! ## Architecture
//!
//! The bridge owns one assertion verifier and a list of downstream adapters.
//! Each adapter holds the administrative credentials of exactly one system:
//!
//! - **Workflow**: workflow engine, invitation-based provisioning, cookie sessions
//! - **Chat**: chat system, direct user creation, token-header sessions
//! - **Mock**: in-memory adapter for tests
//!
//! ## Usage
//!
//! ```ignore
//! use federation_bridge::{adapters::*, AdapterConfig, FederationBridge};
//! use federation_core::{AssertionVerifier, InboundAssertion};
//!
//! let bridge = FederationBridge::builder(AssertionVerifier::new(&secret))
//!     .with_adapter(WorkflowAdapter::new(AdapterConfig::new(
//!         "https://workflow.internal",
//!         AdminCredentials::new("owner@example.com", owner_password),
//!     ))?)
//!     .build();
//!
//! let report = bridge.bridge(&InboundAssertion::new(header_value)).await?;
//! for outcome in &report.outcomes {
//!     println!("{}: {}", outcome.system, outcome.result.is_ok());
//! }
//! ```
//!
//! ## Failure model
//!
//! A bad assertion aborts the request before any downstream call. After
//! that, adapters run independently: one system being down never prevents
//! provisioning into the others.

pub mod adapters;
pub mod bridge;
pub mod error;
pub mod types;

pub use bridge::{
    BridgeReport, DownstreamAdapter, FederationBridge, FederationBridgeBuilder, OutcomeSummary,
    ProvisionedSummary, ReportSummary, SystemOutcome,
};
pub use error::{BridgeError, Result};
pub use types::{
    AdapterConfig, AdminCredentials, DownstreamUser, ProvisionAction, Provisioned, Session,
    SessionArtifact, DEFAULT_HTTP_TIMEOUT,
};
