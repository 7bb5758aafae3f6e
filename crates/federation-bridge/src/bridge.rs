//! Federation Bridge - verifies, canonicalizes and fans out to adapters

use async_trait::async_trait;
use federation_core::{AssertionVerifier, CanonicalIdentity, InboundAssertion};
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{BridgeError, Result};
use crate::types::{ProvisionAction, Provisioned, Session};

/// Trait for downstream adapters
///
/// Each adapter provisions and authenticates users against exactly one
/// system and owns that system's administrative credentials.
#[async_trait]
pub trait DownstreamAdapter: Send + Sync {
    /// Name of the system this adapter talks to
    fn system(&self) -> &str;

    /// Make sure the identity has an account; create it at most once
    ///
    /// An existing account is returned as found, never updated.
    async fn ensure_user(&self, identity: &CanonicalIdentity) -> Result<Provisioned>;

    /// Log in with end-user credentials and return the session
    async fn create_session(&self, email: &str, password: &str) -> Result<Session>;

    /// Get a description of this adapter (for logging)
    fn description(&self) -> &str {
        "downstream adapter"
    }
}

/// Result slot for one downstream system
#[derive(Debug)]
pub struct SystemOutcome {
    pub system: String,
    pub result: Result<Provisioned>,
}

/// Per-system results of one bridge invocation
#[derive(Debug)]
pub struct BridgeReport {
    pub identity: CanonicalIdentity,
    /// One entry per adapter, in registration order
    pub outcomes: Vec<SystemOutcome>,
}

impl BridgeReport {
    pub fn succeeded(&self) -> impl Iterator<Item = (&str, &Provisioned)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok().map(|p| (o.system.as_str(), p)))
    }

    pub fn failed(&self) -> impl Iterator<Item = (&str, &BridgeError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.system.as_str(), e)))
    }

    pub fn outcome(&self, system: &str) -> Option<&SystemOutcome> {
        self.outcomes.iter().find(|o| o.system == system)
    }

    /// True when every adapter succeeded
    pub fn is_complete_success(&self) -> bool {
        self.outcomes.iter().all(|o| o.result.is_ok())
    }
}

/// Serializable summary of a [`BridgeReport`]
#[derive(Debug, Serialize)]
pub struct ReportSummary<'a> {
    pub identity: &'a CanonicalIdentity,
    pub systems: Vec<OutcomeSummary<'a>>,
}

#[derive(Debug, Serialize)]
pub struct OutcomeSummary<'a> {
    pub system: &'a str,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioned: Option<ProvisionedSummary<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    pub retryable: bool,
}

/// Identifying fields of a provisioned user
///
/// The raw downstream record is left out; it can carry invitation links.
#[derive(Debug, Serialize)]
pub struct ProvisionedSummary<'a> {
    pub user_id: &'a str,
    pub email: &'a str,
    pub action: ProvisionAction,
}

impl<'a> From<&'a Provisioned> for ProvisionedSummary<'a> {
    fn from(provisioned: &'a Provisioned) -> Self {
        Self {
            user_id: &provisioned.user.id,
            email: &provisioned.user.email,
            action: provisioned.action,
        }
    }
}

impl BridgeReport {
    pub fn summary(&self) -> ReportSummary<'_> {
        ReportSummary {
            identity: &self.identity,
            systems: self
                .outcomes
                .iter()
                .map(|o| match &o.result {
                    Ok(provisioned) => OutcomeSummary {
                        system: &o.system,
                        ok: true,
                        provisioned: Some(provisioned.into()),
                        error: None,
                        code: None,
                        retryable: false,
                    },
                    Err(e) => OutcomeSummary {
                        system: &o.system,
                        ok: false,
                        provisioned: None,
                        error: Some(e.to_string()),
                        code: Some(e.code()),
                        retryable: e.is_retryable(),
                    },
                })
                .collect(),
        }
    }
}

/// Federation Bridge - one verifier, many adapters
///
/// Holds only read-only state, so a single instance can serve concurrent
/// requests behind an `Arc`.
pub struct FederationBridge {
    verifier: AssertionVerifier,
    adapters: Vec<Arc<dyn DownstreamAdapter>>,
}

impl FederationBridge {
    /// Create a bridge with no adapters
    pub fn new(verifier: AssertionVerifier) -> Self {
        Self {
            verifier,
            adapters: Vec::new(),
        }
    }

    pub fn builder(verifier: AssertionVerifier) -> FederationBridgeBuilder {
        FederationBridgeBuilder::new(verifier)
    }

    /// Register an adapter, replacing any adapter with the same system name
    pub fn register_adapter<A: DownstreamAdapter + 'static>(&mut self, adapter: A) {
        self.register_shared(Arc::new(adapter));
    }

    pub fn register_shared(&mut self, adapter: Arc<dyn DownstreamAdapter>) {
        info!(
            system = adapter.system(),
            description = adapter.description(),
            "Registered downstream adapter"
        );
        match self.adapters.iter().position(|a| a.system() == adapter.system()) {
            Some(index) => self.adapters[index] = adapter,
            None => self.adapters.push(adapter),
        }
    }

    pub fn adapter(&self, system: &str) -> Option<Arc<dyn DownstreamAdapter>> {
        self.adapters.iter().find(|a| a.system() == system).cloned()
    }

    /// Names of registered systems, in registration order
    pub fn systems(&self) -> Vec<String> {
        self.adapters.iter().map(|a| a.system().to_string()).collect()
    }

    /// Verify, canonicalize and provision into every registered system
    ///
    /// Returns `Err` only for assertion failures, before any downstream call.
    /// Adapter failures land in their own slot of the report.
    pub async fn bridge(&self, request: &InboundAssertion) -> Result<BridgeReport> {
        self.fan_out(request, None).await
    }

    /// [`Self::bridge`] with every adapter bounded by the caller's deadline
    ///
    /// An adapter that misses the deadline has its in-flight calls dropped and
    /// its slot set to a retryable `NetworkFailure`. Slots that finished in
    /// time are kept.
    pub async fn bridge_within(
        &self,
        request: &InboundAssertion,
        deadline: Duration,
    ) -> Result<BridgeReport> {
        self.fan_out(request, Some(deadline)).await
    }

    async fn fan_out(
        &self,
        request: &InboundAssertion,
        deadline: Option<Duration>,
    ) -> Result<BridgeReport> {
        let claims = self.verifier.verify_request(request).map_err(|e| {
            warn!(error = %e, "Assertion rejected");
            BridgeError::from(e)
        })?;
        let identity = CanonicalIdentity::from_claims(&claims);

        let outcomes = join_all(self.adapters.iter().map(|adapter| {
            let identity = &identity;
            async move {
                let result = ensure_within(adapter.as_ref(), identity, deadline).await;
                match &result {
                    Ok(provisioned) => info!(
                        system = adapter.system(),
                        subject = %identity.subject,
                        action = ?provisioned.action,
                        "Downstream user ensured"
                    ),
                    Err(e) => warn!(
                        system = adapter.system(),
                        subject = %identity.subject,
                        retryable = e.is_retryable(),
                        error = %e,
                        "Downstream provisioning failed"
                    ),
                }
                SystemOutcome {
                    system: adapter.system().to_string(),
                    result,
                }
            }
        }))
        .await;

        Ok(BridgeReport { identity, outcomes })
    }

    /// Log an end user into one system
    pub async fn establish_session(
        &self,
        system: &str,
        email: &str,
        password: &str,
    ) -> Result<Session> {
        let adapter = self
            .adapter(system)
            .ok_or_else(|| BridgeError::UnknownSystem(system.to_string()))?;

        let result = adapter.create_session(email, password).await;
        match &result {
            Ok(_) => info!(system = %system, "Session established"),
            Err(e) => warn!(system = %system, error = %e, "Session establishment failed"),
        }
        result
    }
}

async fn ensure_within(
    adapter: &dyn DownstreamAdapter,
    identity: &CanonicalIdentity,
    deadline: Option<Duration>,
) -> Result<Provisioned> {
    let Some(deadline) = deadline else {
        return adapter.ensure_user(identity).await;
    };
    tokio::time::timeout(deadline, adapter.ensure_user(identity))
        .await
        .unwrap_or_else(|_| {
            Err(BridgeError::NetworkFailure {
                system: adapter.system().to_string(),
                reason: format!("request deadline of {:?} exceeded", deadline),
            })
        })
}

/// Builder for creating a FederationBridge with adapters
pub struct FederationBridgeBuilder {
    bridge: FederationBridge,
}

impl FederationBridgeBuilder {
    pub fn new(verifier: AssertionVerifier) -> Self {
        Self {
            bridge: FederationBridge::new(verifier),
        }
    }

    /// Add a downstream adapter
    pub fn with_adapter<A: DownstreamAdapter + 'static>(mut self, adapter: A) -> Self {
        self.bridge.register_adapter(adapter);
        self
    }

    pub fn with_shared_adapter(mut self, adapter: Arc<dyn DownstreamAdapter>) -> Self {
        self.bridge.register_shared(adapter);
        self
    }

    pub fn build(self) -> FederationBridge {
        self.bridge
    }
}
