//! Workflow Engine Adapter
//!
//! Provisions users by invitation. The engine identifies sessions with an
//! auth cookie and lists all users to its owner account.

use async_trait::async_trait;
use federation_core::{infer_role, CanonicalIdentity, WorkflowPayload};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::adapters::client::{user_records, DownstreamClient, LoginRole};
use crate::bridge::DownstreamAdapter;
use crate::error::{BridgeError, Result};
use crate::types::{AdapterConfig, DownstreamUser, Provisioned, Session, SessionArtifact};

/// Default adapter name
pub const WORKFLOW_SYSTEM: &str = "workflow";

/// Cookie the engine sets on successful login
pub const WORKFLOW_SESSION_COOKIE: &str = "n8n-auth";

/// REST paths of the workflow engine, relative to its base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowEndpoints {
    pub login: String,
    pub users: String,
    pub invitations: String,
}

impl Default for WorkflowEndpoints {
    fn default() -> Self {
        Self {
            login: "/rest/login".into(),
            users: "/rest/users".into(),
            invitations: "/rest/invitations".into(),
        }
    }
}

/// Adapter for the workflow engine
pub struct WorkflowAdapter {
    client: DownstreamClient,
    endpoints: WorkflowEndpoints,
    artifact: SessionArtifact,
}

impl WorkflowAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self> {
        Self::named(WORKFLOW_SYSTEM, config)
    }

    /// Register under a different system name
    pub fn named(system: impl Into<String>, config: AdapterConfig) -> Result<Self> {
        Ok(Self {
            client: DownstreamClient::new(system, config)?,
            endpoints: WorkflowEndpoints::default(),
            artifact: SessionArtifact::cookie(WORKFLOW_SESSION_COOKIE),
        })
    }

    pub fn with_endpoints(mut self, endpoints: WorkflowEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.artifact = SessionArtifact::cookie(name);
        self
    }

    fn login_body(email: &str, password: &str) -> Value {
        json!({ "email": email, "password": password })
    }

    async fn find_user(&self, admin: &Session, email: &str) -> Result<Option<DownstreamUser>> {
        let listing = self.client.get_json(&self.endpoints.users, admin).await?;
        Ok(user_records(listing)
            .into_iter()
            .filter_map(|record| DownstreamUser::from_record(self.client.system(), record))
            .find(|user| user.email_matches(email)))
    }

    async fn invite(&self, admin: &Session, payload: &WorkflowPayload) -> Result<DownstreamUser> {
        let response = self
            .client
            .post_json(&self.endpoints.invitations, admin, &[payload])
            .await?;

        if let Some(reason) = invitation_error(&response) {
            return Err(BridgeError::ProvisioningFailed {
                system: self.client.system().to_string(),
                status: 200,
                body: self.client.diagnostic_body(&reason),
            });
        }

        user_records(response)
            .into_iter()
            .filter_map(|record| DownstreamUser::from_record(self.client.system(), record))
            .find(|user| user.email_matches(&payload.email))
            .ok_or_else(|| BridgeError::ProvisioningFailed {
                system: self.client.system().to_string(),
                status: 200,
                body: "invitation response contained no record for the invited email".into(),
            })
    }
}

/// First non-empty per-entry `error` in an invitation response
fn invitation_error(response: &Value) -> Option<String> {
    let entries = match response {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => map.get("data")?.as_array()?.as_slice(),
        _ => return None,
    };
    entries
        .iter()
        .filter_map(|entry| entry.get("error")?.as_str())
        .find(|error| !error.trim().is_empty())
        .map(String::from)
}

#[async_trait]
impl DownstreamAdapter for WorkflowAdapter {
    fn system(&self) -> &str {
        self.client.system()
    }

    fn description(&self) -> &str {
        "workflow engine adapter"
    }

    async fn ensure_user(&self, identity: &CanonicalIdentity) -> Result<Provisioned> {
        let payload = WorkflowPayload::from_identity(identity);
        if payload.email.is_empty() {
            return Err(BridgeError::IncompleteIdentity {
                system: self.system().to_string(),
                missing: "email".into(),
            });
        }

        let admin_creds = self.client.admin();
        let admin = self
            .client
            .admin_login(
                &self.endpoints.login,
                &Self::login_body(&admin_creds.email, admin_creds.password()),
                &self.artifact,
            )
            .await?;

        if let Some(existing) = self.find_user(&admin, &payload.email).await? {
            debug!(system = %self.system(), user_id = %existing.id, "User already provisioned");
            return Ok(Provisioned::existing(existing));
        }

        let decision = infer_role(&identity.groups);
        let user = self.invite(&admin, &payload).await?;
        info!(
            system = %self.system(),
            user_id = %user.id,
            subject = %identity.subject,
            role = %decision.role,
            matched_group = ?decision.matched_group,
            "Invited user"
        );
        Ok(Provisioned::created(user))
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session> {
        self.client
            .login(
                &self.endpoints.login,
                &Self::login_body(email, password),
                &self.artifact,
                LoginRole::EndUser,
            )
            .await
    }
}
