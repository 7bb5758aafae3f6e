//! Chat System Adapter
//!
//! Creates users directly through the chat system's admin API. The user
//! listing is paged. Sessions are returned in a `Token` response header and
//! replayed as bearer tokens.

use async_trait::async_trait;
use federation_core::{CanonicalIdentity, ChatPayload};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::adapters::client::{user_records, DownstreamClient, LoginRole};
use crate::bridge::DownstreamAdapter;
use crate::error::{BridgeError, Result};
use crate::types::{AdapterConfig, DownstreamUser, Provisioned, Session, SessionArtifact};

/// Default adapter name
pub const CHAT_SYSTEM: &str = "chat";

/// Response header carrying the session token
pub const CHAT_SESSION_HEADER: &str = "Token";

/// Largest page the chat system serves
pub const CHAT_PAGE_SIZE: usize = 200;

/// Lookups give up after this many full pages
const MAX_LOOKUP_PAGES: usize = 1000;

/// REST paths of the chat system, relative to its base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEndpoints {
    pub login: String,
    /// Paged listing; `page` and `per_page` are appended as query parameters
    pub users: String,
    pub create: String,
    pub per_page: usize,
}

impl Default for ChatEndpoints {
    fn default() -> Self {
        Self {
            login: "/api/v4/users/login".into(),
            users: "/api/v4/users".into(),
            create: "/api/v4/users".into(),
            per_page: CHAT_PAGE_SIZE,
        }
    }
}

/// Adapter for the chat system
pub struct ChatAdapter {
    client: DownstreamClient,
    endpoints: ChatEndpoints,
    artifact: SessionArtifact,
}

impl ChatAdapter {
    pub fn new(config: AdapterConfig) -> Result<Self> {
        Self::named(CHAT_SYSTEM, config)
    }

    pub fn named(system: impl Into<String>, config: AdapterConfig) -> Result<Self> {
        Ok(Self {
            client: DownstreamClient::new(system, config)?,
            endpoints: ChatEndpoints::default(),
            artifact: SessionArtifact::token(CHAT_SESSION_HEADER),
        })
    }

    pub fn with_endpoints(mut self, endpoints: ChatEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    fn login_body(login_id: &str, password: &str) -> Value {
        json!({ "login_id": login_id, "password": password })
    }

    fn matching(&self, records: Vec<Value>, email: &str) -> Option<DownstreamUser> {
        records
            .into_iter()
            .filter_map(|record| DownstreamUser::from_record(self.client.system(), record))
            .find(|user| user.email_matches(email))
    }

    /// Walk the listing page by page until a match or a short page
    async fn find_user(&self, admin: &Session, email: &str) -> Result<Option<DownstreamUser>> {
        let per_page = self.endpoints.per_page.max(1);
        for page in 0..MAX_LOOKUP_PAGES {
            let path = format!("{}?page={}&per_page={}", self.endpoints.users, page, per_page);
            let records = user_records(self.client.get_json(&path, admin).await?);
            let last_page = records.len() < per_page;

            if let Some(found) = self.matching(records, email) {
                return Ok(Some(found));
            }
            if last_page {
                return Ok(None);
            }
        }

        Err(BridgeError::ProvisioningFailed {
            system: self.system().to_string(),
            status: 200,
            body: format!("user listing did not end within {} pages", MAX_LOOKUP_PAGES),
        })
    }
}

#[async_trait]
impl DownstreamAdapter for ChatAdapter {
    fn system(&self) -> &str {
        self.client.system()
    }

    fn description(&self) -> &str {
        "chat system adapter"
    }

    async fn ensure_user(&self, identity: &CanonicalIdentity) -> Result<Provisioned> {
        let payload = ChatPayload::from_identity(identity);
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

        let created = self
            .client
            .post_json(&self.endpoints.create, &admin, &[&payload])
            .await?;
        let user = self
            .matching(user_records(created), &payload.email)
            .ok_or_else(|| BridgeError::ProvisioningFailed {
                system: self.system().to_string(),
                status: 200,
                body: "create response contained no record for the new email".into(),
            })?;

        info!(
            system = %self.system(),
            user_id = %user.id,
            subject = %identity.subject,
            handle = %payload.handle,
            "Created user"
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
