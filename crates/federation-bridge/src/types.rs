//! Core types for the Federation Bridge

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout applied to every outbound call unless configured otherwise
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Owner/administrator credentials of one downstream system
#[derive(Clone, PartialEq, Eq)]
pub struct AdminCredentials {
    pub email: String,
    password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials")
            .field("email", &self.email)
            .field("password", &"[redacted]")
            .finish()
    }
}

impl AdminCredentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub(crate) fn password(&self) -> &str {
        &self.password
    }
}

/// Everything an adapter needs to reach its system
///
/// Injected per adapter instance; there is no process-wide client state.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Base URL, e.g. `https://workflow.internal`
    pub base_url: String,
    pub admin: AdminCredentials,
    /// Per-call timeout for every request this adapter makes
    pub timeout: Duration,
}

impl AdapterConfig {
    pub fn new(base_url: impl Into<String>, admin: AdminCredentials) -> Self {
        Self {
            base_url: base_url.into(),
            admin,
            timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Where a system hands back its session token after login
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionArtifact {
    /// `Set-Cookie: {name}=...`; replayed as a `Cookie` header
    Cookie { name: String },
    /// Response header `{header}: ...`; replayed as `Authorization: Bearer`
    Token { header: String },
}

impl SessionArtifact {
    pub fn cookie(name: impl Into<String>) -> Self {
        SessionArtifact::Cookie { name: name.into() }
    }

    pub fn token(header: impl Into<String>) -> Self {
        SessionArtifact::Token {
            header: header.into(),
        }
    }
}

/// Opaque session credential returned by a downstream login
///
/// Never persisted by the bridge; re-derived on each invocation.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub system: String,
    pub artifact: SessionArtifact,
    token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("system", &self.system)
            .field("artifact", &self.artifact)
            .field("token", &"[redacted]")
            .finish()
    }
}

impl Session {
    pub fn new(system: impl Into<String>, artifact: SessionArtifact, token: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            artifact,
            token: token.into(),
        }
    }

    /// The raw token, for handing back to the caller
    pub fn expose_token(&self) -> &str {
        &self.token
    }

    /// `Set-Cookie`/header-style rendering, e.g. `n8n-auth=abc`
    pub fn header_value(&self) -> String {
        match &self.artifact {
            SessionArtifact::Cookie { name } => format!("{}={}", name, self.token),
            SessionArtifact::Token { .. } => format!("Bearer {}", self.token),
        }
    }
}

/// A user record as held by a downstream system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownstreamUser {
    pub system: String,
    /// Downstream primary key, stringified
    pub id: String,
    pub email: String,
    /// The record exactly as the downstream returned it
    pub record: serde_json::Value,
}

impl DownstreamUser {
    /// Extract id and email from a raw record; `None` if either is missing
    pub fn from_record(system: &str, record: serde_json::Value) -> Option<Self> {
        let id = match record.get("id")? {
            serde_json::Value::String(id) if !id.is_empty() => id.clone(),
            serde_json::Value::Number(id) => id.to_string(),
            _ => return None,
        };
        let email = record.get("email")?.as_str()?.to_string();
        Some(Self {
            system: system.to_string(),
            id,
            email,
            record,
        })
    }

    /// Case-insensitive email comparison
    pub fn email_matches(&self, email: &str) -> bool {
        emails_match(&self.email, email)
    }
}

pub(crate) fn emails_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}

/// What `ensure_user` had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProvisionAction {
    Created,
    Existing,
}

/// Result of a successful `ensure_user`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provisioned {
    pub user: DownstreamUser,
    pub action: ProvisionAction,
}

impl Provisioned {
    pub fn created(user: DownstreamUser) -> Self {
        Self {
            user,
            action: ProvisionAction::Created,
        }
    }

    pub fn existing(user: DownstreamUser) -> Self {
        Self {
            user,
            action: ProvisionAction::Existing,
        }
    }
}
