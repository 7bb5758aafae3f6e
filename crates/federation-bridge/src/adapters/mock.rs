//! Mock Downstream Adapter
//!
//! In-memory stand-in for a downstream system. Keeps its own user table,
//! counts creations and can be switched into a failing mode.

use async_trait::async_trait;
use federation_core::{CanonicalIdentity, ChatPayload};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

use crate::bridge::DownstreamAdapter;
use crate::error::{BridgeError, Result};
use crate::types::{DownstreamUser, Provisioned, Session, SessionArtifact};

#[derive(Default)]
struct MockState {
    users: Vec<DownstreamUser>,
    passwords: HashMap<String, String>,
    failure: Option<BridgeError>,
}

/// Mock adapter for testing
pub struct MockAdapter {
    system: String,
    state: Mutex<MockState>,
    creations: AtomicUsize,
}

impl MockAdapter {
    pub fn new(system: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            state: Mutex::new(MockState::default()),
            creations: AtomicUsize::new(0),
        }
    }

    /// Make every call fail with `error`
    pub fn failing_with(self, error: BridgeError) -> Self {
        self.state().failure = Some(error);
        self
    }

    /// Seed an existing user
    pub fn with_user(self, id: impl Into<String>, email: impl Into<String>) -> Self {
        let (id, email): (String, String) = (id.into(), email.into());
        let record = serde_json::json!({ "id": id, "email": email });
        if let Some(user) = DownstreamUser::from_record(&self.system, record) {
            self.state().users.push(user);
        }
        self
    }

    /// Accept `password` for end-user logins as `email`
    pub fn with_password(self, email: impl Into<String>, password: impl Into<String>) -> Self {
        self.state().passwords.insert(email.into(), password.into());
        self
    }

    /// Number of users created so far
    pub fn creations(&self) -> usize {
        self.creations.load(Ordering::SeqCst)
    }

    pub fn users(&self) -> Vec<DownstreamUser> {
        self.state().users.clone()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DownstreamAdapter for MockAdapter {
    fn system(&self) -> &str {
        &self.system
    }

    fn description(&self) -> &str {
        "mock downstream adapter"
    }

    async fn ensure_user(&self, identity: &CanonicalIdentity) -> Result<Provisioned> {
        let mut state = self.state();
        if let Some(error) = &state.failure {
            return Err(error.clone());
        }
        if identity.email.trim().is_empty() {
            return Err(BridgeError::IncompleteIdentity {
                system: self.system.clone(),
                missing: "email".into(),
            });
        }

        if let Some(existing) = state
            .users
            .iter()
            .find(|user| user.email_matches(&identity.email))
        {
            return Ok(Provisioned::existing(existing.clone()));
        }

        let payload = ChatPayload::from_identity(identity);
        let id = format!("mock-{}", self.creations.fetch_add(1, Ordering::SeqCst) + 1);
        let record = serde_json::json!({
            "id": id,
            "email": payload.email,
            "username": payload.handle,
            "nickname": payload.display_name,
        });
        let user = DownstreamUser::from_record(&self.system, record)
            .ok_or_else(|| BridgeError::Internal("mock record missing id or email".into()))?;
        state.users.push(user.clone());

        Ok(Provisioned::created(user))
    }

    async fn create_session(&self, email: &str, password: &str) -> Result<Session> {
        let state = self.state();
        if let Some(error) = &state.failure {
            return Err(error.clone());
        }

        match state.passwords.get(email) {
            Some(expected) if expected == password => Ok(Session::new(
                self.system.clone(),
                SessionArtifact::cookie("mock-session"),
                format!("session-for-{}", email),
            )),
            _ => Err(BridgeError::SessionEstablishFailed {
                system: self.system.clone(),
                reason: "credentials rejected (HTTP 401)".into(),
            }),
        }
    }
}
