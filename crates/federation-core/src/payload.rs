//! Per-downstream user payloads derived from a [`CanonicalIdentity`]
//!
//! Each downstream system gets its own deterministic projection of the same
//! identity. Payload construction never fails.

use serde::{Deserialize, Serialize};

use crate::identity::{title_case_handle, CanonicalIdentity};

/// Substring that marks a group as privileged, matched case-insensitively
const ADMIN_GROUP_MARKER: &str = "admin";

/// Payload for the chat system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatPayload {
    pub email: String,
    #[serde(rename = "nickname")]
    pub display_name: String,
    #[serde(rename = "username")]
    pub handle: String,
}

impl ChatPayload {
    pub fn from_identity(identity: &CanonicalIdentity) -> Self {
        Self {
            email: identity.email.clone(),
            display_name: identity.display_name_or_handle(),
            handle: identity.handle.clone(),
        }
    }
}

/// Role of a workflow-engine user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowRole {
    Admin,
    Member,
}

impl std::fmt::Display for WorkflowRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowRole::Admin => write!(f, "admin"),
            WorkflowRole::Member => write!(f, "member"),
        }
    }
}

/// Outcome of role inference, with the group that decided it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDecision {
    pub role: WorkflowRole,
    pub matched_group: Option<String>,
}

/// Infer the workflow role from group memberships
///
/// The first group whose name contains "admin" (any case) makes the user an
/// admin; otherwise the user is a member.
pub fn infer_role(groups: &[String]) -> RoleDecision {
    match groups
        .iter()
        .find(|group| group.to_lowercase().contains(ADMIN_GROUP_MARKER))
    {
        Some(group) => RoleDecision {
            role: WorkflowRole::Admin,
            matched_group: Some(group.clone()),
        },
        None => RoleDecision {
            role: WorkflowRole::Member,
            matched_group: None,
        },
    }
}

/// Payload for the workflow engine
///
/// `external_id` carries the canonical subject and keys idempotent upserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowPayload {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub display_name: String,
    pub role: WorkflowRole,
    pub external_id: String,
}

impl WorkflowPayload {
    pub fn from_identity(identity: &CanonicalIdentity) -> Self {
        let (first, last) = split_name(&identity.display_name);
        let first_name = if first.is_empty() {
            title_case_handle(&identity.handle)
        } else {
            first
        };
        let display_name = if identity.display_name.is_empty() {
            first_name.clone()
        } else {
            identity.display_name.clone()
        };

        Self {
            email: identity.email.clone(),
            first_name,
            last_name: last,
            display_name,
            role: infer_role(&identity.groups).role,
            external_id: identity.subject.clone(),
        }
    }
}

/// Split on whitespace: first token, then the remaining tokens joined by spaces
fn split_name(display_name: &str) -> (String, String) {
    let mut tokens = display_name.split_whitespace();
    let first = tokens.next().unwrap_or("").to_string();
    let last = tokens.collect::<Vec<_>>().join(" ");
    (first, last)
}
