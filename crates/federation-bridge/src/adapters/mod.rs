//! Downstream adapters, one per provisioned system

pub mod chat;
mod client;
pub mod mock;
pub mod workflow;

pub use crate::types::{AdapterConfig, AdminCredentials};
pub use chat::{ChatAdapter, ChatEndpoints, CHAT_PAGE_SIZE, CHAT_SESSION_HEADER, CHAT_SYSTEM};
pub use mock::MockAdapter;
pub use workflow::{WorkflowAdapter, WorkflowEndpoints, WORKFLOW_SESSION_COOKIE, WORKFLOW_SYSTEM};
