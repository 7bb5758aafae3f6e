//! Gateway configuration sourced from environment variables

use anyhow::{Context, Result};
use federation_bridge::adapters::{ChatAdapter, WorkflowAdapter};
use federation_bridge::{AdapterConfig, AdminCredentials, FederationBridge, DEFAULT_HTTP_TIMEOUT};
use federation_core::AssertionVerifier;
use std::time::Duration;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(30);

/// Connection details for one downstream system
#[derive(Debug, Clone)]
pub struct SystemConfig {
    pub base_url: String,
    pub admin: AdminCredentials,
}

#[derive(Clone)]
pub struct GatewayConfig {
    pub port: u16,
    shared_secret: String,
    pub http_timeout: Duration,
    pub request_deadline: Duration,
    pub workflow: Option<SystemConfig>,
    pub chat: Option<SystemConfig>,
}

impl std::fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("port", &self.port)
            .field("shared_secret", &"<redacted>")
            .field("http_timeout", &self.http_timeout)
            .field("request_deadline", &self.request_deadline)
            .field("workflow", &self.workflow)
            .field("chat", &self.chat)
            .finish()
    }
}

impl GatewayConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; `from_env` passes the process environment
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = match lookup("FEDERATION_PORT") {
            Some(value) => value.parse().with_context(|| "parse FEDERATION_PORT")?,
            None => DEFAULT_PORT,
        };
        let shared_secret = lookup("FEDERATION_SHARED_SECRET")
            .filter(|value| !value.is_empty())
            .context("FEDERATION_SHARED_SECRET must be set")?;
        let http_timeout = seconds(&lookup, "FEDERATION_HTTP_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);
        let request_deadline = seconds(&lookup, "FEDERATION_REQUEST_DEADLINE_SECS")?
            .unwrap_or(DEFAULT_REQUEST_DEADLINE);

        Ok(Self {
            port,
            shared_secret,
            http_timeout,
            request_deadline,
            workflow: system(&lookup, "WORKFLOW")?,
            chat: system(&lookup, "CHAT")?,
        })
    }

    /// Names of the systems that have a base URL configured
    pub fn enabled_systems(&self) -> Vec<&'static str> {
        let mut systems = Vec::new();
        if self.workflow.is_some() {
            systems.push(federation_bridge::adapters::WORKFLOW_SYSTEM);
        }
        if self.chat.is_some() {
            systems.push(federation_bridge::adapters::CHAT_SYSTEM);
        }
        systems
    }

    pub fn build_bridge(&self) -> Result<FederationBridge> {
        let mut bridge = FederationBridge::new(AssertionVerifier::new(&self.shared_secret));

        if let Some(workflow) = &self.workflow {
            let adapter = WorkflowAdapter::new(self.adapter_config(workflow))
                .with_context(|| "build workflow adapter")?;
            bridge.register_adapter(adapter);
        }
        if let Some(chat) = &self.chat {
            let adapter =
                ChatAdapter::new(self.adapter_config(chat)).with_context(|| "build chat adapter")?;
            bridge.register_adapter(adapter);
        }

        Ok(bridge)
    }

    fn adapter_config(&self, system: &SystemConfig) -> AdapterConfig {
        AdapterConfig::new(system.base_url.clone(), system.admin.clone())
            .with_timeout(self.http_timeout)
    }
}

fn seconds<F>(lookup: &F, key: &str) -> Result<Option<Duration>>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| {
            value
                .parse::<u64>()
                .map(Duration::from_secs)
                .with_context(|| format!("parse {key}"))
        })
        .transpose()
}

fn system<F>(lookup: &F, prefix: &str) -> Result<Option<SystemConfig>>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(base_url) = lookup(&format!("FEDERATION_{prefix}_URL")).filter(|v| !v.is_empty())
    else {
        return Ok(None);
    };
    let email = lookup(&format!("FEDERATION_{prefix}_ADMIN_EMAIL"))
        .with_context(|| format!("FEDERATION_{prefix}_ADMIN_EMAIL must be set"))?;
    let password = lookup(&format!("FEDERATION_{prefix}_ADMIN_PASSWORD"))
        .with_context(|| format!("FEDERATION_{prefix}_ADMIN_PASSWORD must be set"))?;

    Ok(Some(SystemConfig {
        base_url,
        admin: AdminCredentials::new(email, password),
    }))
}
