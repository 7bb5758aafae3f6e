//! HTTP plumbing shared by the REST adapters
//!
//! One `DownstreamClient` per adapter. It owns the admin credentials and the
//! `reqwest::Client` carrying the uniform per-call timeout, and it turns every
//! failure into a [`BridgeError`] that names the system.

use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{BridgeError, Result};
use crate::types::{AdapterConfig, AdminCredentials, Session, SessionArtifact};

/// Response bodies quoted in errors are cut to this many characters
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Who is logging in; decides which error a rejected login becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginRole {
    Admin,
    EndUser,
}

pub(crate) struct DownstreamClient {
    system: String,
    base_url: String,
    admin: AdminCredentials,
    http: reqwest::Client,
}

impl DownstreamClient {
    pub(crate) fn new(system: impl Into<String>, config: AdapterConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| BridgeError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            system: system.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            admin: config.admin,
            http,
        })
    }

    pub(crate) fn system(&self) -> &str {
        &self.system
    }

    pub(crate) fn admin(&self) -> &AdminCredentials {
        &self.admin
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// POST credentials to a login endpoint and pull the session artifact out
    pub(crate) async fn login(
        &self,
        path: &str,
        body: &Value,
        artifact: &SessionArtifact,
        role: LoginRole,
    ) -> Result<Session> {
        debug!(system = %self.system, role = ?role, "Logging in to downstream");

        let response = self.send(self.http.post(self.url(path)).json(body)).await?;
        let status = response.status();

        if !status.is_success() {
            let reason = match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    format!("credentials rejected (HTTP {})", status.as_u16())
                }
                _ => format!("HTTP {}", status.as_u16()),
            };
            return Err(self.login_error(role, reason));
        }

        let token = extract_artifact(&response, artifact).ok_or_else(|| {
            self.login_error(role, format!("no {} in login response", describe(artifact)))
        })?;

        Ok(Session::new(self.system.clone(), artifact.clone(), token))
    }

    /// Log in with this adapter's own admin credentials
    pub(crate) async fn admin_login(
        &self,
        path: &str,
        body: &Value,
        artifact: &SessionArtifact,
    ) -> Result<Session> {
        self.login(path, body, artifact, LoginRole::Admin).await
    }

    pub(crate) async fn get_json(&self, path: &str, session: &Session) -> Result<Value> {
        let request = authorize(self.http.get(self.url(path)), session);
        self.read_json(self.send(request).await?).await
    }

    pub(crate) async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        session: &Session,
        body: &B,
    ) -> Result<Value> {
        let request = authorize(self.http.post(self.url(path)).json(body), session);
        self.read_json(self.send(request).await?).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        request
            .send()
            .await
            .map_err(|e| BridgeError::from_transport(&self.system, e))
    }

    async fn read_json(&self, response: Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| BridgeError::from_transport(&self.system, e))?;

        if !status.is_success() {
            return Err(BridgeError::ProvisioningFailed {
                system: self.system.clone(),
                status: status.as_u16(),
                body: self.diagnostic_body(&body),
            });
        }

        if body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| BridgeError::ProvisioningFailed {
            system: self.system.clone(),
            status: status.as_u16(),
            body: format!("unparseable response ({}): {}", e, self.diagnostic_body(&body)),
        })
    }

    fn login_error(&self, role: LoginRole, reason: String) -> BridgeError {
        let system = self.system.clone();
        match role {
            LoginRole::Admin => BridgeError::UpstreamAuthFailed { system, reason },
            LoginRole::EndUser => BridgeError::SessionEstablishFailed { system, reason },
        }
    }

    /// Truncated body with the admin password scrubbed out
    pub(crate) fn diagnostic_body(&self, body: &str) -> String {
        let scrubbed = match self.admin.password() {
            "" => body.to_string(),
            password => body.replace(password, "[redacted]"),
        };
        truncate_chars(&scrubbed, MAX_ERROR_BODY_CHARS)
    }
}

fn authorize(request: RequestBuilder, session: &Session) -> RequestBuilder {
    match &session.artifact {
        SessionArtifact::Cookie { name } => {
            request.header(COOKIE, format!("{}={}", name, session.expose_token()))
        }
        SessionArtifact::Token { .. } => {
            request.header(AUTHORIZATION, format!("Bearer {}", session.expose_token()))
        }
    }
}

fn describe(artifact: &SessionArtifact) -> String {
    match artifact {
        SessionArtifact::Cookie { name } => format!("'{}' cookie", name),
        SessionArtifact::Token { header } => format!("'{}' header", header),
    }
}

fn extract_artifact(response: &Response, artifact: &SessionArtifact) -> Option<String> {
    match artifact {
        SessionArtifact::Cookie { name } => response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .find_map(|cookie| cookie_value(cookie, name)),
        SessionArtifact::Token { header } => response
            .headers()
            .get(header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(String::from),
    }
}

/// Value of `name` in a `Set-Cookie` header, ignoring attributes
pub(crate) fn cookie_value(set_cookie: &str, name: &str) -> Option<String> {
    let pair = set_cookie.split(';').next()?.trim();
    let (key, value) = pair.split_once('=')?;
    (key.trim() == name && !value.trim().is_empty()).then(|| value.trim().to_string())
}

pub(crate) fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

/// Flatten the common list-response shapes into individual user records
///
/// Accepts a bare array, `{"data": [...]}`, or a single object. Entries of
/// the form `{"user": {...}}` are unwrapped.
pub(crate) fn user_records(value: Value) -> Vec<Value> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Array(items)) => items,
            Some(other) => vec![other],
            None => vec![Value::Object(map)],
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .map(|item| match item {
            Value::Object(mut map) if map.get("user").is_some_and(Value::is_object) => {
                map.remove("user").unwrap_or(Value::Null)
            }
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cookie_value() {
        assert_eq!(
            cookie_value("n8n-auth=abc.def; Path=/; HttpOnly", "n8n-auth"),
            Some("abc.def".to_string())
        );
        assert_eq!(cookie_value("other=1; Path=/", "n8n-auth"), None);
        assert_eq!(cookie_value("n8n-auth=; Max-Age=0", "n8n-auth"), None);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("ééééé", 2), "éé…");
    }

    #[test]
    fn test_user_records_shapes() {
        assert_eq!(user_records(json!([{"id": 1}, {"id": 2}])).len(), 2);
        assert_eq!(user_records(json!({"data": [{"id": 1}]})).len(), 1);
        assert_eq!(user_records(json!({"id": 1, "email": "a@b"})), vec![json!({"id": 1, "email": "a@b"})]);
        assert_eq!(
            user_records(json!({"data": [{"user": {"id": "x"}, "error": ""}]})),
            vec![json!({"id": "x"})]
        );
        assert!(user_records(Value::Null).is_empty());
    }

    #[test]
    fn test_diagnostic_body_scrubs_password() {
        let client = DownstreamClient::new(
            "workflow",
            AdapterConfig::new(
                "http://127.0.0.1:1",
                AdminCredentials::new("owner@example.com", "s3cret-pass"),
            ),
        )
        .unwrap();

        let body = client.diagnostic_body(r#"{"message":"bad password s3cret-pass"}"#);
        assert!(!body.contains("s3cret-pass"));
        assert!(body.contains("[redacted]"));
        assert_eq!(client.url("/rest/users"), "http://127.0.0.1:1/rest/users");
    }
}
