//! Claim set carried by a verified assertion, plus the proxy's side-channel headers

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Header carrying the signed assertion
pub const ASSERTION_HEADER: &str = "X-Pomerium-Jwt-Assertion";
/// Fallback header for the email claim
pub const EMAIL_HEADER: &str = "X-Pomerium-Claim-Email";
/// Fallback header for the display name claim
pub const NAME_HEADER: &str = "X-Pomerium-Claim-Name";
/// Fallback header for the username claim
pub const USER_HEADER: &str = "X-Pomerium-Claim-User";

/// Claims extracted from a verified assertion
///
/// Only `subject` is guaranteed non-empty. Every other string is left empty
/// when absent; defaulting happens in the identity mapper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireClaims")]
pub struct ClaimSet {
    /// Issuer (iss)
    #[serde(rename = "iss")]
    pub issuer: String,

    /// Stable opaque subject id (sub)
    #[serde(rename = "sub")]
    pub subject: String,

    pub email: String,

    /// Display name
    pub name: String,

    /// Preferred username
    #[serde(rename = "user")]
    pub username: String,

    /// Group memberships in issuer order, duplicates kept
    pub groups: Vec<String>,

    /// Issued-at, seconds since epoch
    #[serde(rename = "iat", skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<i64>,

    /// Expiry, seconds since epoch
    #[serde(rename = "exp", skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// Payload as issued by the proxy; every claim may be absent or null
#[derive(Debug, Deserialize)]
struct WireClaims {
    #[serde(default, deserialize_with = "null_as_default")]
    iss: String,
    #[serde(default, deserialize_with = "null_as_default")]
    sub: String,
    #[serde(default, deserialize_with = "null_as_default")]
    email: String,
    #[serde(default, deserialize_with = "null_as_default")]
    name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    user: String,
    #[serde(default, deserialize_with = "null_as_default")]
    preferred_username: String,
    #[serde(default, deserialize_with = "null_as_default")]
    groups: Vec<String>,
    #[serde(default)]
    iat: Option<i64>,
    #[serde(default)]
    exp: Option<i64>,
}

impl From<WireClaims> for ClaimSet {
    fn from(wire: WireClaims) -> Self {
        let username = if wire.preferred_username.is_empty() {
            wire.user
        } else {
            wire.preferred_username
        };
        Self {
            issuer: wire.iss,
            subject: wire.sub,
            email: wire.email,
            name: wire.name,
            username,
            groups: wire.groups,
            issued_at: wire.iat,
            expires_at: wire.exp,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl ClaimSet {
    /// Create a claim set with only a subject
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            ..Self::default()
        }
    }

    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = username.into();
        self
    }

    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_times(mut self, issued_at: i64, expires_at: i64) -> Self {
        self.issued_at = Some(issued_at);
        self.expires_at = Some(expires_at);
        self
    }

    /// Expiry as a timestamp, if present and representable
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        self.expires_at
            .and_then(|exp| Utc.timestamp_opt(exp, 0).single())
    }

    /// Fill empty email/name/username from the proxy's side-channel headers
    ///
    /// Claims already present always win. Blank header values are ignored.
    pub fn apply_fallback(&mut self, fallback: &FallbackHeaders) {
        fill_if_empty(&mut self.email, fallback.email.as_deref());
        fill_if_empty(&mut self.name, fallback.name.as_deref());
        fill_if_empty(&mut self.username, fallback.user.as_deref());
    }
}

fn fill_if_empty(field: &mut String, header: Option<&str>) {
    if !field.trim().is_empty() {
        return;
    }
    if let Some(value) = header.map(str::trim).filter(|v| !v.is_empty()) {
        *field = value.to_string();
    }
}

/// Per-claim headers set by the same proxy that signed the assertion
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FallbackHeaders {
    pub email: Option<String>,
    pub name: Option<String>,
    pub user: Option<String>,
}

impl FallbackHeaders {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none() && self.user.is_none()
    }
}

/// Raw header values of one inbound request, already extracted by the HTTP layer
#[derive(Debug, Clone, Default)]
pub struct InboundAssertion {
    /// Value of [`ASSERTION_HEADER`], if the header was present
    pub assertion: Option<String>,
    pub fallback: FallbackHeaders,
}

impl InboundAssertion {
    pub fn new(assertion: impl Into<String>) -> Self {
        Self {
            assertion: Some(assertion.into()),
            fallback: FallbackHeaders::default(),
        }
    }

    /// A request that carried no assertion header at all
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn with_fallback(mut self, fallback: FallbackHeaders) -> Self {
        self.fallback = fallback;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_and_null_claims_become_empty() {
        let claims: ClaimSet =
            serde_json::from_str(r#"{"sub":"123","email":null,"groups":null}"#).unwrap();

        assert_eq!(claims.subject, "123");
        assert_eq!(claims.email, "");
        assert_eq!(claims.name, "");
        assert!(claims.groups.is_empty());
        assert!(claims.expires_at.is_none());
    }

    #[test]
    fn test_preferred_username_wins_over_user() {
        let claims: ClaimSet =
            serde_json::from_str(r#"{"sub":"1","preferred_username":"sam"}"#).unwrap();
        assert_eq!(claims.username, "sam");

        let claims: ClaimSet =
            serde_json::from_str(r#"{"sub":"1","user":"uid-1","preferred_username":"sam"}"#)
                .unwrap();
        assert_eq!(claims.username, "sam");

        let claims: ClaimSet = serde_json::from_str(r#"{"sub":"1","user":"Sam.Ex"}"#).unwrap();
        assert_eq!(claims.username, "Sam.Ex");
    }

    #[test]
    fn test_group_order_preserved() {
        let claims: ClaimSet =
            serde_json::from_str(r#"{"sub":"1","groups":["b","a","b"]}"#).unwrap();
        assert_eq!(claims.groups, vec!["b", "a", "b"]);
    }

    #[test]
    fn test_fallback_fills_only_empty_fields() {
        let mut claims = ClaimSet::new("1").with_email("jane@example.com");
        claims.apply_fallback(&FallbackHeaders {
            email: Some("other@example.com".into()),
            name: Some("  Jane Example ".into()),
            user: Some("   ".into()),
        });

        assert_eq!(claims.email, "jane@example.com");
        assert_eq!(claims.name, "Jane Example");
        assert_eq!(claims.username, "");
    }

    #[test]
    fn test_expiry_timestamp() {
        let claims = ClaimSet::new("1").with_times(1_700_000_000, 1_700_000_600);
        let exp = claims.expires_at_utc().unwrap();
        assert_eq!(exp.timestamp(), 1_700_000_600);
    }
}
