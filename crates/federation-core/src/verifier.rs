//! Assertion verification
//!
//! The proxy forwards a three-segment `header.payload.signature` token. Each
//! segment may use the standard or URL-safe base64 alphabet, padded or not.
//! Only HS256 is accepted; `none` and asymmetric algorithms are rejected
//! before the signature is even looked at.
//!
//! Key types:
//! - `SharedSecret`: the configured secret, decoded once
//! - `AssertionVerifier`: verification context built around one secret

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD, URL_SAFE};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::claims::{ClaimSet, InboundAssertion};
use crate::error::{IdentityError, Result};

/// The single supported signing algorithm
pub const SUPPORTED_ALGORITHM: &str = "HS256";

type HmacSha256 = Hmac<Sha256>;

const ANY_PADDING: GeneralPurposeConfig =
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent);

const STANDARD_ANY_PADDING: GeneralPurpose = GeneralPurpose::new(&alphabet::STANDARD, ANY_PADDING);
const URL_SAFE_ANY_PADDING: GeneralPurpose = GeneralPurpose::new(&alphabet::URL_SAFE, ANY_PADDING);

/// Segment alphabets, in the order they are tried
const SEGMENT_ENGINES: [&GeneralPurpose; 2] = [&STANDARD_ANY_PADDING, &URL_SAFE_ANY_PADDING];

/// How the configured secret string was interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretEncoding {
    Base64Standard,
    Base64UrlSafe,
    Raw,
}

/// Shared HMAC key, decoded from its configured string form
#[derive(Clone)]
pub struct SharedSecret {
    key: Vec<u8>,
    encoding: SecretEncoding,
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret")
            .field("encoding", &self.encoding)
            .field("key", &"[redacted]")
            .finish()
    }
}

impl SharedSecret {
    /// Decode a configured secret
    ///
    /// Tried in order: standard base64, URL-safe base64, raw bytes. Both
    /// base64 forms require canonical padding so that short plain-text
    /// secrets are not mistaken for base64.
    pub fn decode(configured: &str) -> Self {
        let candidates = [
            (SecretEncoding::Base64Standard, &STANDARD),
            (SecretEncoding::Base64UrlSafe, &URL_SAFE),
        ];

        candidates
            .iter()
            .find_map(|(encoding, engine)| {
                engine
                    .decode(configured)
                    .ok()
                    .filter(|key| !key.is_empty())
                    .map(|key| Self {
                        key,
                        encoding: *encoding,
                    })
            })
            .unwrap_or_else(|| Self {
                key: configured.as_bytes().to_vec(),
                encoding: SecretEncoding::Raw,
            })
    }

    /// Use already-decoded key bytes
    pub fn from_bytes(key: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            encoding: SecretEncoding::Raw,
        }
    }

    pub fn encoding(&self) -> SecretEncoding {
        self.encoding
    }

    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }
}

#[derive(Debug, Deserialize)]
struct AssertionHeader {
    #[serde(default)]
    alg: Option<String>,
}

/// Decode one token segment, trying each alphabet in order
fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    SEGMENT_ENGINES
        .iter()
        .find_map(|engine| engine.decode(segment).ok())
}

/// Verification context: one decoded secret, reused for every request
#[derive(Debug, Clone)]
pub struct AssertionVerifier {
    secret: SharedSecret,
    expiry_leeway: Option<Duration>,
}

impl AssertionVerifier {
    /// Build a verifier from the configured secret string
    pub fn new(configured_secret: &str) -> Self {
        Self::with_secret(SharedSecret::decode(configured_secret))
    }

    pub fn with_secret(secret: SharedSecret) -> Self {
        debug!(encoding = ?secret.encoding(), "Assertion verifier initialised");
        Self {
            secret,
            expiry_leeway: None,
        }
    }

    /// Also reject assertions whose `exp` is older than `leeway`
    pub fn with_expiry_check(mut self, leeway: Duration) -> Self {
        self.expiry_leeway = Some(leeway);
        self
    }

    pub fn secret_encoding(&self) -> SecretEncoding {
        self.secret.encoding()
    }

    /// Verify a raw assertion header value and return its claims
    ///
    /// Fallback headers are not consulted here; see [`Self::verify_request`].
    pub fn verify(&self, header_value: Option<&str>) -> Result<ClaimSet> {
        let token = header_value
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or(IdentityError::MissingAssertion)?;

        let segments: Vec<&str> = token.split('.').collect();
        let [header_b64, payload_b64, signature_b64] = segments.as_slice() else {
            return Err(IdentityError::invalid(format!(
                "expected 3 segments, found {}",
                segments.len()
            )));
        };

        let header_bytes = decode_segment(header_b64)
            .ok_or_else(|| IdentityError::invalid("header segment is not base64"))?;
        let payload_bytes = decode_segment(payload_b64)
            .ok_or_else(|| IdentityError::invalid("payload segment is not base64"))?;
        let signature = decode_segment(signature_b64)
            .ok_or_else(|| IdentityError::invalid("signature segment is not base64"))?;

        let header: AssertionHeader = serde_json::from_slice(&header_bytes)
            .map_err(|e| IdentityError::invalid(format!("malformed header: {}", e)))?;

        match header.alg.as_deref() {
            Some(SUPPORTED_ALGORITHM) => {}
            Some(other) => return Err(IdentityError::UnsupportedAlgorithm(other.to_string())),
            None => return Err(IdentityError::UnsupportedAlgorithm("<missing>".into())),
        }

        self.check_signature(header_b64, payload_b64, &signature)?;

        let claims: ClaimSet = serde_json::from_slice(&payload_bytes)
            .map_err(|e| IdentityError::invalid(format!("malformed payload: {}", e)))?;

        if claims.subject.trim().is_empty() {
            return Err(IdentityError::invalid("assertion has no subject"));
        }

        if let Some(leeway) = self.expiry_leeway {
            self.check_expiry(&claims, leeway)?;
        }

        Ok(claims)
    }

    /// Verify the assertion of one request and enrich it from fallback headers
    pub fn verify_request(&self, request: &InboundAssertion) -> Result<ClaimSet> {
        let mut claims = self.verify(request.assertion.as_deref())?;
        claims.apply_fallback(&request.fallback);

        debug!(
            subject = %claims.subject,
            issuer = %claims.issuer,
            "Assertion verified"
        );

        Ok(claims)
    }

    /// HMAC over the segments exactly as received, compared in constant time
    fn check_signature(&self, header_b64: &str, payload_b64: &str, signature: &[u8]) -> Result<()> {
        let mut mac = HmacSha256::new_from_slice(self.secret.key())
            .map_err(|e| IdentityError::invalid(format!("unusable secret: {}", e)))?;
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        let expected = mac.finalize().into_bytes();

        if bool::from(expected.as_slice().ct_eq(signature)) {
            Ok(())
        } else {
            Err(IdentityError::invalid("signature mismatch"))
        }
    }

    fn check_expiry(&self, claims: &ClaimSet, leeway: Duration) -> Result<()> {
        let exp = claims
            .expires_at_utc()
            .ok_or_else(|| IdentityError::invalid("assertion has no expiry"))?;

        if exp + leeway < Utc::now() {
            return Err(IdentityError::invalid(format!(
                "assertion expired at {}",
                exp.to_rfc3339()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    const KEY: &[u8] = b"bridge-test-signing-key";

    fn sign_with(engine: &GeneralPurpose, key: &[u8], header: &str, payload: &str) -> String {
        let header_b64 = engine.encode(header);
        let payload_b64 = engine.encode(payload);
        let mut mac = HmacSha256::new_from_slice(key).unwrap();
        mac.update(format!("{}.{}", header_b64, payload_b64).as_bytes());
        let signature = engine.encode(mac.finalize().into_bytes());
        format!("{}.{}.{}", header_b64, payload_b64, signature)
    }

    fn sign(payload: &str) -> String {
        sign_with(&URL_SAFE_NO_PAD, KEY, r#"{"alg":"HS256","typ":"JWT"}"#, payload)
    }

    fn verifier() -> AssertionVerifier {
        AssertionVerifier::with_secret(SharedSecret::from_bytes(KEY))
    }

    #[test]
    fn test_valid_assertion() {
        let token = sign(r#"{"iss":"proxy","sub":"user-123","email":"jane@example.com","groups":["rave"]}"#);
        let claims = verifier().verify(Some(&token)).unwrap();

        assert_eq!(claims.subject, "user-123");
        assert_eq!(claims.issuer, "proxy");
        assert_eq!(claims.email, "jane@example.com");
        assert_eq!(claims.groups, vec!["rave"]);
    }

    #[test]
    fn test_standard_padded_segments_accepted() {
        let token = sign_with(&STANDARD, KEY, r#"{"alg":"HS256"}"#, r#"{"sub":"abc"}"#);
        assert!(verifier().verify(Some(&token)).is_ok());
    }

    #[test]
    fn test_missing_assertion() {
        assert_eq!(verifier().verify(None), Err(IdentityError::MissingAssertion));
        assert_eq!(verifier().verify(Some("  ")), Err(IdentityError::MissingAssertion));
    }

    #[test]
    fn test_wrong_segment_count() {
        let v = verifier();
        assert!(matches!(v.verify(Some("a.b")), Err(IdentityError::InvalidAssertion(_))));
        assert!(matches!(v.verify(Some("a.b.c.d")), Err(IdentityError::InvalidAssertion(_))));
    }

    #[test]
    fn test_undecodable_segment() {
        let token = sign(r#"{"sub":"1"}"#);
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = "!!not*base64!!";
        let result = verifier().verify(Some(&parts.join(".")));
        assert!(matches!(result, Err(IdentityError::InvalidAssertion(_))));
    }

    #[test]
    fn test_header_not_json() {
        let header = URL_SAFE_NO_PAD.encode("not json");
        let token = format!("{}.{}.{}", header, URL_SAFE_NO_PAD.encode("{}"), "c2ln");
        assert!(matches!(
            verifier().verify(Some(&token)),
            Err(IdentityError::InvalidAssertion(_))
        ));
    }

    #[test]
    fn test_alg_none_rejected() {
        let token = sign_with(&URL_SAFE_NO_PAD, KEY, r#"{"alg":"none"}"#, r#"{"sub":"1"}"#);
        assert_eq!(
            verifier().verify(Some(&token)),
            Err(IdentityError::UnsupportedAlgorithm("none".into()))
        );
    }

    #[test]
    fn test_asymmetric_and_missing_alg_rejected() {
        let token = sign_with(&URL_SAFE_NO_PAD, KEY, r#"{"alg":"RS256"}"#, r#"{"sub":"1"}"#);
        assert!(matches!(
            verifier().verify(Some(&token)),
            Err(IdentityError::UnsupportedAlgorithm(_))
        ));

        let token = sign_with(&URL_SAFE_NO_PAD, KEY, r#"{"typ":"JWT"}"#, r#"{"sub":"1"}"#);
        assert!(matches!(
            verifier().verify(Some(&token)),
            Err(IdentityError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = sign_with(&URL_SAFE_NO_PAD, b"other-key", r#"{"alg":"HS256"}"#, r#"{"sub":"1"}"#);
        assert_eq!(
            verifier().verify(Some(&token)),
            Err(IdentityError::InvalidAssertion("signature mismatch".into()))
        );
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = sign(r#"{"sub":"alice"}"#);
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], URL_SAFE_NO_PAD.encode(r#"{"sub":"mallory"}"#), parts[2]);
        assert!(matches!(
            verifier().verify(Some(&forged)),
            Err(IdentityError::InvalidAssertion(_))
        ));
    }

    #[test]
    fn test_missing_subject_rejected() {
        let token = sign(r#"{"email":"jane@example.com"}"#);
        assert!(matches!(
            verifier().verify(Some(&token)),
            Err(IdentityError::InvalidAssertion(_))
        ));
    }

    #[test]
    fn test_secret_decoding_priority() {
        assert_eq!(SharedSecret::decode("c2VjcmV0").encoding(), SecretEncoding::Base64Standard);
        assert_eq!(SharedSecret::decode("c2VjcmV0").key(), b"secret");

        let url_safe = SharedSecret::decode("-_8=");
        assert_eq!(url_safe.encoding(), SecretEncoding::Base64UrlSafe);
        assert_eq!(url_safe.key(), &[0xfb, 0xff]);

        let raw = SharedSecret::decode("plain text secret");
        assert_eq!(raw.encoding(), SecretEncoding::Raw);
        assert_eq!(raw.key(), b"plain text secret");
    }

    #[test]
    fn test_encoded_secret_verifies_raw_signature() {
        let configured = STANDARD.encode(KEY);
        let verifier = AssertionVerifier::new(&configured);
        assert_eq!(verifier.secret_encoding(), SecretEncoding::Base64Standard);
        assert!(verifier.verify(Some(&sign(r#"{"sub":"1"}"#))).is_ok());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let rendered = format!("{:?}", SharedSecret::from_bytes(KEY));
        assert!(!rendered.contains("bridge-test"));
        assert!(rendered.contains("redacted"));
    }

    #[test]
    fn test_expiry_check() {
        let now = Utc::now().timestamp();
        let expired = sign(&format!(r#"{{"sub":"1","iat":{},"exp":{}}}"#, now - 600, now - 300));
        let fresh = sign(&format!(r#"{{"sub":"1","iat":{},"exp":{}}}"#, now, now + 300));

        // Without the check, lifetime is the proxy's business
        assert!(verifier().verify(Some(&expired)).is_ok());

        let strict = verifier().with_expiry_check(Duration::seconds(30));
        assert!(matches!(strict.verify(Some(&expired)), Err(IdentityError::InvalidAssertion(_))));
        assert!(strict.verify(Some(&fresh)).is_ok());
    }

    #[test]
    fn test_verify_request_applies_fallback() {
        let request = InboundAssertion::new(sign(r#"{"sub":"1"}"#)).with_fallback(
            crate::claims::FallbackHeaders {
                email: Some("jane@example.com".into()),
                name: None,
                user: Some("jane".into()),
            },
        );

        let claims = verifier().verify_request(&request).unwrap();
        assert_eq!(claims.email, "jane@example.com");
        assert_eq!(claims.username, "jane");
        assert_eq!(claims.name, "");
    }
}
