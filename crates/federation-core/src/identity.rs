//! Canonical identity mapping
//!
//! Turns a verified [`ClaimSet`] into the bridge's downstream-agnostic user
//! shape. Mapping is total: every claim set yields a usable identity.
//!
//! ## Handle invariant
//!
//! A handle is 1-22 characters from `[a-z0-9._-]`, lowercase, and never
//! starts or ends with `-`, `.` or `_`.

use serde::{Deserialize, Serialize};

use crate::claims::ClaimSet;

/// Maximum handle length in characters
pub const MAX_HANDLE_LEN: usize = 22;

/// Substituted when sanitization leaves nothing
const EMPTY_HANDLE_FALLBACK: &str = "user";

/// Prefix for handles synthesized from the subject
const SHADOW_PREFIX: &str = "shadow-";

fn is_separator(c: char) -> bool {
    matches!(c, '-' | '.' | '_')
}

fn is_handle_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || is_separator(c)
}

/// Normalize an arbitrary string into a handle
pub fn sanitize_handle(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if is_handle_char(c) { c } else { '-' })
        .collect();

    let trimmed = mapped.trim_matches(is_separator);
    if trimmed.is_empty() {
        return EMPTY_HANDLE_FALLBACK.to_string();
    }

    // Everything left is ASCII, so char and byte counts agree
    let truncated: String = trimmed.chars().take(MAX_HANDLE_LEN).collect();
    truncated.trim_end_matches(is_separator).to_string()
}

/// Uppercase the first character of a handle
///
/// Locale-naive: only the first `char` is uppercased and the rest is kept as
/// is. Handles are ASCII so this is exact for them, but it will not produce a
/// proper title case for arbitrary Unicode input.
pub fn title_case_handle(handle: &str) -> String {
    let mut chars = handle.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The bridge's normalized view of one user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalIdentity {
    pub subject: String,
    /// Trimmed email, possibly empty
    pub email: String,
    /// Trimmed display name, possibly empty
    pub display_name: String,
    /// Sanitized username, always valid
    pub handle: String,
    /// Groups in claim order
    pub groups: Vec<String>,
}

impl CanonicalIdentity {
    /// Canonicalize verified claims
    pub fn from_claims(claims: &ClaimSet) -> Self {
        Self {
            subject: claims.subject.clone(),
            email: claims.email.trim().to_string(),
            display_name: claims.name.trim().to_string(),
            handle: sanitize_handle(&handle_source(claims)),
            groups: claims.groups.clone(),
        }
    }

    /// Display name, or the title-cased handle when none was asserted
    pub fn display_name_or_handle(&self) -> String {
        if self.display_name.is_empty() {
            title_case_handle(&self.handle)
        } else {
            self.display_name.clone()
        }
    }
}

/// Pick the raw handle: username, then email local part, then the subject
fn handle_source(claims: &ClaimSet) -> String {
    let username = claims.username.trim();
    if !username.is_empty() {
        return username.to_string();
    }

    let local_part = claims.email.trim().split('@').next().unwrap_or("").trim();
    if !local_part.is_empty() {
        return local_part.to_string();
    }

    format!("{}{}", SHADOW_PREFIX, claims.subject)
}
