//! Strongly-typed identifier value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::ValidationError;

/// Number of trailing characters shown when an identifier is masked.
pub const MASK_SUFFIX_LEN: usize = 6;

/// Unique identifier for a coaching session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random SessionId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a SessionId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the id with everything but the last few characters hidden.
    pub fn masked(&self) -> String {
        mask(&self.0.simple().to_string())
    }

    /// Returns true if the hyphen-less form of this id ends with `suffix`.
    pub fn matches_suffix(&self, suffix: &str) -> bool {
        let suffix = suffix.trim().replace('-', "").to_ascii_lowercase();
        !suffix.is_empty() && self.0.simple().to_string().ends_with(&suffix)
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// User-facing identifier as typed at the CLI.
///
/// Never persisted. The session manager maps it to a [`UserKey`] before
/// anything reaches a store.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    /// Creates a new UserId, returning error if empty.
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::empty_field("user_id"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", mask(&self.0))
    }
}

/// Opaque storage key derived from a [`UserId`] by the vault.
///
/// Lower-case hex; the only user reference that stores ever see.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserKey(String);

impl UserKey {
    /// Wraps an already-derived key.
    pub fn new(key: impl Into<String>) -> Result<Self, ValidationError> {
        let key = key.into();
        if key.is_empty() {
            return Err(ValidationError::empty_field("user_key"));
        }
        if !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::invalid_format("user_key", "expected hex digits"));
        }
        Ok(Self(key.to_ascii_lowercase()))
    }

    /// Hex-encodes a digest produced by the vault.
    pub fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Returns the inner string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the key with everything but the last few characters hidden.
    pub fn masked(&self) -> String {
        mask(&self.0)
    }

    /// Returns true if the key ends with `suffix` (case-insensitive).
    pub fn matches_suffix(&self, suffix: &str) -> bool {
        let suffix = suffix.trim().to_ascii_lowercase();
        !suffix.is_empty() && self.0.ends_with(&suffix)
    }
}

impl fmt::Display for UserKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Version number of a user's plan. Versions start at 1 and each new plan
/// takes its predecessor's number plus one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanVersion(u64);

impl PlanVersion {
    pub const FIRST: PlanVersion = PlanVersion(1);

    pub fn new(value: u64) -> Result<Self, ValidationError> {
        if value == 0 {
            return Err(ValidationError::out_of_range("plan_version", 1, i64::MAX, 0));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// The version that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for PlanVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

fn mask(s: &str) -> String {
    if s.len() <= MASK_SUFFIX_LEN {
        return s.to_string();
    }
    format!("...{}", &s[s.len() - MASK_SUFFIX_LEN..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_roundtrips_through_string() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn session_id_matches_its_own_suffix() {
        let id = SessionId::new();
        let simple = id.as_uuid().simple().to_string();
        assert!(id.matches_suffix(&simple[simple.len() - 6..]));
        assert!(!id.matches_suffix(""));
    }

    #[test]
    fn user_id_rejects_blank() {
        assert!(UserId::new("").is_err());
        assert!(UserId::new("   ").is_err());
        assert_eq!(UserId::new(" alex_2025 ").unwrap().as_str(), "alex_2025");
    }

    #[test]
    fn user_id_debug_is_masked() {
        let id = UserId::new("alex_2025_private").unwrap();
        let debug = format!("{:?}", id);
        assert!(!debug.contains("alex"));
        assert!(debug.contains("rivate"));
    }

    #[test]
    fn user_key_requires_hex() {
        assert!(UserKey::new("abc123").is_ok());
        assert!(UserKey::new("not-hex").is_err());
        assert!(UserKey::new("").is_err());
    }

    #[test]
    fn plan_versions_start_at_one() {
        assert!(PlanVersion::new(0).is_err());
        assert_eq!(PlanVersion::FIRST.next().value(), 2);
        assert_eq!(PlanVersion::new(3).unwrap().to_string(), "v3");
    }

    #[test]
    fn user_key_masking_and_suffix() {
        let key = UserKey::new("0123456789abcdef").unwrap();
        assert_eq!(key.masked(), "...abcdef");
        assert!(key.matches_suffix("CDEF"));
        assert!(!key.matches_suffix("0123"));
    }
}
