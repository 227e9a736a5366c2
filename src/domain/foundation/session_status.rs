//! SessionStatus enum for tracking lifecycle of coaching sessions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{StateMachine, ValidationError};

/// Lifecycle status of a coaching session.
///
/// Cleared and Closed are both terminal for writes. A user who comes back
/// after either gets a fresh Active session on the next resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Active,
    Cleared,
    Closed,
}

impl SessionStatus {
    /// Returns true if turns may still be appended.
    pub fn is_writable(&self) -> bool {
        matches!(self, SessionStatus::Active)
    }

    /// Stable lowercase name used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Cleared => "cleared",
            SessionStatus::Closed => "closed",
        }
    }
}

impl StateMachine for SessionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SessionStatus::*;
        matches!((self, target), (Active, Cleared) | (Active, Closed))
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            SessionStatus::Active => vec![SessionStatus::Cleared, SessionStatus::Closed],
            SessionStatus::Cleared | SessionStatus::Closed => vec![],
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Active => "ACTIVE",
            SessionStatus::Cleared => "CLEARED",
            SessionStatus::Closed => "CLOSED",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for SessionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(SessionStatus::Active),
            "cleared" => Ok(SessionStatus::Cleared),
            "closed" => Ok(SessionStatus::Closed),
            other => Err(ValidationError::invalid_format(
                "session_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_active() {
        assert_eq!(SessionStatus::default(), SessionStatus::Active);
    }

    #[test]
    fn only_active_is_writable() {
        assert!(SessionStatus::Active.is_writable());
        assert!(!SessionStatus::Cleared.is_writable());
        assert!(!SessionStatus::Closed.is_writable());
    }

    #[test]
    fn active_can_be_cleared_or_closed() {
        assert!(SessionStatus::Active.can_transition_to(&SessionStatus::Cleared));
        assert!(SessionStatus::Active.can_transition_to(&SessionStatus::Closed));
    }

    #[test]
    fn cleared_and_closed_are_terminal() {
        assert!(SessionStatus::Cleared.is_terminal());
        assert!(SessionStatus::Closed.is_terminal());
        assert!(SessionStatus::Cleared
            .transition_to(SessionStatus::Active)
            .is_err());
        assert!(SessionStatus::Closed
            .transition_to(SessionStatus::Cleared)
            .is_err());
    }

    #[test]
    fn display_uses_upper_case() {
        assert_eq!(SessionStatus::Cleared.to_string(), "CLEARED");
    }

    #[test]
    fn parses_storage_names() {
        for status in [SessionStatus::Active, SessionStatus::Cleared, SessionStatus::Closed] {
            assert_eq!(status.as_str().parse::<SessionStatus>().unwrap(), status);
        }
        assert!("archived".parse::<SessionStatus>().is_err());
    }

    #[test]
    fn serializes_to_snake_case_json() {
        assert_eq!(
            serde_json::to_string(&SessionStatus::Closed).unwrap(),
            "\"closed\""
        );
    }
}
