use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Persistent identifier for a question, as assigned by the catalog backend.
///
/// Catalog ids are opaque; some backends hand out integers, others strings,
/// so the id is stored as text. Ids that stringify to `NaN`, `undefined`,
/// `null` or an empty string are rejected; questions carrying such values
/// cannot be flagged or resumed by id.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QuestionId(String);

impl QuestionId {
    /// Creates a `QuestionId` if the raw value is usable as a persistent key.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Option<Self> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() || matches!(trimmed, "NaN" | "undefined" | "null") {
            return None;
        }
        Some(Self(trimmed.to_owned()))
    }

    /// Returns the underlying id text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({})", self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for parsing a `QuestionId` from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError;

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse QuestionId from string")
    }
}

impl std::error::Error for ParseIdError {}

impl FromStr for QuestionId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QuestionId::new(s).ok_or(ParseIdError)
    }
}

/// Unique identifier for a started session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random session id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn value(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_id_accepts_plain_values() {
        let id = QuestionId::new("q-42").unwrap();
        assert_eq!(id.as_str(), "q-42");
        assert_eq!(id.to_string(), "q-42");
    }

    #[test]
    fn question_id_trims_whitespace() {
        let id = QuestionId::new("  17 ").unwrap();
        assert_eq!(id.as_str(), "17");
    }

    #[test]
    fn question_id_rejects_sentinel_values() {
        assert!(QuestionId::new("").is_none());
        assert!(QuestionId::new("NaN").is_none());
        assert!(QuestionId::new("undefined").is_none());
        assert!(QuestionId::new("null").is_none());
    }

    #[test]
    fn question_id_from_str_round_trip() {
        let id: QuestionId = "abc".parse().unwrap();
        assert_eq!(id, QuestionId::new("abc").unwrap());
        assert!("NaN".parse::<QuestionId>().is_err());
    }

    #[test]
    fn session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
