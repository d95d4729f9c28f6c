use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChronicleError, Result};
use crate::types::statement::{parse_rfc3339_micros, rfc3339_micros};

/// Opaque continuation cursor for paginated reads.
///
/// A cursor pins a position in the total `(stored, id)` order; the next page
/// starts strictly after it in the query's traversal direction. Encoded as
/// URL-safe base64 without padding so it survives query strings untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cursor {
    pub stored: DateTime<Utc>,
    pub id: String,
}

impl Cursor {
    pub fn new(stored: DateTime<Utc>, id: impl Into<String>) -> Self {
        Self {
            stored,
            id: id.into(),
        }
    }

    /// Render the cursor as its opaque wire form.
    pub fn encode(&self) -> String {
        let plain = format!("{}|{}", rfc3339_micros(&self.stored), self.id);
        URL_SAFE_NO_PAD.encode(plain)
    }

    /// Decode a wire-form cursor. Tampered or truncated tokens are a
    /// `ValidationFailure`, never a panic.
    pub fn decode(token: &str) -> Result<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|e| ChronicleError::ValidationFailure(format!("invalid cursor: {e}")))?;
        let plain = String::from_utf8(bytes)
            .map_err(|_| ChronicleError::ValidationFailure("invalid cursor encoding".into()))?;
        let (stored, id) = plain
            .split_once('|')
            .ok_or_else(|| ChronicleError::ValidationFailure("malformed cursor".into()))?;
        if id.is_empty() {
            return Err(ChronicleError::ValidationFailure("malformed cursor".into()));
        }
        let stored = parse_rfc3339_micros(stored)
            .map_err(|_| ChronicleError::ValidationFailure("malformed cursor timestamp".into()))?;
        Ok(Self::new(stored, id))
    }
}

impl TryFrom<String> for Cursor {
    type Error = ChronicleError;

    fn try_from(token: String) -> Result<Self> {
        Cursor::decode(&token)
    }
}

impl From<Cursor> for String {
    fn from(cursor: Cursor) -> Self {
        cursor.encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let stored = parse_rfc3339_micros("2024-03-01T10:00:00.000123Z").unwrap();
        let cursor = Cursor::new(stored, "abc-123");
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn tampered_token_is_rejected() {
        let stored = parse_rfc3339_micros("2024-03-01T10:00:00Z").unwrap();
        let token = Cursor::new(stored, "abc").encode();
        let err = Cursor::decode(&token[..8]).unwrap_err();
        assert!(matches!(err, ChronicleError::ValidationFailure(_)));

        let err = Cursor::decode("!!not base64!!").unwrap_err();
        assert!(matches!(err, ChronicleError::ValidationFailure(_)));
    }

    #[test]
    fn id_may_contain_separator() {
        let stored = parse_rfc3339_micros("2024-03-01T10:00:00Z").unwrap();
        let cursor = Cursor::new(stored, "weird|id");
        // split_once keeps everything after the first separator in the id
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded.id, "weird|id");
    }
}
