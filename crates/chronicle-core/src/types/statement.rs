use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ChronicleError, Result};

/// Verb identifier marking a statement as a voiding statement.
pub const VOIDING_VERB: &str = "http://adlnet.gov/expapi/verbs/voided";

/// Format a timestamp the way every layer of the store does: RFC 3339,
/// microsecond precision, `Z` suffix. Fixed width, so lexicographic order
/// over the rendered strings matches chronological order.
pub fn rfc3339_micros(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 timestamp, truncating to microsecond precision so a
/// value compares identically in memory and in any engine that stores the
/// rendered form.
pub fn parse_rfc3339_micros(value: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(value)
        .map_err(|e| ChronicleError::Serialization(format!("invalid timestamp {value:?}: {e}")))?
        .with_timezone(&Utc);
    Ok(truncate_micros(ts))
}

/// Drop sub-microsecond precision from a timestamp.
pub fn truncate_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(ts.timestamp_micros()).unwrap_or(ts)
}

/// One stored learning record.
///
/// The indexed fields are derived from `raw` and exist so that adapters and
/// translators never reach into the payload themselves; `raw` is the full
/// enriched document and is what backends actually persist. Once stored,
/// `id`, `timestamp` and `raw` never change - the only permitted mutation is
/// the later arrival of a voiding statement referencing `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    /// Opaque unique identifier (client-supplied or server-generated).
    pub id: String,

    /// Identity descriptor of the acting agent.
    pub actor: String,

    /// Action identifier (verb id).
    pub verb: String,

    /// Identity descriptor of the activity or target.
    pub object: String,

    /// Client event time. Defaults to `stored` when absent.
    pub timestamp: DateTime<Utc>,

    /// Server-assigned ingestion time, monotonic per process.
    pub stored: DateTime<Utc>,

    /// Identity that asserted the statement (bound to the credential).
    pub authority: String,

    /// Referenced statement id when this statement voids another one.
    pub void_target: Option<String>,

    /// The full enriched payload, opaque beyond the fields above.
    pub raw: Value,
}

impl Statement {
    /// Derive a `Statement` from an enriched document.
    ///
    /// Expects `id`, `stored` and `authority` to already be present - the
    /// statement store injects them before anything reaches an adapter, and
    /// adapters hand back the persisted document unchanged.
    pub fn from_document(raw: Value) -> Result<Self> {
        let obj = raw
            .as_object()
            .ok_or_else(|| ChronicleError::Serialization("statement is not an object".into()))?;

        let id = obj
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ChronicleError::Serialization("statement has no id".into()))?
            .to_owned();

        let actor = obj
            .get("actor")
            .and_then(identity_descriptor)
            .ok_or_else(|| ChronicleError::Serialization("statement has no actor".into()))?;

        let verb = obj
            .get("verb")
            .and_then(identity_descriptor)
            .ok_or_else(|| ChronicleError::Serialization("statement has no verb".into()))?;

        let object_value = obj
            .get("object")
            .ok_or_else(|| ChronicleError::Serialization("statement has no object".into()))?;
        let object = identity_descriptor(object_value)
            .ok_or_else(|| ChronicleError::Serialization("statement object has no identity".into()))?;

        let stored_str = obj
            .get("stored")
            .and_then(Value::as_str)
            .ok_or_else(|| ChronicleError::Serialization("statement has no stored time".into()))?;
        let stored = parse_rfc3339_micros(stored_str)?;

        let timestamp = match obj.get("timestamp").and_then(Value::as_str) {
            Some(ts) => parse_rfc3339_micros(ts)?,
            None => stored,
        };

        let authority = obj
            .get("authority")
            .and_then(identity_descriptor)
            .unwrap_or_default();

        let void_target = if verb == VOIDING_VERB {
            void_target_of(object_value)
        } else {
            None
        };

        Ok(Self {
            id,
            actor,
            verb,
            object,
            timestamp,
            stored,
            authority,
            void_target,
            raw,
        })
    }

    /// Whether this statement voids another one.
    pub fn is_voiding(&self) -> bool {
        self.void_target.is_some()
    }
}

/// Payload equivalence for idempotent retries.
///
/// Compares two raw documents with the server-assigned `stored` and
/// `authority` fields removed: a client resubmitting a statement cannot know
/// either, so they never participate in the duplicate-versus-conflict
/// decision.
pub fn equivalent_payloads(a: &Value, b: &Value) -> bool {
    strip_server_fields(a) == strip_server_fields(b)
}

fn strip_server_fields(value: &Value) -> Value {
    let mut copy = value.clone();
    if let Some(obj) = copy.as_object_mut() {
        obj.remove("stored");
        obj.remove("authority");
    }
    copy
}

/// Reduce an identity-bearing JSON value to a single descriptor string.
///
/// A bare string is taken as-is; agent objects reduce to their inverse
/// functional identifier (mbox, mbox_sha1sum, openid, or account home
/// page + name); activities and statement references reduce to their `id`.
pub fn identity_descriptor(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            if let Some(mbox) = map.get("mbox").and_then(Value::as_str) {
                return Some(mbox.to_owned());
            }
            if let Some(sha) = map.get("mbox_sha1sum").and_then(Value::as_str) {
                return Some(sha.to_owned());
            }
            if let Some(openid) = map.get("openid").and_then(Value::as_str) {
                return Some(openid.to_owned());
            }
            if let Some(account) = map.get("account").and_then(Value::as_object) {
                let home_page = account.get("homePage").and_then(Value::as_str)?;
                let name = account.get("name").and_then(Value::as_str).unwrap_or("");
                return Some(format!("{home_page}|{name}"));
            }
            if let Some(id) = map.get("id").and_then(Value::as_str) {
                return Some(id.to_owned());
            }
            map.get("name").and_then(Value::as_str).map(str::to_owned)
        }
        _ => None,
    }
}

/// Extract the voided statement id from a voiding statement's object.
///
/// Accepts the statement-reference object form and, leniently, a bare id
/// string.
fn void_target_of(object: &Value) -> Option<String> {
    match object {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => {
            let is_ref = map
                .get("objectType")
                .and_then(Value::as_str)
                .map(|t| t == "StatementRef")
                .unwrap_or(true);
            if is_ref {
                map.get("id").and_then(Value::as_str).map(str::to_owned)
            } else {
                None
            }
        }
        _ => None,
    }
}
