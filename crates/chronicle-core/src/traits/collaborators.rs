use serde_json::Value;

use crate::error::{ChronicleError, Result};
use crate::types::scope::ScopeSet;
use crate::types::statement::parse_rfc3339_micros;

/// External identity/scope source: resolves a credential to the scopes it
/// carries. How credentials are issued and stored is not this crate's
/// concern.
pub trait CredentialResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Result<ScopeSet>;
}

/// External statement-grammar validator, consulted before any item reaches
/// the statement store. A rejection surfaces as `rejected(invalid-schema)`
/// without touching a backend.
pub trait StatementValidator: Send + Sync {
    fn validate(&self, document: &Value) -> Result<()>;
}

/// Minimal structural validator used as default wiring.
///
/// The full statement grammar lives in an external component; this one only
/// rejects payloads the store itself could not index: a non-object payload,
/// missing actor/verb/object, a non-string id, or an unparsable timestamp.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequiredFieldsValidator;

impl StatementValidator for RequiredFieldsValidator {
    fn validate(&self, document: &Value) -> Result<()> {
        let obj = document
            .as_object()
            .ok_or_else(|| ChronicleError::ValidationFailure("statement must be an object".into()))?;

        for field in ["actor", "verb", "object"] {
            match obj.get(field) {
                Some(Value::Null) | None => {
                    return Err(ChronicleError::ValidationFailure(format!(
                        "statement is missing {field}"
                    )));
                }
                Some(_) => {}
            }
        }

        if let Some(id) = obj.get("id") {
            if !id.is_string() {
                return Err(ChronicleError::ValidationFailure(
                    "statement id must be a string".into(),
                ));
            }
        }

        if let Some(ts) = obj.get("timestamp") {
            let ts = ts.as_str().ok_or_else(|| {
                ChronicleError::ValidationFailure("statement timestamp must be a string".into())
            })?;
            parse_rfc3339_micros(ts)
                .map_err(|_| ChronicleError::ValidationFailure(format!("invalid timestamp {ts:?}")))?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_minimal_statement() {
        let doc = json!({"actor": "u1", "verb": "accessed", "object": "course/42"});
        assert!(RequiredFieldsValidator.validate(&doc).is_ok());
    }

    #[test]
    fn rejects_missing_fields_and_bad_types() {
        let v = RequiredFieldsValidator;
        assert!(v.validate(&json!([])).is_err());
        assert!(v.validate(&json!({"verb": "v", "object": "o"})).is_err());
        assert!(v
            .validate(&json!({"actor": "a", "verb": "v", "object": "o", "id": 7}))
            .is_err());
        assert!(v
            .validate(&json!({
                "actor": "a", "verb": "v", "object": "o",
                "timestamp": "not-a-time"
            }))
            .is_err());
    }
}
