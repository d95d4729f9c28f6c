use serde::{Deserialize, Serialize};

/// Why an item was rejected. Rejections are terminal and not retryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// The external validator refused the payload.
    InvalidSchema(String),
    /// The id is already taken by a statement with a different payload.
    Conflict,
    /// The storage engine refused the item.
    Backend(String),
}

/// Per-item outcome of an ingestion batch.
///
/// `Deferred` is terminal for this attempt only: the caller may resubmit the
/// same item and rely on the idempotent-duplicate rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ItemOutcome {
    Stored {
        id: String,
    },
    DuplicateIgnored {
        id: String,
    },
    Rejected {
        id: Option<String>,
        reason: RejectReason,
    },
    Deferred {
        id: Option<String>,
        reason: String,
    },
}

impl ItemOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Stored { .. } | Self::DuplicateIgnored { .. })
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Stored { id } | Self::DuplicateIgnored { id } => Some(id),
            Self::Rejected { id, .. } | Self::Deferred { id, .. } => id.as_deref(),
        }
    }
}

/// Structured result of one ingestion call: one outcome per input item, in
/// input order. A single failing item never aborts its siblings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    outcomes: Vec<ItemOutcome>,
}

impl BatchReport {
    pub fn new(outcomes: Vec<ItemOutcome>) -> Self {
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Identifiers of newly persisted statements, in input order. Duplicate
    /// re-submissions are omitted so callers can derive which items were
    /// skipped.
    pub fn stored_ids(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                ItemOutcome::Stored { id } => Some(id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// True when every item was stored or was an idempotent duplicate.
    pub fn fully_accepted(&self) -> bool {
        self.outcomes.iter().all(ItemOutcome::is_success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_accounting() {
        let report = BatchReport::new(vec![
            ItemOutcome::Stored { id: "a".into() },
            ItemOutcome::DuplicateIgnored { id: "b".into() },
            ItemOutcome::Rejected {
                id: Some("c".into()),
                reason: RejectReason::Conflict,
            },
        ]);
        assert_eq!(report.stored_ids(), vec!["a"]);
        assert!(!report.fully_accepted());
        assert_eq!(report.len(), 3);
    }

    #[test]
    fn outcome_wire_shape() {
        let outcome = ItemOutcome::Rejected {
            id: None,
            reason: RejectReason::InvalidSchema("missing actor".into()),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["reason"]["invalid-schema"], "missing actor");
    }
}
