//! Statement store: the domain layer enforcing append-only semantics over
//! one ingest backend and one query backend.

use std::collections::HashMap;
use std::sync::Arc;

use chronicle_core::clock::StoredClock;
use chronicle_core::error::{ChronicleError, Result};
use chronicle_core::traits::backend::{drain, WriteStatus};
use chronicle_core::traits::statement::StatementBackend;
use chronicle_core::types::outcome::{ItemOutcome, RejectReason};
use chronicle_core::types::query::{StatementPage, StatementQuery};
use chronicle_core::types::statement::{equivalent_payloads, rfc3339_micros, Statement};
use serde_json::Value;
use uuid::Uuid;

/// Enforces statement identity, deduplication, and ordering invariants;
/// owns nothing about how records are physically stored.
pub struct StatementStore {
    ingest: Arc<dyn StatementBackend>,
    reader: Arc<dyn StatementBackend>,
    clock: StoredClock,
}

struct Pending {
    index: usize,
    statement: Statement,
    /// Whether the event timestamp was defaulted from `stored` during
    /// enrichment rather than supplied by the client.
    timestamp_defaulted: bool,
}

impl StatementStore {
    pub fn new(ingest: Arc<dyn StatementBackend>, reader: Arc<dyn StatementBackend>) -> Self {
        Self {
            ingest,
            reader,
            clock: StoredClock::new(),
        }
    }

    /// Persist a batch of validated documents, reporting one outcome per
    /// document in input order.
    ///
    /// Server enrichment happens here: a v4 identifier when the caller
    /// supplied none (never content-derived - two actors may legitimately
    /// emit byte-identical events), a monotonic `stored` timestamp, the
    /// event timestamp defaulted to `stored`, and the credential's
    /// authority. Items whose id already exists are an idempotent no-op
    /// when the payload is equivalent and a conflict otherwise.
    pub fn write_batch(
        &self,
        documents: Vec<Value>,
        authority: &str,
        target: &str,
    ) -> Vec<ItemOutcome> {
        let mut outcomes: Vec<Option<ItemOutcome>> = vec![None; documents.len()];
        let mut pending: Vec<Pending> = Vec::with_capacity(documents.len());

        for (index, document) in documents.into_iter().enumerate() {
            match self.enrich(document, authority) {
                Ok((statement, timestamp_defaulted)) => pending.push(Pending {
                    index,
                    statement,
                    timestamp_defaulted,
                }),
                Err(e) => {
                    outcomes[index] = Some(ItemOutcome::Rejected {
                        id: None,
                        reason: RejectReason::InvalidSchema(e.to_string()),
                    });
                }
            }
        }

        // Dedup against already-persisted identifiers through the query
        // backend. A read failure leaves every remaining item deferred:
        // writing without the dedup check could turn a client retry into a
        // conflict.
        let ids: Vec<String> = pending.iter().map(|p| p.statement.id.clone()).collect();
        let existing = match self.read_existing(&ids, target) {
            Ok(existing) => existing,
            Err(e) => {
                for p in pending {
                    outcomes[p.index] = Some(ItemOutcome::Deferred {
                        id: Some(p.statement.id),
                        reason: e.to_string(),
                    });
                }
                return finish(outcomes);
            }
        };

        let mut survivors: Vec<Pending> = Vec::with_capacity(pending.len());
        for p in pending {
            match existing.get(&p.statement.id) {
                Some(prior) if retry_equivalent(&p, prior) => {
                    outcomes[p.index] = Some(ItemOutcome::DuplicateIgnored {
                        id: p.statement.id,
                    });
                }
                Some(_) => {
                    outcomes[p.index] = Some(ItemOutcome::Rejected {
                        id: Some(p.statement.id),
                        reason: RejectReason::Conflict,
                    });
                }
                None => survivors.push(p),
            }
        }

        if !survivors.is_empty() {
            let statements: Vec<Statement> =
                survivors.iter().map(|p| p.statement.clone()).collect();
            match self.ingest.write(&statements, target) {
                Ok(statuses) => {
                    for (p, status) in survivors.into_iter().zip(statuses) {
                        outcomes[p.index] = Some(match status {
                            WriteStatus::Persisted => ItemOutcome::Stored { id: p.statement.id },
                            WriteStatus::Rejected(reason) => ItemOutcome::Rejected {
                                id: Some(p.statement.id),
                                reason: RejectReason::Backend(reason),
                            },
                        });
                    }
                }
                Err(e) if e.retryable() => {
                    tracing::warn!(error = %e, "ingest backend unreachable, deferring batch");
                    for p in survivors {
                        outcomes[p.index] = Some(ItemOutcome::Deferred {
                            id: Some(p.statement.id),
                            reason: e.to_string(),
                        });
                    }
                }
                Err(e) => {
                    for p in survivors {
                        outcomes[p.index] = Some(ItemOutcome::Rejected {
                            id: Some(p.statement.id),
                            reason: RejectReason::Backend(e.to_string()),
                        });
                    }
                }
            }
        }

        finish(outcomes)
    }

    /// Evaluate a query through the query backend's translator.
    pub fn query(&self, query: &StatementQuery, target: &str) -> Result<StatementPage> {
        self.reader.query_statements(query, target)
    }

    /// Point lookup by statement id. Voided statements remain retrievable
    /// this way - exclusion only applies to filtered queries.
    pub fn find_by_id(&self, id: &str, target: &str) -> Result<Option<Statement>> {
        match self.reader.read_ids(&[id.to_owned()], target) {
            Ok(iter) => {
                let found = drain(iter)?;
                Ok(found.into_iter().next())
            }
            Err(ChronicleError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn enrich(&self, mut document: Value, authority: &str) -> Result<(Statement, bool)> {
        let obj = document.as_object_mut().ok_or_else(|| {
            ChronicleError::ValidationFailure("statement must be an object".into())
        })?;

        if obj.get("id").and_then(Value::as_str).is_none() {
            obj.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
        }
        let stored = self.clock.next();
        let stored_str = rfc3339_micros(&stored);
        obj.insert("stored".into(), Value::String(stored_str.clone()));
        let timestamp_defaulted = !obj.contains_key("timestamp");
        if timestamp_defaulted {
            obj.insert("timestamp".into(), Value::String(stored_str));
        }
        obj.insert("authority".into(), Value::String(authority.to_owned()));

        let statement = Statement::from_document(document)
            .map_err(|e| ChronicleError::ValidationFailure(e.to_string()))?;
        Ok((statement, timestamp_defaulted))
    }

    fn read_existing(&self, ids: &[String], target: &str) -> Result<HashMap<String, Statement>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let found = match self.reader.read_ids(ids, target) {
            Ok(iter) => drain(iter)?,
            // A target nothing was ever written to has no duplicates.
            Err(ChronicleError::NotFound(_)) => Vec::new(),
            Err(e) => return Err(e),
        };
        Ok(found.into_iter().map(|s| (s.id.clone(), s)).collect())
    }
}

/// Whether an incoming item is an idempotent resubmission of `prior`.
///
/// Server-assigned fields never participate. When both sides defaulted the
/// event timestamp from their own `stored`, the differing defaults are
/// server artifacts too and are ignored.
fn retry_equivalent(incoming: &Pending, prior: &Statement) -> bool {
    if equivalent_payloads(&incoming.statement.raw, &prior.raw) {
        return true;
    }
    if incoming.timestamp_defaulted && prior.timestamp == prior.stored {
        return equivalent_payloads(
            &strip_timestamp(&incoming.statement.raw),
            &strip_timestamp(&prior.raw),
        );
    }
    false
}

fn strip_timestamp(value: &Value) -> Value {
    let mut copy = value.clone();
    if let Some(obj) = copy.as_object_mut() {
        obj.remove("timestamp");
    }
    copy
}

fn finish(outcomes: Vec<Option<ItemOutcome>>) -> Vec<ItemOutcome> {
    outcomes
        .into_iter()
        .map(|o| {
            o.unwrap_or(ItemOutcome::Deferred {
                id: None,
                reason: "no outcome recorded".into(),
            })
        })
        .collect()
}
