//! Ingestion pipeline: validation, in-batch dedup, chunking, and outcome
//! aggregation in front of the statement store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chronicle_core::observe;
use chronicle_core::traits::collaborators::StatementValidator;
use chronicle_core::types::outcome::{BatchReport, ItemOutcome, RejectReason};
use chronicle_core::types::statement::equivalent_payloads;
use serde_json::Value;

use crate::store::StatementStore;

/// Batches arriving statements, consults the external validator, and
/// reports a structured per-item outcome. A failing item never aborts its
/// siblings - this is the partial-failure contract everything above relies
/// on.
pub struct IngestionPipeline {
    store: Arc<StatementStore>,
    validator: Arc<dyn StatementValidator>,
    max_batch_size: usize,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<StatementStore>,
        validator: Arc<dyn StatementValidator>,
        max_batch_size: usize,
    ) -> Self {
        Self {
            store,
            validator,
            max_batch_size: max_batch_size.max(1),
        }
    }

    /// Ingest one ordered batch of raw statement documents.
    pub fn ingest(&self, documents: Vec<Value>, authority: &str, target: &str) -> BatchReport {
        let started = Instant::now();
        let total = documents.len();
        let mut outcomes: Vec<Option<ItemOutcome>> = vec![None; total];

        // Validation and in-batch duplicate detection happen before
        // anything reaches a backend.
        let mut accepted: Vec<(usize, Value)> = Vec::with_capacity(total);
        let mut first_by_id: HashMap<String, usize> = HashMap::new();

        for (index, document) in documents.into_iter().enumerate() {
            let client_id = document
                .get("id")
                .and_then(Value::as_str)
                .map(str::to_owned);

            if let Err(e) = self.validator.validate(&document) {
                outcomes[index] = Some(ItemOutcome::Rejected {
                    id: client_id,
                    reason: RejectReason::InvalidSchema(e.to_string()),
                });
                continue;
            }

            if let Some(id) = &client_id {
                if let Some(&first) = first_by_id.get(id) {
                    let duplicate_of = &accepted[first].1;
                    outcomes[index] = Some(if equivalent_payloads(&document, duplicate_of) {
                        ItemOutcome::DuplicateIgnored { id: id.clone() }
                    } else {
                        ItemOutcome::Rejected {
                            id: Some(id.clone()),
                            reason: RejectReason::Conflict,
                        }
                    });
                    continue;
                }
                first_by_id.insert(id.clone(), accepted.len());
            }

            accepted.push((index, document));
        }

        // Chunk to bound per-call overhead against engines that charge a
        // fixed cost per round trip.
        for chunk in accepted.chunks(self.max_batch_size) {
            let (indices, chunk_docs): (Vec<usize>, Vec<Value>) = chunk.iter().cloned().unzip();
            let chunk_outcomes = self.store.write_batch(chunk_docs, authority, target);
            for (index, outcome) in indices.into_iter().zip(chunk_outcomes) {
                outcomes[index] = Some(outcome);
            }
        }

        let report = BatchReport::new(
            outcomes
                .into_iter()
                .map(|o| {
                    o.unwrap_or(ItemOutcome::Deferred {
                        id: None,
                        reason: "no outcome recorded".into(),
                    })
                })
                .collect(),
        );

        for outcome in report.outcomes() {
            observe::record_item_outcome(match outcome {
                ItemOutcome::Stored { .. } => "stored",
                ItemOutcome::DuplicateIgnored { .. } => "duplicate",
                ItemOutcome::Rejected { .. } => "rejected",
                ItemOutcome::Deferred { .. } => "deferred",
            });
        }
        observe::record_ingest(total, started.elapsed());
        tracing::debug!(
            total,
            stored = report.stored_ids().len(),
            "ingested statement batch"
        );
        report
    }
}
