use std::sync::Arc;

use chronicle_core::error::{ChronicleError, Result};
use chronicle_core::traits::backend::RecordIter;
use chronicle_core::types::statement::Statement;
use lmdb::{Cursor, Database, Environment, Transaction};

use crate::keys::key_after;

/// Lazy scan over one target's records in key order.
///
/// Opens a fresh read transaction per step, so the iterator holds no
/// engine resources between calls and abandoning it mid-scan releases
/// everything immediately.
pub(crate) struct LmdbScanIter {
    env: Arc<Environment>,
    db: Database,
    next_start: Option<Vec<u8>>,
    done: bool,
}

impl LmdbScanIter {
    pub(crate) fn new(env: Arc<Environment>, db: Database) -> Self {
        Self {
            env,
            db,
            next_start: None,
            done: false,
        }
    }
}

impl RecordIter for LmdbScanIter {
    fn next(&mut self) -> Result<Option<Statement>> {
        if self.done {
            return Ok(None);
        }

        let txn = self
            .env
            .begin_ro_txn()
            .map_err(|e| ChronicleError::ConnectionFailure(e.to_string()))?;

        let step = {
            let mut cursor = txn
                .open_ro_cursor(self.db)
                .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
            let mut iter = match &self.next_start {
                Some(start) => cursor.iter_from(start.as_slice()),
                None => cursor.iter_start(),
            };
            iter.next().map(|(key, value)| (key.to_vec(), value.to_vec()))
        };

        match step {
            Some((key, value)) => {
                self.next_start = Some(key_after(&key));
                let doc = serde_json::from_slice(&value)
                    .map_err(|e| ChronicleError::Serialization(e.to_string()))?;
                Ok(Some(Statement::from_document(doc)?))
            }
            None => {
                self.done = true;
                Ok(None)
            }
        }
    }
}
