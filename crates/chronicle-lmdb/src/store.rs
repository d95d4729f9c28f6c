use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chronicle_core::error::{ChronicleError, Result};
use chronicle_core::filter::collect_page;
use chronicle_core::traits::backend::{
    Capabilities, RecordBackend, RecordIter, VecRecordIter, WriteStatus,
};
use chronicle_core::traits::statement::StatementBackend;
use chronicle_core::types::query::{StatementPage, StatementQuery};
use chronicle_core::types::statement::Statement;
use lmdb::{Cursor as _, Database, DatabaseFlags, Environment, Transaction, WriteFlags};
use parking_lot::Mutex;

use crate::iter::LmdbScanIter;
use crate::keys::record_key;

/// Configuration for the LMDB statement backend.
#[derive(Debug, Clone)]
pub struct LmdbBackendConfig {
    /// Directory holding the LMDB environment.
    pub path: PathBuf,

    /// Maximum map size in bytes (default: 1GB).
    pub map_size: usize,

    /// Maximum number of named databases. Each target uses two (records
    /// plus id index).
    pub max_dbs: u32,

    /// Maximum number of concurrent readers.
    pub max_readers: u32,
}

impl LmdbBackendConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            map_size: 1024 * 1024 * 1024,
            max_dbs: 32,
            max_readers: 126,
        }
    }

    pub fn with_map_size(mut self, map_size: usize) -> Self {
        self.map_size = map_size;
        self
    }

    pub fn with_max_dbs(mut self, max_dbs: u32) -> Self {
        self.max_dbs = max_dbs;
        self
    }
}

/// LMDB-backed statement store adapter.
///
/// Records live under `(stored, id)` keys, so the engine natively provides
/// the total order and range continuation; field filters and voiding
/// resolution run through the shared post-filter fallback.
pub struct LmdbStatementBackend {
    env: Arc<Environment>,
    dbs: Mutex<HashMap<String, TargetDbs>>,
    closed: AtomicBool,
}

#[derive(Clone, Copy)]
struct TargetDbs {
    records: Database,
    ids: Database,
}

fn ids_db_name(target: &str) -> String {
    format!("{target}#ids")
}

fn validate_target(target: &str) -> Result<()> {
    if target.is_empty()
        || !target
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ChronicleError::ValidationFailure(format!(
            "invalid target name {target:?}"
        )));
    }
    Ok(())
}

impl LmdbStatementBackend {
    /// Open or create the environment.
    pub fn open(cfg: LmdbBackendConfig) -> Result<Self> {
        std::fs::create_dir_all(&cfg.path)?;

        let mut builder = Environment::new();
        builder.set_max_dbs(cfg.max_dbs);
        builder.set_map_size(cfg.map_size);
        builder.set_max_readers(cfg.max_readers);

        let env = builder
            .open(&cfg.path)
            .map_err(|e| ChronicleError::ConnectionFailure(e.to_string()))?;

        Ok(Self {
            env: Arc::new(env),
            dbs: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChronicleError::ConnectionFailure("backend closed".into()));
        }
        Ok(())
    }

    /// Open a target's databases, creating them on demand.
    fn target_dbs(&self, target: &str) -> Result<TargetDbs> {
        validate_target(target)?;
        let mut dbs = self.dbs.lock();
        if let Some(found) = dbs.get(target) {
            return Ok(*found);
        }
        let ids_name = ids_db_name(target);
        let records = self
            .env
            .create_db(Some(target), DatabaseFlags::empty())
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
        let ids = self
            .env
            .create_db(Some(ids_name.as_str()), DatabaseFlags::empty())
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
        let pair = TargetDbs { records, ids };
        dbs.insert(target.to_owned(), pair);
        Ok(pair)
    }

    /// Open a target's databases for reading; `NotFound` when the target
    /// was never written.
    fn existing_target_dbs(&self, target: &str) -> Result<TargetDbs> {
        validate_target(target)?;
        {
            let dbs = self.dbs.lock();
            if let Some(found) = dbs.get(target) {
                return Ok(*found);
            }
        }
        let records = match self.env.open_db(Some(target)) {
            Ok(db) => db,
            Err(lmdb::Error::NotFound) => {
                return Err(ChronicleError::NotFound(format!("target {target:?}")));
            }
            Err(e) => return Err(ChronicleError::BackendRejected(e.to_string())),
        };
        let ids_name = ids_db_name(target);
        let ids = match self.env.open_db(Some(ids_name.as_str())) {
            Ok(db) => db,
            Err(lmdb::Error::NotFound) => {
                return Err(ChronicleError::NotFound(format!("target {target:?}")));
            }
            Err(e) => return Err(ChronicleError::BackendRejected(e.to_string())),
        };
        let pair = TargetDbs { records, ids };
        self.dbs.lock().insert(target.to_owned(), pair);
        Ok(pair)
    }

    fn write_one(&self, dbs: TargetDbs, statement: &Statement) -> Result<WriteStatus> {
        let doc = serde_json::to_vec(&statement.raw)
            .map_err(|e| ChronicleError::Serialization(e.to_string()))?;
        let key = record_key(&statement.stored, &statement.id);

        let mut txn = self
            .env
            .begin_rw_txn()
            .map_err(|e| ChronicleError::ConnectionFailure(e.to_string()))?;

        match txn.get(dbs.ids, &statement.id) {
            Ok(_) => {
                txn.abort();
                return Ok(WriteStatus::Rejected(format!(
                    "id {:?} already present",
                    statement.id
                )));
            }
            Err(lmdb::Error::NotFound) => {}
            Err(e) => {
                txn.abort();
                return Ok(WriteStatus::Rejected(e.to_string()));
            }
        }

        if let Err(e) = txn.put(dbs.ids, &statement.id, &key, WriteFlags::empty()) {
            txn.abort();
            return Ok(WriteStatus::Rejected(e.to_string()));
        }
        if let Err(e) = txn.put(dbs.records, &key, &doc, WriteFlags::empty()) {
            txn.abort();
            return Ok(WriteStatus::Rejected(e.to_string()));
        }

        match txn.commit() {
            Ok(()) => Ok(WriteStatus::Persisted),
            Err(e) => Ok(WriteStatus::Rejected(e.to_string())),
        }
    }
}

impl RecordBackend for LmdbStatementBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ordered_only()
    }

    fn write(&self, statements: &[Statement], target: &str) -> Result<Vec<WriteStatus>> {
        self.ensure_open()?;
        let dbs = self.target_dbs(target)?;

        // One transaction per item so a refused item never rolls back its
        // siblings.
        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            results.push(self.write_one(dbs, statement)?);
        }
        Ok(results)
    }

    fn read_ids(&self, ids: &[String], target: &str) -> Result<Box<dyn RecordIter>> {
        self.ensure_open()?;
        if ids.is_empty() {
            return Ok(Box::new(VecRecordIter::new(Vec::new())));
        }
        let dbs = self.existing_target_dbs(target)?;

        let txn = self
            .env
            .begin_ro_txn()
            .map_err(|e| ChronicleError::ConnectionFailure(e.to_string()))?;

        let mut statements = Vec::new();
        for id in ids {
            let key = match txn.get(dbs.ids, id) {
                Ok(key) => key.to_vec(),
                Err(lmdb::Error::NotFound) => continue,
                Err(e) => return Err(ChronicleError::BackendRejected(e.to_string())),
            };
            let doc = match txn.get(dbs.records, &key) {
                Ok(doc) => doc,
                Err(lmdb::Error::NotFound) => continue,
                Err(e) => return Err(ChronicleError::BackendRejected(e.to_string())),
            };
            let value = serde_json::from_slice(doc)
                .map_err(|e| ChronicleError::Serialization(e.to_string()))?;
            statements.push(Statement::from_document(value)?);
        }
        statements.sort_by(chronicle_core::filter::sort_key_cmp);
        Ok(Box::new(VecRecordIter::new(statements)))
    }

    fn list(&self, target: &str) -> Result<Vec<String>> {
        self.ensure_open()?;

        // The unnamed database holds one entry per named database.
        let main = self
            .env
            .open_db(None)
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
        let txn = self
            .env
            .begin_ro_txn()
            .map_err(|e| ChronicleError::ConnectionFailure(e.to_string()))?;

        let mut names = Vec::new();
        {
            let mut cursor = txn
                .open_ro_cursor(main)
                .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
            for (key, _) in cursor.iter_start() {
                if let Ok(name) = std::str::from_utf8(key) {
                    if !name.contains('#') && name.starts_with(target) {
                        names.push(name.to_owned());
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl StatementBackend for LmdbStatementBackend {
    fn query_statements(&self, query: &StatementQuery, target: &str) -> Result<StatementPage> {
        self.ensure_open()?;
        let dbs = self.existing_target_dbs(target)?;
        // Post-filter fallback: the engine supplies key-ordered records,
        // the shared filter supplies the full query semantics.
        let scan = LmdbScanIter::new(self.env.clone(), dbs.records);
        collect_page(Box::new(scan), query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::traits::backend::drain;
    use serde_json::json;
    use tempfile::TempDir;

    fn backend() -> (LmdbStatementBackend, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LmdbBackendConfig::new(dir.path().join("lmdb"));
        (LmdbStatementBackend::open(cfg).unwrap(), dir)
    }

    fn statement(id: &str, actor: &str, stored: &str) -> Statement {
        let raw = json!({
            "id": id,
            "actor": actor,
            "verb": "accessed",
            "object": "course/42",
            "timestamp": stored,
            "stored": stored,
            "authority": "mailto:lrs@example.com",
        });
        Statement::from_document(raw).unwrap()
    }

    #[test]
    fn write_then_query_in_stored_order() {
        let (backend, _dir) = backend();
        // Written out of order; key order restores it.
        let stmts = vec![
            statement("b", "u1", "2024-03-01T10:00:00.000002Z"),
            statement("a", "u1", "2024-03-01T10:00:00.000001Z"),
        ];
        let results = backend.write(&stmts, "main").unwrap();
        assert_eq!(results, vec![WriteStatus::Persisted, WriteStatus::Persisted]);

        let page = backend
            .query_statements(&StatementQuery::new(), "main")
            .unwrap();
        let ids: Vec<_> = page.statements.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn duplicate_id_rejected_per_item() {
        let (backend, _dir) = backend();
        backend
            .write(&[statement("a", "u1", "2024-03-01T10:00:00.000001Z")], "main")
            .unwrap();

        let results = backend
            .write(
                &[
                    statement("a", "u1", "2024-03-01T10:00:00.000009Z"),
                    statement("b", "u1", "2024-03-01T10:00:00.000003Z"),
                ],
                "main",
            )
            .unwrap();
        assert!(matches!(results[0], WriteStatus::Rejected(_)));
        assert_eq!(results[1], WriteStatus::Persisted);
    }

    #[test]
    fn read_ids_finds_records() {
        let (backend, _dir) = backend();
        backend
            .write(
                &[
                    statement("a", "u1", "2024-03-01T10:00:00.000001Z"),
                    statement("b", "u1", "2024-03-01T10:00:00.000002Z"),
                ],
                "main",
            )
            .unwrap();

        let found = drain(
            backend
                .read_ids(&["b".into(), "missing".into()], "main")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "b");
    }

    #[test]
    fn missing_target_is_not_found() {
        let (backend, _dir) = backend();
        let err = backend
            .query_statements(&StatementQuery::new(), "nowhere")
            .unwrap_err();
        assert!(matches!(err, ChronicleError::NotFound(_)));
    }

    #[test]
    fn list_hides_index_databases() {
        let (backend, _dir) = backend();
        backend
            .write(&[statement("a", "u1", "2024-03-01T10:00:00.000001Z")], "alpha")
            .unwrap();
        backend
            .write(&[statement("b", "u1", "2024-03-01T10:00:00.000002Z")], "beta")
            .unwrap();

        assert_eq!(backend.list("").unwrap(), vec!["alpha", "beta"]);
        assert_eq!(backend.list("al").unwrap(), vec!["alpha"]);
    }

    #[test]
    fn close_is_idempotent() {
        let (backend, _dir) = backend();
        backend.close().unwrap();
        backend.close().unwrap();
        let err = backend.write(&[], "main").unwrap_err();
        assert!(matches!(err, ChronicleError::ConnectionFailure(_)));
    }
}
