use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chronicle_core::cursor::Cursor;
use chronicle_core::error::{ChronicleError, Result};
use chronicle_core::traits::backend::{
    Capabilities, RecordBackend, RecordIter, VecRecordIter, WriteStatus,
};
use chronicle_core::traits::statement::StatementBackend;
use chronicle_core::types::query::{StatementPage, StatementQuery};
use chronicle_core::types::statement::{rfc3339_micros, Statement};
use parking_lot::Mutex;
use rusqlite::{params_from_iter, Connection, OpenFlags};

use crate::query::translate;
use crate::schema;

/// Configuration for the SQLite statement backend.
#[derive(Debug, Clone)]
pub struct SqliteBackendConfig {
    /// Path to the database file.
    pub path: PathBuf,

    /// Enable WAL mode (default: true).
    pub wal_mode: bool,
}

impl SqliteBackendConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            wal_mode: true,
        }
    }

    pub fn with_wal_mode(mut self, wal_mode: bool) -> Self {
        self.wal_mode = wal_mode;
        self
    }
}

/// SQLite-backed statement store adapter.
///
/// The engine evaluates the entire query natively: indexed equality
/// filters, the half-open time range, the voiding anti-join, and
/// `(stored, id)` keyset pagination.
pub struct SqliteStatementBackend {
    conn: Arc<Mutex<Connection>>,
    closed: AtomicBool,
}

impl SqliteStatementBackend {
    /// Open or create the backing database file.
    pub fn open(cfg: SqliteBackendConfig) -> Result<Self> {
        if let Some(parent) = cfg.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open_with_flags(
            &cfg.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(|e| ChronicleError::ConnectionFailure(e.to_string()))?;

        if cfg.wal_mode {
            conn.pragma_update(None, "journal_mode", "WAL")
                .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
        }
        conn.pragma_update(None, "synchronous", "NORMAL")
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChronicleError::ConnectionFailure("backend closed".into()));
        }
        Ok(())
    }

    /// Resolve a target's table, failing with `NotFound` when reading a
    /// target that was never written.
    fn existing_table(&self, conn: &Connection, target: &str) -> Result<String> {
        let table = schema::table_name(target)?;
        if !schema::target_exists(conn, &table)? {
            return Err(ChronicleError::NotFound(format!("target {target:?}")));
        }
        Ok(table)
    }
}

impl RecordBackend for SqliteStatementBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::full()
    }

    fn write(&self, statements: &[Statement], target: &str) -> Result<Vec<WriteStatus>> {
        self.ensure_open()?;
        let table = schema::table_name(target)?;
        let conn = self.conn.lock();
        schema::init_target(&conn, &table)?;

        // One insert per item so a single refusal never poisons siblings.
        let sql = format!(
            "INSERT INTO {table} \
             (id, actor, verb, object, authority, timestamp, stored, void_target, doc) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;

        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            let doc = serde_json::to_string(&statement.raw)
                .map_err(|e| ChronicleError::Serialization(e.to_string()))?;
            let outcome = stmt.execute(rusqlite::params![
                statement.id,
                statement.actor,
                statement.verb,
                statement.object,
                statement.authority,
                rfc3339_micros(&statement.timestamp),
                rfc3339_micros(&statement.stored),
                statement.void_target,
                doc,
            ]);
            results.push(match outcome {
                Ok(_) => WriteStatus::Persisted,
                Err(e) => WriteStatus::Rejected(e.to_string()),
            });
        }
        Ok(results)
    }

    fn read_ids(&self, ids: &[String], target: &str) -> Result<Box<dyn RecordIter>> {
        self.ensure_open()?;
        if ids.is_empty() {
            return Ok(Box::new(VecRecordIter::new(Vec::new())));
        }
        let conn = self.conn.lock();
        let table = self.existing_table(&conn, target)?;

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT doc FROM {table} WHERE id IN ({placeholders}) ORDER BY stored, id"
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(ids.iter()), |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;

        let mut statements = Vec::new();
        for row in rows {
            let doc = row.map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
            statements.push(parse_doc(&doc)?);
        }
        // Bounded by the id list, so materializing keeps the iterator free
        // of the connection lock.
        Ok(Box::new(VecRecordIter::new(statements)))
    }

    fn list(&self, target: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT name FROM sqlite_master WHERE type = 'table' \
                 AND name LIKE 'statements\\_%' ESCAPE '\\' ORDER BY name",
            )
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;

        let mut names = Vec::new();
        for row in rows {
            let table = row.map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
            if let Some(name) = schema::target_of(&table) {
                if name.starts_with(target) {
                    names.push(name.to_owned());
                }
            }
        }
        Ok(names)
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl StatementBackend for SqliteStatementBackend {
    fn query_statements(&self, query: &StatementQuery, target: &str) -> Result<StatementPage> {
        self.ensure_open()?;
        let conn = self.conn.lock();
        let table = self.existing_table(&conn, target)?;

        let native = translate(query, &table);
        let mut stmt = conn
            .prepare(&native.sql)
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
        let rows = stmt
            .query_map(params_from_iter(native.params), |row| {
                row.get::<_, String>(0)
            })
            .map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;

        let mut statements = Vec::new();
        for row in rows {
            let doc = row.map_err(|e| ChronicleError::BackendRejected(e.to_string()))?;
            statements.push(parse_doc(&doc)?);
        }

        let more = query.limit != 0 && statements.len() > query.limit;
        if more {
            statements.truncate(query.limit);
        }
        let next = if more {
            statements
                .last()
                .map(|s| Cursor::new(s.stored, s.id.clone()))
        } else {
            None
        };

        Ok(StatementPage { statements, next })
    }
}

fn parse_doc(doc: &str) -> Result<Statement> {
    let value = serde_json::from_str(doc)
        .map_err(|e| ChronicleError::Serialization(e.to_string()))?;
    Statement::from_document(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::traits::backend::drain;
    use serde_json::json;
    use tempfile::TempDir;

    fn backend() -> (SqliteStatementBackend, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = SqliteBackendConfig::new(dir.path().join("statements.db"));
        (SqliteStatementBackend::open(cfg).unwrap(), dir)
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
    fn write_then_query_round_trip() {
        let (backend, _dir) = backend();
        let stmts = vec![
            statement("a", "u1", "2024-03-01T10:00:00.000001Z"),
            statement("b", "u2", "2024-03-01T10:00:00.000002Z"),
        ];
        let results = backend.write(&stmts, "main").unwrap();
        assert_eq!(results, vec![WriteStatus::Persisted, WriteStatus::Persisted]);

        let page = backend
            .query_statements(&StatementQuery::new(), "main")
            .unwrap();
        let ids: Vec<_> = page.statements.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(page.next.is_none());

        let page = backend
            .query_statements(&StatementQuery::new().with_actor("u2"), "main")
            .unwrap();
        assert_eq!(page.statements.len(), 1);
        assert_eq!(page.statements[0].id, "b");
    }

    #[test]
    fn duplicate_id_rejected_per_item() {
        let (backend, _dir) = backend();
        let first = vec![statement("a", "u1", "2024-03-01T10:00:00.000001Z")];
        backend.write(&first, "main").unwrap();

        let second = vec![
            statement("a", "u1", "2024-03-01T10:00:00.000002Z"),
            statement("b", "u1", "2024-03-01T10:00:00.000003Z"),
        ];
        let results = backend.write(&second, "main").unwrap();
        assert!(matches!(results[0], WriteStatus::Rejected(_)));
        assert_eq!(results[1], WriteStatus::Persisted);
    }

    #[test]
    fn read_ids_returns_matches_only() {
        let (backend, _dir) = backend();
        let stmts = vec![
            statement("a", "u1", "2024-03-01T10:00:00.000001Z"),
            statement("b", "u1", "2024-03-01T10:00:00.000002Z"),
        ];
        backend.write(&stmts, "main").unwrap();

        let found = drain(
            backend
                .read_ids(&["a".into(), "missing".into()], "main")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a");
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
    fn list_filters_by_prefix() {
        let (backend, _dir) = backend();
        backend
            .write(&[statement("a", "u1", "2024-03-01T10:00:00.000001Z")], "alpha")
            .unwrap();
        backend
            .write(&[statement("b", "u1", "2024-03-01T10:00:00.000002Z")], "beta")
            .unwrap();

        assert_eq!(backend.list("").unwrap(), vec!["alpha", "beta"]);
        assert_eq!(backend.list("be").unwrap(), vec!["beta"]);
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
