use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use chronicle_core::error::{ChronicleError, Result};
use chronicle_core::filter::collect_page;
use chronicle_core::traits::backend::{Capabilities, RecordBackend, RecordIter, WriteStatus};
use chronicle_core::traits::statement::StatementBackend;
use chronicle_core::types::query::{StatementPage, StatementQuery};
use chronicle_core::types::statement::Statement;
use parking_lot::Mutex;

/// Configuration for the flat-file statement backend.
#[derive(Debug, Clone)]
pub struct JsonlBackendConfig {
    /// Base directory for statement files, one `<target>.jsonl` per target.
    pub base_dir: PathBuf,

    /// Buffer size for writes.
    pub write_buffer_size: usize,

    /// Whether to flush the write buffer after each append (default: true).
    ///
    /// When `true`, every write call flushes the `BufWriter`, so appended
    /// statements reach the OS page cache immediately. Set to `false` for
    /// maximum throughput at the cost of losing buffered statements on a
    /// process crash.
    pub flush_on_append: bool,
}

impl JsonlBackendConfig {
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            write_buffer_size: 256 * 1024,
            flush_on_append: true,
        }
    }

    pub fn with_flush_on_append(mut self, flush: bool) -> Self {
        self.flush_on_append = flush;
        self
    }
}

/// Flat-file statement store adapter: one append-only JSON Lines file per
/// target.
///
/// The weakest engine in the workspace - no native predicates at all - and
/// therefore the reference exercise for the post-filter fallback, which
/// supplies the complete query semantics over a plain scan.
pub struct JsonlStatementBackend {
    config: JsonlBackendConfig,
    writers: Mutex<HashMap<String, BufWriter<File>>>,
    closed: AtomicBool,
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

impl JsonlStatementBackend {
    /// Open or create the base directory.
    pub fn open(config: JsonlBackendConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.base_dir)?;
        Ok(Self {
            config,
            writers: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        })
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ChronicleError::ConnectionFailure("backend closed".into()));
        }
        Ok(())
    }

    fn target_path(&self, target: &str) -> Result<PathBuf> {
        validate_target(target)?;
        Ok(self.config.base_dir.join(format!("{target}.jsonl")))
    }

    fn open_reader(&self, target: &str) -> Result<BufReader<File>> {
        let path = self.target_path(target)?;
        if !path.exists() {
            return Err(ChronicleError::NotFound(format!("target {target:?}")));
        }
        let file = File::open(&path).map_err(connection)?;
        Ok(BufReader::new(file))
    }
}

fn connection(e: std::io::Error) -> ChronicleError {
    ChronicleError::ConnectionFailure(e.to_string())
}

impl RecordBackend for JsonlStatementBackend {
    fn capabilities(&self) -> Capabilities {
        Capabilities::bulk_only()
    }

    fn write(&self, statements: &[Statement], target: &str) -> Result<Vec<WriteStatus>> {
        self.ensure_open()?;
        let path = self.target_path(target)?;

        let mut writers = self.writers.lock();
        let writer = match writers.entry(target.to_owned()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .map_err(connection)?;
                entry.insert(BufWriter::with_capacity(self.config.write_buffer_size, file))
            }
        };

        let mut results = Vec::with_capacity(statements.len());
        for statement in statements {
            let mut line = serde_json::to_vec(&statement.raw)
                .map_err(|e| ChronicleError::Serialization(e.to_string()))?;
            line.push(b'\n');
            // An IO failure here is connection-level: the file handle is
            // gone for every remaining item, so no per-item progress is
            // meaningful.
            writer.write_all(&line).map_err(connection)?;
            results.push(WriteStatus::Persisted);
        }
        if self.config.flush_on_append {
            writer.flush().map_err(connection)?;
        }
        Ok(results)
    }

    fn read_ids(&self, ids: &[String], target: &str) -> Result<Box<dyn RecordIter>> {
        self.ensure_open()?;
        if let Some(writer) = self.writers.lock().get_mut(target) {
            writer.flush().map_err(connection)?;
        }
        let reader = self.open_reader(target)?;
        let wanted: HashSet<String> = ids.iter().cloned().collect();
        Ok(Box::new(JsonlScanIter {
            lines: reader.lines(),
            wanted: Some(wanted),
        }))
    }

    fn list(&self, target: &str) -> Result<Vec<String>> {
        self.ensure_open()?;
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.config.base_dir).map_err(connection)? {
            let entry = entry.map_err(connection)?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if stem.starts_with(target) {
                        names.push(stem.to_owned());
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn close(&self) -> Result<()> {
        let mut writers = self.writers.lock();
        for (_, writer) in writers.iter_mut() {
            writer.flush().map_err(connection)?;
        }
        writers.clear();
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

impl StatementBackend for JsonlStatementBackend {
    fn query_statements(&self, query: &StatementQuery, target: &str) -> Result<StatementPage> {
        self.ensure_open()?;
        // Flush pending appends so the scan sees every persisted record.
        if let Some(writer) = self.writers.lock().get_mut(target) {
            writer.flush().map_err(connection)?;
        }
        let reader = self.open_reader(target)?;
        let scan = JsonlScanIter {
            lines: reader.lines(),
            wanted: None,
        };
        collect_page(Box::new(scan), query)
    }
}

/// Lazy line-by-line scan of one target file, optionally narrowed to a set
/// of ids. Dropping it closes the file handle.
struct JsonlScanIter {
    lines: std::io::Lines<BufReader<File>>,
    wanted: Option<HashSet<String>>,
}

impl RecordIter for JsonlScanIter {
    fn next(&mut self) -> Result<Option<Statement>> {
        for line in self.lines.by_ref() {
            let line = line.map_err(connection)?;
            if line.trim().is_empty() {
                continue;
            }
            let value = serde_json::from_str(&line)
                .map_err(|e| ChronicleError::Serialization(e.to_string()))?;
            let statement = Statement::from_document(value)?;
            match &self.wanted {
                Some(ids) if !ids.contains(&statement.id) => continue,
                _ => return Ok(Some(statement)),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::traits::backend::drain;
    use serde_json::json;
    use tempfile::TempDir;

    fn backend() -> (JsonlStatementBackend, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let cfg = JsonlBackendConfig::new(dir.path().join("jsonl"));
        (JsonlStatementBackend::open(cfg).unwrap(), dir)
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
    fn append_then_scan_round_trip() {
        let (backend, _dir) = backend();
        let stmts = vec![
            statement("b", "u1", "2024-03-01T10:00:00.000002Z"),
            statement("a", "u2", "2024-03-01T10:00:00.000001Z"),
        ];
        let results = backend.write(&stmts, "main").unwrap();
        assert_eq!(results, vec![WriteStatus::Persisted, WriteStatus::Persisted]);

        // Query sorts by (stored, id) even though the file holds append
        // order.
        let page = backend
            .query_statements(&StatementQuery::new(), "main")
            .unwrap();
        let ids: Vec<_> = page.statements.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn read_ids_scans_lazily() {
        let (backend, _dir) = backend();
        backend
            .write(
                &[
                    statement("a", "u1", "2024-03-01T10:00:00.000001Z"),
                    statement("b", "u1", "2024-03-01T10:00:00.000002Z"),
                    statement("c", "u1", "2024-03-01T10:00:00.000003Z"),
                ],
                "main",
            )
            .unwrap();

        let mut iter = backend.read_ids(&["b".into()], "main").unwrap();
        let first = iter.next().unwrap().unwrap();
        assert_eq!(first.id, "b");
        // Abandon the iterator mid-scan; Drop releases the file handle.
        drop(iter);
    }

    #[test]
    fn missing_target_is_not_found() {
        let (backend, _dir) = backend();
        let err = backend
            .query_statements(&StatementQuery::new(), "nowhere")
            .unwrap_err();
        assert!(matches!(err, ChronicleError::NotFound(_)));

        let err = match backend.read_ids(&["x".into()], "nowhere") {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, ChronicleError::NotFound(_)));
    }

    #[test]
    fn list_reports_target_files() {
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
    fn close_flushes_and_is_idempotent() {
        let (backend, dir) = backend();
        backend
            .write(&[statement("a", "u1", "2024-03-01T10:00:00.000001Z")], "main")
            .unwrap();
        backend.close().unwrap();
        backend.close().unwrap();

        let content =
            std::fs::read_to_string(dir.path().join("jsonl").join("main.jsonl")).unwrap();
        assert!(content.contains("\"id\":\"a\""));

        let err = backend.write(&[], "main").unwrap_err();
        assert!(matches!(err, ChronicleError::ConnectionFailure(_)));
    }
}
