use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::statement::Statement;

/// What a storage engine can evaluate natively.
///
/// The query translator for an adapter consults this set to decide between
/// native push-down and the in-memory post-filter fallback; the observable
/// query semantics are identical either way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Multiple records persist in one engine round trip.
    pub bulk_write: bool,
    /// Equality filters on indexed fields evaluate inside the engine.
    pub native_filter: bool,
    /// Range filters and ordered continuation evaluate inside the engine.
    pub native_range_filter: bool,
}

impl Capabilities {
    /// Everything pushes down.
    pub const fn full() -> Self {
        Self {
            bulk_write: true,
            native_filter: true,
            native_range_filter: true,
        }
    }

    /// Ordered storage without field predicates.
    pub const fn ordered_only() -> Self {
        Self {
            bulk_write: true,
            native_filter: false,
            native_range_filter: true,
        }
    }

    /// Append-only storage; every query post-filters.
    pub const fn bulk_only() -> Self {
        Self {
            bulk_write: true,
            native_filter: false,
            native_range_filter: false,
        }
    }
}

/// Per-item result of a bulk write. A whole-call `Err` is reserved for
/// connection-level failures where no partial progress is meaningful.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteStatus {
    Persisted,
    /// The engine refused this item; siblings proceed independently.
    Rejected(String),
}

/// Lazy statement sequence. Dropping the iterator releases whatever
/// cursor or handle backs it.
pub trait RecordIter: Send {
    /// Next statement, or `None` when the sequence is exhausted.
    fn next(&mut self) -> Result<Option<Statement>>;
}

/// A materialized record sequence, for adapters whose reads are bounded.
pub struct VecRecordIter(std::vec::IntoIter<Statement>);

impl VecRecordIter {
    pub fn new(statements: Vec<Statement>) -> Self {
        Self(statements.into_iter())
    }
}

impl RecordIter for VecRecordIter {
    fn next(&mut self) -> Result<Option<Statement>> {
        Ok(self.0.next())
    }
}

/// Drain a lazy sequence into memory.
pub fn drain(mut iter: Box<dyn RecordIter>) -> Result<Vec<Statement>> {
    let mut out = Vec::new();
    while let Some(stmt) = iter.next()? {
        out.push(stmt);
    }
    Ok(out)
}

/// The contract every storage adapter satisfies.
///
/// Adapters hold no business invariants - only translation logic and
/// transient connection state. All operations are safe to call
/// concurrently; `close` is safe to call more than once.
pub trait RecordBackend: Send + Sync {
    /// The engine's declared capability set.
    fn capabilities(&self) -> Capabilities;

    /// Persist documents into `target`, reporting success or failure per
    /// item - never all-or-nothing.
    fn write(&self, statements: &[Statement], target: &str) -> Result<Vec<WriteStatus>>;

    /// Read statements with the given ids from `target`, lazily.
    fn read_ids(&self, ids: &[String], target: &str) -> Result<Box<dyn RecordIter>>;

    /// Enumerate the storable units (tables, databases, files) whose name
    /// starts with `target`; an empty `target` lists everything. Used for
    /// introspection, not statement traffic.
    fn list(&self, target: &str) -> Result<Vec<String>>;

    /// Release held connections. Idempotent.
    fn close(&self) -> Result<()>;
}
