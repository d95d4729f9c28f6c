use crate::error::Result;
use crate::traits::backend::RecordBackend;
use crate::types::query::{StatementPage, StatementQuery};

/// Statement-aware backend surface: the record contract plus the abstract
/// query operation each adapter's translator implements natively or through
/// the post-filter fallback.
pub trait StatementBackend: RecordBackend {
    /// Evaluate an abstract statement query against `target`.
    ///
    /// Guarantees, independent of engine: voided statements and voiding
    /// statements are excluded unless the query asks for them; time bounds
    /// are the half-open interval `[since, until)`; results follow the
    /// total `(stored, id)` order in the requested direction; the
    /// continuation cursor is present exactly when more results remain.
    fn query_statements(&self, query: &StatementQuery, target: &str) -> Result<StatementPage>;
}
