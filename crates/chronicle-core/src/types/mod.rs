pub mod outcome;
pub mod query;
pub mod scope;
pub mod statement;

pub use outcome::{BatchReport, ItemOutcome, RejectReason};
pub use query::{SortOrder, StatementPage, StatementQuery, DEFAULT_PAGE_SIZE};
pub use scope::{AccessMode, Breadth, Scope, ScopeSet};
pub use statement::{equivalent_payloads, Statement, VOIDING_VERB};
