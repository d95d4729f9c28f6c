//! Convenience re-exports for service consumers.

pub use crate::gate::AccessGate;
pub use crate::ingest::IngestionPipeline;
pub use crate::registry::BackendRegistry;
pub use crate::service::LrsService;
pub use crate::store::StatementStore;

pub use chronicle_core::{
    drain, BatchReport, Capabilities, ChronicleConfig, ChronicleError, CredentialResolver, Cursor,
    ItemOutcome, RecordBackend, RecordIter, RejectReason, RequiredFieldsValidator, Result, Scope,
    ScopeSet, SortOrder, Statement, StatementBackend, StatementPage, StatementQuery,
    StatementValidator, WriteStatus, VOIDING_VERB,
};

pub use chronicle_jsonl::{JsonlBackendConfig, JsonlStatementBackend};
pub use chronicle_lmdb::{LmdbBackendConfig, LmdbStatementBackend};
pub use chronicle_sqlite::{SqliteBackendConfig, SqliteStatementBackend};
