//! Chronicle: a learning record store core.
//!
//! Accepts, persists, and retrieves immutable learning-activity statements
//! on behalf of many independent clients, over interchangeable storage
//! engines:
//! - Statement store: append-only semantics, idempotent deduplication,
//!   monotonic storage ordering, read-time voiding resolution
//! - Ingestion pipeline: validation, chunked bulk writes, per-item
//!   outcomes that never abort sibling items
//! - Access gate: scope enforcement with a TTL-bounded credential cache
//!   and mandatory narrowing for `mine`-scoped credentials
//! - Backend registry: configuration names resolve to adapter
//!   constructors at startup
//!
//! The blocking entry points on [`LrsService`] have `_async` counterparts
//! that run on the tokio blocking pool.

pub mod gate;
pub mod ingest;
pub mod prelude;
pub mod registry;
pub mod service;
pub mod store;

pub use gate::AccessGate;
pub use ingest::IngestionPipeline;
pub use registry::BackendRegistry;
pub use service::LrsService;
pub use store::StatementStore;

pub use chronicle_core::{
    BatchReport, ChronicleConfig, ChronicleError, CredentialResolver, Cursor, ItemOutcome,
    RejectReason, Result, Scope, ScopeSet, SortOrder, Statement, StatementPage, StatementQuery,
    StatementValidator, VOIDING_VERB,
};
