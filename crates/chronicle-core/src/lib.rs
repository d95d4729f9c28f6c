//! Chronicle Core: traits and types for the chronicle storage subsystem
//!
//! This crate defines the abstractions a learning record store is built
//! from:
//! - Backend contract: the fixed operation set and error taxonomy every
//!   storage adapter satisfies, tagged with a declared capability set
//! - Statement model: immutable records with server-assigned storage time
//!   and read-time voiding resolution
//! - Query model: engine-neutral filters with stable `(stored, id)`
//!   ordering and opaque continuation cursors
//! - Post-filter fallback: full query semantics for engines without native
//!   predicates
//!
//! Adapters hold no business invariants; the statement store composes an
//! adapter and enforces append-only semantics on top of it.

pub mod clock;
pub mod config;
pub mod cursor;
pub mod error;
pub mod filter;
pub mod observe;
pub mod traits;
pub mod types;

pub use clock::StoredClock;
pub use config::ChronicleConfig;
pub use cursor::Cursor;
pub use error::{ChronicleError, Result};
pub use traits::{
    drain, Capabilities, CredentialResolver, RecordBackend, RecordIter, RequiredFieldsValidator,
    StatementBackend, StatementValidator, VecRecordIter, WriteStatus,
};
pub use types::{
    equivalent_payloads, AccessMode, BatchReport, Breadth, ItemOutcome, RejectReason, Scope,
    ScopeSet, SortOrder, Statement, StatementPage, StatementQuery, VOIDING_VERB,
};
