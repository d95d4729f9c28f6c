//! SQLite statement backend for chronicle.
//!
//! The richest adapter in the workspace: equality filters, time ranges,
//! the voiding anti-join, ordering, and keyset pagination all execute
//! inside the engine, so queries never materialize more than one page.

mod query;
mod schema;
mod store;

pub use store::{SqliteBackendConfig, SqliteStatementBackend};
