//! LMDB statement backend for chronicle.
//!
//! Statements live under `(stored, id)` keys in one named database per
//! target, with a companion id index for point lookups. The engine supplies
//! ordered storage; query semantics beyond ordering come from the shared
//! post-filter fallback in `chronicle-core`.

mod iter;
mod keys;
mod store;

pub use store::{LmdbBackendConfig, LmdbStatementBackend};
