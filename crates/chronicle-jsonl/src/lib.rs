//! Flat-file JSON Lines statement backend for chronicle.
//!
//! One append-only `<target>.jsonl` file per target; reads are lazy scans
//! and the shared post-filter fallback supplies the full query semantics.

mod store;

pub use store::{JsonlBackendConfig, JsonlStatementBackend};
