//! Explicit backend registry: configuration names map to constructors,
//! built once at startup. Unknown names fail there, not at first use.

use std::collections::HashMap;
use std::sync::Arc;

use chronicle_core::config::ChronicleConfig;
use chronicle_core::error::{ChronicleError, Result};
use chronicle_core::traits::statement::StatementBackend;
use chronicle_jsonl::{JsonlBackendConfig, JsonlStatementBackend};
use chronicle_lmdb::{LmdbBackendConfig, LmdbStatementBackend};
use chronicle_sqlite::{SqliteBackendConfig, SqliteStatementBackend};

type BackendBuilder = Box<dyn Fn(&ChronicleConfig) -> Result<Arc<dyn StatementBackend>> + Send + Sync>;

/// Maps a configuration-supplied backend name to its constructor.
pub struct BackendRegistry {
    builders: HashMap<String, BackendBuilder>,
}

impl BackendRegistry {
    /// An empty registry; callers register everything themselves.
    pub fn new() -> Self {
        Self {
            builders: HashMap::new(),
        }
    }

    /// The registry with the built-in adapters: `sqlite`, `lmdb`, `jsonl`.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("sqlite", |cfg: &ChronicleConfig| {
            let backend = SqliteStatementBackend::open(SqliteBackendConfig::new(
                cfg.path.join("statements.db"),
            ))?;
            Ok(Arc::new(backend) as Arc<dyn StatementBackend>)
        });
        registry.register("lmdb", |cfg: &ChronicleConfig| {
            let backend = LmdbStatementBackend::open(LmdbBackendConfig::new(cfg.path.join("lmdb")))?;
            Ok(Arc::new(backend) as Arc<dyn StatementBackend>)
        });
        registry.register("jsonl", |cfg: &ChronicleConfig| {
            let backend =
                JsonlStatementBackend::open(JsonlBackendConfig::new(cfg.path.join("jsonl")))?;
            Ok(Arc::new(backend) as Arc<dyn StatementBackend>)
        });
        registry
    }

    /// Register a constructor under a name, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, builder: F)
    where
        F: Fn(&ChronicleConfig) -> Result<Arc<dyn StatementBackend>> + Send + Sync + 'static,
    {
        self.builders.insert(name.into(), Box::new(builder));
    }

    /// Construct the backend registered under `name`.
    pub fn build(&self, name: &str, config: &ChronicleConfig) -> Result<Arc<dyn StatementBackend>> {
        match self.builders.get(name) {
            Some(builder) => builder(config),
            None => {
                let mut known = self.names();
                known.sort_unstable();
                Err(ChronicleError::Config(format!(
                    "unknown backend {name:?}, known backends: {known:?}"
                )))
            }
        }
    }

    pub fn names(&self) -> Vec<&str> {
        self.builders.keys().map(String::as_str).collect()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
