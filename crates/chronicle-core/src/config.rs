use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Process-wide store configuration.
///
/// Built once at startup and passed by handle to every component that needs
/// it; nothing reads ambient global state. Read-only thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChronicleConfig {
    /// Base directory under which adapters keep their storage.
    pub path: PathBuf,

    /// Registry name of the adapter receiving bulk ingestion.
    #[serde(default = "default_backend")]
    pub ingest_backend: String,

    /// Registry name of the adapter serving queries. May equal
    /// `ingest_backend`, in which case one instance serves both roles.
    #[serde(default = "default_backend")]
    pub query_backend: String,

    /// Logical collection statements land in by default.
    #[serde(default = "default_target")]
    pub default_target: String,

    /// Upper bound on statements per store call; larger ingestion requests
    /// are chunked.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Upper bound on a query page; requested limits are clamped to it.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: usize,

    /// How long a resolved credential stays cached before the scope source
    /// is consulted again. Bounds revocation propagation delay.
    #[serde(default = "default_auth_cache_ttl")]
    pub auth_cache_ttl_secs: u64,
}

fn default_backend() -> String {
    "sqlite".to_owned()
}

fn default_target() -> String {
    "statements".to_owned()
}

fn default_max_batch_size() -> usize {
    500
}

fn default_max_page_size() -> usize {
    500
}

fn default_auth_cache_ttl() -> u64 {
    60
}

impl ChronicleConfig {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            ingest_backend: default_backend(),
            query_backend: default_backend(),
            default_target: default_target(),
            max_batch_size: default_max_batch_size(),
            max_page_size: default_max_page_size(),
            auth_cache_ttl_secs: default_auth_cache_ttl(),
        }
    }

    pub fn with_backend(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        self.ingest_backend = name.clone();
        self.query_backend = name;
        self
    }

    pub fn with_ingest_backend(mut self, name: impl Into<String>) -> Self {
        self.ingest_backend = name.into();
        self
    }

    pub fn with_query_backend(mut self, name: impl Into<String>) -> Self {
        self.query_backend = name.into();
        self
    }

    pub fn with_default_target(mut self, target: impl Into<String>) -> Self {
        self.default_target = target.into();
        self
    }

    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    pub fn with_max_page_size(mut self, size: usize) -> Self {
        self.max_page_size = size;
        self
    }

    pub fn with_auth_cache_ttl(mut self, ttl_secs: u64) -> Self {
        self.auth_cache_ttl_secs = ttl_secs;
        self
    }

    pub fn auth_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.auth_cache_ttl_secs)
    }
}
