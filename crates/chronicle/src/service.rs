//! Unified service facade wiring the access gate, ingestion pipeline, and
//! statement store over the configured backends.

use std::sync::Arc;
use std::time::Instant;

use chronicle_core::config::ChronicleConfig;
use chronicle_core::error::{ChronicleError, Result};
use chronicle_core::observe;
use chronicle_core::traits::collaborators::{
    CredentialResolver, RequiredFieldsValidator, StatementValidator,
};
use chronicle_core::traits::statement::StatementBackend;
use chronicle_core::types::outcome::BatchReport;
use chronicle_core::types::query::{StatementPage, StatementQuery};
use chronicle_core::types::scope::Breadth;
use chronicle_core::types::statement::Statement;
use serde_json::Value;

use crate::gate::AccessGate;
use crate::ingest::IngestionPipeline;
use crate::registry::BackendRegistry;
use crate::store::StatementStore;

/// The learning record store service.
///
/// Cheap to clone; all state lives behind one shared handle. Backends are
/// chosen by name at construction time and never switch per request.
#[derive(Clone)]
pub struct LrsService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: ChronicleConfig,
    gate: AccessGate,
    pipeline: IngestionPipeline,
    store: Arc<StatementStore>,
    ingest_backend: Arc<dyn StatementBackend>,
    query_backend: Arc<dyn StatementBackend>,
}

impl LrsService {
    /// Open the service with the built-in backend registry and the minimal
    /// structural validator.
    pub fn open(config: ChronicleConfig, resolver: Arc<dyn CredentialResolver>) -> Result<Self> {
        Self::open_with(
            config,
            &BackendRegistry::with_defaults(),
            resolver,
            Arc::new(RequiredFieldsValidator),
        )
    }

    /// Open the service with a caller-supplied registry and validator.
    pub fn open_with(
        config: ChronicleConfig,
        registry: &BackendRegistry,
        resolver: Arc<dyn CredentialResolver>,
        validator: Arc<dyn StatementValidator>,
    ) -> Result<Self> {
        let ingest_backend = registry.build(&config.ingest_backend, &config)?;
        let query_backend = if config.query_backend == config.ingest_backend {
            ingest_backend.clone()
        } else {
            registry.build(&config.query_backend, &config)?
        };

        let store = Arc::new(StatementStore::new(
            ingest_backend.clone(),
            query_backend.clone(),
        ));
        let pipeline =
            IngestionPipeline::new(store.clone(), validator, config.max_batch_size);
        let gate = AccessGate::new(resolver, config.auth_cache_ttl());

        tracing::info!(
            ingest = %config.ingest_backend,
            query = %config.query_backend,
            target = %config.default_target,
            "statement store opened"
        );

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config,
                gate,
                pipeline,
                store,
                ingest_backend,
                query_backend,
            }),
        })
    }

    pub fn config(&self) -> &ChronicleConfig {
        &self.inner.config
    }

    /// Ingest one statement or an ordered batch.
    ///
    /// Authorization short-circuits before any backend call. The report
    /// carries the accepted identifiers on full success and the per-item
    /// outcome array otherwise.
    pub fn ingest(&self, credential: &str, documents: Vec<Value>) -> Result<BatchReport> {
        let scopes = self.inner.gate.authenticate(credential)?;
        self.inner.gate.authorize_write(&scopes)?;
        Ok(self.inner.pipeline.ingest(
            documents,
            scopes.authority(),
            &self.inner.config.default_target,
        ))
    }

    /// Evaluate a statement query, with mandatory narrowing for
    /// `mine`-scoped credentials and the page size clamped to the
    /// configured maximum.
    pub fn query(&self, credential: &str, mut query: StatementQuery) -> Result<StatementPage> {
        let scopes = self.inner.gate.authenticate(credential)?;
        self.inner.gate.authorize_read(&scopes, &mut query)?;

        let max = self.inner.config.max_page_size;
        if query.limit == 0 || query.limit > max {
            query.limit = max;
        }

        let started = Instant::now();
        let page = self
            .inner
            .store
            .query(&query, &self.inner.config.default_target)?;
        observe::record_query(page.statements.len(), started.elapsed());
        Ok(page)
    }

    /// Fetch one statement by id.
    ///
    /// For a `mine`-scoped credential a statement under someone else's
    /// authority is indistinguishable from one that does not exist.
    pub fn find_statement(&self, credential: &str, id: &str) -> Result<Option<Statement>> {
        let scopes = self.inner.gate.authenticate(credential)?;
        let breadth = self.inner.gate.read_breadth(&scopes)?;

        let found = self
            .inner
            .store
            .find_by_id(id, &self.inner.config.default_target)?;
        Ok(match (breadth, found) {
            (Breadth::Mine, Some(stmt)) if stmt.authority != scopes.authority() => None,
            (_, found) => found,
        })
    }

    /// Enumerate the storable units behind the query backend. Read scope
    /// required; introspection only.
    pub fn list_targets(&self, credential: &str) -> Result<Vec<String>> {
        let scopes = self.inner.gate.authenticate(credential)?;
        self.inner.gate.read_breadth(&scopes)?;
        self.inner.query_backend.list("")
    }

    /// Async variant of [`ingest`](Self::ingest); moves the blocking call
    /// onto the runtime's blocking pool.
    pub async fn ingest_async(
        &self,
        credential: impl Into<String>,
        documents: Vec<Value>,
    ) -> Result<BatchReport> {
        let service = self.clone();
        let credential = credential.into();
        tokio::task::spawn_blocking(move || service.ingest(&credential, documents))
            .await
            .map_err(|e| ChronicleError::Other(anyhow::anyhow!("ingest task failed: {e}")))?
    }

    /// Async variant of [`query`](Self::query).
    pub async fn query_async(
        &self,
        credential: impl Into<String>,
        query: StatementQuery,
    ) -> Result<StatementPage> {
        let service = self.clone();
        let credential = credential.into();
        tokio::task::spawn_blocking(move || service.query(&credential, query))
            .await
            .map_err(|e| ChronicleError::Other(anyhow::anyhow!("query task failed: {e}")))?
    }

    /// Release backend connections. Safe to call more than once.
    pub fn close(&self) -> Result<()> {
        self.inner.ingest_backend.close()?;
        self.inner.query_backend.close()?;
        Ok(())
    }
}
