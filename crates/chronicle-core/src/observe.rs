//! Optional metrics instrumentation.
//!
//! When the `observe` feature is enabled, key operations emit counters and
//! histograms via the [`metrics`] crate; a downstream application must
//! install a recorder to collect them. Without the feature every function
//! here is a zero-cost no-op.

/// Record one ingestion call (counter + batch size + latency histogram).
///
/// - `chronicle.ingest.batches_total`
/// - `chronicle.ingest.items_total`
/// - `chronicle.ingest.duration_seconds`
#[inline]
pub fn record_ingest(items: usize, duration: std::time::Duration) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chronicle.ingest.batches_total").increment(1);
        metrics::counter!("chronicle.ingest.items_total").increment(items as u64);
        metrics::histogram!("chronicle.ingest.duration_seconds").record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (items, duration);
    }
}

/// Record one per-item ingestion outcome.
///
/// - `chronicle.ingest.outcomes_total` with an `outcome` label
///   (`stored` / `duplicate` / `rejected` / `deferred`)
#[inline]
pub fn record_item_outcome(outcome: &'static str) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chronicle.ingest.outcomes_total", "outcome" => outcome).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = outcome;
    }
}

/// Record one statement query (counter + result count + latency).
///
/// - `chronicle.query.total`
/// - `chronicle.query.results_total`
/// - `chronicle.query.duration_seconds`
#[inline]
pub fn record_query(results: usize, duration: std::time::Duration) {
    #[cfg(feature = "observe")]
    {
        metrics::counter!("chronicle.query.total").increment(1);
        metrics::counter!("chronicle.query.results_total").increment(results as u64);
        metrics::histogram!("chronicle.query.duration_seconds").record(duration.as_secs_f64());
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = (results, duration);
    }
}

/// Record an authorization cache hit or miss.
///
/// - `chronicle.auth_cache.lookups_total` with a `result` label
#[inline]
pub fn record_auth_lookup(hit: bool) {
    #[cfg(feature = "observe")]
    {
        let result = if hit { "hit" } else { "miss" };
        metrics::counter!("chronicle.auth_cache.lookups_total", "result" => result).increment(1);
    }
    #[cfg(not(feature = "observe"))]
    {
        let _ = hit;
    }
}
