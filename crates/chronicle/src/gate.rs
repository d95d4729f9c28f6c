//! Access control gate: credential resolution with a time-bounded cache,
//! and scope enforcement in front of the statement store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chronicle_core::error::{ChronicleError, Result};
use chronicle_core::observe;
use chronicle_core::traits::collaborators::CredentialResolver;
use chronicle_core::types::query::StatementQuery;
use chronicle_core::types::scope::{AccessMode, Breadth, ScopeSet};
use parking_lot::Mutex;

struct CacheEntry {
    scopes: ScopeSet,
    expires_at: Instant,
}

/// Resolves credentials to scopes and authorizes operations before they
/// run.
///
/// Resolutions are cached with a bounded TTL so revocation at the
/// credential source propagates within a known delay; concurrent
/// resolutions of the same credential collapse into a single resolver call
/// through a per-credential flight guard.
pub struct AccessGate {
    resolver: Arc<dyn CredentialResolver>,
    ttl: Duration,
    cache: Mutex<HashMap<String, CacheEntry>>,
    inflight: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl AccessGate {
    pub fn new(resolver: Arc<dyn CredentialResolver>, ttl: Duration) -> Self {
        Self {
            resolver,
            ttl,
            cache: Mutex::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a credential to its scopes, through the cache.
    pub fn authenticate(&self, credential: &str) -> Result<ScopeSet> {
        if let Some(scopes) = self.cached(credential) {
            observe::record_auth_lookup(true);
            return Ok(scopes);
        }
        observe::record_auth_lookup(false);

        let flight = self
            .inflight
            .lock()
            .entry(credential.to_owned())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = flight.lock();

        // Another caller may have finished the resolution while this one
        // waited on the flight guard.
        if let Some(scopes) = self.cached(credential) {
            return Ok(scopes);
        }

        let result = self.resolver.resolve(credential);
        if let Ok(scopes) = &result {
            self.cache.lock().insert(
                credential.to_owned(),
                CacheEntry {
                    scopes: scopes.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        } else {
            tracing::warn!("credential resolution failed");
        }
        self.inflight.lock().remove(credential);
        result
    }

    fn cached(&self, credential: &str) -> Option<ScopeSet> {
        let mut cache = self.cache.lock();
        match cache.get(credential) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.scopes.clone()),
            Some(_) => {
                cache.remove(credential);
                None
            }
            None => None,
        }
    }

    /// Write operations require a write scope of any breadth.
    pub fn authorize_write(&self, scopes: &ScopeSet) -> Result<()> {
        scopes
            .grant(AccessMode::Write)
            .map(|_| ())
            .ok_or_else(|| ChronicleError::AuthorizationDenied("write scope required".into()))
    }

    /// Read operations require a read scope. A `Mine` grant narrows the
    /// query to the credential's own authority, overriding whatever the
    /// caller requested - the narrowing is mandatory.
    pub fn authorize_read(&self, scopes: &ScopeSet, query: &mut StatementQuery) -> Result<()> {
        match scopes.grant(AccessMode::Read) {
            None => Err(ChronicleError::AuthorizationDenied(
                "read scope required".into(),
            )),
            Some(Breadth::All) => Ok(()),
            Some(Breadth::Mine) => {
                query.authority = Some(scopes.authority().to_owned());
                Ok(())
            }
        }
    }

    /// The breadth granted for reads, for callers that narrow point
    /// lookups themselves.
    pub fn read_breadth(&self, scopes: &ScopeSet) -> Result<Breadth> {
        scopes
            .grant(AccessMode::Read)
            .ok_or_else(|| ChronicleError::AuthorizationDenied("read scope required".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronicle_core::types::scope::Scope;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
    }

    impl CredentialResolver for CountingResolver {
        fn resolve(&self, credential: &str) -> Result<ScopeSet> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if credential == "valid" {
                Ok(ScopeSet::new("mailto:a@b", vec![Scope::READ_ALL]))
            } else {
                Err(ChronicleError::AuthorizationDenied(
                    "unknown credential".into(),
                ))
            }
        }
    }

    #[test]
    fn resolution_is_cached_within_ttl() {
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let gate = AccessGate::new(resolver.clone(), Duration::from_secs(60));

        gate.authenticate("valid").unwrap();
        gate.authenticate("valid").unwrap();
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn expiry_forces_re_resolution() {
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let gate = AccessGate::new(resolver.clone(), Duration::from_millis(0));

        gate.authenticate("valid").unwrap();
        gate.authenticate("valid").unwrap();
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn failures_are_not_cached() {
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let gate = AccessGate::new(resolver.clone(), Duration::from_secs(60));

        assert!(gate.authenticate("bogus").is_err());
        assert!(gate.authenticate("bogus").is_err());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn concurrent_resolutions_collapse() {
        struct SlowResolver {
            calls: AtomicUsize,
        }
        impl CredentialResolver for SlowResolver {
            fn resolve(&self, _credential: &str) -> Result<ScopeSet> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(50));
                Ok(ScopeSet::new("mailto:a@b", vec![Scope::READ_ALL]))
            }
        }

        let resolver = Arc::new(SlowResolver {
            calls: AtomicUsize::new(0),
        });
        let gate = Arc::new(AccessGate::new(resolver.clone(), Duration::from_secs(60)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = gate.clone();
                std::thread::spawn(move || gate.authenticate("valid").unwrap())
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mine_grant_overwrites_authority_filter() {
        let scopes = ScopeSet::new("mailto:me@example.com", vec![Scope::READ_MINE]);
        let resolver = Arc::new(CountingResolver {
            calls: AtomicUsize::new(0),
        });
        let gate = AccessGate::new(resolver, Duration::from_secs(60));

        let mut query = StatementQuery::new();
        query.authority = Some("mailto:someone-else@example.com".into());
        gate.authorize_read(&scopes, &mut query).unwrap();
        assert_eq!(query.authority.as_deref(), Some("mailto:me@example.com"));
    }
}
