use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::session::{Session, SessionStore};
use crate::error::TransportError;

/// Backing identity store, treated as a network-boundary call. `Ok(None)`
/// means "not authenticated" and is never an error; `Err` is reserved for the
/// store being unreachable.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<Option<Session>, TransportError>;
}

/// The in-process session store doubles as the backing identity store.
#[async_trait]
impl IdentityStore for SessionStore {
    async fn verify(&self, credential: &str) -> Result<Option<Session>, TransportError> {
        Ok(self.validate(credential))
    }
}

struct CacheEntry {
    session: Session,
    cached_at: Instant,
}

/// Maps an inbound credential to a principal/session pair, consulting a
/// TTL-bounded cache before hitting the backing store.
///
/// The cache trades consistency for availability: a cached session may grant
/// access for up to `ttl` after the source of truth changed or the session was
/// revoked upstream. That staleness bound is deliberate; `invalidate` exists
/// for the paths (logout) that know the entry is dead.
pub struct IdentityResolver {
    store: Arc<dyn IdentityStore>,
    ttl: Duration,
    cache: RwLock<HashMap<String, CacheEntry>>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn IdentityStore>, ttl: Duration) -> Self {
        Self { store, ttl, cache: RwLock::new(HashMap::new()) }
    }

    /// Resolve a credential. Cache hits within the TTL skip the backing store
    /// entirely. Transport errors propagate; callers fail closed on them.
    pub async fn resolve(&self, credential: &str) -> Result<Option<Session>, TransportError> {
        {
            let cache = self.cache.read();
            if let Some(entry) = cache.get(credential) {
                if entry.cached_at.elapsed() < self.ttl {
                    return Ok(Some(entry.session.clone()));
                }
            }
        }
        match self.store.verify(credential).await? {
            Some(session) => {
                // Concurrent resolutions of the same credential race here;
                // last writer wins and every winner holds a valid entry.
                self.cache.write().insert(
                    credential.to_string(),
                    CacheEntry { session: session.clone(), cached_at: Instant::now() },
                );
                Ok(Some(session))
            }
            None => {
                self.cache.write().remove(credential);
                Ok(None)
            }
        }
    }

    /// Drop a cached entry immediately, e.g. on logout. Faults are never
    /// cached, so there is nothing to clear for error paths.
    pub fn invalidate(&self, credential: &str) {
        self.cache.write().remove(credential);
    }

    #[cfg(test)]
    pub(crate) fn cached_len(&self) -> usize {
        self.cache.read().len()
    }
}
