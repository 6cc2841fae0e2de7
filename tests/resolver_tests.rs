//! Identity resolver cache behavior: hit-within-TTL, refresh-after-expiry,
//! the accepted staleness bound, and transport-fault propagation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use taskgate::error::TransportError;
use taskgate::identity::{IdentityResolver, IdentityStore, Principal, Session, SessionStore};

/// Backing store that counts verify calls and can be flipped between
/// healthy, revoked and unreachable.
struct CountingStore {
    calls: AtomicUsize,
    mode: parking_lot::Mutex<Mode>,
}

enum Mode {
    Healthy(Principal),
    Revoked,
    Unreachable,
}

impl CountingStore {
    fn healthy(principal: Principal) -> Self {
        Self { calls: AtomicUsize::new(0), mode: parking_lot::Mutex::new(Mode::Healthy(principal)) }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn set_mode(&self, mode: Mode) {
        *self.mode.lock() = mode;
    }
}

#[async_trait]
impl IdentityStore for CountingStore {
    async fn verify(&self, credential: &str) -> Result<Option<Session>, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &*self.mode.lock() {
            Mode::Healthy(principal) => {
                let now = Instant::now();
                Ok(Some(Session {
                    token: credential.to_string(),
                    principal: principal.clone(),
                    issued_at: now,
                    expires_at: now + Duration::from_secs(3600),
                }))
            }
            Mode::Revoked => Ok(None),
            Mode::Unreachable => Err(TransportError::IdentityStore("timeout".into())),
        }
    }
}

#[tokio::test]
async fn cache_hit_within_ttl_skips_backing_store() {
    let store = Arc::new(CountingStore::healthy(Principal::new("u1", "editor")));
    let resolver = IdentityResolver::new(store.clone(), Duration::from_secs(300));

    let first = resolver.resolve("tok").await.unwrap().expect("resolved");
    let second = resolver.resolve("tok").await.unwrap().expect("resolved");
    assert_eq!(first.principal, second.principal);
    assert_eq!(store.calls(), 1, "second resolution must be served from cache");
}

#[tokio::test]
async fn expired_cache_entry_triggers_fresh_lookup() {
    let store = Arc::new(CountingStore::healthy(Principal::new("u1", "editor")));
    let resolver = IdentityResolver::new(store.clone(), Duration::from_millis(50));

    resolver.resolve("tok").await.unwrap().expect("resolved");
    resolver.resolve("tok").await.unwrap().expect("resolved");
    assert_eq!(store.calls(), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    resolver.resolve("tok").await.unwrap().expect("resolved");
    assert_eq!(store.calls(), 2, "post-TTL resolution must hit the backing store");
}

#[tokio::test]
async fn staleness_is_bounded_by_ttl_after_upstream_revocation() {
    // Accepted trade-off: a cached session keeps granting for up to TTL after
    // the source of truth revoked it.
    let store = Arc::new(CountingStore::healthy(Principal::new("u1", "admin")));
    let resolver = IdentityResolver::new(store.clone(), Duration::from_millis(60));

    resolver.resolve("tok").await.unwrap().expect("resolved");
    store.set_mode(Mode::Revoked);

    // Within the TTL the stale entry still resolves.
    let stale = resolver.resolve("tok").await.unwrap();
    assert!(stale.is_some(), "within TTL the cache may serve a revoked session");

    tokio::time::sleep(Duration::from_millis(90)).await;
    let fresh = resolver.resolve("tok").await.unwrap();
    assert!(fresh.is_none(), "after TTL the revocation must be observed");
}

#[tokio::test]
async fn explicit_invalidation_beats_the_ttl() {
    let store = Arc::new(CountingStore::healthy(Principal::new("u1", "editor")));
    let resolver = IdentityResolver::new(store.clone(), Duration::from_secs(300));

    resolver.resolve("tok").await.unwrap().expect("resolved");
    store.set_mode(Mode::Revoked);
    resolver.invalidate("tok");

    let got = resolver.resolve("tok").await.unwrap();
    assert!(got.is_none(), "invalidation must force a backing-store round trip");
}

#[tokio::test]
async fn transport_fault_propagates_and_is_not_cached() {
    let store = Arc::new(CountingStore::healthy(Principal::new("u1", "editor")));
    store.set_mode(Mode::Unreachable);
    let resolver = IdentityResolver::new(store.clone(), Duration::from_secs(300));

    let err = resolver.resolve("tok").await.expect_err("unreachable store must error");
    assert!(matches!(err, TransportError::IdentityStore(_)));

    // Recovery is immediate: the fault was not recorded as a decision.
    store.set_mode(Mode::Healthy(Principal::new("u1", "editor")));
    let got = resolver.resolve("tok").await.unwrap();
    assert!(got.is_some());
    assert_eq!(store.calls(), 2);
}

#[tokio::test]
async fn session_store_backed_resolution_roundtrip() {
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(3600)));
    let issued = sessions.issue(Principal::new("alice", "editor,admin"));
    let resolver = IdentityResolver::new(sessions.clone(), Duration::from_secs(300));

    let got = resolver.resolve(&issued.token).await.unwrap().expect("live session resolves");
    assert_eq!(got.principal.id, "alice");
    assert_eq!(got.principal.role_field, "editor,admin");

    sessions.revoke(&issued.token);
    resolver.invalidate(&issued.token);
    assert!(resolver.resolve(&issued.token).await.unwrap().is_none());
}

#[tokio::test]
async fn concurrent_resolutions_of_same_token_are_consistent() {
    let store = Arc::new(CountingStore::healthy(Principal::new("u1", "editor")));
    let resolver = Arc::new(IdentityResolver::new(store.clone(), Duration::from_secs(300)));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let r = resolver.clone();
        handles.push(tokio::spawn(async move { r.resolve("tok").await }));
    }
    for h in handles {
        let got = h.await.unwrap().unwrap().expect("resolved");
        assert_eq!(got.principal.id, "u1");
    }
    // Several tasks may race past the cold cache; correctness only requires
    // that every winner wrote a valid entry and later calls are cached.
    let after = store.calls();
    resolver.resolve("tok").await.unwrap().expect("resolved");
    assert_eq!(store.calls(), after, "warm cache must not call the store");
}
