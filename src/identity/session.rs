use std::collections::HashMap;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use super::principal::Principal;
use crate::tprintln;

pub type SessionToken = String;

/// Ephemeral binding of a credential token to a principal. Created on login,
/// read on every request, removed on logout or revocation.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub principal: Principal,
    pub issued_at: Instant,
    pub expires_at: Instant,
}

fn gen_token() -> String {
    // 256-bit random token, base64url without padding
    let mut buf = [0u8; 32];
    let _ = getrandom::getrandom(&mut buf);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf)
}

/// In-process session store. Owned by the application state and passed in
/// explicitly wherever it is needed; there is no process-wide instance.
pub struct SessionStore {
    ttl: Duration,
    sessions: RwLock<HashMap<SessionToken, Session>>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, sessions: RwLock::new(HashMap::new()) }
    }

    pub fn issue(&self, principal: Principal) -> Session {
        let now = Instant::now();
        let token = gen_token();
        let sess = Session {
            token: token.clone(),
            principal: principal.clone(),
            issued_at: now,
            expires_at: now + self.ttl,
        };
        self.sessions.write().insert(token, sess.clone());
        tprintln!("session.issue user={} ttl_secs={}", principal.id, self.ttl.as_secs());
        sess
    }

    /// Look up a live session. Expired entries are dropped on access.
    pub fn validate(&self, token: &str) -> Option<Session> {
        let now = Instant::now();
        let mut drop_key: Option<String> = None;
        let out = {
            let map = self.sessions.read();
            match map.get(token) {
                Some(sess) if sess.expires_at > now => Some(sess.clone()),
                Some(_) => {
                    drop_key = Some(token.to_string());
                    None
                }
                None => None,
            }
        };
        if let Some(k) = drop_key {
            self.sessions.write().remove(&k);
        }
        out
    }

    pub fn revoke(&self, token: &str) -> bool {
        let removed = self.sessions.write().remove(token);
        if let Some(sess) = &removed {
            tprintln!("session.revoke user={}", sess.principal.id);
        }
        removed.is_some()
    }

    /// Revoke every session belonging to a principal. Returns the count.
    pub fn revoke_principal(&self, principal_id: &str) -> usize {
        let mut map = self.sessions.write();
        let before = map.len();
        map.retain(|_, sess| sess.principal.id != principal_id);
        before - map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_then_validate_returns_same_principal() {
        let store = SessionStore::new(Duration::from_secs(60));
        let sess = store.issue(Principal::new("u1", "editor"));
        let got = store.validate(&sess.token).expect("session live");
        assert_eq!(got.principal, sess.principal);
    }

    #[test]
    fn expired_session_is_dropped() {
        let store = SessionStore::new(Duration::from_millis(0));
        let sess = store.issue(Principal::new("u1", ""));
        assert!(store.validate(&sess.token).is_none());
        // second validate hits the removed entry
        assert!(store.validate(&sess.token).is_none());
    }

    #[test]
    fn revoke_removes_session() {
        let store = SessionStore::new(Duration::from_secs(60));
        let sess = store.issue(Principal::new("u1", ""));
        assert!(store.revoke(&sess.token));
        assert!(!store.revoke(&sess.token));
        assert!(store.validate(&sess.token).is_none());
    }

    #[test]
    fn revoke_principal_sweeps_all_tokens() {
        let store = SessionStore::new(Duration::from_secs(60));
        store.issue(Principal::new("u1", ""));
        store.issue(Principal::new("u1", ""));
        let other = store.issue(Principal::new("u2", ""));
        assert_eq!(store.revoke_principal("u1"), 2);
        assert!(store.validate(&other.token).is_some());
    }

    #[test]
    fn tokens_are_unique_and_urlsafe() {
        let a = gen_token();
        let b = gen_token();
        assert_ne!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }
}
