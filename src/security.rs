//! Credential verification: Argon2 password hashing and the in-process user
//! directory consulted at login. Role assignment lives in the directory's
//! `role_field`; the authorization subsystem never mutates it.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use parking_lot::RwLock;
use password_hash::{PasswordHash, SaltString};

use crate::identity::Principal;

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

struct UserRecord {
    password_hash: String,
    role_field: String,
}

/// Username → credential + role-string table. Mutations (add user, change
/// roles) happen out of band of the request path.
#[derive(Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, username: &str, password: &str, role_field: &str) -> Result<()> {
        let phc = hash_password(password)?;
        self.users.write().insert(
            username.to_string(),
            UserRecord { password_hash: phc, role_field: role_field.to_string() },
        );
        Ok(())
    }

    pub fn set_roles(&self, username: &str, role_field: &str) -> bool {
        let mut map = self.users.write();
        match map.get_mut(username) {
            Some(rec) => {
                rec.role_field = role_field.to_string();
                true
            }
            None => false,
        }
    }

    pub fn remove_user(&self, username: &str) -> bool {
        self.users.write().remove(username).is_some()
    }

    pub fn usernames(&self) -> Vec<String> {
        let mut names: Vec<String> = self.users.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Verify a username/password pair. `None` covers both unknown user and
    /// wrong password; callers cannot distinguish the two.
    pub fn verify_login(&self, username: &str, password: &str) -> Option<Principal> {
        let map = self.users.read();
        let rec = map.get(username)?;
        if verify_password(&rec.password_hash, password) {
            Some(Principal::new(username, rec.role_field.clone()))
        } else {
            None
        }
    }
}
