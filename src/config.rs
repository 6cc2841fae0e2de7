//! Startup configuration for the authorization core.
//!
//! Everything here is consumed once at process start and immutable afterwards:
//! the role→statement table, the resolver cache TTL, the role-name delimiter
//! and the default role name. Values come from an optional JSON config file
//! (`TASKGATE_CONFIG`) with environment-variable overrides for the scalar knobs.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_role_delimiter() -> String { ",".to_string() }
fn default_role_name() -> String { "user".to_string() }
fn default_http_port() -> u16 { 8787 }
fn default_cache_ttl_secs() -> u64 { 5 * 60 }
fn default_session_ttl_secs() -> u64 { 7 * 24 * 3600 }

/// Declarative role table plus role-string parsing knobs.
///
/// `roles` maps role name → resource kind → allowed actions. The shape is a
/// plain tagged map so deployments can extend it without code changes.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessConfig {
    #[serde(default = "default_role_delimiter")]
    pub role_delimiter: String,
    #[serde(default = "default_role_name")]
    pub default_role: String,
    /// Principal ids granted unconditionally, before any role evaluation.
    #[serde(default)]
    pub admin_user_ids: Vec<String>,
    #[serde(default = "AccessConfig::builtin_roles")]
    pub roles: BTreeMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            role_delimiter: default_role_delimiter(),
            default_role: default_role_name(),
            admin_user_ids: Vec::new(),
            roles: Self::builtin_roles(),
        }
    }
}

impl AccessConfig {
    /// Baseline role table: `user` holds no task capabilities, `editor` may
    /// create and update tasks, `admin` has full task capabilities plus user
    /// and session management.
    pub fn builtin_roles() -> BTreeMap<String, BTreeMap<String, BTreeSet<String>>> {
        fn set(actions: &[&str]) -> BTreeSet<String> {
            actions.iter().map(|s| s.to_string()).collect()
        }
        let mut roles = BTreeMap::new();
        roles.insert("user".to_string(), BTreeMap::new());
        roles.insert(
            "editor".to_string(),
            BTreeMap::from([("task".to_string(), set(&["create", "update"]))]),
        );
        roles.insert(
            "admin".to_string(),
            BTreeMap::from([
                ("task".to_string(), set(&["create", "update", "delete"])),
                ("user".to_string(), set(&["create", "list", "set-role", "ban", "delete", "set-password"])),
                ("session".to_string(), set(&["list", "revoke", "delete"])),
            ]),
        );
        roles
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Identity resolver cache freshness window, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Session lifetime, in seconds.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    #[serde(default)]
    pub access: AccessConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_port: default_http_port(),
            cache_ttl_secs: default_cache_ttl_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            access: AccessConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let cfg: AppConfig = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(cfg)
    }

    /// Load configuration from `TASKGATE_CONFIG` (when set) and apply scalar
    /// env overrides: `TASKGATE_HTTP_PORT`, `TASKGATE_CACHE_TTL_SECS`.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var("TASKGATE_CONFIG") {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        if let Ok(port) = std::env::var("TASKGATE_HTTP_PORT") {
            if let Ok(p) = port.parse::<u16>() { cfg.http_port = p; }
        }
        if let Ok(ttl) = std::env::var("TASKGATE_CACHE_TTL_SECS") {
            if let Ok(t) = ttl.parse::<u64>() { cfg.cache_ttl_secs = t; }
        }
        Ok(cfg)
    }
}
