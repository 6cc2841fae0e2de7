use std::collections::HashMap;

use crate::access::{PermissionRequest, Role};
use crate::config::AccessConfig;

/// Immutable role lookup table built once at startup from declarative
/// configuration. Absence of a role is a normal outcome, never an error.
#[derive(Debug, Clone)]
pub struct RoleRegistry {
    roles: HashMap<String, Role>,
}

impl RoleRegistry {
    pub fn from_config(access: &AccessConfig) -> Self {
        let roles = access
            .roles
            .iter()
            .map(|(name, table)| (name.clone(), Role::from_table(name, table)))
            .collect();
        Self { roles }
    }

    /// Baseline registry with the built-in user/editor/admin roles.
    pub fn builtin() -> Self {
        Self::from_config(&AccessConfig::default())
    }

    pub fn lookup_role(&self, name: &str) -> Option<&Role> {
        self.roles.get(name)
    }

    /// True iff the role satisfies every resource kind in the request.
    pub fn role_covers(&self, role: &Role, request: &PermissionRequest) -> bool {
        request.iter().all(|(kind, required)| role.covers(kind, required))
    }

    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.roles.keys().map(|s| s.as_str())
    }
}
