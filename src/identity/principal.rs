use serde::{Deserialize, Serialize};

/// Identity of the acting user. `role_field` is the raw joined role string as
/// stored by the identity store (e.g. `"editor,admin"`); authorization logic
/// must go through [`Principal::parsed_roles`] and never split the string
/// itself. Immutable for the lifetime of a request.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub role_field: String,
}

impl Principal {
    pub fn new(id: impl Into<String>, role_field: impl Into<String>) -> Self {
        Self { id: id.into(), role_field: role_field.into() }
    }

    /// Split `role_field` on the configured delimiter, dropping empty pieces.
    /// An empty field falls back to the configured default role.
    pub fn parsed_roles(&self, delimiter: &str, default_role: &str) -> Vec<String> {
        let roles: Vec<String> = self
            .role_field
            .split(delimiter)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if roles.is_empty() {
            vec![default_role.to_string()]
        } else {
            roles
        }
    }

    pub fn has_role(&self, role: &str, delimiter: &str, default_role: &str) -> bool {
        self.parsed_roles(delimiter, default_role).iter().any(|r| r == role)
    }
}
