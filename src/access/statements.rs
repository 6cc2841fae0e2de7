use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Resource kinds and actions are open string sets: the role table is
/// declarative configuration, not a closed enum.
pub type ResourceKind = String;
pub type Action = String;

/// Resource kind → actions permitted on it.
pub type Statements = HashMap<ResourceKind, HashSet<Action>>;

/// A named, immutable bundle of statements. Roles are built once at process
/// start and never modified at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub name: String,
    statements: Statements,
}

impl Role {
    pub fn new(name: impl Into<String>, statements: Statements) -> Self {
        Self { name: name.into(), statements }
    }

    pub fn from_table(name: &str, table: &BTreeMap<String, BTreeSet<String>>) -> Self {
        let statements = table
            .iter()
            .map(|(kind, actions)| (kind.clone(), actions.iter().cloned().collect()))
            .collect();
        Self { name: name.to_string(), statements }
    }

    /// True iff every required action on `kind` appears in this role's
    /// statements. A missing resource kind behaves as an empty action set.
    pub fn covers(&self, kind: &str, required: &HashSet<Action>) -> bool {
        if required.is_empty() {
            return true;
        }
        match self.statements.get(kind) {
            Some(allowed) => required.is_subset(allowed),
            None => false,
        }
    }

    pub fn statements(&self) -> &Statements {
        &self.statements
    }
}

/// The set of resource/action pairs an operation requires. A single role must
/// satisfy every resource kind in the request for that role to grant access;
/// partial coverage by different roles does not combine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionRequest {
    required: HashMap<ResourceKind, HashSet<Action>>,
}

impl PermissionRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-kind request: `PermissionRequest::on("task", ["create"])`.
    pub fn on<I, S>(kind: &str, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Action>,
    {
        Self::new().and(kind, actions)
    }

    /// Add a resource kind with its required actions.
    pub fn and<I, S>(mut self, kind: &str, actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Action>,
    {
        self.required
            .entry(kind.to_string())
            .or_default()
            .extend(actions.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.required.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKind, &HashSet<Action>)> {
        self.required.iter()
    }

    /// Short log form, e.g. `task:create,update`.
    pub fn describe(&self) -> String {
        let mut kinds: Vec<String> = self
            .required
            .iter()
            .map(|(kind, actions)| {
                let mut acts: Vec<&str> = actions.iter().map(|a| a.as_str()).collect();
                acts.sort_unstable();
                format!("{}:{}", kind, acts.join(","))
            })
            .collect();
        kinds.sort_unstable();
        kinds.join(" ")
    }
}
