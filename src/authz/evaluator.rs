use std::sync::Arc;

use async_trait::async_trait;

use crate::access::{PermissionRequest, RoleRegistry};
use crate::error::TransportError;

/// Outcome of checking one role name against one permission request.
/// `RoleUnknown` (the name is not in the capability model) is a reportable
/// condition, never an aborting error, and is distinct from `Denied`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleEvaluation {
    Granted,
    Denied,
    RoleUnknown,
}

/// Per-role decision call, modeled as a network-boundary operation: each
/// evaluation can fail independently without poisoning its siblings.
#[async_trait]
pub trait RoleEvaluator: Send + Sync {
    async fn evaluate(
        &self,
        role_name: &str,
        request: &PermissionRequest,
    ) -> Result<RoleEvaluation, TransportError>;
}

/// In-process evaluator backed by the role registry. A remote decision-service
/// client implements the same trait; the engine cannot tell them apart.
pub struct LocalRoleEvaluator {
    registry: Arc<RoleRegistry>,
}

impl LocalRoleEvaluator {
    pub fn new(registry: Arc<RoleRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RoleEvaluator for LocalRoleEvaluator {
    async fn evaluate(
        &self,
        role_name: &str,
        request: &PermissionRequest,
    ) -> Result<RoleEvaluation, TransportError> {
        let Some(role) = self.registry.lookup_role(role_name) else {
            return Ok(RoleEvaluation::RoleUnknown);
        };
        if self.registry.role_covers(role, request) {
            Ok(RoleEvaluation::Granted)
        } else {
            Ok(RoleEvaluation::Denied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> LocalRoleEvaluator {
        LocalRoleEvaluator::new(Arc::new(RoleRegistry::builtin()))
    }

    #[tokio::test]
    async fn known_role_grants_or_denies() {
        let ev = local();
        let req = PermissionRequest::on("task", ["create"]);
        assert_eq!(ev.evaluate("editor", &req).await.unwrap(), RoleEvaluation::Granted);
        let req = PermissionRequest::on("task", ["delete"]);
        assert_eq!(ev.evaluate("editor", &req).await.unwrap(), RoleEvaluation::Denied);
    }

    #[tokio::test]
    async fn unknown_role_is_not_an_error() {
        let ev = local();
        let req = PermissionRequest::on("task", ["create"]);
        assert_eq!(ev.evaluate("wizard", &req).await.unwrap(), RoleEvaluation::RoleUnknown);
    }
}
