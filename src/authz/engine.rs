use std::collections::HashSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::evaluator::{RoleEvaluation, RoleEvaluator};
use crate::access::PermissionRequest;
use crate::config::AccessConfig;
use crate::identity::Principal;

/// Boolean authorization outcome. Ordinary denial is a value, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Granted,
    Denied,
}

/// Raised only when every dispatched role evaluation failed at the transport
/// level: the decision is undetermined, which is different from denied.
/// Callers must fail closed and must never convert this into a grant.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthzError {
    #[error("authorization undetermined: all {failed} role evaluations failed")]
    Unavailable { failed: usize },
}

/// Evaluates permission requests against a principal's role set.
///
/// Each role name is dispatched as an independent unit of work against the
/// [`RoleEvaluator`]; the engine waits for all units to settle, tolerates
/// individual failures (including unknown role names), and OR-reduces the
/// granted results. An explicit dependency, not a process-wide singleton.
pub struct AuthzEngine {
    evaluator: Arc<dyn RoleEvaluator>,
    role_delimiter: String,
    default_role: String,
    admin_user_ids: HashSet<String>,
}

impl AuthzEngine {
    pub fn new(evaluator: Arc<dyn RoleEvaluator>, access: &AccessConfig) -> Self {
        Self {
            evaluator,
            role_delimiter: access.role_delimiter.clone(),
            default_role: access.default_role.clone(),
            admin_user_ids: access.admin_user_ids.iter().cloned().collect(),
        }
    }

    /// Decide whether `principal` may perform `request`.
    ///
    /// Granted iff at least one role evaluation settles as granted. Unknown
    /// roles and individual transport faults never cancel sibling
    /// evaluations; they only contribute to an overall denial when no role
    /// grants. The result is invariant under evaluation completion order.
    pub async fn authorize(
        &self,
        principal: &Principal,
        request: &PermissionRequest,
    ) -> Result<Decision, AuthzError> {
        if self.admin_user_ids.contains(&principal.id) {
            debug!(user_id = %principal.id, "authorize: admin bypass");
            return Ok(Decision::Granted);
        }

        let roles = principal.parsed_roles(&self.role_delimiter, &self.default_role);
        let total = roles.len();

        let mut units: JoinSet<(String, Result<RoleEvaluation, crate::error::TransportError>)> =
            JoinSet::new();
        for role in roles {
            let evaluator = self.evaluator.clone();
            let request = request.clone();
            units.spawn(async move {
                let outcome = evaluator.evaluate(&role, &request).await;
                (role, outcome)
            });
        }

        let mut failed = 0usize;
        while let Some(joined) = units.join_next().await {
            match joined {
                Ok((role, Ok(RoleEvaluation::Granted))) => {
                    debug!(user_id = %principal.id, role = %role, request = %request.describe(), "authorize: granted");
                    // First grant decides; the OR has no side effects to
                    // order, remaining units are abandoned.
                    return Ok(Decision::Granted);
                }
                Ok((role, Ok(RoleEvaluation::Denied))) => {
                    debug!(user_id = %principal.id, role = %role, "authorize: role denied");
                }
                Ok((role, Ok(RoleEvaluation::RoleUnknown))) => {
                    warn!(user_id = %principal.id, role = %role, "authorize: unknown role name");
                }
                Ok((role, Err(e))) => {
                    failed += 1;
                    warn!(user_id = %principal.id, role = %role, error = %e, "authorize: role evaluation failed");
                }
                Err(join_err) => {
                    failed += 1;
                    warn!(user_id = %principal.id, error = %join_err, "authorize: evaluation unit panicked");
                }
            }
        }

        if failed == total && total > 0 {
            return Err(AuthzError::Unavailable { failed });
        }
        debug!(user_id = %principal.id, request = %request.describe(), "authorize: denied");
        Ok(Decision::Denied)
    }
}
