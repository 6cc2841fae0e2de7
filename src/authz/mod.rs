//! Authorization engine: concurrent, partial-failure-tolerant evaluation of a
//! permission request against a principal's role set.

mod engine;
mod evaluator;

pub use engine::{AuthzEngine, AuthzError, Decision};
pub use evaluator::{LocalRoleEvaluator, RoleEvaluation, RoleEvaluator};
