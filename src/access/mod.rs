//! Capability model: the immutable role→statement registry and the permission
//! request shape evaluated against it. Read-only after startup, safe for
//! unsynchronized concurrent reads.

mod registry;
mod statements;

pub use registry::RoleRegistry;
pub use statements::{Action, PermissionRequest, ResourceKind, Role, Statements};
