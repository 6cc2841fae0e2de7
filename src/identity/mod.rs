//! Identity for the request path: principals, sessions and the cached
//! credential resolver. Keep the public surface thin and split implementation
//! across sub-modules.

mod principal;
mod resolver;
mod session;

pub use principal::Principal;
pub use resolver::{IdentityResolver, IdentityStore};
pub use session::{Session, SessionStore, SessionToken};
