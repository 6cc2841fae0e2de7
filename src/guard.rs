//! Guard pipeline: the fixed-order middleware stages wrapped around route
//! handlers.
//!
//! Stage 1 attaches collaborator handles to request-scoped context, stage 2
//! resolves the request credential into a principal/session pair (it never
//! short-circuits by itself), stage 3 runs the route's declared guard.
//! Handlers behind a guard read `AuthContext` from extensions and never call
//! the authorization engine directly.
//!
//! Every short-circuit is fail-closed: a missing `AuthContext` (a guard wired
//! before identity attachment) reads as unauthenticated, and an undetermined
//! authorization decision is treated like a denial, never a grant.

use std::fmt::Write as _;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::access::PermissionRequest;
use crate::authz::Decision;
use crate::collab::{Mailer, TaskStore};
use crate::error::AppError;
use crate::identity::{Principal, Session};
use crate::server::AppState;

pub const SESSION_COOKIE: &str = "taskgate_session";

/// Request-scoped collaborator handles, attached by stage 1.
#[derive(Clone)]
pub struct RequestContext {
    pub request_id: String,
    pub tasks: Arc<dyn TaskStore>,
    pub mail: Arc<dyn Mailer>,
}

/// Request-scoped identity, attached by stage 2. Both fields stay `None` for
/// anonymous requests; guards decide what that means for the route.
#[derive(Clone, Default)]
pub struct AuthContext {
    pub principal: Option<Principal>,
    pub session: Option<Session>,
}

pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name { return Some(v[1..].to_string()); }
        }
    }
    None
}

/// Session-cookie first, `Authorization: Bearer` fallback for the mobile and
/// API clients. The token stays opaque here.
pub fn credential_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = parse_cookie(headers, SESSION_COOKIE) {
        return Some(token);
    }
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}

fn gen_request_id() -> String {
    let mut bytes = [0u8; 8];
    let _ = getrandom::getrandom(&mut bytes);
    let mut id = String::with_capacity(16);
    for b in &bytes { let _ = write!(&mut id, "{:02x}", b); }
    id
}

/// Stage 1: attach shared collaborator handles to the request.
pub async fn attach_collaborators(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let ctx = RequestContext {
        request_id: gen_request_id(),
        tasks: state.tasks.clone(),
        mail: state.mailer.clone(),
    };
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

/// Stage 2: resolve the credential and populate `AuthContext`. Anonymous
/// requests and resolver transport faults both leave the context empty; the
/// route's guard turns that into a response. Faults are never cached.
pub async fn attach_identity(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let ctx = match credential_from_headers(req.headers()) {
        None => AuthContext::default(),
        Some(credential) => match state.resolver.resolve(&credential).await {
            Ok(Some(session)) => AuthContext {
                principal: Some(session.principal.clone()),
                session: Some(session),
            },
            Ok(None) => AuthContext::default(),
            Err(e) => {
                warn!(error = %e, "identity resolution failed; treating request as unauthenticated");
                AuthContext::default()
            }
        },
    };
    req.extensions_mut().insert(ctx);
    next.run(req).await
}

fn auth_context(req: &Request) -> AuthContext {
    // Missing context means the guard ran before identity attachment; read it
    // as unauthenticated rather than faulting.
    req.extensions().get::<AuthContext>().cloned().unwrap_or_default()
}

fn unauthorized() -> Response {
    AppError::auth("unauthorized", "authentication required").into_response()
}

fn forbidden() -> Response {
    AppError::forbidden("forbidden", "insufficient permissions").into_response()
}

/// Guard: continue iff a principal is attached. Never consults the engine.
pub async fn require_authenticated(req: Request, next: Next) -> Response {
    if auth_context(&req).principal.is_none() {
        debug!("guard denied: not authenticated");
        return unauthorized();
    }
    next.run(req).await
}

/// Guard: continue iff the principal's parsed role set contains the named
/// role. 401 for anonymous requests, 403 for a missing role.
pub async fn require_role(
    State((state, role)): State<(AppState, String)>,
    req: Request,
    next: Next,
) -> Response {
    let ctx = auth_context(&req);
    let Some(principal) = ctx.principal else {
        debug!(role = %role, "guard denied: not authenticated");
        return unauthorized();
    };
    let access = &state.config.access;
    if !principal.has_role(&role, &access.role_delimiter, &access.default_role) {
        debug!(user_id = %principal.id, role = %role, "guard denied: missing role");
        return forbidden();
    }
    next.run(req).await
}

/// Guard: continue iff the authorization engine grants the permission
/// request. An undetermined decision (engine unavailable) forbids.
pub async fn require_capability(
    State((state, request)): State<(AppState, PermissionRequest)>,
    req: Request,
    next: Next,
) -> Response {
    let ctx = auth_context(&req);
    let Some(principal) = ctx.principal else {
        debug!(request = %request.describe(), "guard denied: not authenticated");
        return unauthorized();
    };
    match state.engine.authorize(&principal, &request).await {
        Ok(Decision::Granted) => next.run(req).await,
        Ok(Decision::Denied) => {
            debug!(user_id = %principal.id, request = %request.describe(), "guard denied: capability check failed");
            forbidden()
        }
        Err(e) => {
            warn!(user_id = %principal.id, error = %e, "guard denied: decision undetermined, failing closed");
            forbidden()
        }
    }
}
