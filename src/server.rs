//!
//! taskgate HTTP server
//! --------------------
//! Axum app wiring the guard pipeline around a thin task API.
//!
//! Responsibilities:
//! - Session management with an HttpOnly cookie (bearer tokens accepted too).
//! - Login/logout endpoints backed by the `security` user directory.
//! - Task endpoints delegating to the `TaskStore` collaborator, each mounted
//!   behind its declared guard.
//! - Startup wiring: config, role registry, resolver, engine, default admin.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Extension, Path, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::access::{PermissionRequest, RoleRegistry};
use crate::authz::{AuthzEngine, LocalRoleEvaluator};
use crate::collab::{Mailer, MemoryTaskStore, NullMailer, TaskStore};
use crate::config::AppConfig;
use crate::guard::{self, AuthContext, RequestContext, SESSION_COOKIE};
use crate::identity::{IdentityResolver, SessionStore};
use crate::security::UserDirectory;

/// Shared server state injected into all handlers and guards.
///
/// Every dependency is an explicit handle owned here; nothing in the
/// authorization path lives in a process-wide static.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<RoleRegistry>,
    pub sessions: Arc<SessionStore>,
    pub resolver: Arc<IdentityResolver>,
    pub engine: Arc<AuthzEngine>,
    pub users: Arc<UserDirectory>,
    pub tasks: Arc<dyn TaskStore>,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        Self::with_collaborators(config, Arc::new(MemoryTaskStore::default()), Arc::new(NullMailer))
    }

    pub fn with_collaborators(
        config: AppConfig,
        tasks: Arc<dyn TaskStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let registry = Arc::new(RoleRegistry::from_config(&config.access));
        let sessions = Arc::new(SessionStore::new(Duration::from_secs(config.session_ttl_secs)));
        let resolver = Arc::new(IdentityResolver::new(
            sessions.clone(),
            Duration::from_secs(config.cache_ttl_secs),
        ));
        let engine = Arc::new(AuthzEngine::new(
            Arc::new(LocalRoleEvaluator::new(registry.clone())),
            &config.access,
        ));
        Self {
            config: Arc::new(config),
            registry,
            sessions,
            resolver,
            engine,
            users: Arc::new(UserDirectory::new()),
            tasks,
            mailer,
        }
    }
}

/// Build the router: open routes, then each guarded group with its declared
/// guard, then the two pipeline stages as outer layers (collaborators run
/// first, identity second, guards last).
pub fn app(state: AppState) -> Router {
    let open = Router::new()
        .route("/", get(|| async { "taskgate ok" }))
        .route("/login", post(login))
        .route("/logout", post(logout));

    let authenticated = Router::new()
        .route("/me", get(me))
        .route("/tasks", get(list_tasks))
        .route_layer(middleware::from_fn(guard::require_authenticated));

    let task_create = Router::new()
        .route("/tasks", post(create_task))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), PermissionRequest::on("task", ["create"])),
            guard::require_capability,
        ));

    let task_update = Router::new()
        .route("/tasks/{id}", put(update_task))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), PermissionRequest::on("task", ["update"])),
            guard::require_capability,
        ));

    let task_delete = Router::new()
        .route("/tasks/{id}", delete(delete_task))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), PermissionRequest::on("task", ["delete"])),
            guard::require_capability,
        ));

    let admin = Router::new()
        .route("/admin/users", get(list_users))
        .route_layer(middleware::from_fn_with_state(
            (state.clone(), "admin".to_string()),
            guard::require_role,
        ));

    open
        .merge(authenticated)
        .merge(task_create)
        .merge(task_update)
        .merge(task_delete)
        .merge(admin)
        .layer(middleware::from_fn_with_state(state.clone(), guard::attach_identity))
        .layer(middleware::from_fn_with_state(state.clone(), guard::attach_collaborators))
        .with_state(state)
}

pub async fn run_with_ports(http_port: u16, config: AppConfig) -> anyhow::Result<()> {
    let state = AppState::new(config);
    ensure_default_admin(&state)?;

    let app = app(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    let port = config.http_port;
    run_with_ports(port, config).await
}

/// Seed an admin login on first start so the instance is reachable.
fn ensure_default_admin(state: &AppState) -> anyhow::Result<()> {
    if !state.users.usernames().is_empty() {
        return Ok(());
    }
    let password = std::env::var("TASKGATE_ADMIN_PASSWORD").unwrap_or_else(|_| "taskgate".to_string());
    state.users.add_user("admin", &password, "admin")?;
    info!("Seeded default admin user 'admin'");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct CreateTaskPayload {
    title: String,
}

#[derive(Debug, Deserialize, Default)]
struct UpdateTaskPayload {
    title: Option<String>,
    done: Option<bool>,
}

fn set_session_cookie(token: &str) -> HeaderValue {
    // HttpOnly cookie scoped to path / with SameSite=Strict
    HeaderValue::from_str(&format!("{}={}; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE, token)).unwrap()
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_str(&format!("{}=deleted; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly; Secure; SameSite=Strict; Path=/", SESSION_COOKIE)).unwrap()
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> impl IntoResponse {
    match state.users.verify_login(&payload.username, &payload.password) {
        Some(principal) => {
            let session = state.sessions.issue(principal);
            let mut headers = HeaderMap::new();
            headers.insert("Set-Cookie", set_session_cookie(&session.token));
            (StatusCode::OK, headers, Json(json!({"status":"ok","token": session.token})))
        }
        None => (
            StatusCode::UNAUTHORIZED,
            HeaderMap::new(),
            Json(json!({"status":"unauthorized"})),
        ),
    }
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    if let Some(token) = guard::credential_from_headers(&headers) {
        state.sessions.revoke(&token);
        state.resolver.invalidate(&token);
    }
    let mut h = HeaderMap::new();
    h.insert("Set-Cookie", clear_session_cookie());
    (StatusCode::OK, h, Json(json!({"status":"ok"})))
}

async fn me(Extension(auth): Extension<AuthContext>) -> impl IntoResponse {
    // Behind require_authenticated; the principal is always present here.
    match auth.principal {
        Some(p) => (StatusCode::OK, Json(json!({"status":"ok","principal": p}))),
        None => (StatusCode::UNAUTHORIZED, Json(json!({"status":"unauthorized"}))),
    }
}

async fn list_tasks(Extension(ctx): Extension<RequestContext>) -> impl IntoResponse {
    let tasks = ctx.tasks.list().await;
    Json(json!({"status":"ok","tasks": tasks}))
}

async fn create_task(
    Extension(ctx): Extension<RequestContext>,
    Extension(auth): Extension<AuthContext>,
    Json(payload): Json<CreateTaskPayload>,
) -> impl IntoResponse {
    let owner = auth.principal.map(|p| p.id).unwrap_or_default();
    let task = ctx.tasks.create(payload.title, owner).await;
    (StatusCode::CREATED, Json(json!({"status":"ok","task": task})))
}

async fn update_task(
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<u64>,
    Json(payload): Json<UpdateTaskPayload>,
) -> impl IntoResponse {
    match ctx.tasks.update(id, payload.title, payload.done).await {
        Some(task) => (StatusCode::OK, Json(json!({"status":"ok","task": task}))),
        None => (StatusCode::NOT_FOUND, Json(json!({"status":"error","code":"not_found","message":"no such task"}))),
    }
}

async fn delete_task(Extension(ctx): Extension<RequestContext>, Path(id): Path<u64>) -> impl IntoResponse {
    if ctx.tasks.delete(id).await {
        (StatusCode::OK, Json(json!({"status":"ok"})))
    } else {
        (StatusCode::NOT_FOUND, Json(json!({"status":"error","code":"not_found","message":"no such task"})))
    }
}

async fn list_users(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({"status":"ok","users": state.users.usernames()}))
}
