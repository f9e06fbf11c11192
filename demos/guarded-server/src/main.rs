//! Role administration API protected by the RBAC guard
//!
//! Identity comes from the `x-tenant-id`, `x-user-id` and `x-client-id`
//! headers. Settings are read from the file named by `ROLEGATE_SETTINGS`,
//! falling back to a permissive development setup.
//!
//! ```text
//! curl -H 'x-user-id: developer' localhost:3000/roles
//! ```

use anyhow::Result;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use rolegate_core::{Role, Rule};
use rolegate_rbac::prelude::*;
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    store: Arc<MemoryRoleStore>,
}

/// API errors rendered as `{"error": <status>, "errorMessage": ...}`
enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl From<RbacError> for ApiError {
    fn from(err: RbacError) -> Self {
        match err {
            RbacError::RoleNotFound(id) => ApiError::NotFound(format!("No Role \"{}\"", id)),
            RbacError::Configuration(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        warn!(status = status.as_u16(), error = %message, "api error");
        (
            status,
            Json(json!({"error": status.as_u16(), "errorMessage": message})),
        )
            .into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

fn tenant(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-tenant-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
}

#[derive(Debug, Deserialize)]
struct NewRole {
    name: String,
    tenant: Option<String>,
    #[serde(default)]
    rules: Vec<Rule>,
}

#[derive(Debug, Deserialize)]
struct RoleUpdate {
    name: String,
    #[serde(default)]
    rules: Vec<Rule>,
}

async fn list_roles(State(state): State<AppState>, headers: HeaderMap) -> ApiResult<Response> {
    let roles = state.store.list_roles(tenant(&headers)).await;
    if roles.is_empty() {
        return Err(ApiError::NotFound("Not Found".to_string()));
    }
    Ok(Json(json!({ "roles": roles })).into_response())
}

async fn create_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewRole>,
) -> ApiResult<Response> {
    let tenant = body.tenant.as_deref().or(tenant(&headers));
    let role = state.store.create_role(&body.name, tenant, body.rules).await?;
    info!(role = %role, "role created");

    Ok((
        StatusCode::CREATED,
        [(header::LOCATION, format!("/roles/{}", role.id))],
        Json(role),
    )
        .into_response())
}

async fn get_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(role_id): Path<String>,
) -> ApiResult<Json<Role>> {
    state
        .store
        .get_role(&role_id, tenant(&headers))
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No Role \"{}\"", role_id)))
}

async fn update_role(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(role_id): Path<String>,
    Json(body): Json<RoleUpdate>,
) -> ApiResult<StatusCode> {
    let Some(mut role) = state.store.get_role(&role_id, tenant(&headers)).await else {
        return Err(ApiError::NotFound(format!("No Role \"{}\"", role_id)));
    };
    role.name = body.name;
    role.rules = body.rules;
    state.store.update_role(role).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_role(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
) -> ApiResult<StatusCode> {
    let role = state.store.remove_role(&role_id).await?;
    info!(role = %role, "role deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn user_roles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<String>,
) -> ApiResult<Response> {
    let roles = state.store.roles_for_user(tenant(&headers), &user_id).await?;
    if roles.is_empty() {
        return Err(ApiError::NotFound("Not Found".to_string()));
    }
    Ok(Json(json!({ "roles": roles })).into_response())
}

async fn client_roles(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(client_id): Path<String>,
) -> ApiResult<Response> {
    let roles = state
        .store
        .roles_for_client(tenant(&headers), &client_id)
        .await?;
    if roles.is_empty() {
        return Err(ApiError::NotFound("Not Found".to_string()));
    }
    Ok(Json(json!({ "roles": roles })).into_response())
}

fn load_settings() -> Result<RbacSettings> {
    match std::env::var("ROLEGATE_SETTINGS") {
        Ok(path) => {
            info!(path = %path, "loading RBAC settings");
            Ok(RbacSettings::from_file(path)?)
        }
        Err(_) => {
            warn!("ROLEGATE_SETTINGS not set, using development settings");
            Ok(RbacSettings::development())
        }
    }
}

fn router(state: AppState, rbac: &RbacGuard) -> Router {
    // One route call per method so each handler gets its own guard
    Router::new()
        .route("/roles", get(list_roles).route_layer(rbac.layer("read", "role")))
        .route("/roles", post(create_role).route_layer(rbac.layer("create", "role")))
        .route("/roles/:roleid", get(get_role).route_layer(rbac.layer("read", "role")))
        .route("/roles/:roleid", put(update_role).route_layer(rbac.layer("update", "role")))
        .route("/roles/:roleid", delete(delete_role).route_layer(rbac.layer("delete", "role")))
        .route("/users/:userid/roles", get(user_roles).route_layer(rbac.layer("read", "role")))
        .route("/clients/:clientid/roles", get(client_roles).route_layer(rbac.layer("read", "role")))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,rolegate_rbac=debug")),
        )
        .init();

    let settings = load_settings()?;
    let store = Arc::new(MemoryRoleStore::from_settings(&settings)?);

    let registry = Arc::new(HookRegistry::new().with_config(settings.config));
    registry
        .patch_hooks(
            HookPatch::new()
                .tenant_extractor(HeaderExtractor::named("x-tenant-id")?)
                .user_extractor(HeaderExtractor::named("x-user-id")?)
                .client_extractor(HeaderExtractor::named("x-client-id")?)
                .role_lookup(store.clone()),
        )
        .await;

    let rbac = RbacGuard::new(registry.clone(), ConfigPatch::new());
    info!(config = ?registry.config().await, "RBAC guard ready");

    let app = router(AppState { store }, &rbac).layer(TraceLayer::new_for_http());

    let addr: SocketAddr = std::env::var("ROLEGATE_ADDR")
        .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
        .parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
