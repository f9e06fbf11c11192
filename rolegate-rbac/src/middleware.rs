//! RBAC guard middleware for axum services
//!
//! [`RbacGuard`] is built once per protected API surface from a shared
//! [`HookRegistry`] and a per-guard [`ConfigPatch`]. Each protected route
//! then gets its own [`GuardedOperation`] bound to a verb and a group,
//! usually installed through [`RbacGuard::layer`]:
//!
//! ```rust,no_run
//! use axum::{Router, routing::get};
//! use rolegate_rbac::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn list_roles() -> &'static str { "[]" }
//! let registry = Arc::new(HookRegistry::new());
//! let rbac = RbacGuard::new(registry, ConfigPatch::enforcing());
//!
//! let app: Router = Router::new()
//!     .route("/roles", get(list_roles).route_layer(rbac.layer("read", "role")));
//! ```

use crate::config::ConfigPatch;
use crate::decision::{Decision, Outcome, decide};
use crate::hooks::HookRegistry;
use axum::Json;
use axum::body::Body;
use axum::http::request::Parts;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};

/// Body of the response sent when a request is blocked
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeniedBody {
    /// HTTP status code
    pub error: u16,
    /// Fixed message
    pub error_message: &'static str,
}

impl DeniedBody {
    /// The one body the guard ever sends
    pub const PERMISSION_DENIED: DeniedBody = DeniedBody {
        error: 403,
        error_message: "Permission Denied",
    };
}

/// `403` with `{"error":403,"errorMessage":"Permission Denied"}`.
///
/// Every blocked request gets exactly this response, whatever the reason.
pub fn forbidden_response() -> Response {
    (StatusCode::FORBIDDEN, Json(DeniedBody::PERMISSION_DENIED)).into_response()
}

struct GuardInner {
    registry: Arc<HookRegistry>,
    config: ConfigPatch,
}

/// Factory for per-operation guards sharing one registry and one
/// per-instance configuration.
#[derive(Clone)]
pub struct RbacGuard {
    inner: Arc<GuardInner>,
}

impl RbacGuard {
    /// Guard over `registry` with a per-guard override
    pub fn new(registry: Arc<HookRegistry>, config: ConfigPatch) -> Self {
        Self {
            inner: Arc::new(GuardInner { registry, config }),
        }
    }

    /// Per-guard enforcement override
    pub fn config(&self) -> ConfigPatch {
        self.inner.config
    }

    /// Reusable decision function for `verb` on `group`
    pub fn operation(&self, verb: &str, group: &str) -> GuardedOperation {
        GuardedOperation {
            guard: self.inner.clone(),
            verb: Arc::from(verb),
            group: Arc::from(group),
        }
    }

    /// Tower layer enforcing `verb` on `group`
    pub fn layer(&self, verb: &str, group: &str) -> GuardLayer {
        GuardLayer {
            operation: self.operation(verb, group),
        }
    }
}

impl fmt::Debug for RbacGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RbacGuard")
            .field("config", &self.inner.config)
            .finish()
    }
}

/// A guard bound to one verb and group
#[derive(Clone)]
pub struct GuardedOperation {
    guard: Arc<GuardInner>,
    verb: Arc<str>,
    group: Arc<str>,
}

impl GuardedOperation {
    /// Guarded verb
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Guarded group
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Decide against a fresh snapshot of the registry
    pub async fn decide(&self, request: &Parts) -> Decision {
        let snapshot = self.guard.registry.snapshot().await;
        decide(&snapshot, &self.guard.config, request, &self.verb, &self.group).await
    }

    /// Outcome only
    pub async fn check(&self, request: &Parts) -> Outcome {
        self.decide(request).await.outcome
    }
}

impl fmt::Debug for GuardedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GuardedOperation({}({}))", self.verb, self.group)
    }
}

/// Layer produced by [`RbacGuard::layer`]
#[derive(Clone, Debug)]
pub struct GuardLayer {
    operation: GuardedOperation,
}

impl<S> Layer<S> for GuardLayer {
    type Service = GuardService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        GuardService {
            inner,
            operation: self.operation.clone(),
        }
    }
}

/// Service wrapping a handler behind a [`GuardedOperation`].
///
/// Allowed and observed-denied requests reach `inner`; enforced denials are
/// answered with [`forbidden_response`] and never reach it.
#[derive(Clone, Debug)]
pub struct GuardService<S> {
    inner: S,
    operation: GuardedOperation,
}

impl<S> Service<Request<Body>> for GuardService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        // The ready service goes with this call; a fresh clone stays behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let operation = self.operation.clone();

        Box::pin(async move {
            let (parts, body) = request.into_parts();
            if !operation.check(&parts).await.proceeds() {
                return Ok(forbidden_response());
            }
            inner.call(Request::from_parts(parts, body)).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardConfig;
    use crate::hooks::HookPatch;
    use crate::lookup::actor_lookup_fn;
    use axum::body::to_bytes;
    use rolegate_core::{Identity, Role, Rule, VerbMatcher};
    use serde_json::{Value, json};

    #[tokio::test]
    async fn test_forbidden_response_shape() {
        let response = forbidden_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            response.headers()["content-type"].to_str().unwrap(),
            "application/json"
        );

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"error": 403, "errorMessage": "Permission Denied"}));
    }

    #[tokio::test]
    async fn test_operation_reads_registry_on_every_call() {
        let registry = Arc::new(HookRegistry::new());
        let guard = RbacGuard::new(registry.clone(), ConfigPatch::new());
        let operation = guard.operation("update", "invoice");

        let request = Request::builder()
            .extension(Identity::anonymous().with_user("u1"))
            .body(())
            .unwrap()
            .into_parts()
            .0;

        // Default registry: log-only and no roles
        assert_eq!(operation.check(&request).await, Outcome::DenyObserved);

        registry
            .patch_config(ConfigPatch::enforcing())
            .await;
        assert_eq!(operation.check(&request).await, Outcome::DenyEnforced);

        registry
            .patch_hooks(HookPatch::new().roles_for_user(actor_lookup_fn(|_, _| {
                Ok(vec![Role::new("clerk", "Clerk").with_rule(Rule::new("invoice", VerbMatcher::any()))])
            })))
            .await;
        assert_eq!(operation.check(&request).await, Outcome::Allow);
        assert_eq!(registry.config().await, GuardConfig { log_only: false });
    }

    #[test]
    fn test_operation_binding() {
        let guard = RbacGuard::new(Arc::new(HookRegistry::new()), ConfigPatch::log_only());
        let operation = guard.operation("delete", "role");
        assert_eq!(operation.verb(), "delete");
        assert_eq!(operation.group(), "role");
        assert_eq!(format!("{:?}", operation), "GuardedOperation(delete(role))");
        assert_eq!(guard.config(), ConfigPatch::log_only());
    }
}
