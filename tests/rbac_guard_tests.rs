//! End-to-end tests for the axum guard
//!
//! Each test builds its own registry and router, sends requests through
//! `tower::ServiceExt::oneshot` and checks what reaches the handler.

use anyhow::Result;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use axum::routing::{delete, get};
use rolegate::prelude::*;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::ServiceExt;

async fn handler(hits: Arc<AtomicUsize>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    "ok"
}

/// `/invoices` guarded by read(invoice), `/invoices/:id` by delete(invoice)
fn app(guard: &RbacGuard, hits: Arc<AtomicUsize>) -> Router {
    let read_hits = hits.clone();
    Router::new()
        .route(
            "/invoices",
            get(move || handler(read_hits.clone())).route_layer(guard.layer("read", "invoice")),
        )
        .route(
            "/invoices/:id",
            delete(move || handler(hits.clone())).route_layer(guard.layer("delete", "invoice")),
        )
}

fn request(method: &str, uri: &str, headers: &[(&str, &str)]) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    builder.body(Body::empty()).unwrap()
}

async fn header_registry(store: Arc<MemoryRoleStore>) -> Result<Arc<HookRegistry>> {
    let registry = Arc::new(HookRegistry::new());
    registry
        .patch_hooks(
            HookPatch::new()
                .tenant_extractor(HeaderExtractor::named("x-tenant-id")?)
                .user_extractor(HeaderExtractor::named("x-user-id")?)
                .client_extractor(HeaderExtractor::named("x-client-id")?)
                .role_lookup(store),
        )
        .await;
    Ok(registry)
}

async fn seeded_store() -> Result<Arc<MemoryRoleStore>> {
    let store = Arc::new(MemoryRoleStore::new());
    store
        .upsert_role(
            Role::new("reader", "Reader").with_rule(Rule::new("invoice", VerbMatcher::exact("read"))),
        )
        .await;
    store
        .upsert_role(
            Role::new("service", "Service").with_rule(Rule::new(GroupMatcher::Any, VerbMatcher::any())),
        )
        .await;
    store.add_user_roles("u1", &["reader".to_string()]).await?;
    store.add_client_roles("c1", &["service".to_string()]).await?;
    Ok(store)
}

async fn body_json(response: axum::response::Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn test_allowed_request_reaches_handler() -> Result<()> {
    let registry = header_registry(seeded_store().await?).await?;
    let guard = RbacGuard::new(registry, ConfigPatch::enforcing());
    let hits = Arc::new(AtomicUsize::new(0));

    let response = app(&guard, hits.clone())
        .oneshot(request("GET", "/invoices", &[("x-user-id", "u1")]))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_enforced_denial_returns_fixed_403() -> Result<()> {
    let registry = header_registry(seeded_store().await?).await?;
    let guard = RbacGuard::new(registry, ConfigPatch::enforcing());
    let hits = Arc::new(AtomicUsize::new(0));

    let response = app(&guard, hits.clone())
        .oneshot(request("DELETE", "/invoices/42", &[("x-user-id", "u1")]))
        .await?;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(
        body_json(response).await?,
        json!({"error": 403, "errorMessage": "Permission Denied"})
    );
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    Ok(())
}

#[tokio::test]
async fn test_log_only_denial_passes_through() -> Result<()> {
    let registry = header_registry(seeded_store().await?).await?;
    // No per-guard override: the registry default is log-only
    let guard = RbacGuard::new(registry, ConfigPatch::new());
    let hits = Arc::new(AtomicUsize::new(0));

    let response = app(&guard, hits.clone())
        .oneshot(request("DELETE", "/invoices/42", &[("x-user-id", "u1")]))
        .await?;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_user_takes_precedence_over_client() -> Result<()> {
    let registry = header_registry(seeded_store().await?).await?;
    let guard = RbacGuard::new(registry, ConfigPatch::enforcing());
    let hits = Arc::new(AtomicUsize::new(0));

    // The client alone may delete
    let response = app(&guard, hits.clone())
        .oneshot(request("DELETE", "/invoices/42", &[("x-client-id", "c1")]))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    // With a user present only the user's roles count
    let response = app(&guard, hits.clone())
        .oneshot(request(
            "DELETE",
            "/invoices/42",
            &[("x-client-id", "c1"), ("x-user-id", "u1")],
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    Ok(())
}

#[tokio::test]
async fn test_tenant_scoped_roles() -> Result<()> {
    let store = seeded_store().await?;
    store
        .upsert_role(
            Role::new("acme-admin", "Acme admin")
                .with_tenant("acme")
                .with_rule(Rule::any()),
        )
        .await;
    store.add_user_roles("u2", &["acme-admin".to_string()]).await?;

    let guard = RbacGuard::new(header_registry(store).await?, ConfigPatch::enforcing());
    let hits = Arc::new(AtomicUsize::new(0));

    let inside = app(&guard, hits.clone())
        .oneshot(request(
            "DELETE",
            "/invoices/1",
            &[("x-tenant-id", "acme"), ("x-user-id", "u2")],
        ))
        .await?;
    assert_eq!(inside.status(), StatusCode::OK);

    let outside = app(&guard, hits.clone())
        .oneshot(request(
            "DELETE",
            "/invoices/1",
            &[("x-tenant-id", "globex"), ("x-user-id", "u2")],
        ))
        .await?;
    assert_eq!(outside.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_anonymous_roles_apply_without_credentials() -> Result<()> {
    let store = seeded_store().await?;
    let guard = RbacGuard::new(header_registry(store.clone()).await?, ConfigPatch::enforcing());
    let hits = Arc::new(AtomicUsize::new(0));

    let response = app(&guard, hits.clone())
        .oneshot(request("GET", "/invoices", &[]))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    store.set_anonymous_roles(&["reader".to_string()]).await?;
    let response = app(&guard, hits.clone())
        .oneshot(request("GET", "/invoices", &[]))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_runtime_patches_apply_to_existing_guards() -> Result<()> {
    let registry = Arc::new(HookRegistry::new());
    let guard = RbacGuard::new(registry.clone(), ConfigPatch::new());
    let hits = Arc::new(AtomicUsize::new(0));
    let router = app(&guard, hits.clone());

    // Log-only by default
    let response = router
        .clone()
        .oneshot(request("GET", "/invoices", &[]))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    registry.patch_config(ConfigPatch::enforcing()).await;
    let response = router
        .clone()
        .oneshot(request("GET", "/invoices", &[]))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    registry
        .patch_hooks(HookPatch::new().roles_for_anonymous(anonymous_lookup_fn(|_| {
            Ok(vec![Role::new("open", "Open").with_rule(Rule::any())])
        })))
        .await;
    let response = router.oneshot(request("GET", "/invoices", &[])).await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    Ok(())
}

#[tokio::test]
async fn test_guards_with_different_modes_share_a_registry() -> Result<()> {
    let registry = header_registry(seeded_store().await?).await?;
    let observing = RbacGuard::new(registry.clone(), ConfigPatch::log_only());
    let enforcing = RbacGuard::new(registry, ConfigPatch::enforcing());
    let hits = Arc::new(AtomicUsize::new(0));

    let response = app(&observing, hits.clone())
        .oneshot(request("DELETE", "/invoices/9", &[("x-user-id", "u1")]))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app(&enforcing, hits.clone())
        .oneshot(request("DELETE", "/invoices/9", &[("x-user-id", "u1")]))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn test_identity_extension_is_the_default_source() -> Result<()> {
    let store = seeded_store().await?;
    let registry = Arc::new(HookRegistry::new());
    registry
        .patch_hooks(HookPatch::new().role_lookup(store))
        .await;
    let guard = RbacGuard::new(registry, ConfigPatch::enforcing());
    let hits = Arc::new(AtomicUsize::new(0));

    let mut req = request("GET", "/invoices", &[]);
    req.extensions_mut().insert(Identity::anonymous().with_user("u1"));

    let response = app(&guard, hits.clone()).oneshot(req).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}
