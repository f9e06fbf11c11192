//! Role lookup hooks
//!
//! The guard consumes a role store only through three lookups: roles of a
//! user, roles of a client, and the anonymous default, each scoped by the
//! request's tenant. A lookup either produces a role list (possibly empty,
//! which simply means "no access") or fails. Stores that hand back raw JSON
//! go through [`decode_roles`], which reports a non-array document as
//! [`RbacError::RoleLookupContract`] instead of treating it as zero roles.

use crate::error::{RbacError, RbacResult};
use crate::hooks::Hooks;
use async_trait::async_trait;
use rolegate_core::{Actor, Identity, Role};
use serde_json::Value;
use std::sync::Arc;

/// Looks up the roles of an identified actor (user or client).
#[async_trait]
pub trait ActorRoleLookup: Send + Sync {
    async fn roles(&self, tenant_id: Option<&str>, actor_id: &str) -> RbacResult<Vec<Role>>;

    /// Name shown in hook diagnostics
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Looks up the roles granted to callers without credentials.
#[async_trait]
pub trait AnonymousRoleLookup: Send + Sync {
    async fn roles(&self, tenant_id: Option<&str>) -> RbacResult<Vec<Role>>;

    /// Name shown in hook diagnostics
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

#[async_trait]
impl<F> ActorRoleLookup for F
where
    F: Fn(Option<&str>, &str) -> RbacResult<Vec<Role>> + Send + Sync,
{
    async fn roles(&self, tenant_id: Option<&str>, actor_id: &str) -> RbacResult<Vec<Role>> {
        self(tenant_id, actor_id)
    }
}

#[async_trait]
impl<F> AnonymousRoleLookup for F
where
    F: Fn(Option<&str>) -> RbacResult<Vec<Role>> + Send + Sync,
{
    async fn roles(&self, tenant_id: Option<&str>) -> RbacResult<Vec<Role>> {
        self(tenant_id)
    }
}

/// Fix a closure's signature so it can serve as a user or client lookup.
pub fn actor_lookup_fn<F>(f: F) -> F
where
    F: Fn(Option<&str>, &str) -> RbacResult<Vec<Role>> + Send + Sync + 'static,
{
    f
}

/// Fix a closure's signature so it can serve as the anonymous lookup.
pub fn anonymous_lookup_fn<F>(f: F) -> F
where
    F: Fn(Option<&str>) -> RbacResult<Vec<Role>> + Send + Sync + 'static,
{
    f
}

/// A store that answers all three lookups.
///
/// Install it with [`HookPatch::role_lookup`](crate::hooks::HookPatch::role_lookup).
#[async_trait]
pub trait RoleLookup: Send + Sync {
    async fn roles_for_user(&self, tenant_id: Option<&str>, user_id: &str)
    -> RbacResult<Vec<Role>>;

    async fn roles_for_client(
        &self,
        tenant_id: Option<&str>,
        client_id: &str,
    ) -> RbacResult<Vec<Role>>;

    async fn roles_for_anonymous(&self, tenant_id: Option<&str>) -> RbacResult<Vec<Role>>;
}

/// The user lookup of a [`RoleLookup`]
pub struct UserRoles<L: ?Sized>(pub Arc<L>);

/// The client lookup of a [`RoleLookup`]
pub struct ClientRoles<L: ?Sized>(pub Arc<L>);

/// The anonymous lookup of a [`RoleLookup`]
pub struct AnonymousRoles<L: ?Sized>(pub Arc<L>);

#[async_trait]
impl<L: RoleLookup + ?Sized> ActorRoleLookup for UserRoles<L> {
    async fn roles(&self, tenant_id: Option<&str>, actor_id: &str) -> RbacResult<Vec<Role>> {
        self.0.roles_for_user(tenant_id, actor_id).await
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<L>()
    }
}

#[async_trait]
impl<L: RoleLookup + ?Sized> ActorRoleLookup for ClientRoles<L> {
    async fn roles(&self, tenant_id: Option<&str>, actor_id: &str) -> RbacResult<Vec<Role>> {
        self.0.roles_for_client(tenant_id, actor_id).await
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<L>()
    }
}

#[async_trait]
impl<L: RoleLookup + ?Sized> AnonymousRoleLookup for AnonymousRoles<L> {
    async fn roles(&self, tenant_id: Option<&str>) -> RbacResult<Vec<Role>> {
        self.0.roles_for_anonymous(tenant_id).await
    }

    fn name(&self) -> &'static str {
        std::any::type_name::<L>()
    }
}

/// Default lookups: every actor has no roles, so every request is denied.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyRoleLookup;

#[async_trait]
impl RoleLookup for EmptyRoleLookup {
    async fn roles_for_user(&self, _tenant_id: Option<&str>, _user_id: &str) -> RbacResult<Vec<Role>> {
        Ok(Vec::new())
    }

    async fn roles_for_client(
        &self,
        _tenant_id: Option<&str>,
        _client_id: &str,
    ) -> RbacResult<Vec<Role>> {
        Ok(Vec::new())
    }

    async fn roles_for_anonymous(&self, _tenant_id: Option<&str>) -> RbacResult<Vec<Role>> {
        Ok(Vec::new())
    }
}

/// Decode a raw role document into roles.
///
/// Anything other than a JSON array, or an array holding malformed role
/// records, is a contract violation by the store integration.
pub fn decode_roles(value: Value) -> RbacResult<Vec<Role>> {
    let records = match value {
        Value::Array(records) => records,
        other => {
            return Err(RbacError::RoleLookupContract(format!(
                "expected an array of roles, got {}",
                json_kind(&other)
            )));
        }
    };

    records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            serde_json::from_value::<Role>(record).map_err(|e| {
                RbacError::RoleLookupContract(format!("role record {}: {}", index, e))
            })
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Source of raw role documents, keyed by tenant and actor.
#[async_trait]
pub trait RoleDocumentSource: Send + Sync {
    async fn fetch(&self, tenant_id: Option<&str>, actor: Actor<'_>) -> RbacResult<Value>;
}

#[async_trait]
impl<F> RoleDocumentSource for F
where
    F: for<'a> Fn(Option<&'a str>, Actor<'a>) -> RbacResult<Value> + Send + Sync,
{
    async fn fetch(&self, tenant_id: Option<&str>, actor: Actor<'_>) -> RbacResult<Value> {
        self(tenant_id, actor)
    }
}

/// Adapts a [`RoleDocumentSource`] into a [`RoleLookup`] via [`decode_roles`].
pub struct JsonRoleLookup<S> {
    source: S,
}

impl<S: RoleDocumentSource> JsonRoleLookup<S> {
    /// Lookup over `source`
    pub fn new(source: S) -> Self {
        Self { source }
    }
}

/// Build a [`JsonRoleLookup`] from a synchronous closure.
pub fn json_lookup_fn<F>(f: F) -> JsonRoleLookup<F>
where
    F: for<'a> Fn(Option<&'a str>, Actor<'a>) -> RbacResult<Value> + Send + Sync + 'static,
{
    JsonRoleLookup { source: f }
}

#[async_trait]
impl<S: RoleDocumentSource> RoleLookup for JsonRoleLookup<S> {
    async fn roles_for_user(&self, tenant_id: Option<&str>, user_id: &str) -> RbacResult<Vec<Role>> {
        decode_roles(self.source.fetch(tenant_id, Actor::User(user_id)).await?)
    }

    async fn roles_for_client(
        &self,
        tenant_id: Option<&str>,
        client_id: &str,
    ) -> RbacResult<Vec<Role>> {
        decode_roles(self.source.fetch(tenant_id, Actor::Client(client_id)).await?)
    }

    async fn roles_for_anonymous(&self, tenant_id: Option<&str>) -> RbacResult<Vec<Role>> {
        decode_roles(self.source.fetch(tenant_id, Actor::Anonymous).await?)
    }
}

/// Pick exactly one lookup by actor precedence and run it.
pub async fn resolve_roles(hooks: &Hooks, identity: &Identity) -> RbacResult<Vec<Role>> {
    let tenant = identity.tenant();
    match identity.actor() {
        Actor::User(user_id) => hooks.roles_for_user.roles(tenant, user_id).await,
        Actor::Client(client_id) => hooks.roles_for_client.roles(tenant, client_id).await,
        Actor::Anonymous => hooks.roles_for_anonymous.roles(tenant).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookPatch;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_decode_roles_accepts_arrays() {
        let roles = decode_roles(json!([
            {"id": "1", "name": "reader", "rules": [{"group": "*", "verb": "read"}]}
        ]))
        .unwrap();
        assert_eq!(roles.len(), 1);
        assert!(decode_roles(json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_decode_roles_rejects_other_shapes() {
        for value in [json!(null), json!({"roles": []}), json!("admin"), json!(3)] {
            assert!(matches!(
                decode_roles(value),
                Err(RbacError::RoleLookupContract(_))
            ));
        }

        let err = decode_roles(json!([{"name": "no id"}])).unwrap_err();
        assert!(matches!(err, RbacError::RoleLookupContract(_)));
        assert!(err.to_string().contains("role record 0"));
    }

    #[tokio::test]
    async fn test_user_path_wins_and_client_path_is_not_invoked() {
        let client_calls = Arc::new(AtomicUsize::new(0));
        let counter = client_calls.clone();

        let mut hooks = Hooks::default();
        HookPatch::new()
            .roles_for_user(actor_lookup_fn(|_, user| Ok(vec![Role::new(user, "user role")])))
            .roles_for_client(actor_lookup_fn(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Vec::new())
            }))
            .apply(&mut hooks);

        let identity = Identity::anonymous().with_user("u1").with_client("c1");
        let roles = resolve_roles(&hooks, &identity).await.unwrap();

        assert_eq!(roles[0].id, "u1");
        assert_eq!(client_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_anonymous_path_receives_tenant() {
        let mut hooks = Hooks::default();
        HookPatch::new()
            .roles_for_anonymous(anonymous_lookup_fn(|tenant| {
                Ok(vec![Role::new(tenant.unwrap_or("none"), "guest")])
            }))
            .apply(&mut hooks);

        let identity = Identity::anonymous().with_tenant("acme");
        let roles = resolve_roles(&hooks, &identity).await.unwrap();
        assert_eq!(roles[0].id, "acme");
    }

    #[tokio::test]
    async fn test_json_lookup_reports_contract_violation() {
        let lookup = json_lookup_fn(|_tenant, actor| match actor {
            Actor::User(_) => Ok(json!([{"id": "1", "name": "reader"}])),
            _ => Ok(json!({"unexpected": true})),
        });

        assert_eq!(lookup.roles_for_user(None, "u1").await.unwrap().len(), 1);
        assert!(matches!(
            lookup.roles_for_client(None, "c1").await,
            Err(RbacError::RoleLookupContract(_))
        ));
    }

    #[tokio::test]
    async fn test_default_lookups_are_empty() {
        let hooks = Hooks::default();
        for identity in [
            Identity::anonymous().with_user("u1"),
            Identity::anonymous().with_client("c1"),
            Identity::anonymous(),
        ] {
            assert!(resolve_roles(&hooks, &identity).await.unwrap().is_empty());
        }
    }
}
